use super::count_table::{CountTable, RARE_THRESHOLD};
use super::language_model::LanguageModel;
use crate::error::ModelError;

/// Conventional discount used when no explicit value is supplied.
pub const DEFAULT_DISCOUNT: f64 = 0.75;

/// Recursive Kneser-Ney probability estimator.
///
/// Converts raw occurrence counts into a calibrated conditional
/// probability for an n-gram, recursively blending the current order
/// with every lower order down to the continuation-count base case.
///
/// # Responsibilities
/// - Validate the discount and floor parameters
/// - Reserve discounted mass for lower orders via the lambda weight
/// - Substitute floors for zero counts so every quantity stays positive
///
/// # Invariants
/// - `discount` lies strictly between 0.0 and 1.0
/// - `zero_floor` is strictly positive
pub struct KneserNey {
	/// Subtractive discount applied to raw counts.
	discount: f64,
	/// Substitute for zero prefix/completion counts. Keeps every
	/// denominator and lambda weight strictly positive, so unseen
	/// contexts never collapse the probability mass.
	zero_floor: u64,
}

impl Default for KneserNey {
	fn default() -> Self {
		Self { discount: DEFAULT_DISCOUNT, zero_floor: RARE_THRESHOLD }
	}
}

impl KneserNey {
	/// Creates an estimator with the given discount and the default
	/// zero-count floor.
	///
	/// # Errors
	/// Returns an error unless `discount` lies strictly between 0.0
	/// and 1.0.
	pub fn new(discount: f64) -> Result<Self, ModelError> {
		Self::with_zero_floor(discount, RARE_THRESHOLD)
	}

	/// Creates an estimator with an explicit zero-count floor.
	///
	/// The default floor happens to equal the rare-event collapsing
	/// threshold, but the two are independent tunables.
	///
	/// # Errors
	/// Returns an error if `discount` is outside (0.0, 1.0) or the
	/// floor is zero.
	pub fn with_zero_floor(discount: f64, zero_floor: u64) -> Result<Self, ModelError> {
		if !(discount > 0.0 && discount < 1.0) {
			return Err(ModelError::InvalidDiscount(discount));
		}
		if zero_floor == 0 {
			return Err(ModelError::InvalidFloor);
		}
		Ok(Self { discount, zero_floor })
	}

	/// Smoothed conditional probability of the last token of `ngram`
	/// given its prefix, backing off through all lower orders.
	///
	/// # Parameters
	/// - `model`: a trained model of order N
	/// - `order`: the n-gram length to evaluate, within [1, N]
	/// - `ngram`: exactly `order` tokens
	///
	/// # Errors
	/// - `InvalidOrder` when `order` is outside [1, N] or the n-gram
	///   length differs from `order`
	/// - `DegenerateModel` when the unigram or bigram table is empty
	pub fn probability(
		&self,
		model: &LanguageModel,
		order: usize,
		ngram: &[&str],
	) -> Result<f64, ModelError> {
		if order == 0 || order > model.order() {
			return Err(ModelError::InvalidOrder(format!(
				"estimation order must be within [1, {}], got {order}",
				model.order()
			)));
		}
		if ngram.len() != order {
			return Err(ModelError::InvalidOrder(format!(
				"expected an n-gram of {order} tokens, got {}",
				ngram.len()
			)));
		}

		let owned: Vec<String> = ngram.iter().map(|token| (*token).to_owned()).collect();
		self.estimate(model.tables(), order, &owned)
	}

	/// Recursive estimation over the table stack; `tables[k - 1]` holds
	/// the order-k counts. Callers have already validated `order` and
	/// the n-gram length.
	pub(crate) fn estimate(
		&self,
		tables: &[CountTable],
		order: usize,
		ngram: &[String],
	) -> Result<f64, ModelError> {
		let d = self.discount;

		if order == 1 {
			// Base case: continuation counts instead of raw frequency.
			// A word seen in many distinct contexts gets more mass than
			// a word that is merely frequent.
			let unigrams = &tables[0];
			let bigrams = &tables[1];
			if unigrams.len() == 0 || bigrams.len() == 0 {
				return Err(ModelError::DegenerateModel(
					"empty unigram or bigram table, model holds no training data".to_owned(),
				));
			}
			let continuation = bigrams.continuation_count(&ngram[0]) as f64;
			return Ok(
				(continuation - d).max(0.0) / bigrams.len() as f64 + d / unigrams.len() as f64
			);
		}

		let table = &tables[order - 1];
		let lower_table = &tables[order - 2];
		let prefix = &ngram[..order - 1];

		// Zero counts are floored to keep both divisions strictly
		// positive; handled locally, never surfaced.
		let mut prefix_count = lower_table.count(prefix);
		if prefix_count == 0 {
			prefix_count = self.zero_floor;
		}
		let mut completions = table.unique_completions(prefix);
		if completions == 0 {
			completions = self.zero_floor;
		}

		// Discounted mass reserved for the lower-order estimate, scaled
		// by how many distinct continuations this prefix has.
		let lambda = (d / prefix_count as f64) * completions as f64;
		let lower_probability = self.estimate(tables, order - 1, &ngram[1..])?;

		Ok((table.count(ngram) as f64 - d).max(0.0) / prefix_count as f64
			+ lambda * lower_probability)
	}
}
