use super::language_model::LanguageModel;
use super::smoothing::KneserNey;
use super::tokens;
use crate::error::ModelError;

/// Scores sentences against a trained model.
///
/// Composes the n-gram extractor with the Kneser-Ney estimator to turn
/// a sentence into a joint probability and a perplexity. Probabilities
/// are accumulated in log space and exponentiated once, so long
/// sentences do not underflow.
pub struct Scorer<'a> {
	model: &'a LanguageModel,
	smoothing: KneserNey,
}

impl<'a> Scorer<'a> {
	/// Creates a scorer with the conventional discount of 0.75 and the
	/// default zero-count floor.
	pub fn new(model: &'a LanguageModel) -> Self {
		Self { model, smoothing: KneserNey::default() }
	}

	/// Creates a scorer with an explicitly configured estimator.
	pub fn with_smoothing(model: &'a LanguageModel, smoothing: KneserNey) -> Self {
		Self { model, smoothing }
	}

	/// Joint probability of `sentence` under the model.
	///
	/// Multiplies the smoothed probabilities of every order-N n-gram of
	/// the tagged sentence. A sentence too short to contain a single
	/// n-gram scores 1.0 (the empty product).
	pub fn sentence_score(&self, sentence: &str) -> Result<f64, ModelError> {
		Ok(self.log_score(sentence)?.exp())
	}

	/// Natural-log joint probability of `sentence`.
	fn log_score(&self, sentence: &str) -> Result<f64, ModelError> {
		let Some(tagged) = tokens::tag_sentence(sentence) else {
			return Ok(0.0);
		};

		let order = self.model.order();
		let mut log_sum = 0.0;
		for ngram in tokens::ngrams(&tagged, order) {
			let p = self.smoothing.estimate(self.model.tables(), order, ngram)?;
			log_sum += p.ln();
		}
		Ok(log_sum)
	}

	/// Perplexity of a single sentence: `score ^ (-1 / word_count)`.
	///
	/// `word_count` is the number of whitespace-delimited tokens of the
	/// raw sentence, sentinels excluded. Lower is better.
	///
	/// # Errors
	/// Returns `EmptySentence` when the sentence has no tokens.
	pub fn perplexity(&self, sentence: &str) -> Result<f64, ModelError> {
		let word_count = sentence.split_whitespace().count();
		if word_count == 0 {
			return Err(ModelError::EmptySentence);
		}
		let log_score = self.log_score(sentence)?;
		Ok((-log_score / word_count as f64).exp())
	}

	/// Aggregate perplexity over a corpus, in the base-10 cross-entropy
	/// form: `10 ^ (-sum(log10(score_i)) / sentence_count)`.
	///
	/// Note this differs from the per-sentence formula, which
	/// normalizes by word count rather than sentence count. The sum is
	/// taken over log-space scores directly, so long corpora do not
	/// underflow.
	///
	/// # Errors
	/// Returns `EmptyCorpus` when `sentences` yields nothing.
	pub fn corpus_perplexity<I, S>(&self, sentences: I) -> Result<f64, ModelError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut log10_sum = 0.0;
		let mut sentence_count = 0usize;
		for sentence in sentences {
			log10_sum += self.log_score(sentence.as_ref())? / std::f64::consts::LN_10;
			sentence_count += 1;
		}
		if sentence_count == 0 {
			return Err(ModelError::EmptyCorpus);
		}
		Ok(10f64.powf(-log10_sum / sentence_count as f64))
	}
}
