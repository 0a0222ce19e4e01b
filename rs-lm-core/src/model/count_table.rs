use std::collections::HashMap;

use crate::error::ModelError;

/// Counts at or below this value are folded into the unknown bucket by
/// the collapsing pass, and the bucket then carries exactly this value
/// as a floor count.
pub(crate) const RARE_THRESHOLD: u64 = 2;

/// Key of a count table entry.
///
/// The rare-event bucket is a dedicated variant rather than a reserved
/// in-vocabulary string, so it can never collide with a real token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum NgramKey {
	/// An observed n-gram, stored as its ordered tokens.
	Entry(Vec<String>),
	/// The collapsed bucket absorbing all rare n-grams of this order.
	Unknown,
}

/// Frequency table for n-grams of a single fixed order.
///
/// # Responsibilities
/// - Accumulate occurrence counts during training
/// - Collapse rare events into the unknown bucket once training ends
/// - Answer the prefix queries needed by Kneser-Ney smoothing
/// - Merge with another table of the same order (parallel training)
///
/// # Invariants
/// - Every `Entry` key holds exactly `order` tokens
/// - After `collapse_rare`, every surviving `Entry` count is strictly
///   above `RARE_THRESHOLD` and `Unknown` carries exactly the threshold
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CountTable {
	/// N-gram length this table covers.
	order: usize,
	/// Occurrence counts keyed by n-gram.
	counts: HashMap<NgramKey, u64>,
}

impl CountTable {
	/// Creates an empty table for n-grams of length `order`.
	pub fn new(order: usize) -> Self {
		Self { order, counts: HashMap::new() }
	}

	/// N-gram length this table covers.
	pub fn order(&self) -> usize {
		self.order
	}

	/// Number of distinct keys, unknown bucket included.
	pub fn len(&self) -> usize {
		self.counts.len()
	}

	/// Records one occurrence of `ngram`.
	pub fn increment(&mut self, ngram: &[String]) {
		debug_assert_eq!(ngram.len(), self.order);
		*self.counts.entry(NgramKey::Entry(ngram.to_vec())).or_insert(0) += 1;
	}

	/// Occurrence count of `ngram`; zero when absent or collapsed.
	pub fn count(&self, ngram: &[String]) -> u64 {
		self.counts.get(&NgramKey::Entry(ngram.to_vec())).copied().unwrap_or(0)
	}

	/// Count carried by the unknown bucket (zero before collapsing).
	pub fn unknown_count(&self) -> u64 {
		self.counts.get(&NgramKey::Unknown).copied().unwrap_or(0)
	}

	/// Folds every n-gram whose count is at or below `RARE_THRESHOLD`
	/// into the unknown bucket, which ends up carrying exactly the
	/// threshold as a floor count.
	///
	/// Applied once, at the end of training. Running it again leaves the
	/// table unchanged: surviving entries are strictly above the
	/// threshold and the bucket is simply re-seeded.
	pub fn collapse_rare(&mut self) {
		self.counts.retain(|_, count| *count > RARE_THRESHOLD);
		self.counts.insert(NgramKey::Unknown, RARE_THRESHOLD);
	}

	/// Number of distinct entries whose first token is `token`.
	///
	/// On the bigram table this is the Kneser-Ney continuation count of
	/// the token.
	pub fn continuation_count(&self, token: &str) -> u64 {
		self.counts
			.keys()
			.filter(|key| match key {
				NgramKey::Entry(tokens) => tokens.first().is_some_and(|first| first == token),
				NgramKey::Unknown => false,
			})
			.count() as u64
	}

	/// Number of distinct entries whose leading tokens equal `prefix`
	/// (how many distinct tokens have followed this prefix).
	pub fn unique_completions(&self, prefix: &[String]) -> u64 {
		self.counts
			.keys()
			.filter(|key| match key {
				NgramKey::Entry(tokens) => tokens.starts_with(prefix),
				NgramKey::Unknown => false,
			})
			.count() as u64
	}

	/// Merges another table into this one.
	///
	/// Occurrence counts for matching keys are summed.
	///
	/// # Errors
	/// Returns an error if the table orders do not match.
	pub fn merge(&mut self, other: &Self) -> Result<(), ModelError> {
		if self.order != other.order {
			return Err(ModelError::OrderMismatch { expected: self.order, actual: other.order });
		}

		for (key, count) in &other.counts {
			*self.counts.entry(key.clone()).or_insert(0) += *count;
		}

		Ok(())
	}

	/// Iterates over all keys and counts (enumeration order unspecified).
	pub fn iter(&self) -> impl Iterator<Item = (&NgramKey, u64)> {
		self.counts.iter().map(|(key, count)| (key, *count))
	}

	/// Inserts a key with an explicit count, used when reconstructing a
	/// table from its persisted form.
	pub fn insert_raw(&mut self, key: NgramKey, count: u64) {
		self.counts.insert(key, count);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grams(words: &[&str]) -> Vec<String> {
		words.iter().map(|w| w.to_string()).collect()
	}

	#[test]
	fn increments_and_counts() {
		let mut table = CountTable::new(2);
		table.increment(&grams(&["the", "cat"]));
		table.increment(&grams(&["the", "cat"]));
		table.increment(&grams(&["the", "dog"]));

		assert_eq!(table.order(), 2);
		assert_eq!(table.count(&grams(&["the", "cat"])), 2);
		assert_eq!(table.count(&grams(&["the", "dog"])), 1);
		assert_eq!(table.count(&grams(&["a", "fish"])), 0);
		assert_eq!(table.len(), 2);
	}

	#[test]
	fn collapse_folds_rare_entries() {
		let mut table = CountTable::new(1);
		for _ in 0..5 {
			table.increment(&grams(&["kept"]));
		}
		for _ in 0..2 {
			table.increment(&grams(&["dropped"]));
		}

		table.collapse_rare();

		assert_eq!(table.count(&grams(&["kept"])), 5);
		assert_eq!(table.count(&grams(&["dropped"])), 0);
		assert_eq!(table.unknown_count(), RARE_THRESHOLD);
	}

	#[test]
	fn collapse_is_idempotent() {
		let mut table = CountTable::new(1);
		for _ in 0..5 {
			table.increment(&grams(&["kept"]));
		}
		table.increment(&grams(&["rare"]));

		table.collapse_rare();
		let once = table.clone();
		table.collapse_rare();

		assert_eq!(table, once);
	}

	#[test]
	fn prefix_queries() {
		let mut table = CountTable::new(2);
		table.increment(&grams(&["the", "cat"]));
		table.increment(&grams(&["the", "dog"]));
		table.increment(&grams(&["a", "cat"]));

		assert_eq!(table.unique_completions(&grams(&["the"])), 2);
		assert_eq!(table.unique_completions(&grams(&["a"])), 1);
		assert_eq!(table.unique_completions(&grams(&["missing"])), 0);
		assert_eq!(table.continuation_count("the"), 2);
		assert_eq!(table.continuation_count("cat"), 0);
	}

	#[test]
	fn merge_sums_counts_and_checks_order() {
		let mut left = CountTable::new(1);
		let mut right = CountTable::new(1);
		left.increment(&grams(&["shared"]));
		right.increment(&grams(&["shared"]));
		right.increment(&grams(&["only"]));

		left.merge(&right).unwrap();
		assert_eq!(left.count(&grams(&["shared"])), 2);
		assert_eq!(left.count(&grams(&["only"])), 1);

		let other_order = CountTable::new(3);
		assert!(matches!(left.merge(&other_order), Err(ModelError::OrderMismatch { .. })));
	}
}
