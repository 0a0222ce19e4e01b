use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use serde::{Deserialize, Serialize};

use super::count_table::{CountTable, NgramKey};
use super::smoothing::KneserNey;
use super::tokens;
use crate::error::ModelError;
use crate::io;

/// Reserved wire spelling of the unknown bucket in persisted models.
///
/// The tokenizer adapter lowercases and splits on whitespace, so this
/// angle-bracket form can never be emitted as a real token.
const UNKNOWN_SPELLING: &str = "<unk>";

/// On-disk form of a model: the order plus one map per order, keyed by
/// the whitespace-joined n-gram so the tuple boundary is recoverable by
/// re-splitting. Tokens must not contain the join delimiter; upstream
/// tokenization guarantees this.
#[derive(Serialize, Deserialize)]
struct ModelData {
	order: usize,
	tables: Vec<HashMap<String, u64>>,
}

/// Word-level n-gram language model smoothed with Kneser-Ney.
///
/// The model owns one frequency table per order from 1 to `order`,
/// populated during a single training pass and collapsed once at the
/// end, after which the tables are read-only.
///
/// # Responsibilities
/// - Ingest sentences and accumulate n-gram counts for every order
/// - Collapse rare events into per-order unknown buckets
/// - Persist and restore the full table set
/// - Expose counts and smoothed probabilities to consumers
///
/// # Invariants
/// - `order` is always >= 2 (the estimator base case divides by the
///   unigram and bigram table sizes)
/// - `tables[k - 1]` holds exactly the n-grams of length `k`
/// - Tables are only mutated by training and the collapsing pass
#[derive(Clone, Debug, PartialEq)]
pub struct LanguageModel {
	/// Maximum n-gram length modeled; fixed at construction.
	order: usize,
	/// One count table per order, table for order k at index k - 1.
	tables: Vec<CountTable>,
}

impl LanguageModel {
	/// Creates an empty model of the given maximum order.
	///
	/// # Errors
	/// Returns an error if `order < 2`.
	pub fn new(order: usize) -> Result<Self, ModelError> {
		if order < 2 {
			return Err(ModelError::InvalidOrder(format!(
				"model order must be >= 2, got {order}"
			)));
		}
		let tables = (1..=order).map(CountTable::new).collect();
		Ok(Self { order, tables })
	}

	/// Maximum n-gram length modeled.
	pub fn order(&self) -> usize {
		self.order
	}

	/// One table per order, table for order k at index k - 1.
	pub(crate) fn tables(&self) -> &[CountTable] {
		&self.tables
	}

	/// Occurrence count of `ngram` in the table of its own length.
	///
	/// Zero for n-grams never observed or collapsed into the unknown
	/// bucket, and for lengths outside [1, order].
	pub fn count(&self, ngram: &[&str]) -> u64 {
		if ngram.is_empty() || ngram.len() > self.order {
			return 0;
		}
		let owned: Vec<String> = ngram.iter().map(|token| (*token).to_owned()).collect();
		self.tables[ngram.len() - 1].count(&owned)
	}

	/// Floor count carried by the unknown bucket of the given order
	/// (zero before training, the rare threshold after).
	pub fn unknown_count(&self, order: usize) -> u64 {
		if order == 0 || order > self.order {
			return 0;
		}
		self.tables[order - 1].unknown_count()
	}

	/// Trains the model on a sequence of sentences.
	///
	/// Every sentence contributes one count per contained k-gram, for
	/// every order k up to the model order. Once the iterator is
	/// exhausted the rare-event collapsing pass runs, once per table.
	///
	/// # Notes
	/// - Sentences yielding no tokens are reported and skipped
	/// - A corpus of zero sentences leaves tables that are empty except
	///   for the unknown buckets
	pub fn train<I, S>(&mut self, sentences: I)
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		for sentence in sentences {
			self.count_sentence(sentence.as_ref());
		}
		self.collapse_rare();
	}

	/// Builds a model by reading every `.txt` file inside `folder` and
	/// training on their lines in parallel.
	///
	/// # Behavior
	/// - Unreadable files are logged and skipped; training continues
	///   with the remaining files
	/// - Sentences are pooled and counted on worker threads, then the
	///   partial models are merged and collapsed once
	///
	/// # Errors
	/// Fails if `folder` is not a directory or cannot be listed, or if
	/// `order < 2`.
	pub fn train_folder<P: AsRef<Path>>(folder: P, order: usize) -> Result<Self, ModelError> {
		let string_path = match folder.as_ref().to_str() {
			Some(s) => s,
			None => {
				return Err(ModelError::Io(std::io::Error::new(
					std::io::ErrorKind::InvalidInput,
					"invalid folder path",
				)));
			}
		};
		// Normalize "folder" / "folder/"
		let folder = io::normalize_folder(string_path);

		if !folder.is_dir() {
			return Err(ModelError::Io(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				format!("expected a directory, got: {}", folder.display()),
			)));
		}

		let mut sentences = Vec::new();
		for path in io::list_files(&folder, "txt")? {
			match io::read_sentences(&path) {
				Ok(lines) => sentences.extend(lines),
				Err(err) => {
					log::warn!("skipping unreadable corpus file {}: {err}", path.display());
				}
			}
		}

		Self::train_parallel(sentences, order)
	}

	/// Builds a model from pooled sentences, one partial model per
	/// chunk of work, merged into a final model.
	///
	/// # Behavior
	/// - Splits the sentences into chunks (based on CPU cores * factor)
	/// - Spawns threads counting each chunk into a partial model
	/// - Merges all partial models by summing counts
	/// - Collapses rare events once, on the merged tables only: a
	///   per-partition collapse would diverge the unknown buckets
	///
	/// # Notes
	/// - Uses MPSC channels to collect partial models from threads
	/// - `unwrap()` is safe because the order was validated above
	pub fn train_parallel(sentences: Vec<String>, order: usize) -> Result<Self, ModelError> {
		let mut final_model = Self::new(order)?;
		if sentences.is_empty() {
			final_model.collapse_rare();
			return Ok(final_model);
		}

		let cpus = num_cpus::get();
		let factor = 8;
		let chunks = cpus * factor;
		let chunk_size = (sentences.len() + chunks - 1) / chunks;

		let (tx, rx) = mpsc::channel();
		for chunk in sentences.chunks(chunk_size) {
			let tx = tx.clone();
			let chunk: Vec<String> = chunk.to_vec();

			thread::spawn(move || {
				let mut partial_model = LanguageModel::new(order).unwrap();
				for sentence in chunk {
					partial_model.count_sentence(&sentence);
				}
				tx.send(partial_model).expect("Failed to send from thread");
			});
		}
		drop(tx);

		for partial_model in rx.iter() {
			final_model.merge(&partial_model)?;
		}

		final_model.collapse_rare();
		Ok(final_model)
	}

	/// Counts every k-gram of one sentence, for k = 1 to the model
	/// order. Counts stay raw; collapsing runs once when training ends.
	fn count_sentence(&mut self, sentence: &str) {
		let Some(tagged) = tokens::tag_sentence(sentence) else {
			log::debug!("skipping sentence with no tokens");
			return;
		};

		for k in 1..=self.order {
			for ngram in tokens::ngrams(&tagged, k) {
				self.tables[k - 1].increment(ngram);
			}
		}
	}

	/// Runs the rare-event collapsing pass on every table independently.
	fn collapse_rare(&mut self) {
		for table in &mut self.tables {
			table.collapse_rare();
		}
	}

	/// Merges another model into this one by summing per-order counts.
	///
	/// Summing is commutative and associative, so partial models from
	/// partitioned training can be combined in any order before the
	/// single collapsing pass.
	///
	/// # Errors
	/// Returns an error if the model orders do not match.
	pub fn merge(&mut self, other: &Self) -> Result<(), ModelError> {
		if self.order != other.order {
			return Err(ModelError::OrderMismatch {
				expected: self.order,
				actual: other.order,
			});
		}

		for (table, other_table) in self.tables.iter_mut().zip(&other.tables) {
			table.merge(other_table)?;
		}

		Ok(())
	}

	/// Serializes the model to its compact byte form.
	///
	/// The payload is self-describing: the order followed by one table
	/// per order, keyed by the whitespace-joined n-gram.
	pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
		let tables = self
			.tables
			.iter()
			.map(|table| {
				table
					.iter()
					.map(|(key, count)| {
						let joined = match key {
							NgramKey::Entry(tokens) => tokens.join(" "),
							NgramKey::Unknown => UNKNOWN_SPELLING.to_owned(),
						};
						(joined, count)
					})
					.collect()
			})
			.collect();

		let data = ModelData { order: self.order, tables };
		Ok(postcard::to_stdvec(&data)?)
	}

	/// Reconstructs a model from its persisted byte form, bypassing the
	/// collapsing pass (it already ran before the model was saved).
	///
	/// Whether the declared order matches the caller's expectation is
	/// the caller's policy; it is not enforced here.
	///
	/// # Errors
	/// Returns `Deserialization` when the payload is malformed,
	/// truncated, or structurally incoherent (table count differing
	/// from the declared order, or a key whose token count does not
	/// match its table). No partial state is installed on failure.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
		let data: ModelData = postcard::from_bytes(bytes)?;

		if data.order < 2 {
			return Err(ModelError::Deserialization(format!(
				"payload declares order {}, minimum is 2",
				data.order
			)));
		}
		if data.tables.len() != data.order {
			return Err(ModelError::Deserialization(format!(
				"payload declares order {} but holds {} tables",
				data.order,
				data.tables.len()
			)));
		}

		let mut tables = Vec::with_capacity(data.order);
		for (index, wire_table) in data.tables.into_iter().enumerate() {
			let mut table = CountTable::new(index + 1);
			for (joined, count) in wire_table {
				if joined == UNKNOWN_SPELLING {
					table.insert_raw(NgramKey::Unknown, count);
					continue;
				}
				let ngram: Vec<String> =
					joined.split_whitespace().map(str::to_owned).collect();
				if ngram.len() != table.order() {
					return Err(ModelError::Deserialization(format!(
						"key '{joined}' has {} tokens in the order-{} table",
						ngram.len(),
						table.order()
					)));
				}
				table.insert_raw(NgramKey::Entry(ngram), count);
			}
			tables.push(table);
		}

		Ok(Self { order: data.order, tables })
	}

	/// Writes the serialized model to `path`.
	pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
		let bytes = self.to_bytes()?;
		std::fs::write(path, bytes)?;
		Ok(())
	}

	/// Reads a model previously written by `save_to_file`.
	pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
		let bytes = std::fs::read(path)?;
		Self::from_bytes(&bytes)
	}

	/// Smoothed conditional probability of the last token of `ngram`
	/// given its prefix, with discount `discount`.
	///
	/// Convenience form building a default-floor estimator per call;
	/// see [`KneserNey`] for a reusable, configurable one.
	pub fn probability(
		&self,
		discount: f64,
		order: usize,
		ngram: &[&str],
	) -> Result<f64, ModelError> {
		KneserNey::new(discount)?.probability(self, order, ngram)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scenario_sentences() -> Vec<String> {
		["the cat sat", "the dog sat"]
			.repeat(3)
			.into_iter()
			.map(str::to_owned)
			.collect()
	}

	fn scenario_model() -> LanguageModel {
		let mut model = LanguageModel::new(2).unwrap();
		model.train(scenario_sentences());
		model
	}

	#[test]
	fn rejects_orders_below_two() {
		assert!(matches!(LanguageModel::new(0), Err(ModelError::InvalidOrder(_))));
		assert!(matches!(LanguageModel::new(1), Err(ModelError::InvalidOrder(_))));
		assert_eq!(LanguageModel::new(2).unwrap().order(), 2);
	}

	#[test]
	fn training_counts_match_corpus() {
		let model = scenario_model();

		assert_eq!(model.count(&["the"]), 6);
		assert_eq!(model.count(&["cat"]), 3);
		assert_eq!(model.count(&["dog"]), 3);
		assert_eq!(model.count(&["sat"]), 6);
		assert_eq!(model.count(&["<s>"]), 6);
		assert_eq!(model.count(&["the", "cat"]), 3);
		assert_eq!(model.count(&["sat", "</s>"]), 6);

		// Never observed in this order.
		assert_eq!(model.count(&["cat", "the"]), 0);
		// Outside the modeled orders.
		assert_eq!(model.count(&[]), 0);
		assert_eq!(model.count(&["the", "cat", "sat"]), 0);
	}

	#[test]
	fn rare_events_collapse_into_unknown() {
		let mut corpus = vec!["the cat sat".to_owned(); 3];
		corpus.push("a rare sentence".to_owned());

		let mut model = LanguageModel::new(2).unwrap();
		model.train(&corpus);

		assert_eq!(model.count(&["rare"]), 0);
		assert_eq!(model.count(&["the"]), 3);
		assert_eq!(model.unknown_count(1), 2);
		assert_eq!(model.unknown_count(2), 2);
	}

	#[test]
	fn empty_corpus_leaves_only_unknown_buckets() {
		let mut model = LanguageModel::new(2).unwrap();
		model.train(Vec::<String>::new());

		assert_eq!(model.count(&["anything"]), 0);
		assert_eq!(model.unknown_count(1), 2);

		// Only the floor buckets remain; probabilities stay finite.
		let p = model.probability(0.75, 1, &["anything"]).unwrap();
		assert!(p.is_finite());
		assert!(p > 0.0);
	}

	#[test]
	fn blank_sentences_are_skipped() {
		let mut model = LanguageModel::new(2).unwrap();
		let mut corpus = vec!["the cat sat".to_owned(); 3];
		corpus.push("   ".to_owned());
		model.train(&corpus);

		assert_eq!(model.count(&["the"]), 3);
		assert_eq!(model.count(&["<s>"]), 3);
	}

	#[test]
	fn partitioned_training_matches_sequential() {
		let sentences = scenario_sentences();

		let parallel = LanguageModel::train_parallel(sentences.clone(), 2).unwrap();
		let mut sequential = LanguageModel::new(2).unwrap();
		sequential.train(&sentences);

		assert_eq!(parallel, sequential);
	}

	#[test]
	fn merge_rejects_order_mismatch() {
		let mut bigram = LanguageModel::new(2).unwrap();
		let trigram = LanguageModel::new(3).unwrap();
		assert!(matches!(
			bigram.merge(&trigram),
			Err(ModelError::OrderMismatch { expected: 2, actual: 3 })
		));
	}

	#[test]
	fn byte_round_trip_preserves_tables() {
		let model = scenario_model();
		let bytes = model.to_bytes().unwrap();
		let restored = LanguageModel::from_bytes(&bytes).unwrap();
		assert_eq!(model, restored);
	}

	#[test]
	fn file_round_trip_preserves_tables() {
		let model = scenario_model();
		let path = std::env::temp_dir()
			.join(format!("rs-lm-core-roundtrip-{}.lm", std::process::id()));

		model.save_to_file(&path).unwrap();
		let restored = LanguageModel::read_from_file(&path).unwrap();
		std::fs::remove_file(&path).ok();

		assert_eq!(model, restored);
	}

	#[test]
	fn corrupt_payload_fails_to_load() {
		let long_a = "a".repeat(32);
		let long_b = "b".repeat(32);
		let corpus = vec![format!("{long_a} {long_b}"); 3];

		let mut model = LanguageModel::new(2).unwrap();
		model.train(&corpus);
		let bytes = model.to_bytes().unwrap();

		// Flip a byte that provably sits inside a token's UTF-8 text:
		// the middle of a run of nine 'a' bytes. 0xFF is never valid
		// UTF-8, so the string cannot deserialize.
		let run = bytes
			.windows(9)
			.position(|window| window.iter().all(|byte| *byte == b'a'))
			.expect("payload contains the long token");
		let mut corrupted = bytes.clone();
		corrupted[run + 4] = 0xFF;
		assert!(matches!(
			LanguageModel::from_bytes(&corrupted),
			Err(ModelError::Deserialization(_))
		));

		// A truncated payload must fail too, never load partially.
		let truncated = &bytes[..bytes.len() / 2];
		assert!(matches!(
			LanguageModel::from_bytes(truncated),
			Err(ModelError::Deserialization(_))
		));
	}

	#[test]
	fn trains_from_folder_of_txt_files() {
		let dir = std::env::temp_dir()
			.join(format!("rs-lm-core-corpus-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join("one.txt"), "the cat sat\nthe cat sat\nthe cat sat\n")
			.unwrap();
		std::fs::write(dir.join("two.txt"), "the dog sat\nthe dog sat\nthe dog sat\n")
			.unwrap();
		std::fs::write(dir.join("ignored.md"), "not corpus data").unwrap();

		let model = LanguageModel::train_folder(&dir, 2).unwrap();
		std::fs::remove_dir_all(&dir).ok();

		assert_eq!(model.count(&["the"]), 6);
		assert_eq!(model.count(&["cat"]), 3);
		assert_eq!(model.count(&["not"]), 0);
	}

	#[test]
	fn train_folder_rejects_missing_directory() {
		let result = LanguageModel::train_folder("no-such-folder-anywhere", 2);
		assert!(matches!(result, Err(ModelError::Io(_))));
	}
}
