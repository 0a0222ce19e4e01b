use thiserror::Error;

/// Errors produced while building, persisting or evaluating a model.
#[derive(Debug, Error)]
pub enum ModelError {
	/// Contract violation: an estimation order outside [1, N], an n-gram
	/// whose length does not match the requested order, or a model
	/// constructed with an order below 2.
	#[error("invalid order: {0}")]
	InvalidOrder(String),

	/// The persisted payload is malformed or truncated. The load is
	/// abandoned without installing any partial state.
	#[error("model deserialization failed: {0}")]
	Deserialization(String),

	/// The discount must lie strictly between 0.0 and 1.0.
	#[error("discount must be in (0.0, 1.0), got {0}")]
	InvalidDiscount(f64),

	/// The zero-count floor must be strictly positive.
	#[error("zero-count floor must be >= 1")]
	InvalidFloor,

	/// The unigram or bigram table is empty: the model holds no training
	/// data at all and cannot produce probabilities.
	#[error("degenerate model: {0}")]
	DegenerateModel(String),

	/// Two tables or models of different order cannot be merged.
	#[error("order mismatch: expected {expected}, got {actual}")]
	OrderMismatch { expected: usize, actual: usize },

	/// Perplexity is undefined for a sentence with no tokens.
	#[error("sentence has no tokens")]
	EmptySentence,

	/// Corpus-level perplexity is undefined over zero sentences.
	#[error("corpus has no sentences")]
	EmptyCorpus,

	/// Failure at one of the file I/O boundaries.
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
}

impl From<postcard::Error> for ModelError {
	fn from(err: postcard::Error) -> Self {
		Self::Deserialization(err.to_string())
	}
}
