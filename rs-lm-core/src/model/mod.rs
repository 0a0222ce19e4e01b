//! Top-level module for the Kneser-Ney language modeling system.
//!
//! This crate provides a word-level n-gram language model, including:
//! - Per-order frequency tables with rare-event collapsing (`CountTable`)
//! - A combined multi-order model (`LanguageModel`)
//! - Recursive Kneser-Ney smoothing (`KneserNey`)
//! - Sentence likelihood and perplexity scoring (`Scorer`)

/// Multi-order language model owning one count table per order.
///
/// Supports training from sentence iterators or corpus folders,
/// parallel construction, merging, and compact persistence.
pub mod language_model;

/// Recursive Kneser-Ney probability estimator.
///
/// Exposes the discount and the zero-count floor as validated,
/// caller-supplied parameters.
pub mod smoothing;

/// Sentence likelihood and perplexity computation on top of a trained
/// model and a configured estimator.
pub mod scorer;

/// Internal representation of a single fixed-order count table.
///
/// Tracks n-gram occurrence counts, collapses rare events into the
/// unknown bucket, and answers the prefix queries smoothing needs.
/// This module is not exposed publicly.
mod count_table;

/// Internal tokenization adapter and n-gram window extraction.
///
/// Not exposed publicly; callers interact through raw sentences.
mod tokens;
