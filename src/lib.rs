//! docqa - Document question answering
//!
//! Indexes plain-text documents into an in-memory semantic index and answers
//! questions from them: each question is expanded into several related
//! queries, candidates from every query are merged and deduplicated, a
//! cross-encoder keeps the most relevant passages, and the answer is generated
//! from those passages only.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod retrieval;

pub use error::{DocQaError, Result};
