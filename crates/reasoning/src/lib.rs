//! Reasoning - Retrieval-Grounded Reasoning Chain Generation
//!
//! Embeds a research question, retrieves the most similar studies from a
//! vector store of structured reasoning chains, and asks a hosted language
//! model to write a new four-part chain (problem decomposition, data
//! requirements, methods, expected conclusion) using them as examples.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod http;
pub mod index;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod retry;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::{ErrorKind, Result, ServiceError};
pub use model::{ReasoningChain, Record, RetrievalResult, RetrievedRecord};
pub use pipeline::{GenerateRequest, Outcome, Pipeline, Stage};
