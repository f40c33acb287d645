//! REST API for reasoning chain generation
//!
//! Serves the generation pipeline over HTTP with axum. The vector store is
//! opened once at startup and shared read-only by all requests.

pub mod handlers;
pub mod routing;
pub mod startup;
pub mod types;

use std::sync::Arc;

use crate::pipeline::Pipeline;
use crate::store::VectorStore;

/// Shared by every request handler.
pub struct AppState {
  pub pipeline: Pipeline,
  pub store: Arc<dyn VectorStore>,
  pub embedding_model: String,
}
