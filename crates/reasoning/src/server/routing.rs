//! Axum router configuration for all endpoints

use axum::{
  routing::{get, post},
  Router,
};
use std::sync::Arc;

use crate::server::handlers;
use crate::server::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
  Router::new()
    // Status and version endpoints
    .route("/status", get(handlers::status))
    .route("/version", get(handlers::version))
    // Generation
    .route("/chains/generate", post(handlers::generate_chain))
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::{to_bytes, Body};
  use axum::http::{Request, StatusCode};
  use serde_json::{json, Value};
  use std::time::Duration;
  use tower::ServiceExt;

  use crate::embedding::{EmbeddingClient, MockEmbeddingService};
  use crate::error::ServiceError;
  use crate::generation::{GenerationClient, MockCompletionService};
  use crate::model::{Provenance, ReasoningChain, Record};
  use crate::pipeline::{Pipeline, PipelineSettings};
  use crate::prompt::PromptBuilder;
  use crate::retriever::Retriever;
  use crate::retry::{Backoff, RetryPolicy};
  use crate::store::{MemoryStore, VectorStore};

  async fn app(completion: MockCompletionService) -> Router {
    let mut store = MemoryStore::new();
    store
      .upsert(
        vec![1.0, 0.0],
        Record {
          id: "W1".to_string(),
          summary_text: Record::summary_for("Stress and neurogenesis", "Does stress matter?"),
          full_payload: ReasoningChain {
            problem_decomposition: "p".to_string(),
            data: "d".to_string(),
            method: "m".to_string(),
            conclusion: "c".to_string(),
          },
          provenance: Provenance {
            title: "Stress and neurogenesis".to_string(),
            year: Some(2012),
            ..Provenance::default()
          },
        },
      )
      .await
      .unwrap();
    let store: Arc<dyn VectorStore> = Arc::new(store);

    let mut embedding = MockEmbeddingService::new();
    embedding.expect_embed().returning(|_| Ok(vec![1.0, 0.0]));
    let policy = RetryPolicy::new(2, Duration::from_secs(5), Backoff::none());

    let pipeline = Pipeline::new(
      Retriever::new(Arc::new(EmbeddingClient::new(Arc::new(embedding), policy.clone())), store.clone()),
      PromptBuilder::default(),
      GenerationClient::new(Arc::new(completion), policy, 3000),
      PipelineSettings { default_top_k: 5, model: "qwen3-max".to_string(), temperature: 0.7 },
    );

    create_router(Arc::new(AppState {
      pipeline,
      store,
      embedding_model: "text-embedding-v4".to_string(),
    }))
  }

  async fn post_generate(app: Router, body: Value) -> (StatusCode, Value) {
    post_raw(app, &body.to_string()).await
  }

  #[tokio::test]
  async fn test_status_reports_record_count() {
    let app = app(MockCompletionService::new()).await;
    let request = Request::builder().uri("/status").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["records"], 1);
    assert_eq!(body["generation_model"], "qwen3-max");
    assert!(body["transaction_id"].is_string());
  }

  #[tokio::test]
  async fn test_generate_success() {
    let mut completion = MockCompletionService::new();
    completion.expect_complete().returning(|_| {
      Ok(
        json!({"problem_decomposition": "p", "data": "d", "method": "m", "conclusion": "c"})
          .to_string(),
      )
    });

    let (status, body) =
      post_generate(app(completion).await, json!({"question": "Does stress matter?"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["reasoning_chain"]["conclusion"], "c");
    assert_eq!(body["references"][0]["title"], "Stress and neurogenesis");
    assert!(body.get("errors").is_none());
  }

  #[tokio::test]
  async fn test_generate_auth_failure_maps_to_bad_gateway() {
    let mut completion = MockCompletionService::new();
    completion.expect_complete().times(1).returning(|_| Err(ServiceError::auth("HTTP 401")));

    let (status, body) =
      post_generate(app(completion).await, json!({"question": "Does stress matter?"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error_kind"], "auth_error");
    assert_eq!(body["stage"], "generating");
    assert_eq!(body["errors"][0]["key"], "auth_error");
    assert!(body.get("reasoning_chain").is_none());
  }

  #[tokio::test]
  async fn test_generate_zero_top_k_is_bad_request() {
    let (status, body) = post_generate(
      app(MockCompletionService::new()).await,
      json!({"question": "Does stress matter?", "top_k": 0}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_kind"], "validation_error");
    assert_eq!(body["stage"], "retrieving");
  }

  async fn post_raw(app: Router, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
      .method("POST")
      .uri("/chains/generate")
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn test_undecodable_bodies_fail_as_validation_errors() {
    let bodies = [
      (r#"{"top_k": 3}"#, "question"),
      (r#"{"question": "q", "top_k": -1}"#, "-1"),
      ("not json", "JSON"),
    ];

    for (body, detail) in bodies {
      let mut completion = MockCompletionService::new();
      completion.expect_complete().times(0);

      let (status, json) = post_raw(app(completion).await, body).await;

      assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
      assert_eq!(json["status"], "error");
      assert_eq!(json["error_kind"], "validation_error");
      assert_eq!(json["stage"], "idle");
      assert!(json["message"].as_str().unwrap().contains(detail), "{body}: {}", json["message"]);
      assert_eq!(json["errors"][0]["key"], "validation_error");
    }
  }
}
