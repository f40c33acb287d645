//! Endpoint handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::Json as ResponseJson;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ErrorKind, ServiceError};
use crate::pipeline::{FailureReport, GenerateRequest, Outcome, Stage};
use crate::server::types::{ApiError, BaseResponse, StatusResponse, VersionResponse};
use crate::server::AppState;

type ErrorResponse = (StatusCode, ResponseJson<BaseResponse<()>>);

/// GET /status - Health check with store size
pub async fn status(
  State(state): State<Arc<AppState>>,
) -> Result<ResponseJson<BaseResponse<StatusResponse>>, ErrorResponse> {
  let transaction_id = Uuid::new_v4();

  match state.store.len().await {
    Ok(records) => {
      let response = StatusResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        records,
        embedding_model: state.embedding_model.clone(),
        generation_model: state.pipeline.settings().model.clone(),
      };
      Ok(ResponseJson(BaseResponse::success(response, transaction_id)))
    }
    Err(e) => {
      let error = ApiError::new(ErrorKind::StoreError.as_str(), &e.to_string());
      Err((
        StatusCode::INTERNAL_SERVER_ERROR,
        ResponseJson(BaseResponse::<()>::error(vec![error], transaction_id)),
      ))
    }
  }
}

/// GET /version - Returns current API version
pub async fn version() -> ResponseJson<BaseResponse<VersionResponse>> {
  let transaction_id = Uuid::new_v4();
  let response = VersionResponse { version: env!("CARGO_PKG_VERSION").to_string() };

  ResponseJson(BaseResponse::success(response, transaction_id))
}

/// POST /chains/generate - Run one retrieval-then-generate request
///
/// A body that does not decode into a request fails like any other
/// validation error, before the pipeline starts.
pub async fn generate_chain(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> (StatusCode, ResponseJson<BaseResponse<Outcome>>) {
  let transaction_id = Uuid::new_v4();
  bentley::verbose!("transaction {transaction_id}: generating chain");

  let outcome = match payload {
    Ok(Json(request)) => state.pipeline.run(request).await,
    Err(rejection) => {
      bentley::warn!("transaction {transaction_id}: rejected request body: {rejection}");
      Outcome::Failed(FailureReport {
        error_kind: ErrorKind::ValidationError,
        stage: Stage::Idle,
        message: ServiceError::validation(rejection.body_text()).to_string(),
      })
    }
  };

  let (code, errors) = match &outcome {
    Outcome::Done(_) => (StatusCode::OK, Vec::new()),
    Outcome::Failed(report) => {
      let error = ApiError::new(report.error_kind.as_str(), &report.message)
        .with_context(json!({ "stage": report.stage }));
      (status_for(report.error_kind), vec![error])
    }
  };

  (code, ResponseJson(BaseResponse::with_errors(outcome, errors, transaction_id)))
}

/// HTTP status for a failed request of the given kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
    ErrorKind::AuthError | ErrorKind::MalformedResponseError => StatusCode::BAD_GATEWAY,
    ErrorKind::TransientServiceError => StatusCode::SERVICE_UNAVAILABLE,
    ErrorKind::StoreError => StatusCode::INTERNAL_SERVER_ERROR,
  }
}
