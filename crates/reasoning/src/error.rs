//! Error taxonomy shared by every component of the request path.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
  #[error("invalid input: {message}")]
  Validation { message: String },

  #[error("authentication failed: {message}")]
  Auth { message: String },

  #[error("service unavailable: {message}")]
  Transient { message: String },

  #[error("malformed response: {message}")]
  MalformedResponse { message: String },

  #[error("vector store error: {message}")]
  Store { message: String },
}

/// Serialisable discriminant of [`ServiceError`], used in outcomes and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  ValidationError,
  AuthError,
  TransientServiceError,
  MalformedResponseError,
  StoreError,
}

impl ServiceError {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation { message: message.into() }
  }

  pub fn auth(message: impl Into<String>) -> Self {
    Self::Auth { message: message.into() }
  }

  pub fn transient(message: impl Into<String>) -> Self {
    Self::Transient { message: message.into() }
  }

  pub fn malformed(message: impl Into<String>) -> Self {
    Self::MalformedResponse { message: message.into() }
  }

  pub fn store(message: impl Into<String>) -> Self {
    Self::Store { message: message.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation { .. } => ErrorKind::ValidationError,
      Self::Auth { .. } => ErrorKind::AuthError,
      Self::Transient { .. } => ErrorKind::TransientServiceError,
      Self::MalformedResponse { .. } => ErrorKind::MalformedResponseError,
      Self::Store { .. } => ErrorKind::StoreError,
    }
  }

  /// Only transient failures are worth another attempt.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Transient { .. })
  }

  pub fn message(&self) -> &str {
    match self {
      Self::Validation { message }
      | Self::Auth { message }
      | Self::Transient { message }
      | Self::MalformedResponse { message }
      | Self::Store { message } => message,
    }
  }
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::ValidationError => "validation_error",
      Self::AuthError => "auth_error",
      Self::TransientServiceError => "transient_service_error",
      Self::MalformedResponseError => "malformed_response_error",
      Self::StoreError => "store_error",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<serde_json::Error> for ServiceError {
  fn from(e: serde_json::Error) -> Self {
    Self::malformed(e.to_string())
  }
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
