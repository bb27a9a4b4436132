use super::*;
use crate::index::IndexError;
use serde::ser::SerializeStruct;

#[repr(i32)]
#[derive(Debug)]
pub(crate) enum ApiError {
  /// Internal server error.
  Internal(String) = 1,

  /// Bad request.
  BadRequest(String) = 2,

  /// Resource not found.
  NotFound(String) = 3,

  /// The chain source failed and nothing is cached.
  Unavailable(String) = 4,
}

impl ApiError {
  pub(crate) fn code(&self) -> i32 {
    match self {
      Self::Internal(_) => 1,
      Self::BadRequest(_) => 2,
      Self::NotFound(_) => 3,
      Self::Unavailable(_) => 4,
    }
  }

  pub(crate) fn not_found<S: ToString>(message: S) -> Self {
    Self::NotFound(message.to_string())
  }

  pub(crate) fn internal<S: ToString>(message: S) -> Self {
    Self::Internal(message.to_string())
  }

  pub(crate) fn bad_request<S: ToString>(message: S) -> Self {
    Self::BadRequest(message.to_string())
  }

  fn message(&self) -> &str {
    match self {
      Self::Internal(msg) | Self::BadRequest(msg) | Self::NotFound(msg) | Self::Unavailable(msg) => {
        msg
      }
    }
  }
}

impl Serialize for ApiError {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("ApiError", 2)?;
    state.serialize_field("code", &self.code())?;
    state.serialize_field("message", self.message())?;
    state.end()
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status_code = match &self {
      Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    if let Self::Internal(message) = &self {
      log::error!("error serving request: {message}");
    }

    (status_code, axum::Json(self)).into_response()
  }
}

impl From<anyhow::Error> for ApiError {
  fn from(error: anyhow::Error) -> Self {
    Self::internal(format!("{error:#}"))
  }
}

impl From<IndexError> for ApiError {
  fn from(error: IndexError) -> Self {
    Self::Unavailable(error.to_string())
  }
}
