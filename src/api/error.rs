use thiserror::Error;

/// Failure of a remote call. Every variant carries text meant for the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// The request never produced a response (DNS, TLS, connection reset, timeout)
  #[error("{message}")]
  Network { message: String },

  /// The server answered with a non-success status
  #[error("{message}")]
  Status { status: u16, message: String },

  /// The response body did not match the expected shape
  #[error("unexpected response: {message}")]
  Decode { message: String },
}

impl ApiError {
  pub fn network(message: impl Into<String>) -> Self {
    Self::Network {
      message: message.into(),
    }
  }

  pub fn status(status: u16, message: impl Into<String>) -> Self {
    Self::Status {
      status,
      message: message.into(),
    }
  }

  pub fn decode(message: impl Into<String>) -> Self {
    Self::Decode {
      message: message.into(),
    }
  }

  /// Human-readable message, surfaced verbatim in notifications.
  pub fn message(&self) -> String {
    self.to_string()
  }

  /// HTTP status code, if the server responded at all.
  pub fn status_code(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    Self::decode(err.to_string())
  }
}
