use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum JsonError {
  /// The buffer does not yet contain a complete top-level value. Callers should
  /// append more bytes (as arrive from the socket layer) and retry.
  #[error("incomplete json input")]
  Incomplete,

  /// The buffer contains bytes that can never form valid JSON.
  #[error("invalid json: {0}")]
  Invalid(String),
}

pub type JsonResult<T> = Result<T, JsonError>;
