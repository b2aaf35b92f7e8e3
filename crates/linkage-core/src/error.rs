//! Error types for `linkage-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Neither identifier was supplied, or one had the wrong shape. Nothing is
  /// written when this is returned.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// The backend failed; the surrounding transaction has been rolled back.
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The stored records contradict the linkage invariants.
  #[error("invariant violation: {0}")]
  InvariantViolation(String),
}

impl Error {
  /// Wrap any backend error as [`Error::Storage`].
  pub fn storage(
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
  ) -> Self {
    Self::Storage(err.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
