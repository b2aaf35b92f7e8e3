//! Error type for `linkage-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown link precedence: {0:?}")]
  UnknownPrecedence(String),
}

impl Error {
  /// Whether the error means another writer held the database lock.
  pub fn is_conflict(&self) -> bool {
    let sqlite = match self {
      Self::Sqlite(e) | Self::Database(tokio_rusqlite::Error::Rusqlite(e)) => e,
      _ => return false,
    };
    matches!(
      sqlite.sqlite_error_code(),
      Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
  }
}

impl From<Error> for linkage_core::Error {
  fn from(err: Error) -> Self { linkage_core::Error::storage(err) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
