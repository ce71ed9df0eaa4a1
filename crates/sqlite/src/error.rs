#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("connection closed")]
  ConnectionClosed,

  /// An error occurred while closing the SQLite connection.
  #[error("failed to close connection: {0}")]
  Close(rusqlite::Error),

  #[error("rusqlite error: {0}")]
  Rusqlite(#[from] rusqlite::Error),

  #[error("serde_rusqlite error: {0}")]
  SerdeRusqlite(#[from] serde_rusqlite::Error),

  #[error("other error: {0}")]
  Other(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
