//! Error types for the shared schema.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
