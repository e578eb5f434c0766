use fleeting_common::ParseIdError;
use thiserror::Error;

/// Input the caller should not have sent. Never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("content must not be empty")]
    EmptyContent,
    #[error("content must be at most {limit} bytes, got {len}")]
    ContentTooLarge { len: usize, limit: usize },
    #[error("ttl_seconds must be a positive integer, got {0}")]
    NonPositiveTtl(i64),
    #[error("ttl_seconds is too large: {0}")]
    TtlTooLarge(i64),
    #[error("max_views must be a positive integer, got {0}")]
    NonPositiveMaxViews(i64),
    #[error("max_views must fit in 32 bits, got {0}")]
    MaxViewsTooLarge(i64),
    #[error("invalid paste id: {0}")]
    MalformedId(#[from] ParseIdError),
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

/// The paste store could not answer. Distinct from a paste being gone.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rocksdb error: {0}")]
    Db(#[from] rocksdb::Error),
    #[error("corrupt paste record: {0}")]
    Codec(#[from] bincode::Error),
    #[error("store task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("no free paste id after {0} attempts")]
    IdExhausted(usize),
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
