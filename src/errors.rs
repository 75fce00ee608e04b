use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    #[error("semaphore not acquired for resource: {0}")]
    LockTimeout(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
