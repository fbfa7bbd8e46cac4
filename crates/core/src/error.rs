use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum TubemarkError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("no video on this page")]
    NoVideo,

    #[error("{0} context is gone")]
    ContextGone(&'static str),
}

pub type Result<T> = std::result::Result<T, TubemarkError>;
