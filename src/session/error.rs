use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Session controller has been torn down")]
    Closed,
}
