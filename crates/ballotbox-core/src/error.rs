use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Every violated constraint of a poll-creation request, in input order.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("poll not found or invalid option")]
    NotFound,
    #[error("you have already voted on this poll")]
    DuplicateVote,
    #[error("votes sent through proxies are not accepted")]
    ProxyRejected,
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
