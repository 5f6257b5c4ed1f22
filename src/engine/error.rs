use ulid::Ulid;

use crate::model::Status;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("conflict with reservations: {0:?}")]
    Conflict(Vec<Ulid>),
    #[error("quota exceeded: {remaining} nights remaining, {requested} requested")]
    QuotaExceeded { remaining: u32, requested: u32 },
    #[error("reservation {id} cannot move from {from} to {to}")]
    InvalidTransition { id: Ulid, from: Status, to: Status },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    Wal(String),
    #[error("store call timed out")]
    Timeout,
}
