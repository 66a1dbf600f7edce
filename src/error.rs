//! Error types for board operations.
//!
//! Only committing a gesture can fail in a way users see. Ranking itself is
//! pure; its [`ResolveError`]s are folded into [`BoardError::NotFound`] or
//! [`BoardError::InvalidMove`] here.

use thiserror::Error;

use crate::models::InvalidSprintId;
use crate::ranking::ResolveError;

pub type Result<T, E = BoardError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BoardError {
    /// The dragged epic, the target epic or the target sprint is not on the
    /// board that was loaded for this gesture.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The drop cannot be resolved into a placement.
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// Some writes in the commit batch were rejected. Others may have landed,
    /// so callers must re-read rather than trust in-memory state.
    #[error("Failed to move epic, please try again ({failed} of {total} writes failed)")]
    WriteFailure { failed: usize, total: usize },

    /// A drag was started while a commit is still outstanding.
    #[error("A move is already being saved")]
    Busy,

    #[error(transparent)]
    InvalidSprintId(#[from] InvalidSprintId),

    /// Reading from the store failed.
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl BoardError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ResolveError> for BoardError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::EpicNotFound(_)
            | ResolveError::TargetEpicNotFound(_)
            | ResolveError::SprintNotFound(_) => Self::NotFound(err.to_string()),
            ResolveError::UngroupedTarget(_) | ResolveError::Unranked { .. } => {
                Self::InvalidMove(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SprintId;
    use uuid::Uuid;

    #[test]
    fn resolve_errors_map_to_not_found() {
        let err: BoardError = ResolveError::EpicNotFound(Uuid::nil()).into();
        assert!(err.is_not_found());

        let err: BoardError = ResolveError::SprintNotFound(SprintId::new("9").unwrap()).into();
        assert!(err.is_not_found());

        let err: BoardError = ResolveError::UngroupedTarget(Uuid::nil()).into();
        assert!(matches!(err, BoardError::InvalidMove(_)));
    }

    #[test]
    fn write_failure_message_asks_for_retry() {
        let err = BoardError::WriteFailure {
            failed: 1,
            total: 3,
        };
        assert!(err.to_string().starts_with("Failed to move epic, please try again"));
    }
}
