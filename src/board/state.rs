use serde::Serialize;
use uuid::Uuid;

use crate::models::SprintId;
use crate::ranking::DropTarget;

/// What the board remembers about the epic being dragged.
///
/// Only used to draw the drag ghost and highlight the hover target; nothing
/// here is written anywhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DragContext {
    pub epic_id: Uuid,
    pub epic_name: String,
    pub source: Option<SprintId>,
    pub hover: Option<DropTarget>,
}

/// Lifecycle of a single drag gesture.
///
/// ```text
/// Idle -> Dragging -> Committing -> Idle
///            |
///            +-----> Idle (cancel / drop outside a target)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragContext),
    Committing { epic_id: Uuid },
}

impl DragState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn dragging(&self) -> Option<&DragContext> {
        match self {
            Self::Dragging(ctx) => Some(ctx),
            _ => None,
        }
    }
}
