//! Drag-and-drop orchestration for the sprint board.
//!
//! [`BoardController`] owns the gesture state machine in [`DragState`] and
//! the commit sequence: load the board, back-fill ranks in the source and
//! destination sprints, resolve the move, write everything in parallel, then
//! re-read the affected sprints.

mod controller;
mod state;

pub use controller::{BoardController, CommitOutcome, DropOutcome};
pub use state::{DragContext, DragState};
