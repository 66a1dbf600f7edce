//! Domain models for the sprint board.
//!
//! # Core Concepts
//!
//! - [`Sprint`]: a time box identified by a [`SprintId`]. Sprints without dates
//!   are backlog buckets.
//! - [`Epic`]: a schedulable unit of work. Its [`RankMap`] records a position
//!   per sprint label; only the current sprint's entry is live.
//! - [`Board`]: every sprint with its members plus the ungrouped epics, as read
//!   from the store in one pass.
//!
//! Rank-map keys are always produced by [`sprint_label`].

mod board;
mod epic;
mod sprint;

pub use board::*;
pub use epic::*;
pub use sprint::*;
