use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sprint::SprintId;

/// Per-sprint positions of an epic, keyed by sprint label (`"Sprint 007"`).
///
/// Serialized as a plain JSON object, e.g. `{"Sprint 007": 3}`.
pub type RankMap = BTreeMap<String, u32>;

/// A named unit of work that can be scheduled into a sprint.
///
/// An epic keeps one rank per sprint it has occupied. Only the entry for
/// `current_sprint_id` is meaningful; entries for earlier sprints are stale
/// history and are never consulted for ordering. Use [`Epic::current_rank`]
/// rather than indexing `rank` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub id: Uuid,
    pub name: String,
    /// `None` while the epic is ungrouped.
    pub current_sprint_id: Option<SprintId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub rank: RankMap,
    #[serde(default)]
    pub work_items: WorkItemSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Epic {
    /// Rank within the epic's current sprint, if it has one.
    pub fn current_rank(&self) -> Option<u32> {
        let sprint = self.current_sprint_id.as_ref()?;
        self.rank.get(&sprint.label()).copied()
    }

    pub fn is_ungrouped(&self) -> bool {
        self.current_sprint_id.is_none()
    }
}

/// Input for creating a new epic. Epics always start ungrouped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEpicInput {
    pub name: String,
}

/// Read-only rollup of an epic's child work items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemSummary {
    pub total: u32,
    pub completed: u32,
    pub points: u32,
    pub completed_points: u32,
}

impl WorkItemSummary {
    /// Completed share of points in `0.0..=1.0`; falls back to item counts
    /// when nothing is pointed.
    pub fn progress(&self) -> f64 {
        if self.points > 0 {
            f64::from(self.completed_points) / f64::from(self.points)
        } else if self.total > 0 {
            f64::from(self.completed) / f64::from(self.total)
        } else {
            0.0
        }
    }
}

impl std::ops::Add for WorkItemSummary {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            total: self.total + rhs.total,
            completed: self.completed + rhs.completed,
            points: self.points + rhs.points,
            completed_points: self.completed_points + rhs.completed_points,
        }
    }
}

impl std::iter::Sum for WorkItemSummary {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, s| acc + s)
    }
}

/// A task or subtask under an epic.
///
/// Work items belong to the surrounding tracker; the board only reads their
/// counts and completion for progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub epic_id: Uuid,
    pub title: String,
    pub points: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for adding a work item to an epic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkItemInput {
    pub title: String,
    #[serde(default)]
    pub points: u32,
}
