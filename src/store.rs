//! The sprint membership store the board reads from and writes to.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::try_join_all;
use uuid::Uuid;

use crate::models::{Board, Epic, Sprint, SprintId, SprintWithEpics};

/// Persistence operations the board controller depends on.
///
/// Writes must be idempotent: writing the same rank twice is a no-op.
/// Both writes fail if the epic does not exist.
#[async_trait]
pub trait SprintStore: Send + Sync {
    /// Every known sprint, ordered by start date with backlog sprints last.
    async fn fetch_sprints(&self) -> Result<Vec<Sprint>>;

    /// Epics whose current sprint is `sprint`; `None` fetches ungrouped epics.
    async fn fetch_epics_by_sprint(&self, sprint: Option<&SprintId>) -> Result<Vec<Epic>>;

    /// Set `rank[label(sprint)]` without changing the epic's assignment.
    async fn write_epic_rank(&self, epic_id: Uuid, sprint: &SprintId, rank: u32) -> Result<()>;

    /// Move the epic into `sprint`, copying its dates and setting the rank
    /// for the new label in one update.
    async fn write_epic_sprint_assignment(
        &self,
        epic_id: Uuid,
        sprint: &SprintId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        rank: u32,
    ) -> Result<()>;

    /// Read every sprint with its members plus the ungrouped epics.
    async fn load_board(&self) -> Result<Board> {
        let sprints = self.fetch_sprints().await?;
        let members =
            try_join_all(sprints.iter().map(|s| self.fetch_epics_by_sprint(Some(&s.id)))).await?;
        let ungrouped = self.fetch_epics_by_sprint(None).await?;

        Ok(Board {
            sprints: sprints
                .into_iter()
                .zip(members)
                .map(|(sprint, epics)| SprintWithEpics::new(sprint, epics))
                .collect(),
            ungrouped,
        })
    }
}
