use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BoardError, Result};
use crate::models::{Board, Epic, SprintId, SprintWithEpics};
use crate::ranking::{
    apply_writes, ensure_dense_ranks, resolve_move, DropTarget, MoveKind, RankWrite,
};
use crate::store::SprintStore;

use super::state::{DragContext, DragState};

/// Result of a committed drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub epic_id: Uuid,
    pub kind: MoveKind,
    pub from: Option<SprintId>,
    pub to: Option<SprintId>,
    /// Every write that was issued, back-fills included.
    pub writes: Vec<RankWrite>,
    /// Whether ranks had to be repaired before the move could be resolved.
    pub repaired: bool,
    /// The affected sprints as re-read from the store after writing.
    pub sprints: Vec<SprintWithEpics>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DropOutcome {
    /// Nothing was written.
    Cancelled,
    Committed(CommitOutcome),
}

/// Drives drag gestures on the sprint board and commits their writes.
///
/// One gesture is in flight at a time. Drag bookkeeping is synchronous and
/// never touches the store; only a drop on a valid target reads the board,
/// resolves the move and writes. The drag state is reset to `Idle` on every
/// exit from a commit, including errors and a dropped future.
pub struct BoardController<S> {
    store: S,
    state: Mutex<DragState>,
}

impl<S: SprintStore> BoardController<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: Mutex::new(DragState::Idle),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> DragState {
        self.lock_state().clone()
    }

    /// Start dragging `epic`. Fails with [`BoardError::Busy`] while a commit
    /// is outstanding; an unfinished drag is replaced.
    pub fn begin_drag(&self, epic: &Epic) -> Result<()> {
        let mut state = self.lock_state();
        match &*state {
            DragState::Committing { .. } => return Err(BoardError::Busy),
            DragState::Dragging(stale) => {
                tracing::debug!(epic = %stale.epic_id, "Replacing unfinished drag");
            }
            DragState::Idle => {}
        }

        *state = DragState::Dragging(DragContext {
            epic_id: epic.id,
            epic_name: epic.name.clone(),
            source: epic.current_sprint_id.clone(),
            hover: None,
        });
        Ok(())
    }

    /// Record the current hover target for highlighting.
    pub fn drag_over(&self, target: Option<DropTarget>) {
        if let DragState::Dragging(ctx) = &mut *self.lock_state() {
            ctx.hover = target;
        }
    }

    pub fn cancel(&self) {
        let mut state = self.lock_state();
        if let DragState::Dragging(ctx) = &*state {
            tracing::debug!(epic = %ctx.epic_id, "Drag cancelled");
            *state = DragState::Idle;
        }
    }

    /// Finish the current drag. `None` means the epic was dropped outside any
    /// target, which cancels the gesture. A drop while another commit is
    /// outstanding fails with [`BoardError::Busy`].
    pub async fn end_drag(&self, target: Option<DropTarget>) -> Result<DropOutcome> {
        let Some(target) = target else {
            self.cancel();
            return Ok(DropOutcome::Cancelled);
        };

        let epic_id = {
            let mut state = self.lock_state();
            let ctx = match &*state {
                DragState::Dragging(ctx) => ctx,
                DragState::Committing { .. } => return Err(BoardError::Busy),
                DragState::Idle => return Ok(DropOutcome::Cancelled),
            };
            let epic_id = ctx.epic_id;
            *state = DragState::Committing { epic_id };
            epic_id
        };

        self.commit(epic_id, target).await.map(DropOutcome::Committed)
    }

    /// Drag-and-drop in one call, for callers without an interactive drag.
    pub async fn commit_move(&self, epic_id: Uuid, target: DropTarget) -> Result<CommitOutcome> {
        {
            let mut state = self.lock_state();
            if !state.is_idle() {
                return Err(BoardError::Busy);
            }
            *state = DragState::Committing { epic_id };
        }

        self.commit(epic_id, target).await
    }

    async fn commit(&self, epic_id: Uuid, target: DropTarget) -> Result<CommitOutcome> {
        let _release = ReleaseOnDrop(&self.state);
        let started = Instant::now();

        let mut board = self.store.load_board().await?;

        let source = board
            .find_epic(epic_id)
            .ok_or_else(|| BoardError::NotFound(format!("Epic not found: {}", epic_id)))?
            .current_sprint_id
            .clone();
        let dest = match &target {
            DropTarget::Sprint(id) => Some(id.clone()),
            DropTarget::Epic(id) => board.find_epic(*id).and_then(|e| e.current_sprint_id.clone()),
        };

        let backfill = normalize(&mut board, touched(&source, &dest));
        let repaired = !backfill.is_empty();

        let resolution = resolve_move(epic_id, &target, &board)?;
        let writes = merge_writes(backfill, &resolution.writes);

        if writes.is_empty() {
            tracing::debug!(epic = %epic_id, "Drop changed nothing");
        } else {
            self.persist(&writes).await?;
        }

        let sprints = self.refresh(&board, touched(&source, &dest)).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            epic = %epic_id,
            kind = ?resolution.kind,
            writes = writes.len(),
            repaired,
            elapsed_ms,
            "Committed epic move"
        );

        Ok(CommitOutcome {
            epic_id,
            kind: resolution.kind,
            from: resolution.from,
            to: resolution.to,
            writes,
            repaired,
            sprints,
        })
    }

    /// Issue every write at once and wait for all of them.
    async fn persist(&self, writes: &[RankWrite]) -> Result<()> {
        let results = join_all(writes.iter().map(|write| async move {
            let result = match write {
                RankWrite::Rank {
                    epic_id,
                    sprint_id,
                    rank,
                } => self.store.write_epic_rank(*epic_id, sprint_id, *rank).await,
                RankWrite::Assign {
                    epic_id,
                    sprint_id,
                    start_date,
                    end_date,
                    rank,
                } => {
                    self.store
                        .write_epic_sprint_assignment(
                            *epic_id,
                            sprint_id,
                            *start_date,
                            *end_date,
                            *rank,
                        )
                        .await
                }
            };
            (write, result)
        }))
        .await;

        let mut failed = 0;
        for (write, result) in &results {
            if let Err(e) = result {
                failed += 1;
                tracing::warn!(epic = %write.epic_id(), sprint = %write.sprint_id(), "Rank write failed: {:#}", e);
            }
        }

        if failed > 0 {
            tracing::error!(failed, total = writes.len(), "Epic move partially failed");
            return Err(BoardError::WriteFailure {
                failed,
                total: writes.len(),
            });
        }
        Ok(())
    }

    /// Re-read the members of the touched sprints from the store.
    async fn refresh(&self, board: &Board, sprints: Vec<&SprintId>) -> Result<Vec<SprintWithEpics>> {
        let known: Vec<_> = sprints
            .into_iter()
            .filter_map(|id| board.sprint(id).map(|s| s.sprint.clone()))
            .collect();

        let members = try_join_all(
            known
                .iter()
                .map(|s| self.store.fetch_epics_by_sprint(Some(&s.id))),
        )
        .await?;

        Ok(known
            .into_iter()
            .zip(members)
            .map(|(sprint, epics)| SprintWithEpics::new(sprint, epics))
            .collect())
    }

    fn lock_state(&self) -> MutexGuard<'_, DragState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct ReleaseOnDrop<'a>(&'a Mutex<DragState>);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = DragState::Idle;
    }
}

/// Distinct sprint ids among source and destination.
fn touched<'a>(source: &'a Option<SprintId>, dest: &'a Option<SprintId>) -> Vec<&'a SprintId> {
    let mut ids: Vec<&SprintId> = source.iter().chain(dest.iter()).collect();
    ids.dedup();
    ids
}

/// Repair the given sprints in place and return the writes that did it.
fn normalize(board: &mut Board, sprints: Vec<&SprintId>) -> Vec<RankWrite> {
    let mut writes = Vec::new();
    for id in sprints {
        if let Some(sprint) = board.sprint(id) {
            writes.extend(ensure_dense_ranks(id, &sprint.epics));
        }
    }

    if !writes.is_empty() {
        tracing::debug!(count = writes.len(), "Back-filling ranks before move");
        apply_writes(board, &writes);
    }
    writes
}

/// Back-fill writes followed by move writes. A move write replaces any
/// back-fill for the same epic and sprint.
fn merge_writes(backfill: Vec<RankWrite>, moves: &[RankWrite]) -> Vec<RankWrite> {
    let mut merged: Vec<RankWrite> = backfill
        .into_iter()
        .filter(|b| {
            !moves
                .iter()
                .any(|m| m.epic_id() == b.epic_id() && m.sprint_id() == b.sprint_id())
        })
        .collect();
    merged.extend_from_slice(moves);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SprintId {
        SprintId::new(s).unwrap()
    }

    #[test]
    fn move_write_supersedes_backfill() {
        let epic = Uuid::new_v4();
        let other = Uuid::new_v4();
        let backfill = vec![
            RankWrite::Rank {
                epic_id: epic,
                sprint_id: sid("007"),
                rank: 4,
            },
            RankWrite::Rank {
                epic_id: other,
                sprint_id: sid("007"),
                rank: 5,
            },
        ];
        let moves = vec![RankWrite::Rank {
            epic_id: epic,
            sprint_id: sid("007"),
            rank: 1,
        }];

        let merged = merge_writes(backfill, &moves);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].epic_id(), other);
        assert_eq!(merged[1].rank(), 1);
    }

    #[test]
    fn touched_deduplicates_same_sprint() {
        let a = Some(sid("007"));
        let b = Some(sid("007"));
        assert_eq!(touched(&a, &b).len(), 1);

        let none = None;
        assert_eq!(touched(&none, &b), vec![&sid("007")]);
    }
}
