//! Drop-gesture resolution.
//!
//! A drop lands either on another epic (take its slot) or on a sprint
//! container (append to the end). Moves inside one sprint are a
//! remove-and-reinsert on the dense sequence; moves across sprints open a
//! slot in the destination and close the vacated one in the source.
//!
//! The board passed in must already be normalized for the sprints involved.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Board, Epic, SprintId, SprintWithEpics};

use super::{apply_writes, RankWrite};

/// Where an epic was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DropTarget {
    Epic(Uuid),
    Sprint(SprintId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    NoOp,
    Reorder,
    CrossSprint,
}

/// The complete write-set for one gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResolution {
    pub epic_id: Uuid,
    pub kind: MoveKind,
    /// Source sprint; `None` when the epic was ungrouped.
    pub from: Option<SprintId>,
    pub to: Option<SprintId>,
    pub writes: Vec<RankWrite>,
}

impl MoveResolution {
    fn no_op(epic: &Epic) -> Self {
        Self {
            epic_id: epic.id,
            kind: MoveKind::NoOp,
            from: epic.current_sprint_id.clone(),
            to: epic.current_sprint_id.clone(),
            writes: Vec::new(),
        }
    }

    pub fn is_no_op(&self) -> bool {
        self.writes.is_empty()
    }

    /// Apply the write-set to an in-memory board.
    pub fn apply(&self, board: &mut Board) {
        apply_writes(board, &self.writes);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Epic not found: {0}")]
    EpicNotFound(Uuid),

    #[error("Target epic not found: {0}")]
    TargetEpicNotFound(Uuid),

    #[error("Sprint not found: {0}")]
    SprintNotFound(SprintId),

    #[error("Target epic {0} is not in a sprint")]
    UngroupedTarget(Uuid),

    #[error("Epic {epic_id} has no rank in sprint {sprint}")]
    Unranked { epic_id: Uuid, sprint: SprintId },
}

/// Compute the writes that move `epic_id` onto `target`.
pub fn resolve_move(
    epic_id: Uuid,
    target: &DropTarget,
    board: &Board,
) -> Result<MoveResolution, ResolveError> {
    let epic = board
        .find_epic(epic_id)
        .ok_or(ResolveError::EpicNotFound(epic_id))?;
    let source = epic.current_sprint_id.as_ref();

    let (dest_id, target_rank) = match target {
        DropTarget::Sprint(sprint_id) => {
            if board.sprint(sprint_id).is_none() {
                return Err(ResolveError::SprintNotFound(sprint_id.clone()));
            }
            if source == Some(sprint_id) {
                return Ok(MoveResolution::no_op(epic));
            }
            (sprint_id, None)
        }
        DropTarget::Epic(target_id) => {
            if *target_id == epic_id {
                return Ok(MoveResolution::no_op(epic));
            }
            let target_epic = board
                .find_epic(*target_id)
                .ok_or(ResolveError::TargetEpicNotFound(*target_id))?;
            let dest = target_epic
                .current_sprint_id
                .as_ref()
                .ok_or(ResolveError::UngroupedTarget(*target_id))?;
            (dest, target_epic.current_rank())
        }
    };

    let dest = board
        .sprint(dest_id)
        .ok_or_else(|| ResolveError::SprintNotFound(dest_id.clone()))?;

    if source == Some(dest_id) {
        let source_rank = epic.current_rank().ok_or_else(|| ResolveError::Unranked {
            epic_id,
            sprint: dest_id.clone(),
        })?;
        let target_rank = target_rank.ok_or_else(|| ResolveError::Unranked {
            epic_id: match target {
                DropTarget::Epic(id) => *id,
                DropTarget::Sprint(_) => epic_id,
            },
            sprint: dest_id.clone(),
        })?;
        return Ok(reorder(epic, dest, source_rank, target_rank));
    }

    let source = match source {
        Some(id) => Some(
            board
                .sprint(id)
                .ok_or_else(|| ResolveError::SprintNotFound(id.clone()))?,
        ),
        None => None,
    };
    Ok(cross_sprint(epic, source, dest, target_rank))
}

fn reorder(epic: &Epic, sprint: &SprintWithEpics, source: u32, target: u32) -> MoveResolution {
    if source == target {
        return MoveResolution::no_op(epic);
    }

    let sprint_id = sprint.id();
    let mut writes: Vec<RankWrite> = others(sprint, epic.id)
        .filter_map(|(other, rank)| {
            let shifted = if source < target && rank > source && rank <= target {
                rank - 1
            } else if source > target && rank >= target && rank < source {
                rank + 1
            } else {
                return None;
            };
            Some(RankWrite::Rank {
                epic_id: other.id,
                sprint_id: sprint_id.clone(),
                rank: shifted,
            })
        })
        .collect();
    writes.push(RankWrite::Rank {
        epic_id: epic.id,
        sprint_id: sprint_id.clone(),
        rank: target,
    });

    tracing::debug!(
        epic = %epic.id,
        sprint = %sprint_id,
        from = source,
        to = target,
        "Resolved reorder"
    );

    MoveResolution {
        epic_id: epic.id,
        kind: MoveKind::Reorder,
        from: Some(sprint_id.clone()),
        to: Some(sprint_id.clone()),
        writes,
    }
}

fn cross_sprint(
    epic: &Epic,
    source: Option<&SprintWithEpics>,
    dest: &SprintWithEpics,
    target_rank: Option<u32>,
) -> MoveResolution {
    // Dropping on a container, or on an epic that somehow has no rank yet,
    // appends after the highest ranked member.
    let insert_at = target_rank.unwrap_or_else(|| dest.max_rank().map_or(1, |max| max + 1));

    let mut writes = Vec::new();

    if let (Some(source), Some(vacated)) = (source, epic.current_rank()) {
        writes.extend(
            others(source, epic.id)
                .filter(|(_, rank)| *rank > vacated)
                .map(|(other, rank)| RankWrite::Rank {
                    epic_id: other.id,
                    sprint_id: source.id().clone(),
                    rank: rank - 1,
                }),
        );
    }

    writes.extend(
        others(dest, epic.id)
            .filter(|(_, rank)| *rank >= insert_at)
            .map(|(other, rank)| RankWrite::Rank {
                epic_id: other.id,
                sprint_id: dest.id().clone(),
                rank: rank + 1,
            }),
    );

    writes.push(RankWrite::Assign {
        epic_id: epic.id,
        sprint_id: dest.id().clone(),
        start_date: dest.sprint.start_date,
        end_date: dest.sprint.end_date,
        rank: insert_at,
    });

    tracing::debug!(
        epic = %epic.id,
        from = ?source.map(|s| s.id().as_str()),
        to = %dest.id(),
        rank = insert_at,
        "Resolved cross-sprint move"
    );

    MoveResolution {
        epic_id: epic.id,
        kind: MoveKind::CrossSprint,
        from: source.map(|s| s.id().clone()),
        to: Some(dest.id().clone()),
        writes,
    }
}

/// Ranked members of `sprint` other than `exclude`, in rank order.
fn others(sprint: &SprintWithEpics, exclude: Uuid) -> impl Iterator<Item = (&Epic, u32)> {
    let mut ranked: Vec<(&Epic, u32)> = sprint
        .epics
        .iter()
        .filter(|e| e.id != exclude)
        .filter_map(|e| e.current_rank().map(|r| (e, r)))
        .collect();
    ranked.sort_by_key(|(_, r)| *r);
    ranked.into_iter()
}
