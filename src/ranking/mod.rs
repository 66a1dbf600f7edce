//! Rank computation for the sprint board.
//!
//! Both halves are pure: [`normalizer`] repairs a sprint so its ranks run
//! `1..=N`, and [`resolver`] turns one drop gesture into the set of
//! [`RankWrite`]s that keeps every affected sprint dense. Neither touches the
//! store; the board controller applies their output.

pub mod normalizer;
pub mod resolver;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{sort_by_rank, Board, SprintId};

pub use normalizer::{ensure_dense_ranks, is_dense};
pub use resolver::{resolve_move, DropTarget, MoveKind, MoveResolution, ResolveError};

/// One persisted change to an epic's placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankWrite {
    /// Set `rank[label]` and leave the sprint assignment alone.
    Rank {
        epic_id: Uuid,
        sprint_id: SprintId,
        rank: u32,
    },
    /// Move the epic into `sprint_id`, copying the sprint's dates and writing
    /// the rank for the new label in the same update.
    Assign {
        epic_id: Uuid,
        sprint_id: SprintId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        rank: u32,
    },
}

impl RankWrite {
    pub fn epic_id(&self) -> Uuid {
        match self {
            Self::Rank { epic_id, .. } | Self::Assign { epic_id, .. } => *epic_id,
        }
    }

    pub fn sprint_id(&self) -> &SprintId {
        match self {
            Self::Rank { sprint_id, .. } | Self::Assign { sprint_id, .. } => sprint_id,
        }
    }

    pub fn rank(&self) -> u32 {
        match self {
            Self::Rank { rank, .. } | Self::Assign { rank, .. } => *rank,
        }
    }

    /// The rank-map key this write targets.
    pub fn label(&self) -> String {
        self.sprint_id().label()
    }
}

/// Replay writes against an in-memory board, as the store would apply them.
///
/// Writes for epics that are not on the board are ignored.
pub fn apply_writes(board: &mut Board, writes: &[RankWrite]) {
    for write in writes {
        match write {
            RankWrite::Rank {
                epic_id,
                sprint_id,
                rank,
            } => {
                let epic = board
                    .sprints
                    .iter_mut()
                    .flat_map(|s| s.epics.iter_mut())
                    .chain(board.ungrouped.iter_mut())
                    .find(|e| e.id == *epic_id);
                if let Some(epic) = epic {
                    epic.rank.insert(sprint_id.label(), *rank);
                    epic.updated_at = Utc::now();
                }
            }
            RankWrite::Assign {
                epic_id,
                sprint_id,
                start_date,
                end_date,
                rank,
            } => {
                let Some(mut epic) = take_epic(board, *epic_id) else {
                    continue;
                };
                epic.current_sprint_id = Some(sprint_id.clone());
                epic.start_date = *start_date;
                epic.end_date = *end_date;
                epic.rank.insert(sprint_id.label(), *rank);
                epic.updated_at = Utc::now();

                match board.sprint_mut(sprint_id) {
                    Some(dest) => dest.epics.push(epic),
                    None => board.ungrouped.push(epic),
                }
            }
        }
    }

    for sprint in &mut board.sprints {
        sort_by_rank(&mut sprint.epics);
    }
}

fn take_epic(board: &mut Board, epic_id: Uuid) -> Option<crate::models::Epic> {
    for sprint in &mut board.sprints {
        if let Some(pos) = sprint.epics.iter().position(|e| e.id == epic_id) {
            return Some(sprint.epics.remove(pos));
        }
    }
    let pos = board.ungrouped.iter().position(|e| e.id == epic_id)?;
    Some(board.ungrouped.remove(pos))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use crate::models::*;

    /// Build a sprint whose epics are ranked in the given order, named by the
    /// given strings. Returns the sprint and the epic ids by name order.
    pub fn sprint(id: &str, names: &[&str]) -> SprintWithEpics {
        let sprint_id = SprintId::new(id).unwrap();
        let epics = names
            .iter()
            .enumerate()
            .map(|(i, name)| epic(name, Some(&sprint_id), Some(i as u32 + 1), i as i64))
            .collect();
        SprintWithEpics::new(
            Sprint {
                id: sprint_id,
                start_date: None,
                end_date: None,
                created_at: Utc::now(),
            },
            epics,
        )
    }

    pub fn epic(name: &str, sprint: Option<&SprintId>, rank: Option<u32>, order: i64) -> Epic {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(order);
        let mut rank_map = RankMap::new();
        if let (Some(s), Some(r)) = (sprint, rank) {
            rank_map.insert(s.label(), r);
        }
        Epic {
            id: Uuid::new_v4(),
            name: name.to_string(),
            current_sprint_id: sprint.cloned(),
            start_date: None,
            end_date: None,
            rank: rank_map,
            work_items: WorkItemSummary::default(),
            created_at: created,
            updated_at: created,
        }
    }

    pub fn id_of(board: &Board, name: &str) -> Uuid {
        board
            .sprints
            .iter()
            .flat_map(|s| s.epics.iter())
            .chain(board.ungrouped.iter())
            .find(|e| e.name == name)
            .map(|e| e.id)
            .unwrap_or_else(|| panic!("no epic named {name}"))
    }

    /// `(name, rank)` pairs of a sprint in board order.
    pub fn order(board: &Board, sprint: &str) -> Vec<(String, u32)> {
        let id = SprintId::new(sprint).unwrap();
        board
            .sprint(&id)
            .unwrap()
            .epics
            .iter()
            .map(|e| (e.name.clone(), e.current_rank().unwrap_or(0)))
            .collect()
    }
}
