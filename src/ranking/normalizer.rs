//! Dense-rank repair for a single sprint.

use crate::models::{Epic, SprintId};

use super::RankWrite;

/// Writes needed for `epics` to hold exactly the ranks `1..=N` in `sprint`.
///
/// Epics without a rank are appended after the current maximum in creation
/// order; existing ranks are not touched. If the ranks still are not dense
/// afterwards (duplicates or gaps left by concurrent edits), the whole sprint
/// is re-sequenced by `(rank, created_at, id)` and only changed epics get a
/// write. Epics whose current sprint is not `sprint` are ignored.
pub fn ensure_dense_ranks(sprint: &SprintId, epics: &[Epic]) -> Vec<RankWrite> {
    let members: Vec<&Epic> = epics
        .iter()
        .filter(|e| e.current_sprint_id.as_ref() == Some(sprint))
        .collect();

    let mut missing: Vec<&Epic> = members
        .iter()
        .copied()
        .filter(|e| e.current_rank().is_none())
        .collect();
    missing.sort_by_key(|e| (e.created_at, e.id));

    let mut placed: Vec<(u32, &Epic)> = members
        .iter()
        .filter_map(|e| e.current_rank().map(|r| (r, *e)))
        .collect();
    let top = placed.iter().map(|(r, _)| *r).max().unwrap_or(0);

    // Appending past u32::MAX is impossible; re-sequence everything instead.
    let fits = u32::try_from(missing.len())
        .ok()
        .and_then(|n| top.checked_add(n))
        .is_some();

    let mut writes = Vec::new();
    if fits {
        for (epic, offset) in missing.drain(..).zip(1u32..) {
            let rank = top + offset;
            writes.push(RankWrite::Rank {
                epic_id: epic.id,
                sprint_id: sprint.clone(),
                rank,
            });
            placed.push((rank, epic));
        }

        if ranks_are_dense(placed.iter().map(|(r, _)| *r)) {
            return writes;
        }
    }

    tracing::debug!(sprint = %sprint, "Re-sequencing ranks with gaps or duplicates");
    placed.sort_by_key(|(r, e)| (*r, e.created_at, e.id));
    placed
        .iter()
        .map(|(_, epic)| *epic)
        .chain(missing)
        .zip(1u32..)
        .filter(|(epic, rank)| epic.current_rank() != Some(*rank))
        .map(|(epic, rank)| RankWrite::Rank {
            epic_id: epic.id,
            sprint_id: sprint.clone(),
            rank,
        })
        .collect()
}

/// Whether the sprint's members currently satisfy the dense-rank invariant.
pub fn is_dense(sprint: &SprintId, epics: &[Epic]) -> bool {
    let ranks: Option<Vec<u32>> = epics
        .iter()
        .filter(|e| e.current_sprint_id.as_ref() == Some(sprint))
        .map(Epic::current_rank)
        .collect();
    ranks.is_some_and(|r| ranks_are_dense(r.into_iter()))
}

fn ranks_are_dense(ranks: impl Iterator<Item = u32>) -> bool {
    let mut ranks: Vec<u32> = ranks.collect();
    ranks.sort_unstable();
    ranks.iter().zip(1u32..).all(|(r, expected)| *r == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::test_support::epic;

    fn sid(s: &str) -> SprintId {
        SprintId::new(s).unwrap()
    }

    #[test]
    fn empty_sprint_needs_no_writes() {
        assert!(ensure_dense_ranks(&sid("007"), &[]).is_empty());
        assert!(is_dense(&sid("007"), &[]));
    }

    #[test]
    fn dense_sprint_needs_no_writes() {
        let s = sid("007");
        let epics = vec![
            epic("A", Some(&s), Some(2), 0),
            epic("B", Some(&s), Some(1), 1),
            epic("C", Some(&s), Some(3), 2),
        ];
        assert!(ensure_dense_ranks(&s, &epics).is_empty());
        assert!(is_dense(&s, &epics));
    }

    #[test]
    fn backfills_missing_ranks_in_creation_order() {
        let s = sid("007");
        let epics = vec![
            epic("late", Some(&s), None, 5),
            epic("A", Some(&s), Some(1), 0),
            epic("early", Some(&s), None, 1),
            epic("B", Some(&s), Some(2), 2),
        ];

        let writes = ensure_dense_ranks(&s, &epics);

        assert_eq!(
            writes,
            vec![
                RankWrite::Rank {
                    epic_id: epics[2].id,
                    sprint_id: s.clone(),
                    rank: 3
                },
                RankWrite::Rank {
                    epic_id: epics[0].id,
                    sprint_id: s.clone(),
                    rank: 4
                },
            ]
        );
    }

    #[test]
    fn rank_for_another_sprint_counts_as_missing() {
        let s = sid("008");
        let mut moved = epic("moved", Some(&s), None, 0);
        moved.rank.insert(sid("007").label(), 1);
        let epics = vec![epic("C", Some(&s), Some(1), 1), moved];

        let writes = ensure_dense_ranks(&s, &epics);

        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].epic_id(), epics[1].id);
        assert_eq!(writes[0].rank(), 2);
    }

    #[test]
    fn resequences_duplicates_and_gaps() {
        let s = sid("007");
        let epics = vec![
            epic("A", Some(&s), Some(1), 0),
            epic("B", Some(&s), Some(3), 1),
            epic("C", Some(&s), Some(3), 2),
            epic("D", Some(&s), Some(7), 3),
        ];
        assert!(!is_dense(&s, &epics));

        let writes = ensure_dense_ranks(&s, &epics);

        let by_epic: Vec<(uuid::Uuid, u32)> =
            writes.iter().map(|w| (w.epic_id(), w.rank())).collect();
        // C already holds 3 after B takes 2, so only B and D move.
        assert_eq!(by_epic, vec![(epics[1].id, 2), (epics[3].id, 4)]);
    }

    #[test]
    fn resequences_a_rank_at_the_top_of_the_range() {
        let s = sid("007");
        let epics = vec![epic("A", Some(&s), Some(u32::MAX), 0)];

        let writes = ensure_dense_ranks(&s, &epics);

        assert_eq!(
            writes,
            vec![RankWrite::Rank {
                epic_id: epics[0].id,
                sprint_id: s.clone(),
                rank: 1
            }]
        );
    }

    #[test]
    fn unranked_epics_after_a_maximal_rank_are_appended_by_resequencing() {
        let s = sid("007");
        let epics = vec![
            epic("A", Some(&s), Some(1), 0),
            epic("B", Some(&s), Some(u32::MAX), 1),
            epic("new", Some(&s), None, 2),
        ];

        let writes = ensure_dense_ranks(&s, &epics);

        let by_epic: Vec<(uuid::Uuid, u32)> =
            writes.iter().map(|w| (w.epic_id(), w.rank())).collect();
        assert_eq!(by_epic, vec![(epics[1].id, 2), (epics[2].id, 3)]);
    }

    #[test]
    fn ignores_epics_from_other_sprints() {
        let s = sid("007");
        let other = sid("008");
        let epics = vec![
            epic("A", Some(&s), Some(1), 0),
            epic("X", Some(&other), None, 1),
            epic("U", None, None, 2),
        ];
        assert!(ensure_dense_ranks(&s, &epics).is_empty());
    }
}
