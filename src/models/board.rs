use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::epic::{Epic, WorkItemSummary};
use super::sprint::{Sprint, SprintId};

/// A sprint together with the epics currently assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintWithEpics {
    #[serde(flatten)]
    pub sprint: Sprint,
    pub epics: Vec<Epic>,
}

impl SprintWithEpics {
    /// Build from a sprint and its members, ordered by rank.
    pub fn new(sprint: Sprint, mut epics: Vec<Epic>) -> Self {
        sort_by_rank(&mut epics);
        Self { sprint, epics }
    }

    pub fn id(&self) -> &SprintId {
        &self.sprint.id
    }

    /// Highest current rank among members; epics without a rank are skipped.
    pub fn max_rank(&self) -> Option<u32> {
        self.epics.iter().filter_map(Epic::current_rank).max()
    }

    pub fn progress(&self) -> WorkItemSummary {
        self.epics.iter().map(|e| e.work_items).sum()
    }
}

/// Everything the board shows: every sprint plus the ungrouped epics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub sprints: Vec<SprintWithEpics>,
    pub ungrouped: Vec<Epic>,
}

impl Board {
    pub fn sprint(&self, id: &SprintId) -> Option<&SprintWithEpics> {
        self.sprints.iter().find(|s| s.id() == id)
    }

    pub fn sprint_mut(&mut self, id: &SprintId) -> Option<&mut SprintWithEpics> {
        self.sprints.iter_mut().find(|s| s.id() == id)
    }

    /// Look an epic up in any sprint or in the ungrouped bucket.
    pub fn find_epic(&self, id: Uuid) -> Option<&Epic> {
        self.sprints
            .iter()
            .flat_map(|s| s.epics.iter())
            .chain(self.ungrouped.iter())
            .find(|e| e.id == id)
    }
}

/// Order epics by their current rank. Unranked epics go last in creation
/// order.
pub fn sort_by_rank(epics: &mut [Epic]) {
    epics.sort_by(|a, b| {
        let key = |e: &Epic| (e.current_rank().is_none(), e.current_rank(), e.created_at, e.id);
        key(a).cmp(&key(b))
    });
}

/// View state supplied by the caller for one board render.
///
/// Collapsed sprints keep their counts and progress but omit their epic list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardViewOptions {
    #[serde(default)]
    pub collapsed: BTreeSet<SprintId>,
    /// When set, only these sprints are shown.
    #[serde(default)]
    pub only: Option<BTreeSet<SprintId>>,
    #[serde(default)]
    pub hide_ungrouped: bool,
}

impl BoardViewOptions {
    pub fn view(&self, board: Board) -> BoardView {
        let sprints = board
            .sprints
            .into_iter()
            .filter(|s| self.only.as_ref().map_or(true, |only| only.contains(s.id())))
            .map(|s| {
                let collapsed = self.collapsed.contains(s.id());
                let mut view = SprintView::from(s);
                if collapsed {
                    view.collapsed = true;
                    view.epics.clear();
                }
                view
            })
            .collect();

        BoardView {
            sprints,
            ungrouped: if self.hide_ungrouped {
                Vec::new()
            } else {
                board.ungrouped
            },
        }
    }
}

/// A rendered sprint column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintView {
    #[serde(flatten)]
    pub sprint: Sprint,
    pub epic_count: usize,
    pub progress: WorkItemSummary,
    pub collapsed: bool,
    pub epics: Vec<Epic>,
}

impl From<SprintWithEpics> for SprintView {
    fn from(s: SprintWithEpics) -> Self {
        Self {
            epic_count: s.epics.len(),
            progress: s.progress(),
            collapsed: false,
            epics: s.epics,
            sprint: s.sprint,
        }
    }
}

/// A rendered board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub sprints: Vec<SprintView>,
    pub ungrouped: Vec<Epic>,
}
