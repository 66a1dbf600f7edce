mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::*;
use crate::store::SprintStore;

const EPIC_SELECT: &str = "
    SELECT e.id, e.name, e.current_sprint_id, e.start_date, e.end_date, e.rank,
           e.created_at, e.updated_at,
           COUNT(w.id),
           COALESCE(SUM(w.completed), 0),
           COALESCE(SUM(w.points), 0),
           COALESCE(SUM(CASE WHEN w.completed THEN w.points ELSE 0 END), 0)
    FROM epics e
    LEFT JOIN work_items w ON w.epic_id = e.id";

const EPIC_GROUP: &str = "GROUP BY e.id ORDER BY e.created_at, e.id";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::run_migrations(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    // ============================================================
    // Sprint operations
    // ============================================================

    /// All sprints, dated ones first by start date, then backlog sprints by id.
    pub fn get_all_sprints(&self) -> Result<Vec<Sprint>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, start_date, end_date, created_at
             FROM sprints ORDER BY start_date IS NULL, start_date, id",
        )?;

        let sprints = stmt
            .query_map([], sprint_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sprints)
    }

    pub fn get_sprint(&self, id: &SprintId) -> Result<Option<Sprint>> {
        let conn = self.lock()?;
        let sprint = conn
            .query_row(
                "SELECT id, start_date, end_date, created_at FROM sprints WHERE id = ?",
                [id.as_str()],
                sprint_from_row,
            )
            .optional()?;
        Ok(sprint)
    }

    pub fn create_sprint(&self, input: CreateSprintInput) -> Result<Sprint> {
        if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
            if end < start {
                anyhow::bail!("Sprint end date is before its start date");
            }
        }
        if self.get_sprint(&input.id)?.is_some() {
            anyhow::bail!("Sprint {} already exists", input.id);
        }

        let conn = self.lock()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO sprints (id, start_date, end_date, created_at) VALUES (?, ?, ?, ?)",
            (
                input.id.as_str(),
                input.start_date.map(|d| d.to_string()),
                input.end_date.map(|d| d.to_string()),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Sprint {
            id: input.id,
            start_date: input.start_date,
            end_date: input.end_date,
            created_at: now,
        })
    }

    pub fn get_sprint_with_epics(&self, id: &SprintId) -> Result<Option<SprintWithEpics>> {
        let Some(sprint) = self.get_sprint(id)? else {
            return Ok(None);
        };
        let epics = self.get_epics_by_sprint(Some(id))?;
        Ok(Some(SprintWithEpics::new(sprint, epics)))
    }

    // ============================================================
    // Epic operations
    // ============================================================

    /// Create an ungrouped epic with no rank history.
    pub fn create_epic(&self, input: CreateEpicInput) -> Result<Epic> {
        let conn = self.lock()?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO epics (id, name, rank, created_at, updated_at) VALUES (?, ?, '{}', ?, ?)",
            (
                id.to_string(),
                &input.name,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Epic {
            id,
            name: input.name,
            current_sprint_id: None,
            start_date: None,
            end_date: None,
            rank: RankMap::new(),
            work_items: WorkItemSummary::default(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_epic(&self, id: Uuid) -> Result<Option<Epic>> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE e.id = ? {}", EPIC_SELECT, EPIC_GROUP);
        let epic = conn
            .query_row(&sql, [id.to_string()], epic_from_row)
            .optional()?;
        Ok(epic)
    }

    /// Members of a sprint in creation order, or ungrouped epics for `None`.
    pub fn get_epics_by_sprint(&self, sprint: Option<&SprintId>) -> Result<Vec<Epic>> {
        let conn = self.lock()?;

        let epics = match sprint {
            Some(id) => {
                let sql = format!(
                    "{} WHERE e.current_sprint_id = ? {}",
                    EPIC_SELECT, EPIC_GROUP
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([id.as_str()], epic_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "{} WHERE e.current_sprint_id IS NULL {}",
                    EPIC_SELECT, EPIC_GROUP
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], epic_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(epics)
    }

    /// Set one rank-map entry. Returns `false` if the epic does not exist.
    pub fn set_epic_rank(&self, epic_id: Uuid, sprint: &SprintId, rank: u32) -> Result<bool> {
        let conn = self.lock()?;
        let Some(mut ranks) = read_rank_map(&conn, epic_id)? else {
            return Ok(false);
        };

        let label = sprint.label();
        if ranks.get(&label) == Some(&rank) {
            return Ok(true);
        }
        ranks.insert(label, rank);

        conn.execute(
            "UPDATE epics SET rank = ?, updated_at = ? WHERE id = ?",
            (
                serde_json::to_string(&ranks)?,
                Utc::now().to_rfc3339(),
                epic_id.to_string(),
            ),
        )?;
        Ok(true)
    }

    /// Move an epic into a sprint, writing sprint id, dates and the new
    /// label's rank together. Returns `false` if the epic does not exist.
    pub fn assign_epic_to_sprint(
        &self,
        epic_id: Uuid,
        sprint: &SprintId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        rank: u32,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let Some(mut ranks) = read_rank_map(&conn, epic_id)? else {
            return Ok(false);
        };
        ranks.insert(sprint.label(), rank);

        let rows = conn.execute(
            "UPDATE epics
             SET current_sprint_id = ?, start_date = ?, end_date = ?, rank = ?, updated_at = ?
             WHERE id = ?",
            (
                sprint.as_str(),
                start_date.map(|d| d.to_string()),
                end_date.map(|d| d.to_string()),
                serde_json::to_string(&ranks)?,
                Utc::now().to_rfc3339(),
                epic_id.to_string(),
            ),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Work item operations
    // ============================================================

    pub fn create_work_item(&self, epic_id: Uuid, input: CreateWorkItemInput) -> Result<WorkItem> {
        self.get_epic(epic_id)?
            .ok_or_else(|| anyhow::anyhow!("Epic not found"))?;

        let conn = self.lock()?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO work_items (id, epic_id, title, points, completed, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
            (
                id.to_string(),
                epic_id.to_string(),
                &input.title,
                input.points,
                now.to_rfc3339(),
            ),
        )?;

        Ok(WorkItem {
            id,
            epic_id,
            title: input.title,
            points: input.points,
            completed: false,
            created_at: now,
        })
    }

    pub fn complete_work_item(&self, id: Uuid) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE work_items SET completed = 1 WHERE id = ?",
            [id.to_string()],
        )?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

#[async_trait]
impl SprintStore for Database {
    async fn fetch_sprints(&self) -> Result<Vec<Sprint>> {
        self.get_all_sprints()
    }

    async fn fetch_epics_by_sprint(&self, sprint: Option<&SprintId>) -> Result<Vec<Epic>> {
        self.get_epics_by_sprint(sprint)
    }

    async fn write_epic_rank(&self, epic_id: Uuid, sprint: &SprintId, rank: u32) -> Result<()> {
        if !self.set_epic_rank(epic_id, sprint, rank)? {
            anyhow::bail!("Epic not found: {}", epic_id);
        }
        Ok(())
    }

    async fn write_epic_sprint_assignment(
        &self,
        epic_id: Uuid,
        sprint: &SprintId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        rank: u32,
    ) -> Result<()> {
        if !self.assign_epic_to_sprint(epic_id, sprint, start_date, end_date, rank)? {
            anyhow::bail!("Epic not found: {}", epic_id);
        }
        Ok(())
    }
}

/// Default on-disk location for the board database.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "sprintboard")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("sprintboard.db"))
}

fn read_rank_map(conn: &Connection, epic_id: Uuid) -> Result<Option<RankMap>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT rank FROM epics WHERE id = ?",
            [epic_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.map(|s| parse_rank_map(&s)))
}

fn sprint_from_row(row: &Row<'_>) -> rusqlite::Result<Sprint> {
    Ok(Sprint {
        id: parse_sprint_id(row.get::<_, String>(0)?)?,
        start_date: row.get::<_, Option<String>>(1)?.and_then(parse_date),
        end_date: row.get::<_, Option<String>>(2)?.and_then(parse_date),
        created_at: parse_datetime(row.get::<_, String>(3)?),
    })
}

fn epic_from_row(row: &Row<'_>) -> rusqlite::Result<Epic> {
    Ok(Epic {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        current_sprint_id: row
            .get::<_, Option<String>>(2)?
            .map(parse_sprint_id)
            .transpose()?,
        start_date: row.get::<_, Option<String>>(3)?.and_then(parse_date),
        end_date: row.get::<_, Option<String>>(4)?.and_then(parse_date),
        rank: parse_rank_map(&row.get::<_, String>(5)?),
        created_at: parse_datetime(row.get::<_, String>(6)?),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
        work_items: WorkItemSummary {
            total: row.get(8)?,
            completed: row.get(9)?,
            points: row.get(10)?,
            completed_points: row.get(11)?,
        },
    })
}

fn parse_sprint_id(s: String) -> rusqlite::Result<SprintId> {
    SprintId::new(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Unparseable rank maps read as empty; the normalizer back-fills them.
fn parse_rank_map(s: &str) -> RankMap {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::warn!("Discarding malformed rank map {:?}: {}", s, e);
        RankMap::new()
    })
}

fn parse_date(s: String) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
