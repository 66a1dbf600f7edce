use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every rank-map key. See [`sprint_label`].
pub const SPRINT_LABEL_PREFIX: &str = "Sprint ";

/// Format the rank-map key for a sprint.
///
/// This is the only place a label is built. Epics store their ranks keyed by
/// this string rather than by the raw id, so any other formatting would make
/// ranks silently stop matching.
pub fn sprint_label(id: &SprintId) -> String {
    format!("{}{}", SPRINT_LABEL_PREFIX, id.as_str())
}

/// Returned when a string cannot be used as a sprint id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sprint id {0:?}: must be non-empty, trimmed, and free of control characters")]
pub struct InvalidSprintId(pub String);

/// Identifier of a sprint, e.g. `"007"`.
///
/// Validated on construction so that [`SprintId::label`] always produces a
/// well-formed key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SprintId(String);

impl SprintId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidSprintId> {
        let id = id.into();
        if id.is_empty() || id.trim() != id || id.chars().any(char::is_control) {
            return Err(InvalidSprintId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The rank-map key for this sprint (`"Sprint 007"`).
    pub fn label(&self) -> String {
        sprint_label(self)
    }
}

impl fmt::Display for SprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SprintId {
    type Err = InvalidSprintId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SprintId {
    type Error = InvalidSprintId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SprintId> for String {
    fn from(id: SprintId) -> Self {
        id.0
    }
}

/// A time box that epics are scheduled into.
///
/// A sprint without dates is an unscheduled backlog bucket. It still keeps
/// ranks for its epics like any other sprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: SprintId,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Sprint {
    pub fn is_scheduled(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_some()
    }

    pub fn label(&self) -> String {
        self.id.label()
    }
}

/// Input for creating a new sprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSprintInput {
    pub id: SprintId,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
