use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp layout used for `created_at` (RFC 3339, UTC, millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub done: bool,
    #[serde(default, deserialize_with = "deserialize_subtasks")]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub done: bool,
}

impl Task {
    /// Build a fresh, not-done task with no subtasks
    pub fn new(title: String, created_at: String) -> Self {
        Self {
            id: new_id(),
            title,
            created_at,
            done: false,
            subtasks: Vec::new(),
        }
    }

    /// Number of completed subtasks and total subtasks.
    /// Display only: `done` is never derived from this.
    pub fn progress(&self) -> (usize, usize) {
        let completed = self.subtasks.iter().filter(|s| s.done).count();
        (completed, self.subtasks.len())
    }

    pub fn subtask_titles(&self) -> Vec<&str> {
        self.subtasks.iter().map(|s| s.title.as_str()).collect()
    }

    /// First 8 characters of the id, used when listing
    pub fn short_id(&self) -> &str {
        let end = self.id.char_indices().nth(8).map(|(i, _)| i).unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// Which tasks a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Done,
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => !task.done,
            StatusFilter::Done => task.done,
        }
    }

    /// Cycle All -> Pending -> Done -> All
    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Pending,
            StatusFilter::Pending => StatusFilter::Done,
            StatusFilter::Done => StatusFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Pending => "Pending",
            StatusFilter::Done => "Done",
        }
    }
}

impl Subtask {
    pub fn new(title: String) -> Self {
        Self {
            id: new_id(),
            title,
            done: false,
        }
    }
}

/// Generate a new opaque identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Subtasks were once stored as bare titles, so accept either shape
#[derive(Deserialize)]
#[serde(untagged)]
enum SubtaskShape {
    Record(Subtask),
    Title(String),
}

fn deserialize_subtasks<'de, D>(deserializer: D) -> Result<Vec<Subtask>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<SubtaskShape> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|shape| match shape {
            SubtaskShape::Record(subtask) => subtask,
            SubtaskShape::Title(title) => Subtask::new(title),
        })
        .collect())
}
