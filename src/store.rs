use chrono::{DateTime, NaiveDateTime, Utc};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::models::{Subtask, Task, TIMESTAMP_FORMAT};

/// Shortest id prefix accepted by `resolve_prefix`
pub const MIN_PREFIX_LEN: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Addresses a subtask either by its id or by its zero-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtaskRef {
    Id(String),
    Index(usize),
}

impl fmt::Display for SubtaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtaskRef::Id(id) => write!(f, "{}", id),
            SubtaskRef::Index(index) => write!(f, "#{}", index + 1),
        }
    }
}

/// Emitted to listeners after every successful mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    TaskCreated { task_id: String },
    TaskUpdated { task_id: String },
    TaskRemoved { task_id: String },
}

impl StoreEvent {
    pub fn task_id(&self) -> &str {
        match self {
            StoreEvent::TaskCreated { task_id }
            | StoreEvent::TaskUpdated { task_id }
            | StoreEvent::TaskRemoved { task_id } => task_id,
        }
    }
}

pub type Listener = Box<dyn FnMut(&StoreEvent)>;
pub type Clock = Box<dyn FnMut() -> DateTime<Utc>>;

/// Collects events from a store subscription so the owner can drain them later
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Rc<RefCell<Vec<StoreEvent>>>,
}

impl EventQueue {
    pub fn drain(&self) -> Vec<StoreEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

/// In-memory owner of all tasks, in insertion order
pub struct TaskStore {
    tasks: Vec<Task>,
    listeners: Vec<Listener>,
    clock: Clock,
    last_created: Option<DateTime<Utc>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_clock(Box::new(Utc::now))
    }

    /// Create an empty store that reads the current time from `clock`
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            tasks: Vec::new(),
            listeners: Vec::new(),
            clock,
            last_created: None,
        }
    }

    /// Build a store from previously persisted or imported tasks.
    /// Rejects records `create` could not have produced: empty or duplicate
    /// ids, blank titles and unparseable `created_at` values.
    pub fn load(tasks: Vec<Task>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.replace(tasks)?;
        Ok(store)
    }

    /// Replace the whole collection, keeping listeners and clock.
    /// Does not notify listeners.
    pub fn replace(&mut self, tasks: Vec<Task>) -> Result<(), StoreError> {
        self.last_created = validate_tasks(&tasks)?;
        self.tasks = tasks;
        tracing::debug!(count = self.tasks.len(), "Loaded tasks into store");
        Ok(())
    }

    /// Register a listener notified after each successful mutation
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// Register a listener that queues events for later draining
    pub fn subscribe_queue(&mut self) -> EventQueue {
        let queue = EventQueue::default();
        let events = Rc::clone(&queue.events);
        self.subscribe(Box::new(move |event| events.borrow_mut().push(event.clone())));
        queue
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&Task, StoreError> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| task_not_found(id))
    }

    /// Position of a task in display order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Resolve a full id or an unambiguous id prefix to a task id
    pub fn resolve_prefix(&self, prefix: &str) -> Result<String, StoreError> {
        let prefix = prefix.trim();
        if self.tasks.iter().any(|t| t.id == prefix) {
            return Ok(prefix.to_string());
        }
        if prefix.chars().count() < MIN_PREFIX_LEN {
            return Err(StoreError::InvalidInput(format!(
                "Id prefix '{}' is shorter than {} characters",
                prefix, MIN_PREFIX_LEN
            )));
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task.id.clone()),
            (Some(_), Some(_)) => Err(StoreError::InvalidInput(format!(
                "Id prefix '{}' matches more than one task",
                prefix
            ))),
            (None, _) => Err(task_not_found(prefix)),
        }
    }

    /// Append a new task and return it
    pub fn create(&mut self, title: &str) -> Result<&Task, StoreError> {
        let title = normalize_title(title)?;

        let mut now = (self.clock)();
        if let Some(last) = self.last_created {
            now = now.max(last);
        }
        self.last_created = Some(now);

        let task = Task::new(title, format_timestamp(now));
        let task_id = task.id.clone();
        tracing::info!(task_id = %task_id, title = %task.title, "Created task");
        self.tasks.push(task);
        self.notify(StoreEvent::TaskCreated { task_id });

        let index = self.tasks.len() - 1;
        Ok(&self.tasks[index])
    }

    pub fn rename(&mut self, id: &str, title: &str) -> Result<(), StoreError> {
        let title = normalize_title(title)?;
        let task = self.task_mut(id)?;
        task.title = title;
        tracing::info!(task_id = %id, "Renamed task");
        self.notify_updated(id);
        Ok(())
    }

    /// Flip `done` and return the new value
    pub fn toggle_done(&mut self, id: &str) -> Result<bool, StoreError> {
        let task = self.task_mut(id)?;
        task.done = !task.done;
        let done = task.done;
        tracing::info!(task_id = %id, done, "Toggled task");
        self.notify_updated(id);
        Ok(done)
    }

    /// Delete a task together with its subtasks and return it
    pub fn remove(&mut self, id: &str) -> Result<Task, StoreError> {
        let index = self.position(id).ok_or_else(|| task_not_found(id))?;
        let task = self.tasks.remove(index);
        tracing::info!(task_id = %id, subtasks = task.subtasks.len(), "Removed task");
        self.notify(StoreEvent::TaskRemoved { task_id: task.id.clone() });
        Ok(task)
    }

    /// Append a subtask and return its id
    pub fn add_subtask(&mut self, task_id: &str, title: &str) -> Result<String, StoreError> {
        let title = normalize_title(title)?;
        let task = self.task_mut(task_id)?;
        let subtask = Subtask::new(title);
        let subtask_id = subtask.id.clone();
        task.subtasks.push(subtask);
        tracing::info!(task_id = %task_id, subtask_id = %subtask_id, "Added subtask");
        self.notify_updated(task_id);
        Ok(subtask_id)
    }

    pub fn rename_subtask(
        &mut self,
        task_id: &str,
        subtask: &SubtaskRef,
        title: &str,
    ) -> Result<(), StoreError> {
        let title = normalize_title(title)?;
        let task = self.task_mut(task_id)?;
        let index = find_subtask(task, subtask)?;
        task.subtasks[index].title = title;
        tracing::info!(task_id = %task_id, subtask = %subtask, "Renamed subtask");
        self.notify_updated(task_id);
        Ok(())
    }

    /// Flip a subtask's `done` and return the new value
    pub fn toggle_subtask(&mut self, task_id: &str, subtask: &SubtaskRef) -> Result<bool, StoreError> {
        let task = self.task_mut(task_id)?;
        let index = find_subtask(task, subtask)?;
        let entry = &mut task.subtasks[index];
        entry.done = !entry.done;
        let done = entry.done;
        tracing::info!(task_id = %task_id, subtask = %subtask, done, "Toggled subtask");
        self.notify_updated(task_id);
        Ok(done)
    }

    pub fn remove_subtask(&mut self, task_id: &str, subtask: &SubtaskRef) -> Result<Subtask, StoreError> {
        let task = self.task_mut(task_id)?;
        let index = find_subtask(task, subtask)?;
        let removed = task.subtasks.remove(index);
        tracing::info!(task_id = %task_id, subtask_id = %removed.id, "Removed subtask");
        self.notify_updated(task_id);
        Ok(removed)
    }

    fn task_mut(&mut self, id: &str) -> Result<&mut Task, StoreError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| task_not_found(id))
    }

    fn notify_updated(&mut self, task_id: &str) {
        self.notify(StoreEvent::TaskUpdated {
            task_id: task_id.to_string(),
        });
    }

    fn notify(&mut self, event: StoreEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

/// Format a timestamp the way `created_at` stores it
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored `created_at`, accepting any RFC 3339 offset
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn normalize_title(title: &str) -> Result<String, StoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput("Title cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn task_not_found(id: &str) -> StoreError {
    StoreError::NotFound(format!("task '{}'", id))
}

fn find_subtask(task: &Task, subtask: &SubtaskRef) -> Result<usize, StoreError> {
    let found = match subtask {
        SubtaskRef::Id(id) => task.subtasks.iter().position(|s| &s.id == id),
        SubtaskRef::Index(index) => (*index < task.subtasks.len()).then_some(*index),
    };
    found.ok_or_else(|| {
        StoreError::NotFound(format!("subtask {} of task '{}'", subtask, task.id))
    })
}

/// Check loaded tasks and return the latest `created_at` among them
fn validate_tasks(tasks: &[Task]) -> Result<Option<DateTime<Utc>>, StoreError> {
    let mut task_ids = HashSet::new();
    let mut latest = None;
    for task in tasks {
        if task.id.is_empty() {
            return Err(StoreError::InvalidInput("Task id cannot be empty".to_string()));
        }
        if !task_ids.insert(task.id.as_str()) {
            return Err(StoreError::InvalidInput(format!("Duplicate task id '{}'", task.id)));
        }
        if task.title.trim().is_empty() {
            return Err(StoreError::InvalidInput(format!("Task '{}' has an empty title", task.id)));
        }
        let created = parse_timestamp(&task.created_at).ok_or_else(|| {
            StoreError::InvalidInput(format!(
                "Task '{}' has an invalid createdAt '{}'",
                task.id, task.created_at
            ))
        })?;
        latest = latest.max(Some(created));

        let mut subtask_ids = HashSet::new();
        for subtask in &task.subtasks {
            if subtask.id.is_empty() {
                return Err(StoreError::InvalidInput(format!(
                    "Subtask id cannot be empty in task '{}'",
                    task.id
                )));
            }
            if !subtask_ids.insert(subtask.id.as_str()) {
                return Err(StoreError::InvalidInput(format!(
                    "Duplicate subtask id '{}' in task '{}'",
                    subtask.id, task.id
                )));
            }
            if subtask.title.trim().is_empty() {
                return Err(StoreError::InvalidInput(format!(
                    "Subtask '{}' in task '{}' has an empty title",
                    subtask.id, task.id
                )));
            }
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fixed_clock(times: Vec<DateTime<Utc>>) -> Clock {
        let mut times = times.into_iter();
        let mut last = Utc.with_ymd_and_hms(2024, 4, 3, 0, 0, 0).unwrap();
        Box::new(move || {
            if let Some(next) = times.next() {
                last = next;
            }
            last
        })
    }

    #[test]
    fn create_assigns_unique_ids_and_non_decreasing_timestamps() {
        let mut store = TaskStore::new();
        for i in 0..50 {
            store.create(&format!("Task {}", i)).unwrap();
        }
        let ids: HashSet<_> = store.list().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 50);
        for pair in store.list().windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn created_at_never_goes_backwards_with_clock() {
        let later = Utc.with_ymd_and_hms(2024, 4, 3, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 4, 3, 11, 0, 0).unwrap();
        let mut store = TaskStore::with_clock(fixed_clock(vec![later, earlier]));

        let first = store.create("first").unwrap().created_at.clone();
        let second = store.create("second").unwrap().created_at.clone();
        assert_eq!(first, "2024-04-03T12:00:00.000Z");
        assert_eq!(second, first);
    }

    #[test]
    fn create_trims_and_rejects_empty_titles() {
        let mut store = TaskStore::new();
        assert_eq!(store.create("  Write report  ").unwrap().title, "Write report");
        assert!(matches!(store.create("   "), Err(StoreError::InvalidInput(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn toggle_twice_restores_done() {
        let mut store = TaskStore::new();
        let id = store.create("Write report").unwrap().id.clone();
        assert!(store.toggle_done(&id).unwrap());
        assert!(store.get(&id).unwrap().done);
        assert!(!store.toggle_done(&id).unwrap());
        assert!(!store.get(&id).unwrap().done);
    }

    #[test]
    fn remove_then_remove_again_is_not_found() {
        let mut store = TaskStore::new();
        let id = store.create("Write report").unwrap().id.clone();
        store.add_subtask(&id, "Outline").unwrap();
        let removed = store.remove(&id).unwrap();
        assert_eq!(removed.subtasks.len(), 1);
        assert!(store.list().iter().all(|t| t.id != id));
        assert!(matches!(store.remove(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn operations_on_missing_task_report_not_found() {
        let mut store = TaskStore::new();
        assert!(matches!(store.rename("nope", "x"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.toggle_done("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.add_subtask("nope", "x"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn rename_keeps_id_and_created_at() {
        let mut store = TaskStore::new();
        let original = store.create("Draft").unwrap().clone();
        store.rename(&original.id, "Final").unwrap();
        let renamed = store.get(&original.id).unwrap();
        assert_eq!(renamed.title, "Final");
        assert_eq!(renamed.created_at, original.created_at);
        assert!(matches!(store.rename(&original.id, ""), Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn add_subtask_increments_count_by_one() {
        let mut store = TaskStore::new();
        let id = store.create("Groceries").unwrap().id.clone();
        store.add_subtask(&id, "Buy eggs").unwrap();
        let before = store.get(&id).unwrap().subtasks.len();
        store.add_subtask(&id, "Buy milk").unwrap();
        let task = store.get(&id).unwrap();
        assert_eq!(task.subtasks.len(), before + 1);
        assert_eq!(task.subtask_titles(), vec!["Buy eggs", "Buy milk"]);
    }

    #[test]
    fn subtasks_addressed_by_id_or_index() {
        let mut store = TaskStore::new();
        let id = store.create("Trip").unwrap().id.clone();
        let tickets = store.add_subtask(&id, "Tickets").unwrap();
        store.add_subtask(&id, "Hotel").unwrap();
        store.add_subtask(&id, "Bags").unwrap();

        assert!(store.toggle_subtask(&id, &SubtaskRef::Id(tickets.clone())).unwrap());
        assert!(store.toggle_subtask(&id, &SubtaskRef::Index(2)).unwrap());
        assert_eq!(store.get(&id).unwrap().progress(), (2, 3));
        assert!(!store.get(&id).unwrap().done);

        store.rename_subtask(&id, &SubtaskRef::Index(1), "Hostel").unwrap();
        let removed = store.remove_subtask(&id, &SubtaskRef::Id(tickets)).unwrap();
        assert_eq!(removed.title, "Tickets");
        assert_eq!(store.get(&id).unwrap().subtask_titles(), vec!["Hostel", "Bags"]);

        assert!(matches!(
            store.toggle_subtask(&id, &SubtaskRef::Index(5)),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.remove_subtask(&id, &SubtaskRef::Id("missing".to_string())),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut store = TaskStore::new();
        for title in ["c", "a", "b"] {
            store.create(title).unwrap();
        }
        let titles: Vec<_> = store.list().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn listeners_see_one_event_per_successful_mutation() {
        let mut store = TaskStore::new();
        let queue = store.subscribe_queue();

        let id = store.create("Write report").unwrap().id.clone();
        store.add_subtask(&id, "Outline").unwrap();
        store.toggle_done(&id).unwrap();
        let _ = store.toggle_done("missing");
        let _ = store.create("");
        store.remove(&id).unwrap();

        assert_eq!(
            queue.drain(),
            vec![
                StoreEvent::TaskCreated { task_id: id.clone() },
                StoreEvent::TaskUpdated { task_id: id.clone() },
                StoreEvent::TaskUpdated { task_id: id.clone() },
                StoreEvent::TaskRemoved { task_id: id },
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let mut task = Task::new("a".to_string(), "2024-04-03T10:00:00.000Z".to_string());
        let duplicate = task.clone();
        assert!(matches!(
            TaskStore::load(vec![task.clone(), duplicate]),
            Err(StoreError::InvalidInput(_))
        ));

        let subtask = Subtask::new("x".to_string());
        task.subtasks = vec![subtask.clone(), subtask];
        assert!(matches!(TaskStore::load(vec![task]), Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn load_rejects_records_create_would_refuse() {
        let valid = || Task::new("a".to_string(), "2024-04-03T10:00:00.000Z".to_string());
        let rejected = |task: Task| matches!(TaskStore::load(vec![task]), Err(StoreError::InvalidInput(_)));

        assert!(rejected(Task { id: String::new(), ..valid() }));
        assert!(rejected(Task { title: "   ".to_string(), ..valid() }));
        assert!(rejected(Task { created_at: "yesterday".to_string(), ..valid() }));

        let mut blank_subtask = valid();
        blank_subtask.subtasks.push(Subtask::new(String::new()));
        assert!(rejected(blank_subtask));

        let mut unnamed_subtask = valid();
        unnamed_subtask.subtasks.push(Subtask { id: String::new(), ..Subtask::new("x".to_string()) });
        assert!(rejected(unnamed_subtask));

        assert!(TaskStore::load(vec![valid()]).is_ok());
    }

    #[test]
    fn failed_replace_keeps_previous_tasks() {
        let mut store = TaskStore::new();
        store.create("keep").unwrap();
        let bad = Task::new("x".to_string(), "not a time".to_string());
        assert!(store.replace(vec![bad]).is_err());
        assert_eq!(store.list()[0].title, "keep");
    }

    #[test]
    fn load_seeds_clock_from_offset_timestamps() {
        let earlier = Task::new("a".to_string(), "2999-01-01T00:00:00.000Z".to_string());
        let later = Task::new("b".to_string(), "2999-01-01T02:00:00+01:00".to_string());
        let mut store = TaskStore::load(vec![later, earlier]).unwrap();
        let created = store.create("now").unwrap();
        assert_eq!(created.created_at, "2999-01-01T01:00:00.000Z");
    }

    #[test]
    fn load_seeds_monotonic_clock_from_existing_tasks() {
        let future = Task::new("future".to_string(), "2999-01-01T00:00:00.000Z".to_string());
        let mut store = TaskStore::load(vec![future]).unwrap();
        let created = store.create("now").unwrap();
        assert_eq!(created.created_at, "2999-01-01T00:00:00.000Z");
    }

    #[test]
    fn resolve_prefix_requires_unique_match() {
        let a = Task {
            id: "abcd1111".to_string(),
            ..Task::new("a".to_string(), "2024-04-03T10:00:00.000Z".to_string())
        };
        let b = Task {
            id: "abcd2222".to_string(),
            ..Task::new("b".to_string(), "2024-04-03T10:00:00.000Z".to_string())
        };
        let store = TaskStore::load(vec![a, b]).unwrap();

        assert_eq!(store.resolve_prefix("abcd1").unwrap(), "abcd1111");
        assert_eq!(store.resolve_prefix("abcd2222").unwrap(), "abcd2222");
        assert!(matches!(store.resolve_prefix("abcd"), Err(StoreError::InvalidInput(_))));
        assert!(matches!(store.resolve_prefix("ab"), Err(StoreError::InvalidInput(_))));
        assert!(matches!(store.resolve_prefix("ffff"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn write_report_scenario() {
        let mut store = TaskStore::new();
        let id = store.create("Write report").unwrap().id.clone();
        {
            let task = store.get(&id).unwrap();
            assert!(!task.done);
            assert!(task.subtasks.is_empty());
        }
        store.add_subtask(&id, "Outline").unwrap();
        assert_eq!(store.get(&id).unwrap().subtask_titles(), vec!["Outline"]);
        assert!(store.toggle_done(&id).unwrap());
        store.remove(&id).unwrap();
        assert!(store.list().iter().all(|t| t.id != id));
    }

    #[test]
    fn timestamps_parse_back() {
        let time = Utc.with_ymd_and_hms(2024, 4, 3, 9, 30, 0).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(time)), Some(time));
        assert_eq!(parse_timestamp("2024-04-03T11:30:00+02:00"), Some(time));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
