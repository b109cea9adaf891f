use rusqlite::Connection;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Subtask, Task};
use crate::store::{StoreEvent, TaskStore};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        tracing::debug!(path = %db_path.display(), "Opened database");

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open a throwaway database that lives only as long as the connection
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                done            INTEGER NOT NULL DEFAULT 0,
                position        INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS subtasks (
                id              TEXT NOT NULL,
                task_id         TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                done            INTEGER NOT NULL DEFAULT 0,
                position        INTEGER NOT NULL,
                PRIMARY KEY (task_id, id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_position ON tasks(position)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_subtasks_task_id ON subtasks(task_id, position)",
            [],
        )?;

        Ok(())
    }

    /// Helper function to map a row to a Task without its subtasks
    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: row.get(2)?,
            done: row.get::<_, i64>(3)? != 0,
            subtasks: Vec::new(),
        })
    }

    fn row_to_subtask(row: &rusqlite::Row) -> Result<Subtask, rusqlite::Error> {
        Ok(Subtask {
            id: row.get(0)?,
            title: row.get(1)?,
            done: row.get::<_, i64>(2)? != 0,
        })
    }

    /// Load every task with its subtasks, in display order
    pub fn load_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, created_at, done FROM tasks ORDER BY position ASC",
        )?;
        let mut tasks = stmt
            .query_map([], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut sub_stmt = self.conn.prepare(
            "SELECT id, title, done FROM subtasks WHERE task_id = ?1 ORDER BY position ASC",
        )?;
        for task in tasks.iter_mut() {
            task.subtasks = sub_stmt
                .query_map(rusqlite::params![task.id], Self::row_to_subtask)?
                .collect::<Result<Vec<_>, _>>()?;
        }

        tracing::debug!(count = tasks.len(), "Loaded tasks from database");
        Ok(tasks)
    }

    /// Get the maximum position value from all tasks
    pub fn get_max_task_position(&self) -> Result<i64, DatabaseError> {
        let max_position: Option<i64> = self.conn.query_row(
            "SELECT MAX(position) FROM tasks",
            [],
            |row| row.get(0),
        )?;
        Ok(max_position.unwrap_or(-1))
    }

    /// Insert or update a task and replace its subtasks.
    /// New tasks go after every existing task; existing tasks keep their position.
    pub fn save_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let next_position = self.get_max_task_position()? + 1;
        tx.execute(
            "INSERT INTO tasks (id, title, created_at, done, position)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title, done = excluded.done",
            rusqlite::params![
                task.id,
                task.title,
                task.created_at,
                if task.done { 1 } else { 0 },
                next_position
            ],
        )?;
        Self::write_subtasks(&tx, task)?;
        tx.commit()?;
        Ok(())
    }

    fn write_subtasks(conn: &Connection, task: &Task) -> Result<(), DatabaseError> {
        conn.execute(
            "DELETE FROM subtasks WHERE task_id = ?1",
            rusqlite::params![task.id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT INTO subtasks (id, task_id, title, done, position) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, subtask) in task.subtasks.iter().enumerate() {
            stmt.execute(rusqlite::params![
                subtask.id,
                task.id,
                subtask.title,
                if subtask.done { 1 } else { 0 },
                position as i64
            ])?;
        }
        Ok(())
    }

    /// Delete a task by ID; its subtasks go with it
    pub fn delete_task(&self, id: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(())
    }

    /// Overwrite the whole collection in one transaction
    pub fn replace_all(&self, tasks: &[Task]) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM tasks", [])?;
        for (position, task) in tasks.iter().enumerate() {
            tx.execute(
                "INSERT INTO tasks (id, title, created_at, done, position) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    task.id,
                    task.title,
                    task.created_at,
                    if task.done { 1 } else { 0 },
                    position as i64
                ],
            )?;
            Self::write_subtasks(&tx, task)?;
        }
        tx.commit()?;
        tracing::info!(count = tasks.len(), "Replaced all tasks");
        Ok(())
    }

    /// Persist the effect of one store mutation
    pub fn apply(&self, event: &StoreEvent, store: &TaskStore) -> Result<(), DatabaseError> {
        match event {
            StoreEvent::TaskCreated { task_id } | StoreEvent::TaskUpdated { task_id } => {
                // Removed later in the same batch; the removal event handles it
                if let Ok(task) = store.get(task_id) {
                    self.save_task(task)?;
                }
            }
            StoreEvent::TaskRemoved { task_id } => self.delete_task(task_id)?,
        }
        tracing::debug!(?event, "Persisted store event");
        Ok(())
    }

    /// Persist a batch of events in order
    pub fn apply_all(&self, events: &[StoreEvent], store: &TaskStore) -> Result<(), DatabaseError> {
        for event in events {
            self.apply(event, store)?;
        }
        Ok(())
    }
}
