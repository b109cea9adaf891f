use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::models::Task;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },
    #[error("Failed to write {path}: {message}")]
    WriteError { path: String, message: String },
    #[error("Invalid task JSON: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Serialize tasks as a pretty-printed JSON array
pub fn export_json(tasks: &[Task]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(tasks)?)
}

/// Parse a JSON array of tasks. Bare-string subtasks are accepted.
pub fn import_json(text: &str) -> Result<Vec<Task>, ExportError> {
    Ok(serde_json::from_str(text)?)
}

pub fn write_file(path: &Path, tasks: &[Task]) -> Result<(), ExportError> {
    let json = export_json(tasks)?;
    fs::write(path, json).map_err(|e| ExportError::WriteError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), count = tasks.len(), "Exported tasks");
    Ok(())
}

pub fn read_file(path: &Path) -> Result<Vec<Task>, ExportError> {
    let text = fs::read_to_string(path).map_err(|e| ExportError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let tasks = import_json(&text)?;
    tracing::info!(path = %path.display(), count = tasks.len(), "Imported tasks");
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaskStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn export_then_import_yields_equal_tasks() {
        let mut store = TaskStore::new();
        let id = store.create("Write report").unwrap().id.clone();
        store.add_subtask(&id, "Outline").unwrap();
        store.toggle_done(&id).unwrap();

        let json = export_json(store.list()).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert_eq!(import_json(&json).unwrap(), store.list().to_vec());
    }

    #[test]
    fn import_rejects_malformed_json() {
        assert!(matches!(import_json("{not json"), Err(ExportError::ParseError(_))));
        assert!(matches!(
            import_json(r#"[{"id": "t1", "title": "x"}]"#),
            Err(ExportError::ParseError(_))
        ));
    }

    #[test]
    fn file_helpers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");

        let mut store = TaskStore::new();
        store.create("Call mom").unwrap();
        write_file(&path, store.list()).unwrap();

        assert_eq!(read_file(&path).unwrap(), store.list().to_vec());
        assert!(matches!(
            read_file(&dir.path().join("missing.json")),
            Err(ExportError::ReadError { .. })
        ));
    }
}
