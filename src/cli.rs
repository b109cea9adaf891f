use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::database::{Database, DatabaseError};
use crate::export::{self, ExportError};
use crate::models::{StatusFilter, Task};
use crate::store::{EventQueue, StoreError, SubtaskRef, TaskStore};
use crate::utils::parse_position;

#[derive(Parser)]
#[command(name = "taskman")]
#[command(about = "Task Manager - a terminal to-do list with subtasks")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Launch interactive TUI (default if no subcommand)
    Tui,
    /// Add a new task
    Add {
        /// Task title
        title: String,
    },
    /// List tasks in creation order
    List {
        /// Which tasks to show
        #[arg(long, value_enum, default_value_t = ListFilter::All)]
        filter: ListFilter,
        /// Print the tasks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a task and its subtasks
    Show {
        /// Task id or unique id prefix
        id: String,
    },
    /// Change a task's title
    Rename {
        /// Task id or unique id prefix
        id: String,
        /// New title
        title: String,
    },
    /// Toggle a task between done and not done
    Done {
        /// Task id or unique id prefix
        id: String,
    },
    /// Delete a task and its subtasks
    Rm {
        /// Task id or unique id prefix
        id: String,
    },
    /// Work with a task's subtasks
    #[command(subcommand)]
    Sub(SubCommands),
    /// Write all tasks to a JSON file
    Export {
        /// Destination file
        file: PathBuf,
    },
    /// Replace all tasks with the contents of a JSON file
    Import {
        /// Source file
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SubCommands {
    /// Append a subtask
    Add {
        /// Task id or unique id prefix
        id: String,
        /// Subtask title
        title: String,
    },
    /// Rename the subtask at a position
    Rename {
        /// Task id or unique id prefix
        id: String,
        /// Subtask position, starting at 1
        position: String,
        /// New title
        title: String,
    },
    /// Toggle the subtask at a position
    Done {
        /// Task id or unique id prefix
        id: String,
        /// Subtask position, starting at 1
        position: String,
    },
    /// Remove the subtask at a position
    Rm {
        /// Task id or unique id prefix
        id: String,
        /// Subtask position, starting at 1
        position: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFilter {
    All,
    Pending,
    Done,
}

impl From<ListFilter> for StatusFilter {
    fn from(filter: ListFilter) -> Self {
        match filter {
            ListFilter::All => StatusFilter::All,
            ListFilter::Pending => StatusFilter::Pending,
            ListFilter::Done => StatusFilter::Done,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("{0}")]
    StoreError(#[from] StoreError),
    #[error("{0}")]
    ExportError(#[from] ExportError),
    #[error("Invalid position: {0}")]
    PositionError(String),
    #[error("Failed to write output: {0}")]
    OutputError(#[from] std::io::Error),
}

/// A store loaded from the database whose mutations are written back on commit
struct Session<'a> {
    db: &'a Database,
    store: TaskStore,
    queue: EventQueue,
}

impl<'a> Session<'a> {
    fn open(db: &'a Database) -> Result<Self, CliError> {
        let mut store = TaskStore::load(db.load_tasks()?)?;
        let queue = store.subscribe_queue();
        Ok(Self { db, store, queue })
    }

    fn resolve(&self, id: &str) -> Result<String, CliError> {
        Ok(self.store.resolve_prefix(id)?)
    }

    fn commit(&self) -> Result<(), CliError> {
        self.db.apply_all(&self.queue.drain(), &self.store)?;
        Ok(())
    }
}

fn subtask_at(position: &str) -> Result<SubtaskRef, CliError> {
    parse_position(position)
        .map(SubtaskRef::Index)
        .map_err(CliError::PositionError)
}

/// Run one non-interactive command against the database
pub fn run_command(command: Commands, db: &Database, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Commands::Tui => Ok(()),
        Commands::Add { title } => handle_add(&title, db, out),
        Commands::List { filter, json } => handle_list(filter.into(), json, db, out),
        Commands::Show { id } => handle_show(&id, db, out),
        Commands::Rename { id, title } => {
            let mut session = Session::open(db)?;
            let id = session.resolve(&id)?;
            session.store.rename(&id, &title)?;
            session.commit()?;
            writeln!(out, "Task renamed")?;
            Ok(())
        }
        Commands::Done { id } => {
            let mut session = Session::open(db)?;
            let id = session.resolve(&id)?;
            let done = session.store.toggle_done(&id)?;
            session.commit()?;
            writeln!(out, "Task marked {}", if done { "done" } else { "not done" })?;
            Ok(())
        }
        Commands::Rm { id } => {
            let mut session = Session::open(db)?;
            let id = session.resolve(&id)?;
            let removed = session.store.remove(&id)?;
            session.commit()?;
            writeln!(out, "Deleted task: {}", removed.title)?;
            Ok(())
        }
        Commands::Sub(sub) => handle_subtask(sub, db, out),
        Commands::Export { file } => {
            let tasks = db.load_tasks()?;
            export::write_file(&file, &tasks)?;
            writeln!(out, "Exported {} tasks to {}", tasks.len(), file.display())?;
            Ok(())
        }
        Commands::Import { file } => {
            let tasks = export::read_file(&file)?;
            // Validate ids before touching the database
            let store = TaskStore::load(tasks)?;
            db.replace_all(store.list())?;
            writeln!(out, "Imported {} tasks from {}", store.len(), file.display())?;
            Ok(())
        }
    }
}

/// Handle the add command
pub fn handle_add(title: &str, db: &Database, out: &mut impl Write) -> Result<(), CliError> {
    let mut session = Session::open(db)?;
    let short_id = session.store.create(title)?.short_id().to_string();
    session.commit()?;
    writeln!(out, "Task created successfully (ID: {})", short_id)?;
    Ok(())
}

/// Handle the list command
pub fn handle_list(
    filter: StatusFilter,
    json: bool,
    db: &Database,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let tasks: Vec<Task> = db
        .load_tasks()?
        .into_iter()
        .filter(|task| filter.matches(task))
        .collect();

    if json {
        writeln!(out, "{}", export::export_json(&tasks)?)?;
        return Ok(());
    }

    if tasks.is_empty() {
        writeln!(out, "No tasks")?;
        return Ok(());
    }

    for task in &tasks {
        writeln!(out, "{}", format_task_line(task))?;
    }
    Ok(())
}

/// Handle the show command
pub fn handle_show(id: &str, db: &Database, out: &mut impl Write) -> Result<(), CliError> {
    let session = Session::open(db)?;
    let id = session.resolve(id)?;
    let task = session.store.get(&id)?;

    writeln!(out, "{}", task.title)?;
    writeln!(out, "  id:       {}", task.id)?;
    writeln!(out, "  created:  {}", task.created_at)?;
    writeln!(out, "  status:   {}", if task.done { "done" } else { "not done" })?;
    if task.subtasks.is_empty() {
        writeln!(out, "  no subtasks")?;
    } else {
        let (completed, total) = task.progress();
        writeln!(out, "  subtasks: {}/{}", completed, total)?;
        for (index, subtask) in task.subtasks.iter().enumerate() {
            writeln!(out, "    {}. {} {}", index + 1, checkbox(subtask.done), subtask.title)?;
        }
    }
    Ok(())
}

fn handle_subtask(command: SubCommands, db: &Database, out: &mut impl Write) -> Result<(), CliError> {
    let mut session = Session::open(db)?;
    match command {
        SubCommands::Add { id, title } => {
            let id = session.resolve(&id)?;
            session.store.add_subtask(&id, &title)?;
            let count = session.store.get(&id)?.subtasks.len();
            session.commit()?;
            writeln!(out, "Subtask {} added", count)?;
        }
        SubCommands::Rename { id, position, title } => {
            let id = session.resolve(&id)?;
            session.store.rename_subtask(&id, &subtask_at(&position)?, &title)?;
            session.commit()?;
            writeln!(out, "Subtask renamed")?;
        }
        SubCommands::Done { id, position } => {
            let id = session.resolve(&id)?;
            let done = session.store.toggle_subtask(&id, &subtask_at(&position)?)?;
            session.commit()?;
            writeln!(out, "Subtask marked {}", if done { "done" } else { "not done" })?;
        }
        SubCommands::Rm { id, position } => {
            let id = session.resolve(&id)?;
            let removed = session.store.remove_subtask(&id, &subtask_at(&position)?)?;
            session.commit()?;
            writeln!(out, "Deleted subtask: {}", removed.title)?;
        }
    }
    Ok(())
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

/// One-line summary used by `list`
pub fn format_task_line(task: &Task) -> String {
    let mut line = format!("{}  {} {}", task.short_id(), checkbox(task.done), task.title);
    let (completed, total) = task.progress();
    if total > 0 {
        line.push_str(&format!(" ({}/{})", completed, total));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(db: &Database, command: Commands) -> Result<String, CliError> {
        let mut out = Vec::new();
        run_command(command, db, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn only_task(db: &Database) -> Task {
        let mut tasks = db.load_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        tasks.remove(0)
    }

    #[test]
    fn parses_nested_subcommands() {
        let cli = Cli::try_parse_from(["taskman", "--dev", "sub", "done", "abcd", "2"]).unwrap();
        assert!(cli.dev);
        assert_eq!(
            cli.command,
            Some(Commands::Sub(SubCommands::Done {
                id: "abcd".to_string(),
                position: "2".to_string()
            }))
        );

        let cli = Cli::try_parse_from(["taskman", "list", "--filter", "pending"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::List { filter: ListFilter::Pending, json: false })
        );

        assert!(Cli::try_parse_from(["taskman", "-v", "-q", "list"]).is_err());
    }

    #[test]
    fn add_then_manage_subtasks_by_position() {
        let db = Database::in_memory().unwrap();
        let output = run(&db, Commands::Add { title: "Write report".to_string() }).unwrap();
        assert!(output.starts_with("Task created successfully"));

        let id = only_task(&db).id;
        run(&db, Commands::Sub(SubCommands::Add { id: id.clone(), title: "Outline".to_string() })).unwrap();
        run(&db, Commands::Sub(SubCommands::Add { id: id.clone(), title: "Draft".to_string() })).unwrap();
        run(&db, Commands::Sub(SubCommands::Done { id: id.clone(), position: "2".to_string() })).unwrap();
        run(&db, Commands::Sub(SubCommands::Rename {
            id: id.clone(),
            position: "1".to_string(),
            title: "Outline v2".to_string(),
        }))
        .unwrap();

        let task = only_task(&db);
        assert_eq!(task.subtask_titles(), vec!["Outline v2", "Draft"]);
        assert!(task.subtasks[1].done);

        let err = run(&db, Commands::Sub(SubCommands::Rm { id: id.clone(), position: "0".to_string() }));
        assert!(matches!(err, Err(CliError::PositionError(_))));
        let err = run(&db, Commands::Sub(SubCommands::Rm { id, position: "9".to_string() }));
        assert!(matches!(err, Err(CliError::StoreError(StoreError::NotFound(_)))));
    }

    #[test]
    fn commands_accept_id_prefix() {
        let db = Database::in_memory().unwrap();
        run(&db, Commands::Add { title: "Call mom".to_string() }).unwrap();
        let task = only_task(&db);

        run(&db, Commands::Done { id: task.short_id().to_string() }).unwrap();
        assert!(only_task(&db).done);

        run(&db, Commands::Rename { id: task.short_id().to_string(), title: "Call dad".to_string() }).unwrap();
        assert_eq!(only_task(&db).title, "Call dad");

        run(&db, Commands::Rm { id: task.id.clone() }).unwrap();
        assert!(db.load_tasks().unwrap().is_empty());
        assert!(matches!(
            run(&db, Commands::Rm { id: task.id }),
            Err(CliError::StoreError(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn list_filters_by_status() {
        let db = Database::in_memory().unwrap();
        run(&db, Commands::Add { title: "open".to_string() }).unwrap();
        run(&db, Commands::Add { title: "closed".to_string() }).unwrap();
        let closed = db.load_tasks().unwrap()[1].id.clone();
        run(&db, Commands::Done { id: closed }).unwrap();

        let pending = run(&db, Commands::List { filter: ListFilter::Pending, json: false }).unwrap();
        assert!(pending.contains("[ ] open"));
        assert!(!pending.contains("closed"));

        let done = run(&db, Commands::List { filter: ListFilter::Done, json: true }).unwrap();
        let parsed = export::import_json(&done).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "closed");
    }

    #[test]
    fn empty_title_is_rejected() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            run(&db, Commands::Add { title: "  ".to_string() }),
            Err(CliError::StoreError(StoreError::InvalidInput(_)))
        ));
        assert!(db.load_tasks().unwrap().is_empty());
    }

    #[test]
    fn format_task_line_shows_progress() {
        let mut store = TaskStore::new();
        let id = store.create("Trip").unwrap().id.clone();
        store.add_subtask(&id, "Tickets").unwrap();
        store.toggle_subtask(&id, &SubtaskRef::Index(0)).unwrap();
        let line = format_task_line(store.get(&id).unwrap());
        assert!(line.ends_with("[ ] Trip (1/1)"));
    }
}
