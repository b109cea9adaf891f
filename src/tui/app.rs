use crate::models::{StatusFilter, Task};
use crate::store::{EventQueue, StoreError, SubtaskRef, TaskStore};
use crate::tui::error::TuiError;
use crate::tui::widgets::input::LineInput;
use crate::utils::{ParsedKeyBinding, parse_key_binding};
use crate::{Config, Database};
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Tasks,
    Subtasks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    View,
    Input,
    ConfirmDelete,
    Help,
}

/// What a submitted title will be used for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    NewTask,
    RenameTask { task_id: String },
    NewSubtask { task_id: String },
    RenameSubtask { task_id: String, index: usize },
}

impl InputPurpose {
    pub fn title(&self) -> &'static str {
        match self {
            InputPurpose::NewTask => "New task",
            InputPurpose::RenameTask { .. } => "Rename task",
            InputPurpose::NewSubtask { .. } => "New subtask",
            InputPurpose::RenameSubtask { .. } => "Rename subtask",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputState {
    pub purpose: InputPurpose,
    pub input: LineInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Task { task_id: String, title: String },
    Subtask { task_id: String, index: usize, title: String },
}

impl DeleteTarget {
    pub fn describe(&self) -> (&'static str, &str) {
        match self {
            DeleteTarget::Task { title, .. } => ("task", title),
            DeleteTarget::Subtask { title, .. } => ("subtask", title),
        }
    }
}

/// Key bindings from config, parsed once at startup
#[derive(Debug, Clone)]
pub struct KeyMap {
    pub quit: ParsedKeyBinding,
    pub new: ParsedKeyBinding,
    pub edit: ParsedKeyBinding,
    pub delete: ParsedKeyBinding,
    pub toggle_done: ParsedKeyBinding,
    pub switch_pane: ParsedKeyBinding,
    pub list_up: ParsedKeyBinding,
    pub list_down: ParsedKeyBinding,
    pub toggle_filter: ParsedKeyBinding,
    pub help: ParsedKeyBinding,
}

impl KeyMap {
    pub fn from_config(config: &Config) -> Result<Self, TuiError> {
        fn parse(name: &str, value: &str) -> Result<ParsedKeyBinding, TuiError> {
            parse_key_binding(value).map_err(|e| TuiError::KeyBindingError(format!("{}: {}", name, e)))
        }

        let keys = &config.key_bindings;
        Ok(Self {
            quit: parse("quit", &keys.quit)?,
            new: parse("new", &keys.new)?,
            edit: parse("edit", &keys.edit)?,
            delete: parse("delete", &keys.delete)?,
            toggle_done: parse("toggle_done", &keys.toggle_done)?,
            switch_pane: parse("switch_pane", &keys.switch_pane)?,
            list_up: parse("list_up", &keys.list_up)?,
            list_down: parse("list_down", &keys.list_down)?,
            toggle_filter: parse("toggle_filter", &keys.toggle_filter)?,
            help: parse("help", &keys.help)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub mode: Mode,
    pub pane: Pane,
    pub filter: StatusFilter,
    pub task_list_state: ListState,
    pub subtask_list_state: ListState,
    /// 0 = Delete, 1 = Cancel
    pub confirm_selection: usize,
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            mode: Mode::View,
            pane: Pane::Tasks,
            filter: StatusFilter::All,
            task_list_state: ListState::default(),
            subtask_list_state: ListState::default(),
            confirm_selection: 1,
            status_message: None,
            status_message_time: None,
        }
    }
}

pub struct App {
    pub config: Config,
    pub db: Database,
    pub store: TaskStore,
    pub keys: KeyMap,
    pub ui: UiState,
    pub input: Option<InputState>,
    pub pending_delete: Option<DeleteTarget>,
    queue: EventQueue,
}

impl App {
    pub fn new(config: Config, db: Database) -> Result<Self, TuiError> {
        let keys = KeyMap::from_config(&config)?;
        let mut store = TaskStore::load(db.load_tasks()?)?;
        let queue = store.subscribe_queue();

        let mut app = Self {
            config,
            db,
            store,
            keys,
            ui: UiState::default(),
            input: None,
            pending_delete: None,
            queue,
        };
        app.clamp_selection();
        tracing::info!(tasks = app.store.len(), "TUI started");
        Ok(app)
    }

    /// Tasks shown under the current filter, in store order
    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.store
            .list()
            .iter()
            .filter(|task| self.ui.filter.matches(task))
            .collect()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let index = self.ui.task_list_state.selected()?;
        self.visible_tasks().get(index).copied()
    }

    pub fn selected_subtask_index(&self) -> Option<usize> {
        let task = self.selected_task()?;
        self.ui
            .subtask_list_state
            .selected()
            .filter(|index| *index < task.subtasks.len())
    }

    /// Keep both list selections inside their lists
    pub fn clamp_selection(&mut self) {
        let task_count = self.visible_tasks().len();
        let task_selection = match (task_count, self.ui.task_list_state.selected()) {
            (0, _) => None,
            (n, Some(i)) => Some(i.min(n - 1)),
            (_, None) => Some(0),
        };
        self.ui.task_list_state.select(task_selection);

        let subtask_count = self.selected_task().map(|t| t.subtasks.len()).unwrap_or(0);
        let subtask_selection = match (subtask_count, self.ui.subtask_list_state.selected()) {
            (0, _) => None,
            (n, Some(i)) => Some(i.min(n - 1)),
            (_, None) => Some(0),
        };
        self.ui.subtask_list_state.select(subtask_selection);

        if task_selection.is_none() {
            self.ui.pane = Pane::Tasks;
        }
    }

    pub fn select_next(&mut self) {
        match self.ui.pane {
            Pane::Tasks => {
                let count = self.visible_tasks().len();
                step_selection(&mut self.ui.task_list_state, count, true);
                self.ui.subtask_list_state.select(None);
            }
            Pane::Subtasks => {
                let count = self.selected_task().map(|t| t.subtasks.len()).unwrap_or(0);
                step_selection(&mut self.ui.subtask_list_state, count, true);
            }
        }
        self.clamp_selection();
    }

    pub fn select_previous(&mut self) {
        match self.ui.pane {
            Pane::Tasks => {
                let count = self.visible_tasks().len();
                step_selection(&mut self.ui.task_list_state, count, false);
                self.ui.subtask_list_state.select(None);
            }
            Pane::Subtasks => {
                let count = self.selected_task().map(|t| t.subtasks.len()).unwrap_or(0);
                step_selection(&mut self.ui.subtask_list_state, count, false);
            }
        }
        self.clamp_selection();
    }

    pub fn switch_pane(&mut self) {
        self.ui.pane = match self.ui.pane {
            Pane::Tasks if self.selected_task().is_some() => Pane::Subtasks,
            Pane::Tasks => Pane::Tasks,
            Pane::Subtasks => Pane::Tasks,
        };
    }

    pub fn cycle_filter(&mut self) {
        let selected_id = self.selected_task().map(|t| t.id.clone());
        self.ui.filter = self.ui.filter.next();
        self.select_task_by_id(selected_id.as_deref());
        self.set_status_message(format!("Showing: {}", self.ui.filter.label()));
    }

    fn select_task_by_id(&mut self, id: Option<&str>) {
        let index = id.and_then(|id| self.visible_tasks().iter().position(|t| t.id == id));
        self.ui.task_list_state.select(index);
        self.ui.subtask_list_state.select(None);
        self.clamp_selection();
    }

    /// Open the title input for a new item in the focused pane
    pub fn begin_new(&mut self) {
        let purpose = match self.ui.pane {
            Pane::Tasks => InputPurpose::NewTask,
            Pane::Subtasks => match self.selected_task() {
                Some(task) => InputPurpose::NewSubtask { task_id: task.id.clone() },
                None => return,
            },
        };
        self.open_input(purpose, "");
    }

    /// Open the title input prefilled with the focused item's title
    pub fn begin_edit(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let (purpose, current) = match self.ui.pane {
            Pane::Tasks => (InputPurpose::RenameTask { task_id: task.id.clone() }, task.title.clone()),
            Pane::Subtasks => {
                let Some(index) = self.selected_subtask_index() else {
                    return;
                };
                (
                    InputPurpose::RenameSubtask { task_id: task.id.clone(), index },
                    task.subtasks[index].title.clone(),
                )
            }
        };
        self.open_input(purpose, &current);
    }

    fn open_input(&mut self, purpose: InputPurpose, text: &str) {
        self.input = Some(InputState {
            purpose,
            input: LineInput::with_text(text),
        });
        self.ui.mode = Mode::Input;
    }

    pub fn cancel_input(&mut self) {
        self.input = None;
        self.ui.mode = Mode::View;
    }

    /// Apply the typed title. Invalid titles keep the input open.
    pub fn submit_input(&mut self) -> Result<(), TuiError> {
        let Some(state) = self.input.take() else {
            self.ui.mode = Mode::View;
            return Ok(());
        };
        let title = state.input.value();

        let result = match &state.purpose {
            InputPurpose::NewTask => self.store.create(&title).map(|task| task.id.clone()),
            InputPurpose::RenameTask { task_id } => {
                self.store.rename(task_id, &title).map(|_| task_id.clone())
            }
            InputPurpose::NewSubtask { task_id } => {
                self.store.add_subtask(task_id, &title).map(|_| task_id.clone())
            }
            InputPurpose::RenameSubtask { task_id, index } => self
                .store
                .rename_subtask(task_id, &SubtaskRef::Index(*index), &title)
                .map(|_| task_id.clone()),
        };

        match result {
            Ok(task_id) => {
                self.persist()?;
                self.ui.mode = Mode::View;
                match &state.purpose {
                    InputPurpose::NewTask => {
                        self.select_task_by_id(Some(&task_id));
                        self.set_status_message("Task created".to_string());
                    }
                    InputPurpose::NewSubtask { .. } => {
                        let count = self.store.get(&task_id).map(|t| t.subtasks.len()).unwrap_or(0);
                        self.ui.subtask_list_state.select(count.checked_sub(1));
                        self.set_status_message("Subtask added".to_string());
                    }
                    _ => self.set_status_message("Saved".to_string()),
                }
                self.clamp_selection();
            }
            Err(StoreError::InvalidInput(message)) => {
                self.input = Some(state);
                self.set_status_message(message);
            }
            Err(err) => {
                self.ui.mode = Mode::View;
                self.set_status_message(err.to_string());
            }
        }
        Ok(())
    }

    /// Toggle completion of the focused task or subtask
    pub fn toggle_selected(&mut self) -> Result<(), TuiError> {
        let Some(task_id) = self.selected_task().map(|t| t.id.clone()) else {
            return Ok(());
        };
        let result = match self.ui.pane {
            Pane::Tasks => self.store.toggle_done(&task_id),
            Pane::Subtasks => match self.selected_subtask_index() {
                Some(index) => self.store.toggle_subtask(&task_id, &SubtaskRef::Index(index)),
                None => return Ok(()),
            },
        };
        match result {
            Ok(_) => {
                self.persist()?;
                // A filtered view may have just hidden the task
                self.clamp_selection();
            }
            Err(err) => self.set_status_message(err.to_string()),
        }
        Ok(())
    }

    /// Ask for confirmation before deleting the focused item
    pub fn request_delete(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let target = match self.ui.pane {
            Pane::Tasks => DeleteTarget::Task {
                task_id: task.id.clone(),
                title: task.title.clone(),
            },
            Pane::Subtasks => match self.selected_subtask_index() {
                Some(index) => DeleteTarget::Subtask {
                    task_id: task.id.clone(),
                    index,
                    title: task.subtasks[index].title.clone(),
                },
                None => return,
            },
        };
        self.pending_delete = Some(target);
        self.ui.confirm_selection = 1;
        self.ui.mode = Mode::ConfirmDelete;
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
        self.ui.mode = Mode::View;
    }

    pub fn confirm_delete(&mut self) -> Result<(), TuiError> {
        self.ui.mode = Mode::View;
        let Some(target) = self.pending_delete.take() else {
            return Ok(());
        };
        let result = match &target {
            DeleteTarget::Task { task_id, .. } => self.store.remove(task_id).map(|_| ()),
            DeleteTarget::Subtask { task_id, index, .. } => self
                .store
                .remove_subtask(task_id, &SubtaskRef::Index(*index))
                .map(|_| ()),
        };
        match result {
            Ok(()) => {
                self.persist()?;
                let (kind, _) = target.describe();
                self.set_status_message(format!("Deleted {}", kind));
                if matches!(target, DeleteTarget::Task { .. }) {
                    self.ui.subtask_list_state.select(None);
                }
                self.clamp_selection();
            }
            Err(err) => self.set_status_message(err.to_string()),
        }
        Ok(())
    }

    /// Write every queued store event to the database
    pub fn persist(&mut self) -> Result<(), TuiError> {
        let events = self.queue.drain();
        if events.is_empty() {
            return Ok(());
        }
        self.db.apply_all(&events, &self.store)?;
        Ok(())
    }

    pub fn toggle_help(&mut self) {
        self.ui.mode = if self.ui.mode == Mode::Help { Mode::View } else { Mode::Help };
    }

    pub fn set_status_message(&mut self, message: String) {
        self.ui.status_message = Some(message);
        self.ui.status_message_time = Some(Instant::now());
    }

    /// Clear the status message once it has been shown long enough
    pub fn check_status_message_timeout(&mut self) {
        let timeout = Duration::from_secs(self.config.status_message_secs);
        if let Some(shown_at) = self.ui.status_message_time {
            if shown_at.elapsed() >= timeout {
                self.ui.status_message = None;
                self.ui.status_message_time = None;
            }
        }
    }

    /// Hints shown in the status bar for the current mode
    pub fn key_hints(&self) -> Vec<String> {
        use crate::utils::format_key_binding_for_display as show;
        let keys = &self.config.key_bindings;
        match self.ui.mode {
            Mode::View => vec![
                format!("{}: New", show(&keys.new)),
                format!("{}: Edit", show(&keys.edit)),
                format!("{}: Toggle", show(&keys.toggle_done)),
                format!("{}: Delete", show(&keys.delete)),
                format!("{}: Pane", show(&keys.switch_pane)),
                format!("{}: Filter", show(&keys.toggle_filter)),
                format!("{}: Help", show(&keys.help)),
                format!("{}: Quit", show(&keys.quit)),
            ],
            Mode::Input => vec!["Enter: Save".to_string(), "Esc: Cancel".to_string()],
            Mode::ConfirmDelete => vec![
                "↑↓: Choose".to_string(),
                "Enter: Confirm".to_string(),
                "Esc: Cancel".to_string(),
            ],
            Mode::Help => vec![format!("{} / Esc: Close help", show(&keys.help))],
        }
    }
}

fn step_selection(state: &mut ListState, count: usize, forward: bool) {
    if count == 0 {
        state.select(None);
        return;
    }
    let next = match (state.selected(), forward) {
        (None, _) => 0,
        (Some(i), true) => (i + 1).min(count - 1),
        (Some(i), false) => i.saturating_sub(1),
    };
    state.select(Some(next));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn app() -> App {
        App::new(Config::default(), Database::in_memory().unwrap()).unwrap()
    }

    fn type_text(app: &mut App, text: &str) {
        let state = app.input.as_mut().expect("input open");
        for ch in text.chars() {
            state.input.insert_char(ch);
        }
    }

    fn add_task(app: &mut App, title: &str) {
        app.ui.pane = Pane::Tasks;
        app.begin_new();
        type_text(app, title);
        app.submit_input().unwrap();
    }

    #[test]
    fn new_task_is_persisted_and_selected() {
        let mut app = app();
        add_task(&mut app, "Write report");
        add_task(&mut app, "Call mom");

        assert_eq!(app.ui.mode, Mode::View);
        assert_eq!(app.selected_task().unwrap().title, "Call mom");
        let stored: Vec<_> = app.db.load_tasks().unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(stored, vec!["Write report", "Call mom"]);
    }

    #[test]
    fn empty_title_keeps_input_open() {
        let mut app = app();
        app.begin_new();
        type_text(&mut app, "   ");
        app.submit_input().unwrap();

        assert_eq!(app.ui.mode, Mode::Input);
        assert!(app.input.is_some());
        assert!(app.ui.status_message.is_some());
        assert!(app.store.is_empty());
    }

    #[test]
    fn subtask_pane_adds_toggles_and_renames() {
        let mut app = app();
        add_task(&mut app, "Groceries");
        app.switch_pane();
        assert_eq!(app.ui.pane, Pane::Subtasks);

        app.begin_new();
        type_text(&mut app, "Buy milk");
        app.submit_input().unwrap();
        app.toggle_selected().unwrap();

        app.begin_edit();
        type_text(&mut app, " and eggs");
        app.submit_input().unwrap();

        let stored = app.db.load_tasks().unwrap();
        assert_eq!(stored[0].subtask_titles(), vec!["Buy milk and eggs"]);
        assert!(stored[0].subtasks[0].done);
        assert!(!stored[0].done);
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app();
        add_task(&mut app, "Temp");

        app.request_delete();
        assert_eq!(app.ui.mode, Mode::ConfirmDelete);
        app.cancel_delete();
        assert_eq!(app.store.len(), 1);

        app.request_delete();
        app.confirm_delete().unwrap();
        assert!(app.store.is_empty());
        assert!(app.db.load_tasks().unwrap().is_empty());
        assert_eq!(app.ui.task_list_state.selected(), None);
    }

    #[test]
    fn filter_hides_done_tasks_and_keeps_selection_valid() {
        let mut app = app();
        add_task(&mut app, "open");
        add_task(&mut app, "closed");
        app.toggle_selected().unwrap();

        app.cycle_filter();
        assert_eq!(app.ui.filter, StatusFilter::Pending);
        let visible: Vec<_> = app.visible_tasks().iter().map(|t| t.title.clone()).collect();
        assert_eq!(visible, vec!["open"]);
        assert_eq!(app.selected_task().unwrap().title, "open");

        app.toggle_selected().unwrap();
        assert!(app.visible_tasks().is_empty());
        assert_eq!(app.selected_task(), None);
    }

    #[test]
    fn selection_moves_within_bounds() {
        let mut app = app();
        for title in ["a", "b", "c"] {
            add_task(&mut app, title);
        }
        app.select_next();
        assert_eq!(app.selected_task().unwrap().title, "c");
        app.select_previous();
        app.select_previous();
        app.select_previous();
        assert_eq!(app.selected_task().unwrap().title, "a");
    }

    #[test]
    fn loads_existing_tasks_on_start() {
        let db = Database::in_memory().unwrap();
        let mut store = TaskStore::new();
        store.create("from before").unwrap();
        db.replace_all(store.list()).unwrap();

        let app = App::new(Config::default(), db).unwrap();
        assert_eq!(app.selected_task().unwrap().title, "from before");
    }

    #[test]
    fn bad_key_binding_fails_startup() {
        let mut config = Config::default();
        config.key_bindings.quit = "Hyper+q".to_string();
        assert!(matches!(
            App::new(config, Database::in_memory().unwrap()),
            Err(TuiError::KeyBindingError(_))
        ));
    }
}
