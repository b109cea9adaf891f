pub mod cli;
pub mod config;
pub mod database;
pub mod export;
pub mod logging;
pub mod models;
pub mod store;
pub mod tui;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use models::{StatusFilter, Subtask, Task};
pub use store::{StoreError, StoreEvent, SubtaskRef, TaskStore};
pub use utils::Profile;
