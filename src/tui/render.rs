use ratatui::Frame;
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders};

use crate::tui::app::{Mode, Pane};
use crate::tui::widgets::{
    color::parse_color,
    confirm_delete::render_confirm_delete,
    help::render_help,
    input::render_input,
    status_bar::render_status_bar,
    subtask_list::render_subtask_list,
    task_list::render_task_list,
};
use crate::tui::{App, Layout};

pub const APP_TITLE: &str = "Task Manager";

pub fn render(f: &mut Frame, app: &mut App, layout: &Layout) {
    let fg_color = parse_color(&app.config.theme.fg);
    let bg_color = parse_color(&app.config.theme.bg);
    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title(APP_TITLE)
        .title_alignment(ratatui::layout::Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, f.area());

    // Lists borrow the store while the list states are borrowed mutably
    let App { store, ui, config, .. } = app;
    let tasks: Vec<_> = store.list().iter().filter(|t| ui.filter.matches(t)).collect();
    let selected = ui.task_list_state.selected().and_then(|i| tasks.get(i).copied());

    render_task_list(
        f,
        layout.task_area,
        &tasks,
        store.len(),
        ui.filter,
        ui.pane == Pane::Tasks,
        &mut ui.task_list_state,
        config,
    );
    render_subtask_list(
        f,
        layout.subtask_area,
        selected,
        ui.pane == Pane::Subtasks,
        &mut ui.subtask_list_state,
        config,
    );

    let hints = app.key_hints();
    render_status_bar(f, layout.status_area, app.ui.status_message.as_ref(), &hints, &app.config);

    match app.ui.mode {
        Mode::View => {}
        Mode::Help => render_help(f, layout.inner_area, &app.config),
        Mode::Input => {
            if let Some(state) = &app.input {
                render_input(f, layout.inner_area, state.purpose.title(), &state.input, &app.config);
            }
        }
        Mode::ConfirmDelete => {
            if let Some(target) = &app.pending_delete {
                render_confirm_delete(f, layout.inner_area, target, app.ui.confirm_selection, &app.config);
            }
        }
    }
}
