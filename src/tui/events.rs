use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    size as terminal_size,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use std::io;
use std::time::Duration;

use crate::tui::App;
use crate::tui::app::Mode;
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;
use crate::tui::widgets::confirm_delete::OPTIONS;
use crate::utils::has_primary_modifier;

/// Guard that ensures terminal state is restored even on panic.
/// A terminal left in raw mode or the alternate screen is unusable.
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        let mut guard = Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: false,
        };
        execute!(io::stdout(), EnterAlternateScreen)?;
        guard.alternate_screen_enabled = true;
        Ok(guard)
    }

    /// Restore terminal state on normal exit; drop then does nothing
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Already cleaning up, errors have nowhere to go
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

pub fn run_event_loop(mut app: App) -> Result<(), TuiError> {
    // Check size before entering the alternate screen so the error is readable
    let (width, height) = terminal_size()?;
    let min_width_with_border = Layout::MIN_WIDTH + 2;
    let min_height_with_border = Layout::MIN_HEIGHT + 2;
    if width < min_width_with_border || height < min_height_with_border {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width, height, min_width_with_border, min_height_with_border
        )));
    }

    let mut guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    loop {
        app.check_status_message_timeout();

        let size = terminal.size()?;
        let terminal_rect = Rect::new(0, 0, size.width, size.height);
        terminal.draw(|f| {
            let layout = Layout::calculate(terminal_rect, app.config.list_width_percent);
            crate::tui::render::render(f, &mut app, &layout);
        })?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                // Only Press events; Windows also reports Release
                Event::Key(key_event) if key_event.kind == KeyEventKind::Press => {
                    if handle_key_event(&mut app, key_event)? {
                        break;
                    }
                }
                // The next draw picks up the new size
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    // Nothing should be pending, but never lose a mutation on exit
    app.persist()?;
    guard.restore()?;
    tracing::info!("TUI exited");

    Ok(())
}

/// Dispatch a key press to the handler for the current mode.
/// Returns true when the application should quit.
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    match app.ui.mode {
        Mode::View => handle_view_mode(app, key_event),
        Mode::Input => {
            handle_input_mode(app, key_event)?;
            Ok(false)
        }
        Mode::ConfirmDelete => {
            handle_confirm_delete(app, key_event)?;
            Ok(false)
        }
        Mode::Help => {
            if key_event.code == KeyCode::Esc || app.keys.help.matches(&key_event) {
                app.toggle_help();
            }
            Ok(false)
        }
    }
}

fn handle_view_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    let keys = app.keys.clone();

    if keys.quit.matches(&key_event) {
        return Ok(true);
    }

    if keys.list_down.matches(&key_event) || key_event.code == KeyCode::Down {
        app.select_next();
    } else if keys.list_up.matches(&key_event) || key_event.code == KeyCode::Up {
        app.select_previous();
    } else if keys.switch_pane.matches(&key_event) {
        app.switch_pane();
    } else if keys.new.matches(&key_event) {
        app.begin_new();
    } else if keys.edit.matches(&key_event) {
        app.begin_edit();
    } else if keys.toggle_done.matches(&key_event) {
        app.toggle_selected()?;
    } else if keys.delete.matches(&key_event) {
        app.request_delete();
    } else if keys.toggle_filter.matches(&key_event) {
        app.cycle_filter();
    } else if keys.help.matches(&key_event) {
        app.toggle_help();
    }

    Ok(false)
}

fn handle_input_mode(app: &mut App, key_event: KeyEvent) -> Result<(), TuiError> {
    match key_event.code {
        KeyCode::Enter => return app.submit_input(),
        KeyCode::Esc => {
            app.cancel_input();
            return Ok(());
        }
        _ => {}
    }

    let word = has_primary_modifier(key_event.modifiers);
    let Some(state) = app.input.as_mut() else {
        return Ok(());
    };
    let input = &mut state.input;
    match key_event.code {
        KeyCode::Char(ch) if !word => input.insert_char(ch),
        KeyCode::Backspace => input.delete_char(),
        KeyCode::Delete => input.delete_forward(),
        KeyCode::Left if word => input.move_cursor_word_left(),
        KeyCode::Right if word => input.move_cursor_word_right(),
        KeyCode::Left => input.move_cursor_left(),
        KeyCode::Right => input.move_cursor_right(),
        KeyCode::Home => input.move_cursor_home(),
        KeyCode::End => input.move_cursor_end(),
        _ => {}
    }
    Ok(())
}

fn handle_confirm_delete(app: &mut App, key_event: KeyEvent) -> Result<(), TuiError> {
    match key_event.code {
        KeyCode::Up | KeyCode::Left => {
            app.ui.confirm_selection = app.ui.confirm_selection.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Right => {
            app.ui.confirm_selection = (app.ui.confirm_selection + 1).min(OPTIONS.len() - 1);
        }
        KeyCode::Enter => {
            if app.ui.confirm_selection == 0 {
                app.confirm_delete()?;
            } else {
                app.cancel_delete();
            }
        }
        KeyCode::Char('y') => app.confirm_delete()?,
        KeyCode::Esc | KeyCode::Char('n') => app.cancel_delete(),
        _ => {}
    }
    Ok(())
}
