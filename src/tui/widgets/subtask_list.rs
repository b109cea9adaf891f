use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, StatefulWidget};

use crate::Config;
use crate::models::Task;
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};
use crate::tui::widgets::task_list::render_scrollbar;
use crate::tui::widgets::truncate;

pub fn render_subtask_list(
    f: &mut Frame,
    area: Rect,
    task: Option<&Task>,
    focused: bool,
    list_state: &mut ListState,
    config: &Config,
) {
    let theme = &config.theme;
    let fg = parse_color(&theme.fg);
    let done_fg = parse_color(&theme.done_fg);
    let highlight_bg = parse_color(&theme.highlight_bg);
    let highlight_fg = if theme.highlight_fg.is_empty() {
        get_contrast_text_color(highlight_bg)
    } else {
        parse_color(&theme.highlight_fg)
    };
    let border_style = if focused { Style::default().fg(highlight_bg) } else { Style::default() };

    let Some(task) = task else {
        let empty = Paragraph::new("No task selected")
            .block(Block::default().borders(Borders::ALL).title("Subtasks").border_style(border_style))
            .style(Style::default().fg(fg));
        f.render_widget(empty, area);
        return;
    };

    let max_width = area.width.saturating_sub(4) as usize;

    // Header with creation time above the list
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);
    let header = Paragraph::new(Line::from(truncate(
        &format!(" {} · created {}", task.title, task.created_at),
        area.width as usize,
    )))
    .style(Style::default().fg(fg));
    f.render_widget(header, sections[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(sections[1]);

    let items: Vec<ListItem> = task
        .subtasks
        .iter()
        .enumerate()
        .map(|(index, subtask)| {
            let marker = if subtask.done { "[x]" } else { "[ ]" };
            let row = format!("{}. {} {}", index + 1, marker, subtask.title);
            let style = if subtask.done { Style::default().fg(done_fg) } else { Style::default() };
            ListItem::new(truncate(&row, max_width)).style(style)
        })
        .collect();
    let total_items = items.len();

    let (completed, total) = task.progress();
    let title = format!("Subtasks ({}/{})", completed, total);

    if items.is_empty() {
        let empty = Paragraph::new("No subtasks yet")
            .block(Block::default().borders(Borders::ALL).title(title).border_style(border_style))
            .style(Style::default().fg(fg));
        f.render_widget(empty, body[0]);
        return;
    }

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title).border_style(border_style))
        .style(Style::default().fg(fg))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));
    StatefulWidget::render(list, body[0], f.buffer_mut(), list_state);

    render_scrollbar(f, body[0], body[1], total_items, list_state.selected());
}
