use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::widgets::{
    Block, Borders, List, ListItem, ListState, Scrollbar, ScrollbarOrientation, ScrollbarState,
    StatefulWidget,
};

use crate::Config;
use crate::models::{StatusFilter, Task};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};
use crate::tui::widgets::truncate;

/// One list row: status marker, title and subtask progress
pub fn task_row(task: &Task) -> String {
    let status_indicator = if task.done { "✓" } else { "○" };
    let (completed, total) = task.progress();
    if total > 0 {
        format!("{} {} [{}/{}]", status_indicator, task.title, completed, total)
    } else {
        format!("{} {}", status_indicator, task.title)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn render_task_list(
    f: &mut Frame,
    area: Rect,
    tasks: &[&Task],
    total_count: usize,
    filter: StatusFilter,
    focused: bool,
    list_state: &mut ListState,
    config: &Config,
) {
    let max_width = area.width.saturating_sub(4) as usize; // 2 for borders, 2 for padding

    let theme = &config.theme;
    let fg = parse_color(&theme.fg);
    let done_fg = parse_color(&theme.done_fg);
    let highlight_bg = parse_color(&theme.highlight_bg);
    let highlight_fg = if theme.highlight_fg.is_empty() {
        get_contrast_text_color(highlight_bg)
    } else {
        parse_color(&theme.highlight_fg)
    };

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let style = if task.done { Style::default().fg(done_fg) } else { Style::default() };
            ListItem::new(truncate(&task_row(task), max_width)).style(style)
        })
        .collect();

    // Reserve the rightmost column for the scrollbar
    let list_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let list_area = list_areas[0];
    let scrollbar_area = list_areas[1];

    let title = match filter {
        StatusFilter::All => format!("Tasks ({})", total_count),
        other => format!("Tasks - {} ({} of {})", other.label(), tasks.len(), total_count),
    };
    let border_style = if focused { Style::default().fg(highlight_bg) } else { Style::default() };
    let total_items = items.len();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title).border_style(border_style))
        .style(Style::default().fg(fg))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));

    StatefulWidget::render(list, list_area, f.buffer_mut(), list_state);

    render_scrollbar(f, list_area, scrollbar_area, total_items, list_state.selected());
}

/// Draw a vertical scrollbar beside a bordered list when it overflows
pub fn render_scrollbar(
    f: &mut Frame,
    list_area: Rect,
    scrollbar_area: Rect,
    total_items: usize,
    selected: Option<usize>,
) {
    let visible_items = list_area.height.saturating_sub(2) as usize; // Account for borders
    if total_items <= visible_items || scrollbar_area.width == 0 || list_area.height <= 2 {
        return;
    }

    let scrollbar_inner_area = Rect::new(
        scrollbar_area.x,
        list_area.y + 1,
        scrollbar_area.width,
        list_area.height.saturating_sub(2),
    );

    let selected_index = selected.unwrap_or(0);
    let scroll_position = selected_index.saturating_sub(visible_items.saturating_sub(1));

    let mut scrollbar_state = ScrollbarState::new(total_items)
        .viewport_content_length(visible_items)
        .position(scroll_position);

    let scrollbar = Scrollbar::default()
        .orientation(ScrollbarOrientation::VerticalRight)
        .begin_symbol(Some("↑"))
        .end_symbol(Some("↓"))
        .track_symbol(Some("│"))
        .thumb_symbol("█");

    f.render_stateful_widget(scrollbar, scrollbar_inner_area, &mut scrollbar_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Subtask;

    #[test]
    fn row_shows_progress_only_with_subtasks() {
        let mut task = Task::new("Trip".to_string(), "2024-04-03T10:00:00.000Z".to_string());
        assert_eq!(task_row(&task), "○ Trip");

        task.subtasks.push(Subtask::new("Tickets".to_string()));
        task.subtasks.push(Subtask { done: true, ..Subtask::new("Hotel".to_string()) });
        task.done = true;
        assert_eq!(task_row(&task), "✓ Trip [1/2]");
    }
}
