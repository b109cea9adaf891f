use ratatui::layout::{Constraint, Direction, Layout as RatLayout, Rect};

pub struct Layout {
    pub inner_area: Rect, // Area inside the outer border
    pub task_area: Rect,
    pub subtask_area: Rect,
    pub status_area: Rect,
}

impl Layout {
    /// Minimum inner terminal dimensions: two usable panes and a status line
    pub const MIN_WIDTH: u16 = 40;
    pub const MIN_HEIGHT: u16 = 8;

    pub fn calculate(size: Rect, list_width_percent: u16) -> Self {
        let min_width_with_border = Self::MIN_WIDTH + 2;
        let min_height_with_border = Self::MIN_HEIGHT + 2;
        let width = size.width.max(min_width_with_border);
        let height = size.height.max(min_height_with_border);
        let size = Rect::new(size.x, size.y, width, height);

        let inner_area = Rect::new(
            size.x + 1,
            size.y + 1,
            size.width.saturating_sub(2),
            size.height.saturating_sub(2),
        );

        // Each pane keeps at least 15 columns
        let requested = (inner_area.width * list_width_percent.clamp(20, 80)) / 100;
        let task_width = requested.max(15).min(inner_area.width.saturating_sub(15));

        let vertical = RatLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // Panes
                Constraint::Length(1), // Status
            ])
            .split(inner_area);

        let horizontal = RatLayout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(task_width), Constraint::Min(1)])
            .split(vertical[0]);

        Self {
            inner_area,
            task_area: horizontal[0],
            subtask_area: horizontal[1],
            status_area: vertical[1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_panes_and_status_line() {
        let layout = Layout::calculate(Rect::new(0, 0, 102, 30), 50);
        assert_eq!(layout.inner_area, Rect::new(1, 1, 100, 28));
        assert_eq!(layout.task_area.width, 50);
        assert_eq!(layout.subtask_area.width, 50);
        assert_eq!(layout.status_area.height, 1);
        assert_eq!(layout.status_area.y, 28);
    }

    #[test]
    fn tiny_terminal_is_padded_to_minimum() {
        let layout = Layout::calculate(Rect::new(0, 0, 10, 4), 50);
        assert_eq!(layout.inner_area.width, Layout::MIN_WIDTH);
        assert_eq!(layout.inner_area.height, Layout::MIN_HEIGHT);
        assert!(layout.task_area.width >= 15);
        assert!(layout.subtask_area.width >= 15);
    }
}
