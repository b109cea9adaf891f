use ratatui::Frame;
use ratatui::layout::{Position, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::Config;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::popup_line_area;

/// Single-line text field used for task and subtask titles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInput {
    chars: Vec<char>,
    cursor: usize,
}

impl LineInput {
    /// Start with existing text, cursor at the end
    pub fn with_text(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let cursor = chars.len();
        Self { chars, cursor }
    }

    pub fn value(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert_char(&mut self, ch: char) {
        self.chars.insert(self.cursor, ch);
        self.cursor += 1;
    }

    /// Delete the character before the cursor
    pub fn delete_char(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    /// Delete the character under the cursor
    pub fn delete_forward(&mut self) {
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.chars.len();
    }

    /// Jump to the start of the previous word
    pub fn move_cursor_word_left(&mut self) {
        while self.cursor > 0 && self.chars[self.cursor - 1].is_whitespace() {
            self.cursor -= 1;
        }
        while self.cursor > 0 && !self.chars[self.cursor - 1].is_whitespace() {
            self.cursor -= 1;
        }
    }

    /// Jump past the end of the next word
    pub fn move_cursor_word_right(&mut self) {
        let len = self.chars.len();
        while self.cursor < len && self.chars[self.cursor].is_whitespace() {
            self.cursor += 1;
        }
        while self.cursor < len && !self.chars[self.cursor].is_whitespace() {
            self.cursor += 1;
        }
    }

    /// Visible slice and cursor column for a field `width` characters wide
    pub fn visible(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }
        let start = (self.cursor + 1).saturating_sub(width);
        let text: String = self.chars.iter().skip(start).take(width).collect();
        (text, self.cursor - start)
    }
}

pub fn render_input(f: &mut Frame, area: Rect, title: &str, input: &LineInput, config: &Config) {
    let fg_color = parse_color(&config.theme.fg);
    let bg_color = parse_color(&config.theme.bg);

    let popup = popup_line_area(area, 60, 3);
    f.render_widget(Clear, popup);

    let inner_width = popup.width.saturating_sub(2) as usize;
    let (text, cursor_col) = input.visible(inner_width);

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} (Enter to save, Esc to cancel)", title))
                .style(Style::default().fg(fg_color).bg(bg_color)),
        )
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(paragraph, popup);

    f.set_cursor_position(Position::new(popup.x + 1 + cursor_col as u16, popup.y + 1));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_at_cursor() {
        let mut input = LineInput::with_text("Buy mlk");
        input.move_cursor_left();
        input.move_cursor_left();
        input.insert_char('i');
        assert_eq!(input.value(), "Buy milk");
        input.move_cursor_home();
        input.delete_forward();
        assert_eq!(input.value(), "uy milk");
        input.move_cursor_end();
        input.delete_char();
        assert_eq!(input.value(), "uy mil");
    }

    #[test]
    fn word_motion_skips_whitespace() {
        let mut input = LineInput::with_text("write  the report");
        input.move_cursor_word_left();
        assert_eq!(input.cursor(), 11);
        input.move_cursor_word_left();
        assert_eq!(input.cursor(), 7);
        input.move_cursor_word_right();
        assert_eq!(input.cursor(), 10);
    }

    #[test]
    fn visible_window_follows_cursor() {
        let input = LineInput::with_text("abcdefghij");
        assert_eq!(input.visible(4), ("hij".to_string(), 3));
        let mut input = input;
        input.move_cursor_home();
        assert_eq!(input.visible(4), ("abcd".to_string(), 0));
    }
}
