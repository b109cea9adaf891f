use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::Config;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::popup_area;
use crate::utils::format_key_binding_for_display;

pub fn render_help(f: &mut Frame, area: Rect, config: &Config) {
    let fg_color = parse_color(&config.theme.fg);
    let bg_color = parse_color(&config.theme.bg);

    let popup_area = popup_area(area, 60, 70);
    f.render_widget(Clear, popup_area);

    let paragraph = Paragraph::new(build_help_text(config))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help - Key Bindings")
                .title_alignment(Alignment::Center)
                .style(Style::default().fg(fg_color).bg(bg_color)),
        )
        .style(Style::default().fg(fg_color).bg(bg_color))
        .wrap(ratatui::widgets::Wrap { trim: true });

    f.render_widget(paragraph, popup_area);
}

pub fn build_help_text(config: &Config) -> String {
    let keys = &config.key_bindings;
    let show = |binding: &String| format_key_binding_for_display(binding);
    let mut text = String::new();

    text.push_str("Navigation:\n");
    text.push_str(&format!("  {} / {} or ↑ / ↓: Move selection\n", show(&keys.list_up), show(&keys.list_down)));
    text.push_str(&format!("  {}: Switch between tasks and subtasks\n", show(&keys.switch_pane)));
    text.push_str(&format!("  {}: Cycle filter (all / pending / done)\n", show(&keys.toggle_filter)));
    text.push('\n');

    text.push_str("Actions (apply to the focused pane):\n");
    text.push_str(&format!("  {}: New task or subtask\n", show(&keys.new)));
    text.push_str(&format!("  {}: Rename\n", show(&keys.edit)));
    text.push_str(&format!("  {}: Toggle done\n", show(&keys.toggle_done)));
    text.push_str(&format!("  {}: Delete\n", show(&keys.delete)));
    text.push('\n');

    text.push_str("Title input:\n");
    text.push_str("  Enter: Save\n");
    text.push_str("  Esc: Cancel\n");
    text.push_str("  Ctrl+Left / Ctrl+Right: Word navigation\n");
    text.push('\n');

    text.push_str("General:\n");
    text.push_str(&format!("  {}: Show/hide help\n", show(&keys.help)));
    text.push_str(&format!("  {}: Quit\n", show(&keys.quit)));

    text
}
