//! Command input widget.
//!
//! Renders the command bar at the bottom of the TUI. In normal mode it
//! shows key hints; in command mode it shows the `:` prompt with the
//! typed command.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::app::TuiApp;
use crate::state::InputMode;

/// Renders the command input bar.
pub fn render_command_input(app: &TuiApp, area: Rect, buf: &mut Buffer) {
    if area.height == 0 {
        return;
    }

    let line = match app.state.mode {
        InputMode::Normal => Line::from(vec![
            Span::styled(
                " q",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(":quit ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "Space",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(":step ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "j/k",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(":nav ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "+/-",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(":zoom ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                ":",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("cmd ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "?",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(":help", Style::default().fg(Color::DarkGray)),
        ]),
        InputMode::Command => Line::from(vec![
            Span::styled(
                ":",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(&app.state.command_buffer, Style::default().fg(Color::White)),
            Span::styled("█", Style::default().fg(Color::White)),
        ]),
    };

    Widget::render(line, area, buf);
}
