/// Popup overlays drawn on top of the main layout.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

// ── Alert ──────────────────────────────────────────────────────────────────────

/// Centered blocking message. Enter or Esc dismisses it (see `handle_key`).
pub fn draw_alert(f: &mut Frame, message: &str, area: Rect) {
    let popup_area = alert_area(message, area);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(Span::styled(
            " Błąd ",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Span::styled(
            " Enter / Esc zamknij ",
            Style::default().fg(Color::DarkGray),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .style(Style::default().bg(Color::Rgb(18, 10, 14)));

    let lines: Vec<Line<'static>> = message
        .lines()
        .map(|l| Line::from(Span::styled(format!(" {l}"), Style::default().fg(Color::White))))
        .collect();

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

fn alert_area(message: &str, area: Rect) -> Rect {
    let width = 64u16.min(area.width.saturating_sub(4));
    let inner = width.saturating_sub(3).max(1) as usize;
    // Rough wrapped height: each source line takes ceil(len / inner) rows.
    let rows: usize = message
        .lines()
        .map(|l| l.chars().count().div_ceil(inner).max(1))
        .sum();
    let height = (rows as u16 + 2).clamp(5, area.height.saturating_sub(2).max(5));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect { x, y, width, height: height.min(area.height) }
}
