/// Ratatui draw entry-point for zant.
/// Thin dispatcher. The panes live in chat.rs, form_view.rs and overlays.rs.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use super::chat::{SPINNER_GLYPHS, truncate_middle};
use super::{AppState, Focus, Mode};

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),     // chat + form
            Constraint::Length(1),  // status bar
            Constraint::Length(3),  // input box
        ])
        .split(area);

    // Form gets the right side when there's room, otherwise chat only.
    if rows[0].width >= 90 {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(rows[0]);
        super::chat::draw_history(f, state, cols[0]);
        super::form_view::draw_form(f, state, cols[1]);
    } else if state.focus == Focus::Chat {
        super::chat::draw_history(f, state, rows[0]);
    } else {
        super::form_view::draw_form(f, state, rows[0]);
    }

    draw_status_bar(f, state, rows[1]);
    draw_input(f, state, rows[2]);

    if let Mode::Alert(msg) = &state.mode {
        super::overlays::draw_alert(f, msg, area);
    }
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let busy = state.is_busy() || state.downloading;
    let (status_glyph, status_color) = if busy {
        let g = SPINNER_GLYPHS[(state.spinner_tick as usize) % SPINNER_GLYPHS.len()];
        (g, Color::Cyan)
    } else {
        ("▲", Color::White)
    };

    let case = state.session.case();
    let filled = state
        .field_order
        .iter()
        .filter(|k| super::form_view::is_filled(&case, **k))
        .count();
    let missing = state.session.missing_fields().len();
    let case_id = state
        .session
        .current_case_id()
        .map(|id| id.chars().take(8).collect::<String>())
        .unwrap_or_else(|| "nowe".to_string());

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(status_glyph, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::styled(" zant", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(state.profile.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(truncate_middle(&state.backend_url, 32), Style::default().fg(Color::Rgb(100, 180, 220))),
        Span::styled(format!("  #{case_id}"), Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("  {filled}/{} pól", state.field_order.len()),
            Style::default().fg(Color::Green),
        ),
    ];
    if missing > 0 {
        spans.push(Span::styled(
            format!("  brakuje {missing}"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    if state.downloading {
        spans.push(Span::styled("  generowanie dokumentów…", Style::default().fg(Color::Cyan)));
    }
    if let Some(notice) = &state.notice {
        spans.push(Span::styled(format!("  {notice}"), Style::default().fg(Color::Rgb(220, 160, 0))));
    }

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(18, 18, 28))),
        area,
    );
}

// ── Input box ─────────────────────────────────────────────────────────────────

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let busy = state.is_busy();
    let on_chat = state.focus == Focus::Chat;
    let (border_color, prompt_color, prompt_char) = match (busy, on_chat) {
        (true, _)      => (Color::Rgb(40, 40, 60), Color::DarkGray,           "·"),
        (false, true)  => (Color::Rgb(60, 60, 80), Color::Cyan,               "❯"),
        (false, false) => (Color::Rgb(40, 40, 60), Color::Rgb(110, 90, 200),  "✎"),
    };

    let prompt_span = Span::styled(
        format!("  {prompt_char} "),
        Style::default().fg(prompt_color).add_modifier(Modifier::BOLD),
    );

    let content_span = if busy && state.input.is_empty() {
        Span::styled(
            "asystent odpowiada…  Esc anuluje",
            Style::default().fg(Color::Rgb(60, 60, 80)),
        )
    } else if !on_chat && state.input.is_empty() {
        Span::styled(
            "edycja formularza · Tab/↑↓ następne pole · Enter zapisz · Esc wróć do czatu",
            Style::default().fg(Color::Rgb(70, 70, 90)),
        )
    } else if state.input.is_empty() {
        Span::styled(
            "opisz zdarzenie · Tab formularz · Ctrl+D dokumenty · Ctrl+N nowe zgłoszenie",
            Style::default().fg(Color::Rgb(70, 70, 90)),
        )
    } else {
        Span::styled(state.input.clone(), Style::default().fg(Color::White))
    };

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(Color::Rgb(8, 8, 14)));

    let paragraph = Paragraph::new(Line::from(vec![prompt_span, content_span]))
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);

    // Cursor in the chat input; field editing places its own cursor.
    if on_chat && matches!(state.mode, Mode::Normal) {
        use unicode_width::UnicodeWidthStr;
        // prompt "  ❯ " is 4 cols wide
        let prompt_width: u16 = 4;
        let text_before_cursor = &state.input[..super::clamp_cursor(&state.input, state.cursor)];
        let cursor_x = area.x + prompt_width + text_before_cursor.width() as u16;
        let cursor_y = area.y + 1; // +1 for top border
        if cursor_x < area.x + area.width {
            f.set_cursor_position((cursor_x, cursor_y));
        }
    }
}
