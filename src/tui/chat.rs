/// Chat history pane: bubbles, spinner and wrapping utilities.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, List, ListItem},
};
use unicode_width::UnicodeWidthStr;

use super::AppState;
use crate::assistant::Role;

// ── Spinner ────────────────────────────────────────────────────────────────────

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_MSGS: &[(&str, Color)] = &[
    ("analizuję zgłoszenie…",  Color::Cyan),
    ("uzupełniam formularz…",  Color::Rgb(0, 200, 255)),
    ("sprawdzam braki…",       Color::Rgb(0, 220, 180)),
    ("jeszcze chwila…",        Color::Rgb(100, 200, 255)),
];

pub fn spinner_frame(tick: u32) -> (&'static str, &'static str, Color) {
    let glyph = SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()];
    // Message changes every ~2 seconds (120ms × 16 ticks)
    let msg_idx = (tick as usize / 16) % SPINNER_MSGS.len();
    let (msg, color) = SPINNER_MSGS[msg_idx];
    (glyph, msg, color)
}

// ── History items builder ──────────────────────────────────────────────────────

pub fn build_items(state: &AppState, term_width: u16) -> Vec<ListItem<'static>> {
    let mut items: Vec<ListItem<'static>> = Vec::new();

    for turn in state.session.history() {
        match turn.role {
            Role::User => push_bubble(
                &mut items,
                &turn.content,
                term_width,
                "ty",
                Color::Rgb(28, 26, 52),
                Color::Rgb(110, 90, 200),
                Color::Rgb(160, 140, 255),
                Color::Rgb(235, 232, 255),
            ),
            Role::Assistant => push_bubble(
                &mut items,
                &turn.content,
                term_width,
                "asystent",
                Color::Rgb(12, 30, 30),
                Color::Rgb(0, 150, 150),
                Color::Rgb(0, 220, 200),
                Color::Rgb(220, 240, 240),
            ),
        }
    }

    if state.is_busy() {
        let (glyph, msg, color) = spinner_frame(state.spinner_tick);
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled(glyph, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {msg}"), Style::default().fg(color)),
        ])));
    }

    items
}

#[allow(clippy::too_many_arguments)]
fn push_bubble(
    items: &mut Vec<ListItem<'static>>,
    text: &str,
    term_width: u16,
    label: &str,
    bg: Color,
    border: Color,
    label_fg: Color,
    text_fg: Color,
) {
    let body_style = Style::default().fg(text_fg).bg(bg);
    let edge_style = Style::default().fg(border).bg(bg);

    // 2 chars left margin, 1 right margin
    let inner_w = (term_width as usize).saturating_sub(3).max(10);
    // "╭─ " + label + " " + dashes + "╮"
    let dash_total = inner_w.saturating_sub(5 + label.width());
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled("╭─ ", edge_style),
        Span::styled(label.to_string(), Style::default().fg(label_fg).bg(bg).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {}╮", "─".repeat(dash_total)), edge_style),
    ])));

    let wrap_width = inner_w.saturating_sub(2).max(10);
    let raw_lines: Vec<&str> = if text.is_empty() { vec![""] } else { text.lines().collect() };
    for line in raw_lines.iter().flat_map(|line| wrap_text(line, wrap_width)) {
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled("│ ", edge_style),
            Span::styled(line, body_style),
        ])));
    }

    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("╰{}╯", "─".repeat(inner_w.saturating_sub(2))), edge_style),
    ])));
    items.push(ListItem::new(Line::raw("")));
}

pub fn draw_history(f: &mut Frame, state: &AppState, area: Rect) {
    let all_items = build_items(state, area.width);
    let total = all_items.len();
    let visible = area.height as usize;

    let skip = if total > visible {
        (total - visible).saturating_sub(state.scroll)
    } else {
        0
    };

    let sliced: Vec<ListItem<'static>> = all_items.into_iter().skip(skip).collect();
    let list = List::new(sliced)
        .block(Block::default().style(Style::default().bg(Color::Rgb(8, 8, 14))));
    f.render_widget(list, area);
}

// ── Utilities ──────────────────────────────────────────────────────────────────

/// Greedy word wrap by display width. Leading indentation is kept on the
/// first line so numbered steps and their document lines stay aligned.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::new()];
    }
    let indent: String = text.chars().take_while(|c| *c == ' ').collect();
    let mut lines = Vec::new();
    let mut current = indent.clone();
    let mut current_width = indent.width();
    let base_width = current_width;

    for word in text.split_whitespace() {
        let word_width = word.width();
        if current_width == base_width && lines.is_empty() || current_width == 0 {
            current.push_str(word);
            current_width += word_width;
        } else if current_width + 1 + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Shorten to at most `max` chars, eliding the middle.
pub fn truncate_middle(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max || max < 3 {
        return s.to_string();
    }
    let keep = max - 1;
    let head: String = s.chars().take(keep / 2).collect();
    let tail: String = s.chars().skip(count - (keep - keep / 2)).collect();
    format!("{head}…{tail}")
}
