/// Form pane: every schema field, grouped by section, with its draft text.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use super::{AppState, Focus, Mode};
use crate::assistant::{ActionStep, MissingField};
use crate::case::{Case, FieldKey, RawValue};
use crate::schema::{FieldDefinition, FieldKind};

const LABEL_WIDTH: usize = 26;
// "  ▸ " before the label
const MARKER_WIDTH: usize = 4;

/// Whether the stored case has something meaningful for `key`.
pub fn is_filled(case: &Case, key: FieldKey) -> bool {
    match case.get(key) {
        RawValue::Empty => false,
        RawValue::Text(s) => !s.trim().is_empty(),
        RawValue::Witnesses(list) => !list.is_empty(),
        RawValue::Flag(_) | RawValue::Reporter(_) => true,
    }
}

fn missing_for<'a>(state: &'a AppState, key: FieldKey) -> Option<&'a MissingField> {
    state
        .session
        .missing_fields()
        .iter()
        .find(|m| m.field == key.as_str())
}

/// Text shown in the value column. Choices show their option label.
fn shown_value(field: &FieldDefinition, draft: &str) -> String {
    if field.kind == FieldKind::Choice {
        return field.option_label(draft).unwrap_or(draft).to_string();
    }
    draft.replace('\n', "⏎")
}

fn pad_label(label: &str) -> String {
    let mut out = String::new();
    let mut w = 0;
    for c in label.chars() {
        let cw = c.to_string().width();
        if w + cw > LABEL_WIDTH - 1 {
            out.push('…');
            w += 1;
            break;
        }
        out.push(c);
        w += cw;
    }
    out.push_str(&" ".repeat(LABEL_WIDTH.saturating_sub(w)));
    out
}

// ── Line builder ──────────────────────────────────────────────────────────────

/// Build the form lines. Also returns the line index of the focused field.
pub fn build_lines(state: &AppState) -> (Vec<Line<'static>>, Option<usize>) {
    let focused = state.focused_key();
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut focused_line = None;

    for section in &state.drafts.schema().sections {
        if !lines.is_empty() {
            lines.push(Line::raw(""));
        }
        lines.push(Line::from(Span::styled(
            format!(" {}", section.title),
            Style::default().fg(Color::Rgb(160, 140, 255)).add_modifier(Modifier::BOLD),
        )));

        for field in &section.fields {
            let key = field.key;
            let is_focused = focused == Some(key);
            if is_focused {
                focused_line = Some(lines.len());
            }

            let draft = state.drafts.value(key);
            let missing = missing_for(state, key);
            let has_error = state.drafts.has_error(key);

            let marker = if is_focused { "  ▸ " } else { "    " };
            let label_style = if is_focused {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else if missing.is_some() {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Gray)
            };

            let mut spans = vec![
                Span::styled(marker, Style::default().fg(Color::Cyan)),
                Span::styled(pad_label(field.label), label_style),
            ];

            if draft.is_empty() {
                let hint = match (field.kind, field.placeholder) {
                    (FieldKind::Choice, _) if is_focused => {
                        let labels: Vec<&str> = field.options.iter().map(|o| o.label).collect();
                        format!("← → {}", labels.join(" / "))
                    }
                    (_, Some(p)) => p.to_string(),
                    _ => "·".to_string(),
                };
                spans.push(Span::styled(hint, Style::default().fg(Color::Rgb(70, 70, 90))));
            } else {
                let value_style = if has_error {
                    Style::default().fg(Color::Red)
                } else if is_focused {
                    Style::default().fg(Color::White).bg(Color::Rgb(28, 26, 52))
                } else {
                    Style::default().fg(Color::Rgb(220, 240, 240))
                };
                spans.push(Span::styled(shown_value(field, draft), value_style));
            }

            if state.drafts.is_dirty(key) {
                spans.push(Span::styled(" *", Style::default().fg(Color::Rgb(220, 160, 0))));
            }
            if has_error {
                spans.push(Span::styled(
                    "  niepoprawny format",
                    Style::default().fg(Color::Red).add_modifier(Modifier::ITALIC),
                ));
            }
            lines.push(Line::from(spans));

            if let Some(m) = missing {
                let reason = if m.reason.is_empty() { "brakuje" } else { m.reason.as_str() };
                lines.push(Line::from(vec![
                    Span::raw(" ".repeat(MARKER_WIDTH)),
                    Span::styled(
                        format!("! {reason}"),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::DIM),
                    ),
                ]));
            }
        }
    }

    push_actions(&mut lines, state.session.recommended_actions());

    (lines, focused_line)
}

/// Steps the assistant recommends, below the last section.
fn push_actions(lines: &mut Vec<Line<'static>>, actions: &[ActionStep]) {
    if actions.is_empty() {
        return;
    }
    let mut steps: Vec<&ActionStep> = actions.iter().collect();
    steps.sort_by_key(|a| a.step_number);

    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled(
        " Zalecane kroki",
        Style::default().fg(Color::Rgb(0, 220, 200)).add_modifier(Modifier::BOLD),
    )));
    for step in steps {
        lines.push(Line::from(vec![
            Span::styled(format!("    {}. ", step.step_number), Style::default().fg(Color::Cyan)),
            Span::styled(step.description.clone(), Style::default().fg(Color::Rgb(220, 240, 240))),
        ]));
        if !step.required_documents.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("       {}", step.required_documents.join(", ")),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
}

// ── Draw ──────────────────────────────────────────────────────────────────────

pub fn draw_form(f: &mut Frame, state: &AppState, area: Rect) {
    let (lines, focused_line) = build_lines(state);

    let inner_height = area.height.saturating_sub(2) as usize;
    // Keep the focused field a couple of lines clear of the bottom edge.
    let offset = match focused_line {
        Some(line) if line + 2 > inner_height => line + 2 - inner_height,
        _ => 0,
    };

    let border_color = if state.focus == Focus::Chat {
        Color::Rgb(40, 40, 60)
    } else {
        Color::Rgb(110, 90, 200)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(
            " Zgłoszenie wypadku ",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(Color::Rgb(10, 10, 18)));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((offset.min(u16::MAX as usize) as u16, 0));
    f.render_widget(paragraph, area);

    // Text cursor inside the focused field (choices are picked with arrows).
    let Some(key) = state.focused_key() else { return };
    let Some(line) = focused_line else { return };
    if !matches!(state.mode, Mode::Normal) {
        return;
    }
    let Some(field) = state.drafts.schema().field(key) else { return };
    if field.kind == FieldKind::Choice {
        return;
    }
    let draft = state.drafts.value(key);
    let before = shown_value(field, &draft[..super::clamp_cursor(draft, state.field_cursor)]);
    let x = area.x as usize + 1 + MARKER_WIDTH + LABEL_WIDTH + before.width();
    let y = area.y as usize + 1 + line - offset;
    if x < (area.x + area.width) as usize && y < (area.y + area.height).saturating_sub(1) as usize {
        f.set_cursor_position((x as u16, y as u16));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::AssistantResponse;
    use crate::case::{ReporterType, Witness};
    use crate::config::ResolvedConfig;
    use crate::session::Session;
    use crate::storage::MemoryStore;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> AppState {
        let resolved = ResolvedConfig {
            backend_url: "http://localhost:8000".into(),
            request_timeout: Duration::from_secs(5),
            download_dir: PathBuf::from("."),
            data_dir: PathBuf::from("."),
            profile_name: "test".into(),
        };
        AppState::new(Session::open(Arc::new(MemoryStore::new())), &resolved)
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_is_filled() {
        let mut case = Case::empty();
        assert!(!is_filled(&case, FieldKey::FirstName));
        case.first_name = Some("  ".into());
        assert!(!is_filled(&case, FieldKey::FirstName));
        case.first_name = Some("Jan".into());
        assert!(is_filled(&case, FieldKey::FirstName));

        case.sudden = Some(false);
        assert!(is_filled(&case, FieldKey::Sudden));
        case.reporter_type = Some(ReporterType::Victim);
        assert!(is_filled(&case, FieldKey::ReporterType));

        assert!(!is_filled(&case, FieldKey::Witnesses));
        case.witnesses = vec![Witness::new("Anna", "Nowak")];
        assert!(is_filled(&case, FieldKey::Witnesses));
    }

    #[test]
    fn test_pad_label_truncates_to_column() {
        assert_eq!(pad_label("Imię").width(), LABEL_WIDTH);
        let long = pad_label("Informacja o udzielonej pierwszej pomocy medycznej");
        assert_eq!(long.width(), LABEL_WIDTH);
        assert!(long.contains('…'));
    }

    #[test]
    fn test_lines_show_sections_and_focus() {
        let mut s = state();
        let (lines, focused) = build_lines(&s);
        assert!(focused.is_none());
        let first_title = &s.drafts.schema().sections[0].title;
        assert!(line_text(&lines[0]).contains(first_title));

        s.focus = Focus::Field(0);
        let (lines, focused) = build_lines(&s);
        let idx = focused.unwrap();
        assert!(line_text(&lines[idx]).starts_with("  ▸ "));
    }

    #[test]
    fn test_choice_shows_option_label() {
        let mut s = state();
        s.drafts.on_change(FieldKey::Sudden, "true");
        let (lines, _) = build_lines(&s);
        let label = s.drafts.schema().field(FieldKey::Sudden).unwrap().label;
        let row = lines.iter().map(line_text).find(|t| t.contains(label.chars().take(10).collect::<String>().as_str())).unwrap();
        assert!(row.contains("Tak"));
        assert!(row.ends_with(" *"));
    }

    #[test]
    fn test_recommended_actions_listed_in_order() {
        let mut s = state();
        s.begin_send("co dalej?").unwrap();
        s.session.complete(Ok(AssistantResponse {
            assistant_reply: "Oto kroki".into(),
            missing_fields: vec![],
            case_state_preview: Case::empty(),
            recommended_actions: Some(vec![
                ActionStep {
                    step_number: 2,
                    description: "Złóż zawiadomienie w ZUS".into(),
                    required_documents: vec!["EWYP".into()],
                },
                ActionStep {
                    step_number: 1,
                    description: "Zbierz dokumentację medyczną".into(),
                    required_documents: vec![],
                },
            ]),
        }));

        let texts: Vec<String> = build_lines(&s).0.iter().map(line_text).collect();
        let header = texts.iter().position(|t| t == " Zalecane kroki").unwrap();
        assert_eq!(texts[header + 1], "    1. Zbierz dokumentację medyczną");
        assert_eq!(texts[header + 2], "    2. Złóż zawiadomienie w ZUS");
        assert_eq!(texts[header + 3], "       EWYP");
    }

    #[test]
    fn test_no_actions_no_section() {
        let s = state();
        assert!(!build_lines(&s).0.iter().map(line_text).any(|t| t.contains("Zalecane kroki")));
    }

    #[test]
    fn test_invalid_draft_marked() {
        let mut s = state();
        s.drafts.on_change(FieldKey::Pesel, "12ab");
        let store = s.session.store_mut();
        s.drafts.blur(store, FieldKey::Pesel).unwrap();
        let (lines, _) = build_lines(&s);
        assert!(lines.iter().map(line_text).any(|t| t.contains("12ab") && t.contains("niepoprawny format")));
    }
}
