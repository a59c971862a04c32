/// Ratatui-based TUI for zant.
///
/// Architecture:
///   main thread:    event loop: crossterm keyboard events + mpsc UiEvent drain
///   request tasks:  tokio::spawn for assistant turns and document downloads,
///                   each reporting back with a single UiEvent
///
/// Layout:
///   ┌───────────────────────────────┬───────────────────────────┐
///   │  conversation (Min(0))        │  form (sections, fields)  │
///   ├───────────────────────────────┴───────────────────────────┤
///   │  status bar (1 line)                                      │
///   ├───────────────────────────────────────────────────────────┤
///   │  input box (3 lines, fixed)                               │
///   └───────────────────────────────────────────────────────────┘
pub mod render;
pub mod chat;
pub mod form_view;
pub mod overlays;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::{mpsc, oneshot};

use crate::assistant::{AssistantBackend, AssistantError, AssistantResponse, HttpAssistant};
use crate::case::FieldKey;
use crate::config::ResolvedConfig;
use crate::documents::{DocumentClient, DownloadOutcome, format_action_steps};
use crate::draft::{BlurOutcome, DraftSync};
use crate::schema::{FieldKind, Schema};
use crate::session::Session;

// ── UiEvent: background task results ──────────────────────────────

#[derive(Debug)]
pub enum UiEvent {
    /// An assistant request finished (or was cancelled / timed out).
    /// `seq` ties it to the request that started it.
    AssistantDone {
        seq: u64,
        outcome: Result<AssistantResponse, AssistantError>,
    },
    /// A document download finished.
    DocumentsDone(Result<DownloadOutcome, String>),
}

// ── Focus / Mode ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Chat,
    /// Index into `AppState::field_order`
    Field(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Blocking message; any of Enter / Esc dismisses it
    Alert(String),
}

/// What the event loop must do after a key was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Send(String),
    Cancel,
    Download,
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub session: Session,
    pub drafts: DraftSync,
    /// Field keys in display order, for focus movement
    pub field_order: Vec<FieldKey>,
    pub focus: Focus,
    pub mode: Mode,
    pub input: String,
    pub cursor: usize,        // byte offset in input
    pub field_cursor: usize,  // byte offset in the focused field's draft
    pub scroll: usize,        // lines scrolled up in history
    /// Incremented every 120ms while a request is in flight
    pub spinner_tick: u32,
    pub cancel_tx: Option<oneshot::Sender<()>>,
    /// Sequence number of the request currently in flight
    pub request_seq: u64,
    pub downloading: bool,
    /// One-line notice shown in the status bar until the next key
    pub notice: Option<String>,
    pub profile: String,
    pub backend_url: String,
}

impl AppState {
    pub fn new(session: Session, resolved: &ResolvedConfig) -> Self {
        let drafts = DraftSync::bind(Schema::accident_notification(), session.store());
        let field_order = drafts.schema().list_fields().map(|f| f.key).collect();
        Self {
            session,
            drafts,
            field_order,
            focus: Focus::Chat,
            mode: Mode::Normal,
            input: String::new(),
            cursor: 0,
            field_cursor: 0,
            scroll: 0,
            spinner_tick: 0,
            cancel_tx: None,
            request_seq: 0,
            downloading: false,
            notice: None,
            profile: resolved.profile_name.clone(),
            backend_url: resolved.backend_url.clone(),
        }
    }

    pub fn focused_key(&self) -> Option<FieldKey> {
        match self.focus {
            Focus::Field(i) => self.field_order.get(i).copied(),
            Focus::Chat => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_loading()
    }

    fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::AssistantDone { seq, outcome } => {
                if seq != self.request_seq {
                    tracing::debug!(seq, current = self.request_seq, "dropping stale assistant outcome");
                    return;
                }
                self.cancel_tx = None;
                self.session.complete(outcome);
                self.drafts.refresh();
                self.sync_field_cursor();
                self.scroll = 0;
            }
            UiEvent::DocumentsDone(result) => {
                self.downloading = false;
                match result {
                    Ok(outcome) => {
                        self.notice = Some(format!(
                            "zapisano {} ({} plików)",
                            outcome.path.display(),
                            outcome.entries.len()
                        ));
                        if let Some(steps) = outcome.steps.filter(|s| !s.is_empty()) {
                            self.session.append_assistant_message(format_action_steps(&steps));
                            self.scroll = 0;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "document generation failed");
                        self.mode = Mode::Alert(format!("Nie udało się wygenerować dokumentów.\n\n{e}"));
                    }
                }
            }
        }
    }

    // ── Focus movement ────────────────────────────────────────────────────────

    /// Leave the focused field (committing it) and focus `next`.
    fn move_focus(&mut self, next: Focus) {
        if let Some(key) = self.focused_key() {
            self.blur(key);
        }
        self.focus = next;
        self.sync_field_cursor();
    }

    /// Commit `key`. A commit re-derives every draft, so the field cursor is
    /// re-synced afterwards.
    fn blur(&mut self, key: FieldKey) {
        let outcome = self.drafts.blur(self.session.store_mut(), key);
        self.sync_field_cursor();
        match outcome {
            Ok(BlurOutcome::Committed) => {}
            Ok(BlurOutcome::Rejected) => {
                self.notice = Some(format!("{key}: niepoprawny format, pole nie zostało zapisane"));
            }
            Err(e) => {
                tracing::error!(field = %key, error = %e, "commit failed");
                self.notice = Some(format!("{key}: {e}"));
            }
        }
    }

    fn next_focus(&self) -> Focus {
        match self.focus {
            Focus::Chat if !self.field_order.is_empty() => Focus::Field(0),
            Focus::Field(i) if i + 1 < self.field_order.len() => Focus::Field(i + 1),
            _ => Focus::Chat,
        }
    }

    fn prev_focus(&self) -> Focus {
        match self.focus {
            Focus::Chat if !self.field_order.is_empty() => Focus::Field(self.field_order.len() - 1),
            Focus::Field(i) if i > 0 => Focus::Field(i - 1),
            _ => Focus::Chat,
        }
    }

    fn sync_field_cursor(&mut self) {
        self.field_cursor = self.focused_key().map(|k| self.drafts.value(k).len()).unwrap_or(0);
    }

    // ── Session reset ─────────────────────────────────────────────────────────

    fn clear_session(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        // Any outcome still on its way belongs to the old session.
        self.request_seq = self.request_seq.wrapping_add(1);
        self.session.clear();
        self.drafts = DraftSync::bind(Schema::accident_notification(), self.session.store());
        self.focus = Focus::Chat;
        self.input.clear();
        self.cursor = 0;
        self.scroll = 0;
        self.notice = Some("rozpoczęto nowe zgłoszenie".to_string());
    }

    /// Start an assistant turn. Returns the request to run in the background.
    fn begin_send(&mut self, text: &str) -> Option<crate::assistant::AssistantRequest> {
        match self.session.begin_send(text) {
            Ok(request) => {
                self.request_seq = self.request_seq.wrapping_add(1);
                self.input.clear();
                self.cursor = 0;
                self.scroll = 0;
                Some(request)
            }
            Err(e) => {
                self.notice = Some(e.to_string());
                None
            }
        }
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(session: Session, resolved: ResolvedConfig) -> Result<()> {
    let assistant = HttpAssistant::new(&resolved.backend_url, resolved.request_timeout)?;
    let documents = DocumentClient::new(&resolved.backend_url, resolved.request_timeout)?;

    let mut terminal = setup_terminal()?;

    // Panic hook: restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let mut state = AppState::new(session, &resolved);
    let result = event_loop(&mut terminal, &mut state, &assistant, &documents, resolved.download_dir).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    assistant: &HttpAssistant,
    documents: &DocumentClient,
    download_dir: PathBuf,
) -> Result<()> {
    // Channel: background tasks → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.is_busy() || state.downloading {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, state))?;
                }
            }

            // ── Drain results from background tasks ───────────────────────────
            Some(ev) = ui_rx.recv() => {
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                if let Event::Key(key) = ev {
                    match handle_key(key, state) {
                        Action::Quit => break,
                        Action::Send(text) => {
                            if let Some(request) = state.begin_send(&text) {
                                launch_assistant(request, state, assistant.clone(), ui_tx.clone());
                            }
                        }
                        Action::Cancel => {
                            if let Some(tx) = state.cancel_tx.take() {
                                let _ = tx.send(());
                            }
                        }
                        Action::Download => {
                            launch_download(state, documents.clone(), download_dir.clone(), ui_tx.clone());
                        }
                        Action::None => {}
                    }
                }
                terminal.draw(|f| render::draw(f, state))?;
            }
        }
    }

    if let Some(key) = state.focused_key() {
        state.blur(key);
    }
    Ok(())
}

// ── Key handler ───────────────────────────────────────────────────────────────

fn handle_key(key: KeyEvent, state: &mut AppState) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if ctrl && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    // A blocking alert swallows everything until dismissed.
    if let Mode::Alert(_) = state.mode {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            state.mode = Mode::Normal;
        }
        return Action::None;
    }

    state.notice = None;

    if ctrl {
        return match key.code {
            KeyCode::Char('n') => {
                state.clear_session();
                Action::None
            }
            KeyCode::Char('d') => {
                if state.downloading {
                    state.notice = Some("dokumenty są już generowane".to_string());
                    Action::None
                } else {
                    // Commit what is being typed before the case is sent off.
                    if let Some(k) = state.focused_key() {
                        state.blur(k);
                    }
                    Action::Download
                }
            }
            KeyCode::Char('w') => {
                edit_focused(state, |text, cursor| input_delete_word(text, cursor));
                Action::None
            }
            _ => Action::None,
        };
    }

    match key.code {
        KeyCode::Esc => {
            if state.is_busy() {
                return Action::Cancel;
            }
            if state.focus != Focus::Chat {
                state.move_focus(Focus::Chat);
            }
            Action::None
        }
        KeyCode::Tab => {
            let next = state.next_focus();
            state.move_focus(next);
            Action::None
        }
        KeyCode::BackTab => {
            let prev = state.prev_focus();
            state.move_focus(prev);
            Action::None
        }
        KeyCode::Up if state.focus != Focus::Chat => {
            let prev = state.prev_focus();
            state.move_focus(prev);
            Action::None
        }
        KeyCode::Down if state.focus != Focus::Chat => {
            let next = state.next_focus();
            state.move_focus(next);
            Action::None
        }
        KeyCode::Up | KeyCode::PageUp => {
            state.scroll = state.scroll.saturating_add(if key.code == KeyCode::PageUp { 10 } else { 1 });
            Action::None
        }
        KeyCode::Down | KeyCode::PageDown => {
            state.scroll = state.scroll.saturating_sub(if key.code == KeyCode::PageDown { 10 } else { 1 });
            Action::None
        }
        KeyCode::Enter => match state.focused_key() {
            Some(k) => {
                // Explicit confirm: same as leaving the field, focus stays.
                state.blur(k);
                Action::None
            }
            None => {
                if state.is_busy() {
                    state.notice = Some("poczekaj na odpowiedź asystenta (Esc anuluje)".to_string());
                    return Action::None;
                }
                if state.input.trim().is_empty() {
                    Action::None
                } else {
                    Action::Send(state.input.clone())
                }
            }
        },
        KeyCode::Left | KeyCode::Right if is_choice_focused(state) => {
            cycle_choice(state, key.code == KeyCode::Right);
            Action::None
        }
        KeyCode::Left => {
            edit_focused(state, |text, cursor| *cursor = prev_char_boundary(text, *cursor));
            Action::None
        }
        KeyCode::Right => {
            edit_focused(state, |text, cursor| *cursor = next_char_boundary(text, *cursor));
            Action::None
        }
        KeyCode::Home => {
            edit_focused(state, |_, cursor| *cursor = 0);
            Action::None
        }
        KeyCode::End => {
            edit_focused(state, |text, cursor| *cursor = text.len());
            Action::None
        }
        KeyCode::Backspace => {
            edit_focused(state, input_backspace);
            Action::None
        }
        KeyCode::Delete => {
            edit_focused(state, |text, cursor| input_delete_forward(text, cursor));
            Action::None
        }
        KeyCode::Char(c) if !is_choice_focused(state) => {
            edit_focused(state, |text, cursor| {
                text.insert(*cursor, c);
                *cursor += c.len_utf8();
            });
            Action::None
        }
        _ => Action::None,
    }
}

/// Apply an edit to whatever has focus: the chat input, or the focused
/// field's draft (local only, through the draft sync).
fn edit_focused(state: &mut AppState, edit: impl FnOnce(&mut String, &mut usize)) {
    match state.focused_key() {
        None => edit(&mut state.input, &mut state.cursor),
        Some(key) => {
            let mut text = state.drafts.value(key).to_string();
            let mut cursor = clamp_cursor(&text, state.field_cursor);
            edit(&mut text, &mut cursor);
            state.drafts.on_change(key, &text);
            state.field_cursor = cursor;
        }
    }
}

fn is_choice_focused(state: &AppState) -> bool {
    state
        .focused_key()
        .and_then(|k| state.drafts.schema().field(k))
        .is_some_and(|f| f.kind == FieldKind::Choice)
}

/// Step through "" and the field's options.
fn cycle_choice(state: &mut AppState, forward: bool) {
    let Some(key) = state.focused_key() else { return };
    let Some(field) = state.drafts.schema().field(key) else { return };

    let mut values: Vec<&str> = vec![""];
    values.extend(field.options.iter().map(|o| o.value));
    let current = values.iter().position(|v| *v == state.drafts.value(key)).unwrap_or(0);
    let next = if forward {
        (current + 1) % values.len()
    } else {
        (current + values.len() - 1) % values.len()
    };
    let value = values[next].to_string();
    state.drafts.on_change(key, &value);
    state.field_cursor = value.len();
}

// ── Background launchers ─────────────────────────────────────────────────────

fn launch_assistant(
    request: crate::assistant::AssistantRequest,
    state: &mut AppState,
    backend: HttpAssistant,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
) {
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    state.cancel_tx = Some(cancel_tx);
    let seq = state.request_seq;
    tracing::debug!(seq, "assistant request started");

    tokio::spawn(async move {
        let outcome = tokio::select! {
            result = backend.send(&request) => result,
            _ = cancel_rx => Err(AssistantError::Cancelled),
        };
        let _ = ui_tx.send(UiEvent::AssistantDone { seq, outcome });
    });
}

fn launch_download(
    state: &mut AppState,
    client: DocumentClient,
    dir: PathBuf,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
) {
    state.downloading = true;
    let case = state.session.case();
    tokio::spawn(async move {
        let result = client.download(&case, &dir).await.map_err(|e| format!("{e:#}"));
        let _ = ui_tx.send(UiEvent::DocumentsDone(result));
    });
}

// ── Input editing helpers ─────────────────────────────────────────────────────

/// Remove the character immediately before the cursor (UTF-8 safe).
fn input_backspace(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let prev = prev_char_boundary(input, *cursor);
    input.drain(prev..*cursor);
    *cursor = prev;
}

/// Delete the character at the cursor position.
fn input_delete_forward(input: &mut String, cursor: &mut usize) {
    if *cursor >= input.len() {
        return;
    }
    let next = next_char_boundary(input, *cursor);
    input.drain(*cursor..next);
}

/// Delete the word immediately before the cursor.
fn input_delete_word(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let start = word_left(input, *cursor);
    input.drain(start..*cursor);
    *cursor = start;
}

/// Bring a byte cursor back inside `s` and onto a char boundary.
pub fn clamp_cursor(s: &str, pos: usize) -> usize {
    let pos = pos.min(s.len());
    if s.is_char_boundary(pos) { pos } else { prev_char_boundary(s, pos) }
}

fn prev_char_boundary(s: &str, pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    let mut p = pos - 1;
    while !s.is_char_boundary(p) {
        p -= 1;
    }
    p
}

fn next_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut p = pos + 1;
    while p <= s.len() && !s.is_char_boundary(p) {
        p += 1;
    }
    p.min(s.len())
}

/// Jump to the start of the previous word (skip trailing spaces, then the word).
fn word_left(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos > 0 && bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    while pos > 0 && !bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Case;
    use crate::session::APOLOGY;
    use crate::storage::MemoryStore;
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

    fn press(state: &mut AppState, code: KeyCode) -> Action {
        handle_key(KeyEvent::new(code, KeyModifiers::NONE), state)
    }

    fn type_text(state: &mut AppState, text: &str) {
        for c in text.chars() {
            press(state, KeyCode::Char(c));
        }
    }

    fn focus_field(state: &mut AppState, key: FieldKey) {
        let idx = state.field_order.iter().position(|k| *k == key).unwrap();
        state.move_focus(Focus::Field(idx));
    }

    #[test]
    fn test_enter_sends_chat_input() {
        let mut s = state();
        type_text(&mut s, "Złamałem rękę");
        assert_eq!(press(&mut s, KeyCode::Enter), Action::Send("Złamałem rękę".into()));
    }

    #[test]
    fn test_typing_into_field_is_local_until_tab() {
        let mut s = state();
        focus_field(&mut s, FieldKey::FirstName);
        type_text(&mut s, "Jan");
        assert_eq!(s.drafts.value(FieldKey::FirstName), "Jan");
        assert_eq!(s.session.case().first_name, None);

        press(&mut s, KeyCode::Tab);
        assert_eq!(s.session.case().first_name.as_deref(), Some("Jan"));
        assert_eq!(s.focused_key(), Some(FieldKey::LastName));
    }

    #[test]
    fn test_invalid_field_not_committed_on_blur() {
        let mut s = state();
        focus_field(&mut s, FieldKey::Pesel);
        type_text(&mut s, "12ab");
        press(&mut s, KeyCode::Esc);
        assert_eq!(s.focus, Focus::Chat);
        assert!(s.drafts.has_error(FieldKey::Pesel));
        assert_eq!(s.session.case().pesel, None);
        assert!(s.notice.is_some());
    }

    #[test]
    fn test_focus_wraps_around() {
        let mut s = state();
        press(&mut s, KeyCode::BackTab);
        assert_eq!(s.focus, Focus::Field(s.field_order.len() - 1));
        press(&mut s, KeyCode::Tab);
        assert_eq!(s.focus, Focus::Chat);
    }

    #[test]
    fn test_choice_field_cycles_options() {
        let mut s = state();
        focus_field(&mut s, FieldKey::Sudden);
        press(&mut s, KeyCode::Right);
        assert_eq!(s.drafts.value(FieldKey::Sudden), "true");
        press(&mut s, KeyCode::Right);
        assert_eq!(s.drafts.value(FieldKey::Sudden), "false");
        press(&mut s, KeyCode::Right);
        assert_eq!(s.drafts.value(FieldKey::Sudden), "");
        press(&mut s, KeyCode::Left);
        press(&mut s, KeyCode::Enter);
        assert_eq!(s.session.case().sudden, Some(false));
    }

    #[test]
    fn test_send_refused_while_awaiting_and_esc_cancels() {
        let mut s = state();
        assert!(s.begin_send("pierwsza").is_some());
        type_text(&mut s, "druga");
        assert_eq!(press(&mut s, KeyCode::Enter), Action::None);
        assert_eq!(press(&mut s, KeyCode::Esc), Action::Cancel);
    }

    #[test]
    fn test_stale_assistant_outcome_dropped() {
        let mut s = state();
        s.begin_send("hej").unwrap();
        let seq = s.request_seq;
        s.apply_event(UiEvent::AssistantDone { seq: seq + 7, outcome: Err(AssistantError::Timeout) });
        assert!(s.is_busy());
        s.apply_event(UiEvent::AssistantDone { seq, outcome: Err(AssistantError::Cancelled) });
        assert!(!s.is_busy());
        assert_eq!(s.session.history().last().unwrap().content, APOLOGY);
    }

    #[test]
    fn test_assistant_reply_overwrites_unsaved_draft() {
        let mut s = state();
        focus_field(&mut s, FieldKey::AccidentPlace);
        type_text(&mut s, "hala");
        s.begin_send("hej").unwrap();
        let seq = s.request_seq;
        s.apply_event(UiEvent::AssistantDone {
            seq,
            outcome: Ok(AssistantResponse {
                assistant_reply: "ok".into(),
                missing_fields: vec![],
                case_state_preview: Case { accident_place: Some("magazyn".into()), ..Default::default() },
                recommended_actions: None,
            }),
        });
        assert_eq!(s.drafts.value(FieldKey::AccidentPlace), "magazyn");
        assert_eq!(s.field_cursor, "magazyn".len());
    }

    #[test]
    fn test_ctrl_n_starts_over() {
        let mut s = state();
        focus_field(&mut s, FieldKey::FirstName);
        type_text(&mut s, "Jan");
        press(&mut s, KeyCode::Tab);
        handle_key(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL), &mut s);
        assert_eq!(*s.session.case(), Case::empty());
        assert_eq!(s.drafts.value(FieldKey::FirstName), "");
        assert_eq!(s.focus, Focus::Chat);
        assert_eq!(s.session.history().len(), 1);
    }

    #[test]
    fn test_alert_blocks_until_dismissed() {
        let mut s = state();
        s.apply_event(UiEvent::DocumentsDone(Err("502".into())));
        assert!(matches!(s.mode, Mode::Alert(_)));
        assert!(!s.downloading);
        type_text(&mut s, "x");
        assert!(s.input.is_empty());
        press(&mut s, KeyCode::Enter);
        assert_eq!(s.mode, Mode::Normal);
    }

    #[test]
    fn test_download_commit_resyncs_field_cursor() {
        let mut s = state();
        focus_field(&mut s, FieldKey::Witnesses);
        type_text(&mut s, "Ą  Ż");
        press(&mut s, KeyCode::Left);
        assert_eq!(s.field_cursor, "Ą  ".len());

        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(ctrl_d, &mut s), Action::Download);

        // The witness codec collapsed the double space.
        let shown = s.drafts.value(FieldKey::Witnesses).to_string();
        assert_eq!(shown, "Ą Ż");
        assert!(shown.is_char_boundary(s.field_cursor));
        assert_eq!(s.field_cursor, shown.len());

        type_text(&mut s, "k");
        assert_eq!(s.drafts.value(FieldKey::Witnesses), "Ą Żk");
    }

    #[test]
    fn test_clamp_cursor_lands_on_char_boundary() {
        let text = "Ą Ż";
        assert_eq!(clamp_cursor(text, 4), 3);
        assert_eq!(clamp_cursor(text, 1), 0);
        assert_eq!(clamp_cursor(text, 3), 3);
        assert_eq!(clamp_cursor(text, 99), text.len());
    }

    #[test]
    fn test_stale_field_cursor_is_clamped_on_edit() {
        let mut s = state();
        focus_field(&mut s, FieldKey::AccidentPlace);
        type_text(&mut s, "Łódź");
        // Inside 'Ł'.
        s.field_cursor = 1;
        type_text(&mut s, "x");
        assert_eq!(s.drafts.value(FieldKey::AccidentPlace), "xŁódź");
    }

    #[test]
    fn test_input_helpers_are_utf8_safe() {
        let mut text = "zażółć gęślą".to_string();
        let mut cursor = text.len();
        input_backspace(&mut text, &mut cursor);
        assert_eq!(text, "zażółć gęśl");
        input_delete_word(&mut text, &mut cursor);
        assert_eq!(text, "zażółć ");
        cursor = prev_char_boundary(&text, 4);
        assert!(text.is_char_boundary(cursor));
        input_delete_forward(&mut text, &mut cursor);
        assert!(text.len() < "zażółć ".len());
    }
}
