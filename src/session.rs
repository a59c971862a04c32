/// One reporting session: identity, chat history, the case store and the
/// assistant's latest view of what is still missing.
///
/// `Session` is the context object handed to every caller; nothing about the
/// session lives in globals. It is restored from storage on `open` and torn
/// down with `clear`, which re-opens it over the now empty storage.
use std::sync::Arc;

use crate::assistant::{
    ActionStep, AssistantBackend, AssistantError, AssistantRequest, AssistantResponse, ChatTurn,
    MissingField, NOTIFICATION_MODE, Role,
};
use crate::case::Case;
use crate::storage::{KeyValueStore, keys};
use crate::store::CaseStore;

pub const GREETING: &str = "Cześć! Jestem asystentem zgłoszenia wypadku ZUS. Jak mogę Ci pomóc? \
Możesz odpowiedzieć pełnym zeznaniem zdarzenia. Jeśli będą jakieś brakujące informacje, poproszę Cię o nie.";

pub const APOLOGY: &str = "Przepraszam, wystąpił błąd połączenia z serwerem.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingAssistant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("still waiting for the assistant's previous reply")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
}

pub struct Session {
    storage: Arc<dyn KeyValueStore>,
    case_id: Option<String>,
    history: Vec<ChatTurn>,
    store: CaseStore,
    missing: Vec<MissingField>,
    recommended_actions: Vec<ActionStep>,
    state: SessionState,
}

impl Session {
    /// Restore whatever the storage holds; every absent or unreadable entry
    /// starts fresh on its own.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let case_id = match storage.get(keys::CASE_ID) {
            Ok(id) => id.filter(|id| !id.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "could not read session id");
                None
            }
        };
        let history = restore_history(storage.as_ref());
        let store = CaseStore::load(storage.clone());
        tracing::debug!(case_id = ?case_id, turns = history.len(), "session opened");

        Self {
            storage,
            case_id,
            history,
            store,
            missing: Vec::new(),
            recommended_actions: Vec::new(),
            state: SessionState::Idle,
        }
    }

    /// The session identity, minted and persisted on first access.
    pub fn case_id(&mut self) -> &str {
        let storage = &self.storage;
        self.case_id.get_or_insert_with(|| {
            let id = uuid::Uuid::new_v4().to_string();
            if let Err(e) = storage.set(keys::CASE_ID, &id) {
                tracing::error!(error = %e, "failed to persist session id");
            }
            tracing::info!(case_id = %id, "new session");
            id
        })
    }

    /// The identity if one exists already; never mints.
    pub fn current_case_id(&self) -> Option<&str> {
        self.case_id.as_deref()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CaseStore {
        &mut self.store
    }

    pub fn case(&self) -> Arc<Case> {
        self.store.get()
    }

    pub fn missing_fields(&self) -> &[MissingField] {
        &self.missing
    }

    pub fn recommended_actions(&self) -> &[ActionStep] {
        &self.recommended_actions
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state() == SessionState::AwaitingAssistant
    }

    // ── Request cycle ─────────────────────────────────────────────────────────

    /// Idle → AwaitingAssistant. Appends the user turn right away and returns
    /// the request to send. The request carries the history as it was before
    /// this turn.
    pub fn begin_send(&mut self, text: &str) -> Result<AssistantRequest, SessionError> {
        if self.is_loading() {
            return Err(SessionError::Busy);
        }
        // Blank check only; the message goes out as typed.
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let request = AssistantRequest {
            case_id: self.case_id().to_string(),
            message: text.to_string(),
            mode: NOTIFICATION_MODE,
            conversation_history: self.history.clone(),
            case_state: Case::clone(&self.store.get()),
        };

        self.push_turn(ChatTurn::user(text));
        self.state = SessionState::AwaitingAssistant;
        Ok(request)
    }

    /// AwaitingAssistant → Idle with the outcome of the request. A failure
    /// becomes an apology turn and leaves the case and the missing-field
    /// report alone.
    pub fn complete(&mut self, outcome: Result<AssistantResponse, AssistantError>) {
        if !self.is_loading() {
            tracing::debug!("ignoring assistant outcome with no request in flight");
            return;
        }
        self.state = SessionState::Idle;

        match outcome {
            Ok(resp) => {
                tracing::info!(
                    missing = resp.missing_fields.len(),
                    "assistant replied"
                );
                self.push_turn(ChatTurn::assistant(resp.assistant_reply));
                self.store.replace(resp.case_state_preview);
                self.missing = resp.missing_fields;
                if let Some(actions) = resp.recommended_actions {
                    self.recommended_actions = actions;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "assistant request failed");
                self.push_turn(ChatTurn::assistant(APOLOGY));
            }
        }
    }

    /// One full turn against `backend`. Only refusals are returned as errors;
    /// backend failures end up in the history.
    pub async fn send_message<B: AssistantBackend>(&mut self, backend: &B, text: &str) -> Result<(), SessionError> {
        let request = self.begin_send(text)?;
        let outcome = backend.send(&request).await;
        self.complete(outcome);
        Ok(())
    }

    /// Out-of-band assistant turn, outside the request cycle.
    pub fn append_assistant_message(&mut self, text: impl Into<String>) {
        self.push_turn(ChatTurn::assistant(text));
    }

    /// Erase all persisted session state and reinitialize from empty storage,
    /// exactly as a fresh start would. Subscribers of the old case store see
    /// it closed and must bind to the new one.
    pub fn clear(&mut self) {
        for key in [keys::HISTORY, keys::CASE_STATE, keys::CASE_ID] {
            if let Err(e) = self.storage.remove(key) {
                tracing::error!(key, error = %e, "failed to erase session entry");
            }
        }
        tracing::info!("session cleared");
        *self = Self::open(self.storage.clone());
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    fn push_turn(&mut self, turn: ChatTurn) {
        self.history.push(turn);
        self.persist_history();
    }

    fn persist_history(&self) {
        match serde_json::to_string(&self.history) {
            Ok(json) => {
                if let Err(e) = self.storage.set(keys::HISTORY, &json) {
                    tracing::error!(error = %e, "failed to persist chat history");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to serialize chat history"),
        }
    }
}

fn greeting() -> Vec<ChatTurn> {
    vec![ChatTurn::assistant(GREETING)]
}

fn restore_history(storage: &dyn KeyValueStore) -> Vec<ChatTurn> {
    let raw = match storage.get(keys::HISTORY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return greeting(),
        Err(e) => {
            tracing::warn!(error = %e, "could not read chat history; starting fresh");
            return greeting();
        }
    };
    match serde_json::from_str::<Vec<ChatTurn>>(&raw) {
        Ok(turns) if !turns.is_empty() => turns,
        Ok(_) => greeting(),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable chat history");
            greeting()
        }
    }
}
