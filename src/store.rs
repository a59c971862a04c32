/// The case store: single source of truth for the case record.
///
/// Two write paths meet here. The assistant path replaces the whole case with
/// an authoritative snapshot (through a `MergePolicy`); the user path updates
/// one field (or one atomic group of fields) at a time. Every successful write
/// is persisted synchronously and published to subscribers.
use std::sync::Arc;

use tokio::sync::watch;

use crate::case::{Case, CaseError, FieldKey, RawValue};
use crate::storage::{KeyValueStore, keys};

// ── Merge policy ──────────────────────────────────────────────────────────────

/// How an incoming assistant snapshot is reconciled with the current case.
pub trait MergePolicy: Send + Sync {
    fn merge(&self, current: &Case, incoming: Case) -> Case;

    fn name(&self) -> &'static str;
}

/// The incoming snapshot replaces the current case outright, including any
/// field the user changed since the request was sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssistantWins;

impl MergePolicy for AssistantWins {
    fn merge(&self, _current: &Case, incoming: Case) -> Case {
        incoming
    }

    fn name(&self) -> &'static str {
        "assistant-wins"
    }
}

// ── CaseStore ─────────────────────────────────────────────────────────────────

pub struct CaseStore {
    case: Arc<Case>,
    storage: Arc<dyn KeyValueStore>,
    policy: Box<dyn MergePolicy>,
    tx: watch::Sender<Arc<Case>>,
}

impl CaseStore {
    /// Restore the last persisted case, or start empty.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_policy(storage, Box::new(AssistantWins))
    }

    pub fn with_policy(storage: Arc<dyn KeyValueStore>, policy: Box<dyn MergePolicy>) -> Self {
        let case = Arc::new(restore(storage.as_ref()));
        let (tx, _rx) = watch::channel(case.clone());
        Self { case, storage, policy, tx }
    }

    /// Current snapshot. Cheap; the returned value never changes underneath you.
    pub fn get(&self) -> Arc<Case> {
        self.case.clone()
    }

    /// A receiver that is marked changed after every successful write.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Case>> {
        self.tx.subscribe()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Reconcile an authoritative snapshot into the store.
    pub fn replace(&mut self, incoming: Case) {
        let merged = self.policy.merge(&self.case, incoming);
        self.commit(merged);
    }

    /// Write one field, leaving every other field untouched.
    pub fn update(&mut self, key: FieldKey, value: RawValue) -> Result<(), CaseError> {
        self.update_fields([(key, value)])
    }

    /// Write several fields as one change: either all land (one persist, one
    /// notification) or none do.
    pub fn update_fields(
        &mut self,
        values: impl IntoIterator<Item = (FieldKey, RawValue)>,
    ) -> Result<(), CaseError> {
        let mut next = Case::clone(&self.case);
        for (key, value) in values {
            next.set(key, value)?;
        }
        self.commit(next);
        Ok(())
    }

    fn commit(&mut self, next: Case) {
        self.case = Arc::new(next);
        self.persist();
        self.tx.send_replace(self.case.clone());
    }

    /// Storage failures are logged; the in-memory case stays authoritative.
    fn persist(&self) {
        let json = match serde_json::to_string(self.case.as_ref()) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize case");
                return;
            }
        };
        if let Err(e) = self.storage.set(keys::CASE_STATE, &json) {
            tracing::error!(error = %e, "failed to persist case");
        }
    }
}

fn restore(storage: &dyn KeyValueStore) -> Case {
    let raw = match storage.get(keys::CASE_STATE) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Case::empty(),
        Err(e) => {
            tracing::warn!(error = %e, "could not read persisted case; starting empty");
            return Case::empty();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "discarding unreadable persisted case");
        Case::empty()
    })
}
