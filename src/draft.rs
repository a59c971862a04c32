/// Local draft sync: the editable text behind every form field.
///
/// Keystrokes only touch the local draft map. A draft reaches the case store
/// when the field is committed (blur or explicit confirm), never per
/// keystroke. In the other direction, every change of the bound case
/// re-derives the whole draft map from the new snapshot, discarding any
/// uncommitted text: the latest case always wins over local edits.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;

use crate::case::{Case, CaseError, FieldKey, RawValue};
use crate::classification::ClassificationIndex;
use crate::schema::{CommitHandler, Schema};
use crate::store::CaseStore;
use crate::validation::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurOutcome {
    /// Draft was valid and has been written to the store.
    Committed,
    /// Draft failed validation; the field is marked and nothing was written.
    Rejected,
}

pub struct DraftSync {
    schema: Schema,
    validator: Validator,
    classification: &'static ClassificationIndex,
    binding: watch::Receiver<Arc<Case>>,
    drafts: HashMap<FieldKey, String>,
    errors: HashSet<FieldKey>,
}

impl DraftSync {
    /// Bind to `store` and derive the initial drafts from its current case.
    pub fn bind(schema: Schema, store: &CaseStore) -> Self {
        let validator = Validator::for_schema(&schema);
        let mut binding = store.subscribe();
        let case = binding.borrow_and_update().clone();
        let mut sync = Self {
            schema,
            validator,
            classification: ClassificationIndex::builtin(),
            binding,
            drafts: HashMap::new(),
            errors: HashSet::new(),
        };
        sync.derive(&case);
        sync
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Re-derive the drafts if the bound case changed since the last look.
    /// Returns whether anything was re-derived.
    pub fn refresh(&mut self) -> bool {
        match self.binding.has_changed() {
            Ok(true) => {
                let case = self.binding.borrow_and_update().clone();
                self.derive(&case);
                true
            }
            // Store dropped: nothing will change any more.
            Ok(false) | Err(_) => false,
        }
    }

    /// Replace the whole draft map with the display text of `case`.
    fn derive(&mut self, case: &Case) {
        self.drafts = self
            .schema
            .list_fields()
            .map(|f| (f.key, f.display(case)))
            .collect();
        self.errors.clear();
    }

    pub fn value(&self, key: FieldKey) -> &str {
        self.drafts.get(&key).map(String::as_str).unwrap_or_default()
    }

    pub fn has_error(&self, key: FieldKey) -> bool {
        self.errors.contains(&key)
    }

    /// Draft text differs from what the bound case would display.
    pub fn is_dirty(&self, key: FieldKey) -> bool {
        let case = self.binding.borrow();
        self.schema
            .field(key)
            .is_some_and(|f| f.display(&case) != self.value(key))
    }

    /// A keystroke. Local only; an errored field clears its mark as soon as
    /// the text becomes valid, but typing never sets the mark.
    pub fn on_change(&mut self, key: FieldKey, text: &str) {
        if self.schema.field(key).is_none() {
            return;
        }
        self.drafts.insert(key, text.to_string());
        if self.errors.contains(&key) && self.validator.check(key, text) {
            self.errors.remove(&key);
        }
    }

    /// Push `text` for `key` into the store and re-derive the drafts.
    pub fn on_commit(&mut self, store: &mut CaseStore, key: FieldKey, text: &str) -> Result<(), CaseError> {
        let field = self
            .schema
            .field(key)
            .ok_or_else(|| CaseError::UnknownField(key.to_string()))?;

        match field.on_commit {
            CommitHandler::ClassificationLookup => {
                let description = self.classification.resolve(text);
                tracing::debug!(code = text, found = !description.is_empty(), "classification lookup");
                store.update_fields([
                    (key, RawValue::Text(text.to_string())),
                    (FieldKey::BusinessDescription, RawValue::Text(description)),
                ])?;
            }
            CommitHandler::Generic => {
                let value = field.parse(text);
                store.update(key, value)?;
            }
        }

        self.refresh();
        Ok(())
    }

    /// Leaving a field: validate the current draft and commit it if valid.
    pub fn blur(&mut self, store: &mut CaseStore, key: FieldKey) -> Result<BlurOutcome, CaseError> {
        let text = self.value(key).to_string();
        if !self.validator.check(key, &text) {
            self.errors.insert(key);
            return Ok(BlurOutcome::Rejected);
        }
        self.errors.remove(&key);
        self.on_commit(store, key, &text)?;
        Ok(BlurOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Witness;
    use crate::storage::MemoryStore;

    fn setup() -> (CaseStore, DraftSync) {
        let store = CaseStore::load(Arc::new(MemoryStore::new()));
        let sync = DraftSync::bind(Schema::accident_notification(), &store);
        (store, sync)
    }

    fn assert_matches_case(sync: &DraftSync, case: &Case) {
        for field in sync.schema().list_fields() {
            assert_eq!(sync.value(field.key), field.display(case), "field {}", field.key);
        }
    }

    #[test]
    fn test_initial_drafts_are_empty_text() {
        let (_store, sync) = setup();
        for key in FieldKey::ALL {
            assert_eq!(sync.value(key), "", "field {key}");
        }
    }

    #[test]
    fn test_change_is_local_only() {
        let (store, mut sync) = setup();
        sync.on_change(FieldKey::FirstName, "Ja");
        sync.on_change(FieldKey::FirstName, "Jan");
        assert_eq!(sync.value(FieldKey::FirstName), "Jan");
        assert_eq!(store.get().first_name, None);
        assert!(sync.is_dirty(FieldKey::FirstName));
    }

    #[test]
    fn test_replace_overwrites_every_draft() {
        let (mut store, mut sync) = setup();
        sync.on_change(FieldKey::FirstName, "unsaved");
        sync.on_change(FieldKey::Witnesses, "Someone Else");
        sync.on_change(FieldKey::Sudden, "true");

        let incoming = Case {
            first_name: Some("Jan".into()),
            accident_date: Some("2024-05-03".into()),
            witnesses: vec![Witness::new("Anna", "Nowak")],
            work_related: Some(true),
            ..Default::default()
        };
        store.replace(incoming.clone());

        assert!(sync.refresh());
        assert_matches_case(&sync, &incoming);
        assert_eq!(sync.value(FieldKey::Sudden), "");
        assert_eq!(sync.value(FieldKey::Witnesses), "Anna Nowak");
        assert!(!sync.is_dirty(FieldKey::FirstName));
        assert!(!sync.refresh());
    }

    #[test]
    fn test_generic_commit_parses_with_codec() {
        let (mut store, mut sync) = setup();
        sync.on_commit(&mut store, FieldKey::Witnesses, "Anna Nowak, Jan Kowalski").unwrap();
        assert_eq!(
            store.get().witnesses,
            vec![Witness::new("Anna", "Nowak"), Witness::new("Jan", "Kowalski")]
        );

        sync.on_commit(&mut store, FieldKey::WorkRelated, "false").unwrap();
        assert_eq!(store.get().work_related, Some(false));
        assert_eq!(sync.value(FieldKey::WorkRelated), "false");
    }

    #[test]
    fn test_classification_commit_writes_code_and_description_once() {
        let (mut store, mut sync) = setup();
        let mut rx = store.subscribe();
        store.update(FieldKey::FirstName, RawValue::Text("Jan".into())).unwrap();
        rx.borrow_and_update();

        sync.on_commit(&mut store, FieldKey::Pkd, "43.21.z").unwrap();

        let case = store.get();
        assert_eq!(case.pkd.as_deref(), Some("43.21.z"));
        assert_eq!(case.business_description.as_deref(), Some("Wykonywanie instalacji elektrycznych"));
        assert_eq!(case.first_name.as_deref(), Some("Jan"));
        assert_eq!(sync.value(FieldKey::BusinessDescription), "Wykonywanie instalacji elektrycznych");

        // One notification for both fields.
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_classification_miss_clears_description() {
        let (mut store, mut sync) = setup();
        store.update(FieldKey::BusinessDescription, RawValue::Text("stale".into())).unwrap();
        sync.on_commit(&mut store, FieldKey::Pkd, "00.00").unwrap();
        assert_eq!(store.get().pkd.as_deref(), Some("00.00"));
        assert_eq!(store.get().business_description.as_deref(), Some(""));
    }

    #[test]
    fn test_blur_rejects_invalid_and_keeps_store() {
        let (mut store, mut sync) = setup();
        sync.on_change(FieldKey::Pesel, "123");
        assert_eq!(sync.blur(&mut store, FieldKey::Pesel).unwrap(), BlurOutcome::Rejected);
        assert!(sync.has_error(FieldKey::Pesel));
        assert_eq!(store.get().pesel, None);
        // The rejected text stays in the draft for the user to fix.
        assert_eq!(sync.value(FieldKey::Pesel), "123");

        sync.on_change(FieldKey::Pesel, "1234");
        assert!(sync.has_error(FieldKey::Pesel));
        sync.on_change(FieldKey::Pesel, "85010112345");
        assert!(!sync.has_error(FieldKey::Pesel));

        assert_eq!(sync.blur(&mut store, FieldKey::Pesel).unwrap(), BlurOutcome::Committed);
        assert_eq!(store.get().pesel.as_deref(), Some("85010112345"));
    }

    #[test]
    fn test_typing_never_sets_error() {
        let (_store, mut sync) = setup();
        sync.on_change(FieldKey::Nip, "abc");
        assert!(!sync.has_error(FieldKey::Nip));
    }

    #[test]
    fn test_assistant_date_reaches_draft_without_reload() {
        let (mut store, mut sync) = setup();
        assert_eq!(sync.value(FieldKey::AccidentDate), "");
        store.replace(Case { accident_date: Some("2024-05-03".into()), ..Default::default() });
        sync.refresh();
        assert_eq!(sync.value(FieldKey::AccidentDate), "2024-05-03");
    }
}
