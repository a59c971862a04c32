/// Business classification (PKD) code → description lookup.
///
/// Codes are compared after normalization: everything except ASCII letters and
/// digits is dropped and letters are upper-cased, so "01.11.Z", "0111z" and
/// "01 11 Z" are the same code. A miss is not an error, it resolves to "".
use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Deserialize;

const BUILTIN_CODES: &str = include_str!("../data/pkd.json");

#[derive(Debug, Clone, Deserialize)]
pub struct CodeEntry {
    pub code: String,
    pub desc: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationIndex {
    by_code: HashMap<String, String>,
}

static BUILTIN: LazyLock<ClassificationIndex> = LazyLock::new(|| {
    match serde_json::from_str::<Vec<CodeEntry>>(BUILTIN_CODES) {
        Ok(entries) => {
            let index = ClassificationIndex::from_entries(entries);
            if index.is_empty() {
                tracing::warn!("built-in classification list is empty; lookups will miss");
            } else {
                tracing::debug!(codes = index.len(), "classification list loaded");
            }
            index
        }
        Err(e) => {
            tracing::error!(error = %e, "built-in classification list is unreadable; lookups will miss");
            ClassificationIndex::default()
        }
    }
});

pub fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl ClassificationIndex {
    /// Build the lookup table. Later duplicates of a normalized code win.
    pub fn from_entries(entries: impl IntoIterator<Item = CodeEntry>) -> Self {
        let by_code = entries
            .into_iter()
            .map(|e| (normalize_code(&e.code), e.desc))
            .collect();
        Self { by_code }
    }

    /// The list shipped with the binary, parsed on first use.
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    pub fn resolve(&self, raw_code: &str) -> String {
        self.by_code
            .get(&normalize_code(raw_code))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
