/// Field-level validation: does the whole display text match the field's pattern?
use std::collections::HashMap;

use regex::Regex;

use crate::case::FieldKey;
use crate::schema::Schema;

/// Compile `pattern` so that it must match the entire text, not a substring.
pub fn full_match(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

/// Patterns of a whole schema compiled once, for per-keystroke checks.
/// No pattern means always valid. A pattern that fails to compile can't
/// reject anything, so it is logged and the field treated as unconstrained.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    compiled: HashMap<FieldKey, Regex>,
}

impl Validator {
    pub fn for_schema(schema: &Schema) -> Self {
        let mut compiled = HashMap::new();
        for field in schema.list_fields() {
            let Some(pattern) = field.pattern else { continue };
            match full_match(pattern) {
                Ok(re) => {
                    compiled.insert(field.key, re);
                }
                Err(e) => {
                    tracing::warn!(field = %field.key, error = %e, "unusable validation pattern");
                }
            }
        }
        Self { compiled }
    }

    pub fn check(&self, key: FieldKey, text: &str) -> bool {
        self.compiled.get(&key).is_none_or(|re| re.is_match(text))
    }
}
