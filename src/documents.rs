/// Document generation: send the sanitized case, receive a ZIP archive and an
/// optional list of follow-up steps encoded in a response header.
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose};
use serde_json::{Map, Value};

use crate::assistant::ActionStep;
use crate::case::{Case, normalize_witnesses};

pub const ACTIONS_HEADER: &str = "X-ZANT-Actions";
const MAX_LISTED_DOCUMENTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("document service returned an empty archive")]
    EmptyArchive,
    #[error("document request timed out")]
    Timeout,
    #[error("document transport error: {0}")]
    Transport(String),
    #[error("could not encode case: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for DocumentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DocumentError::Timeout
        } else {
            DocumentError::Transport(e.to_string())
        }
    }
}

// ── Payload sanitization ──────────────────────────────────────────────────────

/// Shape a case JSON object for the document service: the witness list is
/// always an array holding only witnesses with both names, and blank strings
/// become null.
pub fn sanitize_payload(payload: &Value) -> Value {
    let Value::Object(fields) = payload else {
        return Value::Object(Map::from_iter([("witnesses".to_string(), Value::Array(vec![]))]));
    };

    let mut out: Map<String, Value> = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "witnesses")
        .map(|(k, v)| (k.clone(), blank_to_null(v.clone())))
        .collect();

    let witnesses: Vec<Value> = normalize_witnesses(fields.get("witnesses").unwrap_or(&Value::Null))
        .into_iter()
        .filter(|w| w.is_complete())
        .filter_map(|w| serde_json::to_value(w).ok())
        .map(blank_to_null)
        .collect();
    out.insert("witnesses".to_string(), Value::Array(witnesses));

    Value::Object(out)
}

fn blank_to_null(value: Value) -> Value {
    match value {
        Value::String(s) if s.trim().is_empty() => Value::Null,
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, blank_to_null(v))).collect()),
        other => other,
    }
}

impl Case {
    pub fn to_document_payload(&self) -> Result<Value, DocumentError> {
        Ok(sanitize_payload(&serde_json::to_value(self)?))
    }
}

// ── Action steps ──────────────────────────────────────────────────────────────

/// Decode the follow-up steps header (base64 of a UTF-8 JSON array). Any
/// failure is logged and means "no steps".
pub fn decode_action_steps(header: &str) -> Option<Vec<ActionStep>> {
    let bytes = match general_purpose::STANDARD.decode(header.trim()) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, "action steps header is not base64");
            return None;
        }
    };
    let text = match String::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "action steps header is not UTF-8");
            return None;
        }
    };
    match serde_json::from_str::<Vec<ActionStep>>(&text) {
        Ok(steps) => Some(steps),
        Err(e) => {
            tracing::warn!(error = %e, "action steps header is not a step list");
            None
        }
    }
}

/// Human-readable step list for the chat, ordered by step number.
pub fn format_action_steps(steps: &[ActionStep]) -> String {
    let mut sorted: Vec<&ActionStep> = steps.iter().collect();
    sorted.sort_by_key(|s| s.step_number);

    let mut out = String::from("Kolejne kroki po wygenerowaniu dokumentów:");
    for step in sorted {
        out.push_str(&format!("\n{}. {}", step.step_number, step.description));
        if step.required_documents.is_empty() {
            continue;
        }
        let listed = step
            .required_documents
            .iter()
            .take(MAX_LISTED_DOCUMENTS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("\n   Dokumenty: {listed}"));
        let rest = step.required_documents.len().saturating_sub(MAX_LISTED_DOCUMENTS);
        if rest > 0 {
            out.push_str(&format!(" +{rest} więcej"));
        }
    }
    out
}

// ── Archive ───────────────────────────────────────────────────────────────────

pub fn archive_file_name(case: &Case) -> String {
    let stem: String = case
        .last_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("draft")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("dokumenty_wypadkowe_{stem}.zip")
}

/// Names of the files inside a ZIP archive.
pub fn list_archive(data: &[u8]) -> Result<Vec<String>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(data)).context("Response is not a ZIP archive")?;
    let mut names = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let file = zip.by_index(i)?;
        if !file.is_dir() {
            names.push(file.name().to_string());
        }
    }
    Ok(names)
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct GeneratedDocuments {
    pub archive: Vec<u8>,
    pub steps: Option<Vec<ActionStep>>,
}

#[derive(Debug)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub entries: Vec<String>,
    pub steps: Option<Vec<ActionStep>>,
}

#[derive(Debug, Clone)]
pub struct DocumentClient {
    http: reqwest::Client,
    pub base_url: String,
}

impl DocumentClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// `POST {base_url}/api/case/download-documents` with the sanitized case.
    pub async fn generate(&self, case: &Case) -> Result<GeneratedDocuments, DocumentError> {
        let payload = case.to_document_payload()?;
        let url = format!("{}/api/case/download-documents", self.base_url);
        let resp = self.http.post(&url).json(&payload).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DocumentError::Status { status, body });
        }

        let steps = resp
            .headers()
            .get(ACTIONS_HEADER)
            .and_then(|v| match v.to_str() {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    tracing::warn!("action steps header is not ASCII");
                    None
                }
            })
            .and_then(|h| decode_action_steps(&h));

        let archive = resp.bytes().await?.to_vec();
        if archive.is_empty() {
            return Err(DocumentError::EmptyArchive);
        }
        Ok(GeneratedDocuments { archive, steps })
    }

    /// Generate and write the archive into `dir`. Nothing is written unless
    /// the whole response arrived.
    pub async fn download(&self, case: &Case, dir: &Path) -> Result<DownloadOutcome> {
        let generated = self.generate(case).await?;
        let entries = list_archive(&generated.archive).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not list archive entries");
            Vec::new()
        });

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create download directory {}", dir.display()))?;
        let path = dir.join(archive_file_name(case));
        std::fs::write(&path, &generated.archive)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), entries = entries.len(), "documents saved");

        Ok(DownloadOutcome { path, entries, steps: generated.steps })
    }
}
