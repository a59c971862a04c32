use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::case::Case;

pub const NOTIFICATION_MODE: &str = "notification";

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A field the assistant still considers unfilled or invalid. `field` is the
/// backend's key and is kept verbatim even when it names no known field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingField {
    pub field: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStep {
    pub step_number: u32,
    pub description: String,
    #[serde(default)]
    pub required_documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantRequest {
    pub case_id: String,
    pub message: String,
    pub mode: &'static str,
    pub conversation_history: Vec<ChatTurn>,
    pub case_state: Case,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantResponse {
    pub assistant_reply: String,
    #[serde(default)]
    pub missing_fields: Vec<MissingField>,
    #[serde(default)]
    pub case_state_preview: Case,
    #[serde(default)]
    pub recommended_actions: Option<Vec<ActionStep>>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant request timed out")]
    Timeout,
    #[error("assistant request was cancelled")]
    Cancelled,
    #[error("assistant backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode assistant response: {0}")]
    Decode(String),
    #[error("assistant transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for AssistantError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AssistantError::Timeout
        } else if e.is_decode() {
            AssistantError::Decode(e.to_string())
        } else {
            AssistantError::Transport(e.to_string())
        }
    }
}

// ── Backend ───────────────────────────────────────────────────────────────────

/// Anything that can answer one assistant turn.
pub trait AssistantBackend: Send + Sync {
    fn send(
        &self,
        request: &AssistantRequest,
    ) -> impl Future<Output = Result<AssistantResponse, AssistantError>> + Send;
}

/// The real backend: `POST {base_url}/api/assistant/message`.
#[derive(Debug, Clone)]
pub struct HttpAssistant {
    http: reqwest::Client,
    pub base_url: String,
}

impl HttpAssistant {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self) -> String {
        format!("{}/api/assistant/message", self.base_url)
    }
}

impl AssistantBackend for HttpAssistant {
    async fn send(&self, request: &AssistantRequest) -> Result<AssistantResponse, AssistantError> {
        let resp = self.http.post(self.url()).json(request).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AssistantError::Status { status, body });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| AssistantError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn request() -> AssistantRequest {
        AssistantRequest {
            case_id: "case-1".into(),
            message: "Złamałem rękę w pracy 3 maja".into(),
            mode: NOTIFICATION_MODE,
            conversation_history: vec![ChatTurn::assistant("Cześć!")],
            case_state: Case::empty(),
        }
    }

    #[test]
    fn test_turn_wire_format() {
        let turn = ChatTurn::user("hej");
        assert_eq!(serde_json::to_value(&turn).unwrap(), json!({"role": "user", "content": "hej"}));
        let back: ChatTurn = serde_json::from_str(r#"{"role":"assistant","content":"ok"}"#).unwrap();
        assert_eq!(back, ChatTurn::assistant("ok"));
    }

    #[test]
    fn test_request_wire_format() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["mode"], "notification");
        assert_eq!(value["case_id"], "case-1");
        assert_eq!(value["conversation_history"][0]["role"], "assistant");
        assert_eq!(value["case_state"]["witnesses"], json!([]));
    }

    #[test]
    fn test_response_tolerates_missing_optional_parts() {
        let resp: AssistantResponse =
            serde_json::from_str(r#"{"assistant_reply":"Dzięki","case_state_preview":{"witnesses":"x"}}"#)
                .unwrap();
        assert!(resp.missing_fields.is_empty());
        assert!(resp.recommended_actions.is_none());
        assert!(resp.case_state_preview.witnesses.is_empty());
    }

    #[tokio::test]
    async fn test_http_success_decodes_response() {
        async fn handler(Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(body["mode"], "notification");
            Json(json!({
                "assistant_reply": format!("Otrzymano: {}", body["message"].as_str().unwrap_or("")),
                "missing_fields": [{"field": "pesel", "reason": "Brak numeru PESEL"}],
                "case_state_preview": {"accident_date": "2024-05-03", "witnesses": []},
                "recommended_actions": [{"step_number": 1, "description": "Zgłoś", "required_documents": []}]
            }))
        }
        let base = serve(Router::new().route("/api/assistant/message", post(handler))).await;
        let backend = HttpAssistant::new(&format!("{base}/"), Duration::from_secs(5)).unwrap();

        let resp = backend.send(&request()).await.unwrap();
        assert_eq!(resp.assistant_reply, "Otrzymano: Złamałem rękę w pracy 3 maja");
        assert_eq!(resp.missing_fields[0].field, "pesel");
        assert_eq!(resp.case_state_preview.accident_date.as_deref(), Some("2024-05-03"));
        assert_eq!(resp.recommended_actions.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        async fn handler() -> (StatusCode, &'static str) {
            (StatusCode::INTERNAL_SERVER_ERROR, "boom")
        }
        let base = serve(Router::new().route("/api/assistant/message", post(handler))).await;
        let backend = HttpAssistant::new(&base, Duration::from_secs(5)).unwrap();

        match backend.send(&request()).await {
            Err(AssistantError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_garbage_body_is_decode_error() {
        async fn handler() -> &'static str {
            "not json"
        }
        let base = serve(Router::new().route("/api/assistant/message", post(handler))).await;
        let backend = HttpAssistant::new(&base, Duration::from_secs(5)).unwrap();
        assert!(matches!(backend.send(&request()).await, Err(AssistantError::Decode(_))));
    }

    #[tokio::test]
    async fn test_http_timeout() {
        async fn handler() -> &'static str {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "{}"
        }
        let base = serve(Router::new().route("/api/assistant/message", post(handler))).await;
        let backend = HttpAssistant::new(&base, Duration::from_millis(100)).unwrap();
        assert!(matches!(backend.send(&request()).await, Err(AssistantError::Timeout)));
    }
}
