//! HTTP + SSE client for one agent daemon.
//!
//! Control-plane calls (session create, prompt post) ride a client with a
//! hard per-request timeout. The event subscription uses a second client
//! without one, since the SSE body stays open for the whole eval.

use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hievals_models::Envelope;

use crate::error::{Error, Result};

/// Per-request timeout for control-plane calls.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Largest session-create body we bother reading.
const SESSION_BODY_LIMIT: usize = 8192;

/// How much of an error body to surface in messages.
const ERROR_BODY_LIMIT: usize = 1024;

/// A daemon-side session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Serialize)]
struct ModelRef<'a> {
    #[serde(rename = "providerID")]
    provider_id: &'a str,
    #[serde(rename = "modelID")]
    model_id: &'a str,
}

#[derive(Debug, Serialize)]
struct PromptPart<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    model: ModelRef<'a>,
    parts: Vec<PromptPart<'a>>,
}

/// Client for a single daemon instance.
pub struct SessionClient {
    base_url: String,
    control: reqwest::Client,
    events: reqwest::Client,
}

impl SessionClient {
    /// Build a client for the daemon at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            control: reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?,
            events: reqwest::Client::builder().build()?,
        })
    }

    /// Create a session, accepting both direct and `data`-wrapped responses.
    ///
    /// An empty session ID is an error even when the body parses.
    pub async fn create_session(&self, title: &str) -> Result<Session> {
        let resp = self
            .control
            .post(format!("{}/session", self.base_url))
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        let body = &body[..body.len().min(SESSION_BODY_LIMIT)];

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(body).trim().to_string(),
            });
        }

        let envelope: Envelope<Session> =
            serde_json::from_slice(body).map_err(Error::SessionDecode)?;
        let session = envelope.into_inner();
        if session.id.is_empty() {
            return Err(Error::EmptySessionId {
                body: String::from_utf8_lossy(body).trim().to_string(),
            });
        }

        debug!(session = %session.id, "session created");
        Ok(session)
    }

    /// Open the SSE event subscription.
    ///
    /// Must be called before [`Self::post_prompt`], or terminal events can
    /// race past the subscriber.
    pub async fn subscribe_events(
        &self,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>> {
        let resp = self
            .events
            .get(format!("{}/event", self.base_url))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        Ok(resp.bytes_stream())
    }

    /// Post the prompt to the session's fire-and-forget endpoint.
    pub async fn post_prompt(
        &self,
        session_id: &str,
        provider_id: &str,
        model_id: &str,
        prompt: &str,
    ) -> Result<()> {
        let request = PromptRequest {
            model: ModelRef {
                provider_id,
                model_id,
            },
            parts: vec![PromptPart {
                kind: "text",
                text: prompt,
            }],
        };

        let resp = self
            .control
            .post(format!(
                "{}/session/{}/prompt_async",
                self.base_url, session_id
            ))
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.bytes().await.unwrap_or_default();
            let body = &body[..body.len().min(ERROR_BODY_LIMIT)];
            return Err(Error::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(body).trim().to_string(),
            });
        }

        Ok(())
    }
}
