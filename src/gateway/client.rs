//! HTTP implementation of [`RemoteSessionGateway`] for the Devin v1 API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{BoxFuture, RemoteSessionGateway};
use crate::config::GatewayConfig;
use crate::models::transcript::{
    AuthorKind, CreatedSession, RemoteStatus, SessionSnapshot, TranscriptMessage,
};
use crate::{AppError, Result};

/// Wire shape of `POST /sessions`.
#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: Option<String>,
    url: Option<String>,
}

/// Wire shape of `GET /session/{id}`.
#[derive(Debug, Deserialize)]
struct SessionDetailsResponse {
    status_enum: Option<String>,
    #[serde(default)]
    messages: Vec<WireMessage>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: String,
}

impl WireMessage {
    fn into_message(self) -> TranscriptMessage {
        let author = match self.kind.as_deref() {
            Some("devin_message") => AuthorKind::Agent,
            Some("user_message") => AuthorKind::User,
            _ => AuthorKind::Other,
        };
        TranscriptMessage {
            author,
            text: self.message,
        }
    }
}

/// Remote agent REST client.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    api_base: String,
}

impl GatewayClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no API key is configured or the key is
    /// not a valid header value, and `AppError::Gateway` if the HTTP client
    /// cannot be constructed.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("remote agent api key is not configured".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|err| AppError::Config(format!("invalid remote agent api key: {err}")))?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()
            .map_err(|err| AppError::Gateway(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
        })
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|err| AppError::Gateway(format!("{operation} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(operation, %status, body = %truncate(&body, 200), "remote agent request rejected");
            return Err(AppError::Gateway(format!("{operation} failed: HTTP {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| AppError::Gateway(format!("{operation} returned invalid json: {err}")))
    }
}

impl RemoteSessionGateway for GatewayClient {
    fn create(&self, prompt: &str) -> BoxFuture<'_, Result<CreatedSession>> {
        let payload = json!({ "prompt": prompt });
        Box::pin(async move {
            let request = self
                .http
                .post(format!("{}/sessions", self.api_base))
                .json(&payload);
            let created: CreateSessionResponse =
                self.request_json("create session", request).await?;

            let session_id = created
                .session_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| AppError::Gateway("no session id returned".into()))?;
            let url = created.url.unwrap_or_default();
            debug!(session_id, "remote session created");
            Ok(CreatedSession { session_id, url })
        })
    }

    fn fetch_status(&self, session_id: &str) -> BoxFuture<'_, Result<SessionSnapshot>> {
        let url = format!("{}/session/{session_id}", self.api_base);
        Box::pin(async move {
            let details: SessionDetailsResponse = self
                .request_json("get session details", self.http.get(url))
                .await?;

            Ok(SessionSnapshot {
                status: RemoteStatus::from_wire(details.status_enum.as_deref()),
                raw_status: details.status_enum,
                messages: details
                    .messages
                    .into_iter()
                    .map(WireMessage::into_message)
                    .collect(),
                url: details.url,
            })
        })
    }

    fn send_message(&self, session_id: &str, text: &str) -> BoxFuture<'_, Result<()>> {
        let url = format!("{}/session/{session_id}/message", self.api_base);
        let payload = json!({ "message": text });
        Box::pin(async move {
            let _: serde_json::Value = self
                .request_json("send message", self.http.post(url).json(&payload))
                .await?;
            Ok(())
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_owned()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
