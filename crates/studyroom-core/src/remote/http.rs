//! HTTP client for the room session store.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::types::{ActiveSession, RemoteError};
use super::SessionStore;
use crate::storage::ApiConfig;
use crate::timer::FocusTask;

const USER_HEADER: &str = "X-User-Id";

#[derive(Debug, Clone)]
pub struct HttpSessionStore {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    #[serde(alias = "_id")]
    session_id: String,
}

#[derive(Deserialize)]
struct ActiveResponse {
    #[serde(default)]
    session: Option<ActiveSession>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpSessionStore {
    /// # Errors
    ///
    /// Returns [`RemoteError::Rejected`] with status 0 if the base URL does
    /// not parse or cannot carry a path.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url).map_err(|e| RemoteError::Rejected {
            status: 0,
            message: format!("invalid base url '{base_url}': {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Rejected {
                status: 0,
                message: format!("base url '{base_url}' cannot carry a path"),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            token: None,
            user_id: None,
        })
    }

    pub fn from_config(api: &ApiConfig, user_id: Option<String>) -> Result<Self, RemoteError> {
        let mut store = Self::new(&api.base_url, Duration::from_secs(api.timeout_secs))?;
        store.token = api.token.clone();
        store.user_id = user_id;
        Ok(store)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// `{base}/rooms/{room}/focus-sessions[/tail..]`
    fn endpoint(&self, room_id: &str, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["rooms", room_id, "focus-sessions"])
                .extend(tail);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let mut request = request;
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(user_id) = &self.user_id {
            request = request.header(USER_HEADER, user_id);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        if status == StatusCode::CONFLICT {
            Err(RemoteError::Conflict(message))
        } else {
            Err(RemoteError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_decode() {
        RemoteError::Decode(err.to_string())
    } else {
        RemoteError::Network(err.to_string())
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn start(&self, room_id: &str, task: &FocusTask) -> Result<String, RemoteError> {
        let url = self.endpoint(room_id, &[]);
        let body = json!({
            "topicId": task.id,
            "topicTitle": task.title,
            "milestoneId": task.milestone_id,
        });
        let response = self.send(self.client.post(url).json(&body)).await?;
        let parsed: StartResponse = response.json().await.map_err(map_transport_error)?;
        Ok(parsed.session_id)
    }

    async fn pulse(&self, room_id: &str, session_id: &str, elapsed_seconds: u64) -> Result<(), RemoteError> {
        let url = self.endpoint(room_id, &[session_id, "pulse"]);
        let body = json!({ "elapsedSeconds": elapsed_seconds });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn end(&self, room_id: &str, session_id: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(room_id, &[session_id, "end"]);
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn active(&self, room_id: &str) -> Result<Option<ActiveSession>, RemoteError> {
        let url = self.endpoint(room_id, &["active"]);
        match self.send(self.client.get(url)).await {
            Ok(response) => {
                let parsed: ActiveResponse = response.json().await.map_err(map_transport_error)?;
                Ok(parsed.session)
            }
            Err(RemoteError::Rejected { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
