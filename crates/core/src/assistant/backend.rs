use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, error};

use crate::assistant::{ApiCall, ApiResponse};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/v1";
pub const SESSION_HEADER: &str = "X-Session-ID";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{detail} (status {status})")]
    Status { status: u16, detail: String },

    #[error("invalid {endpoint} response: {reason}")]
    InvalidResponse {
        endpoint: &'static str,
        reason: String,
    },
}

/// The assistant's server side: transcript lookup, chat, summary and quiz.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    async fn call(&self, session_id: &str, call: &ApiCall) -> Result<ApiResponse, BackendError>;
}

/// `POST {base}/video/{endpoint}` with a JSON body and the session header.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        session_id: &str,
        endpoint: &'static str,
        body: &B,
    ) -> Result<R, BackendError> {
        let url = format!("{}/video/{}", self.base_url, endpoint);
        debug!(%url, "backend request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header(SESSION_HEADER, session_id)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null);
            let detail = body["detail"]
                .as_str()
                .unwrap_or("API request failed")
                .to_string();
            error!(%url, status = status.as_u16(), %detail, "backend returned an error");
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let value = response.json::<serde_json::Value>().await?;
        serde_json::from_value(value).map_err(|e| BackendError::InvalidResponse {
            endpoint,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl VideoBackend for HttpBackend {
    async fn call(&self, session_id: &str, call: &ApiCall) -> Result<ApiResponse, BackendError> {
        let endpoint = call.endpoint();
        Ok(match call {
            ApiCall::FetchTranscript(body) => {
                ApiResponse::FetchTranscript(self.post(session_id, endpoint, body).await?)
            }
            ApiCall::Chat(body) => ApiResponse::Chat(self.post(session_id, endpoint, body).await?),
            ApiCall::Summary(body) => {
                ApiResponse::Summary(self.post(session_id, endpoint, body).await?)
            }
            ApiCall::Quiz(body) => ApiResponse::Quiz(self.post(session_id, endpoint, body).await?),
        })
    }
}
