// HTTP gateway for submitting notifications to a running gate
//
// Maps the gate's status codes back onto typed errors so callers can tell a
// rate-limited send apart from a transport failure.

use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::Notification;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned by [`NotificationClient::send`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The gate does not serve the send route
    #[error("notification endpoint not found")]
    NotFound,

    /// The user's quota for the category is used up
    #[error("too many messages of that type sent")]
    TooManyMessages {
        /// Seconds from the `Retry-After` header, when present
        retry_after: Option<u64>,
    },

    /// Any other non-success status
    #[error("notification gate answered {status}: {body}")]
    Status { status: u16, body: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for `POST /notify/send`
#[derive(Debug, Clone)]
pub struct NotificationClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl NotificationClient {
    /// Create a client for the gate at `base_url` (e.g. `http://127.0.0.1:8080`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Use a preconfigured HTTP client
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send_url(&self) -> String {
        format!("{}/notify/send", self.base_url)
    }

    /// Submit one notification
    pub async fn send(&self, notification: &Notification) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.send_url())
            .timeout(self.timeout)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = response.text().await?;
        debug!(status = status.as_u16(), body = %body, "Notification gate response");

        match status {
            s if s.is_success() => {
                info!(
                    user_id = %notification.user_id,
                    category = %notification.category,
                    "Sent notification with success"
                );
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => Err(ClientError::TooManyMessages { retry_after }),
            s => Err(ClientError::Status {
                status: s.as_u16(),
                body,
            }),
        }
    }
}
