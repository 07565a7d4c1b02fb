// Request handlers for the notification API

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use super::model::{MessageResponse, Notification};
use super::AppState;
use crate::metrics;
use crate::rate_limit::DispatchError;

pub(crate) const MESSAGE_SENT: &str = "Message Sent";
pub(crate) const TOO_MANY_MESSAGES: &str = "too many messages of that type sent";
pub(crate) const HANDLER_NOT_FOUND: &str = "this notification type handler was not found";
pub(crate) const UNKNOWN_FAILURE: &str = "failed to send message with unknown error, try again later";

/// `POST /notify/send`
pub async fn send_notification(State(state): State<AppState>, body: Bytes) -> Response {
    let notification: Notification = match serde_json::from_slice(&body) {
        Ok(notification) => notification,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid request body: {}", e) })),
            )
                .into_response();
        }
    };

    let problems = notification.validate();
    if !problems.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(problems)).into_response();
    }

    match state
        .dispatcher
        .admit(
            &notification.user_id,
            &notification.category,
            &notification.message,
        )
        .await
    {
        Ok(()) => message(StatusCode::CREATED, MESSAGE_SENT),
        Err(e) => dispatch_error_response(&e, &notification),
    }
}

fn dispatch_error_response(err: &DispatchError, notification: &Notification) -> Response {
    match err {
        DispatchError::RateLimited(limited) => {
            let mut response = message(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_MESSAGES);
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(limited.retry_after_secs()),
            );
            response
        }
        DispatchError::UnknownCategory(category) => {
            error!(category = %category, user_id = %notification.user_id, "Unknown notification type");
            message(StatusCode::INTERNAL_SERVER_ERROR, HANDLER_NOT_FOUND)
        }
        other => {
            error!(error = %other, user_id = %notification.user_id, "Failed to send notification");
            message(StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_FAILURE)
        }
    }
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(MessageResponse::new(text))).into_response()
}

/// `GET /healthcheck`
pub async fn healthcheck() -> &'static str {
    "Healthy"
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> Response {
    message(StatusCode::NOT_FOUND, "not found")
}
