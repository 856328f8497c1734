use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use thiserror::Error;

use crate::model::{ChangeTimestamp, ConversationSummary};

pub const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out")]
    Timeout,

    #[error("session is not authorized")]
    Unauthorized,

    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("server returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request rejected by server: {message}")]
    Unsuccessful { message: String },

    #[error("malformed response: {reason}")]
    Malformed { reason: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited {
                retry_after_secs: 0,
            },
            _ => {
                let message = body
                    .map(|b| {
                        let text = String::from_utf8_lossy(b);
                        text.chars().take(MAX_ERROR_BODY_LENGTH).collect::<String>()
                    })
                    .unwrap_or_default();
                Self::Http { status, message }
            }
        }
    }

    #[must_use]
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Network { .. } | Self::Timeout | Self::RateLimited { .. } => {
                ErrorSeverity::Transient
            }
            Self::Http { status, .. } if *status >= 500 => ErrorSeverity::Transient,
            Self::Http { .. }
            | Self::Unauthorized
            | Self::Unsuccessful { .. }
            | Self::Malformed { .. } => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Transient)
    }
}

/// `{success, data, message}` wrapper every backend endpoint responds with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Fails closed: an unsuccessful envelope or one without a payload is an
    /// error, never an empty value.
    pub fn into_result(self) -> ApiResult<T> {
        if !self.success {
            return Err(ApiError::Unsuccessful {
                message: self.message.unwrap_or_else(|| "no message".into()),
            });
        }
        self.data
            .ok_or_else(|| ApiError::malformed("successful response without data"))
    }
}

/// Payload of the lightweight "anything changed since T" endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheck {
    pub has_updates: bool,
    pub timestamp: ChangeTimestamp,
}

impl UpdateCheck {
    pub fn validate(self) -> ApiResult<Self> {
        if self.timestamp.value() < 0 {
            return Err(ApiError::malformed(format!(
                "negative change timestamp {}",
                self.timestamp
            )));
        }
        Ok(self)
    }
}

pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_slice(body).map_err(|e| ApiError::malformed(e.to_string()))?;
    envelope.into_result()
}

pub fn decode_conversations(body: &[u8]) -> ApiResult<Vec<ConversationSummary>> {
    decode_envelope(body)
}

pub fn decode_update_check(body: &[u8]) -> ApiResult<UpdateCheck> {
    decode_envelope::<UpdateCheck>(body)?.validate()
}

/// Remote operations the poller depends on. Implemented by the shell's HTTP
/// layer; the core only sees typed results.
#[async_trait(?Send)]
pub trait ConversationApi {
    async fn list_conversations(&self) -> ApiResult<Vec<ConversationSummary>>;

    async fn check_for_updates(&self, since: ChangeTimestamp) -> ApiResult<UpdateCheck>;
}

#[async_trait(?Send)]
impl<T: ConversationApi + ?Sized> ConversationApi for Rc<T> {
    async fn list_conversations(&self) -> ApiResult<Vec<ConversationSummary>> {
        (**self).list_conversations().await
    }

    async fn check_for_updates(&self, since: ChangeTimestamp) -> ApiResult<UpdateCheck> {
        (**self).check_for_updates(since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status_mapping() {
        assert_eq!(ApiError::from_http_status(401, None), ApiError::Unauthorized);
        assert_eq!(ApiError::from_http_status(504, None), ApiError::Timeout);
        assert!(matches!(
            ApiError::from_http_status(429, None),
            ApiError::RateLimited { .. }
        ));
        assert_eq!(
            ApiError::from_http_status(404, Some(&b"no such route"[..])),
            ApiError::Http {
                status: 404,
                message: "no such route".into()
            }
        );
    }

    #[test]
    fn test_error_body_is_truncated() {
        let body = "x".repeat(1000);
        match ApiError::from_http_status(500, Some(body.as_bytes())) {
            ApiError::Http { message, .. } => assert_eq!(message.len(), MAX_ERROR_BODY_LENGTH),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_severity() {
        assert!(ApiError::network("reset").is_transient());
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::from_http_status(503, None).is_transient());
        assert!(!ApiError::from_http_status(404, None).is_transient());
        assert_eq!(ApiError::Unauthorized.severity(), ErrorSeverity::Permanent);
        assert_eq!(
            ApiError::malformed("bad").severity(),
            ErrorSeverity::Permanent
        );
    }

    #[test]
    fn test_decode_update_check() {
        let check =
            decode_update_check(br#"{"success":true,"data":{"has_updates":true,"timestamp":100}}"#)
                .unwrap();
        assert!(check.has_updates);
        assert_eq!(check.timestamp, ChangeTimestamp(100));
    }

    #[test]
    fn test_decode_fails_closed() {
        assert!(matches!(
            decode_update_check(br#"{"success":false,"message":"no such endpoint"}"#),
            Err(ApiError::Unsuccessful { .. })
        ));
        assert!(matches!(
            decode_update_check(br#"{"success":true}"#),
            Err(ApiError::Malformed { .. })
        ));
        assert!(matches!(
            decode_update_check(br#"{"success":true,"data":{"has_updates":"yes"}}"#),
            Err(ApiError::Malformed { .. })
        ));
        assert!(matches!(
            decode_update_check(br#"{"success":true,"data":{"has_updates":true,"timestamp":-4}}"#),
            Err(ApiError::Malformed { .. })
        ));
        assert!(matches!(
            decode_update_check(b"<html>502</html>"),
            Err(ApiError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_conversations() {
        let body = br#"{
            "success": true,
            "data": [
                {"id": "c1", "title": "Ops", "unread_count": 2, "updated_at": 1700000000000},
                {"id": "c2", "updated_at": 1700000000500}
            ]
        }"#;
        let conversations = decode_conversations(body).unwrap();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].title.as_deref(), Some("Ops"));
        assert_eq!(conversations[1].unread_count, 0);
    }

    #[test]
    fn test_envelope_without_data_decodes_for_payload_without_default() {
        // UpdateCheck has no Default impl; a missing `data` must still decode.
        let envelope: ApiEnvelope<UpdateCheck> =
            serde_json::from_slice(br#"{"success":true}"#).unwrap();
        assert_eq!(envelope.data, None);
        assert!(matches!(
            decode_envelope::<UpdateCheck>(br#"{"success":true,"message":"ok"}"#),
            Err(ApiError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_conversations_rejects_invalid_id() {
        let body = br#"{"success":true,"data":[{"id":"","updated_at":1}]}"#;
        assert!(matches!(
            decode_conversations(body),
            Err(ApiError::Malformed { .. })
        ));
    }
}
