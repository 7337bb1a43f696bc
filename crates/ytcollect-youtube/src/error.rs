//! API error taxonomy

use serde::Deserialize;
use ytcollect_core::Retryable;

/// Failure of a single API request, classified by what the collector does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Daily quota used up; only a later invocation can continue
    QuotaExceeded { reason: String },
    /// The video exists but its comments are turned off
    CommentsDisabled,
    /// Channel, playlist, video or thread does not exist (or is private)
    NotFound { reason: String },
    /// Short-term rate limit; backing off helps
    RateLimited { reason: String },
    /// 5xx or `backendError`
    Server { status: u16, message: String },
    /// Timeout, connection reset, DNS failure
    Network(String),
    /// Request refused for a reason retrying cannot fix (bad key, API disabled)
    Rejected {
        status: u16,
        reason: String,
        message: String,
    },
    /// Response body did not decode
    Malformed(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded { reason } => write!(f, "quota exceeded ({reason})"),
            Self::CommentsDisabled => write!(f, "comments disabled"),
            Self::NotFound { reason } => write!(f, "not found ({reason})"),
            Self::RateLimited { reason } => write!(f, "rate limited ({reason})"),
            Self::Server { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Rejected {
                status,
                reason,
                message,
            } => write!(f, "HTTP {status} {reason}: {message}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_)
        )
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

impl ApiError {
    /// Classify a non-2xx response by the `reason` of its error body,
    /// falling back to the status code.
    pub fn from_response(status: u16, body: &str) -> Self {
        let (reason, message) = match serde_json::from_str::<ErrorBody>(body) {
            Ok(b) => (
                b.error
                    .errors
                    .into_iter()
                    .map(|e| e.reason)
                    .find(|r| !r.is_empty())
                    .unwrap_or_default(),
                b.error.message,
            ),
            Err(_) => (String::new(), body.chars().take(200).collect()),
        };

        match reason.as_str() {
            "quotaExceeded" | "dailyLimitExceeded" => Self::QuotaExceeded { reason },
            "commentsDisabled" => Self::CommentsDisabled,
            "videoNotFound" | "channelNotFound" | "playlistNotFound" | "commentNotFound"
            | "commentThreadNotFound" | "notFound" => Self::NotFound { reason },
            "rateLimitExceeded" | "userRateLimitExceeded" => Self::RateLimited { reason },
            "backendError" | "internalError" => Self::Server { status, message },
            "" => match status {
                404 => Self::NotFound {
                    reason: "notFound".to_string(),
                },
                429 => Self::RateLimited {
                    reason: "tooManyRequests".to_string(),
                },
                500..=599 => Self::Server { status, message },
                _ => Self::Rejected {
                    status,
                    reason,
                    message,
                },
            },
            _ if (500..=599).contains(&status) => Self::Server { status, message },
            _ => Self::Rejected {
                status,
                reason,
                message,
            },
        }
    }

    /// Convert a transport error; the URL is dropped since it carries the API key.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        let is_decode = e.is_decode();
        let message = e.without_url().to_string();
        match status {
            Some(status) => Self::from_response(status, &message),
            None if is_decode => Self::Malformed(message),
            None => Self::Network(message),
        }
    }

    /// Whether the whole run must stop until the quota resets
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: u16, reason: &str) -> String {
        format!(
            r#"{{"error":{{"code":{code},"message":"The request failed.","errors":[{{"message":"x","domain":"youtube.quota","reason":"{reason}"}}]}}}}"#
        )
    }

    #[test]
    fn quota_reasons() {
        let e = ApiError::from_response(403, &body(403, "quotaExceeded"));
        assert!(e.is_quota());
        assert!(!e.is_retryable());
        assert!(ApiError::from_response(403, &body(403, "dailyLimitExceeded")).is_quota());
    }

    #[test]
    fn comments_disabled_is_not_quota() {
        let e = ApiError::from_response(403, &body(403, "commentsDisabled"));
        assert_eq!(e, ApiError::CommentsDisabled);
        assert!(!e.is_quota());
    }

    #[test]
    fn forbidden_is_rejected() {
        for reason in ["forbidden", "accessNotConfigured", "keyInvalid"] {
            let e = ApiError::from_response(403, &body(403, reason));
            assert!(matches!(e, ApiError::Rejected { .. }), "{reason}");
            assert!(!e.is_retryable());
        }
    }

    #[test]
    fn not_found_by_reason_and_status() {
        assert!(matches!(
            ApiError::from_response(404, &body(404, "videoNotFound")),
            ApiError::NotFound { .. }
        ));
        assert!(matches!(
            ApiError::from_response(404, "<html>gone</html>"),
            ApiError::NotFound { .. }
        ));
    }

    #[test]
    fn transient_errors_retry() {
        assert!(ApiError::from_response(403, &body(403, "rateLimitExceeded")).is_retryable());
        assert!(ApiError::from_response(500, &body(500, "backendError")).is_retryable());
        assert!(ApiError::from_response(503, "unavailable").is_retryable());
        assert!(ApiError::from_response(429, "").is_retryable());
        assert!(ApiError::Network("timed out".into()).is_retryable());
        assert!(!ApiError::Malformed("eof".into()).is_retryable());
    }

    #[test]
    fn unknown_client_error_is_rejected() {
        let e = ApiError::from_response(400, &body(400, "invalidPageToken"));
        assert_eq!(
            e.to_string(),
            "HTTP 400 invalidPageToken: The request failed."
        );
    }
}
