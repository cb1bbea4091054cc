use crate::request::Phase;
use serde_json::json;
use thiserror::Error;

/// Everything that can end a request attempt.
///
/// The tags are disjoint: a failed chain or hostname check is always
/// `SslCertificateNotVerified`, a broken socket or TLS protocol failure is
/// always `ConnectionFailed`, and an elapsed deadline is always `Timeout`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("SSL certificate not verified: {message}")]
    SslCertificateNotVerified { message: String, code: i32 },

    #[error("Request timed out while {phase}")]
    Timeout { phase: Phase },

    #[error("Request cancelled")]
    Cancelled,
}

impl RequestError {
    /// Stable machine-readable tag.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::Config(_) => "CONFIG_ERROR",
            RequestError::InvalidUrl(_) => "INVALID_URL",
            RequestError::InvalidRequest(_) => "INVALID_REQUEST",
            RequestError::ConnectionFailed(_) => "CONNECTION_FAILED",
            RequestError::SslCertificateNotVerified { .. } => "SSL_CERTIFICATE_NOT_VERIFIED",
            RequestError::Timeout { .. } => "TIMEOUT",
            RequestError::Cancelled => "CANCELLED",
        }
    }

    /// Whether repeating the same request could succeed.
    ///
    /// Trust and configuration failures are deterministic for a given
    /// configuration, so only network-level failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::ConnectionFailed(_) | RequestError::Timeout { .. }
        )
    }

    pub fn is_certificate_error(&self) -> bool {
        matches!(self, RequestError::SslCertificateNotVerified { .. })
    }

    /// JSON error envelope used by the command-line front end.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error = json!({
            "message": self.to_string(),
            "code": self.code(),
            "retryable": self.is_retryable(),
        });
        if let RequestError::SslCertificateNotVerified { code, .. } = self {
            error["verifyCode"] = json!(code);
        }
        json!({
            "success": false,
            "error": error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            RequestError::Config("x".into()),
            RequestError::InvalidUrl("x".into()),
            RequestError::InvalidRequest("x".into()),
            RequestError::ConnectionFailed("x".into()),
            RequestError::SslCertificateNotVerified {
                message: "x".into(),
                code: 20,
            },
            RequestError::Timeout {
                phase: Phase::Connecting,
            },
            RequestError::Cancelled,
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RequestError::ConnectionFailed("reset".into()).is_retryable());
        assert!(RequestError::Timeout {
            phase: Phase::Handshaking
        }
        .is_retryable());
        assert!(!RequestError::Config("missing".into()).is_retryable());
        assert!(!RequestError::SslCertificateNotVerified {
            message: "unknown issuer".into(),
            code: 20,
        }
        .is_retryable());
    }

    #[test]
    fn test_json_envelope() {
        let body = RequestError::SslCertificateNotVerified {
            message: "certificate verify failed".into(),
            code: 20,
        }
        .to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "SSL_CERTIFICATE_NOT_VERIFIED");
        assert_eq!(body["error"]["verifyCode"], 20);
        assert_eq!(body["error"]["retryable"], false);
    }

    #[test]
    fn test_timeout_message_names_phase() {
        let err = RequestError::Timeout {
            phase: Phase::Handshaking,
        };
        assert_eq!(err.to_string(), "Request timed out while handshaking");
    }
}
