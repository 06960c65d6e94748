//! Remote write error types.
//!
//! A failed commit is either worth retrying later or never worth retrying.

use thiserror::Error;

/// Outcome of a failed remote commit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network, timeout, throttling, expired credentials, or a server fault.
    /// The event stays queued and is retried on the next drain.
    #[error("Transient remote error: {0}")]
    Transient(String),

    /// The remote store permanently refused the write (for example the
    /// referenced session no longer exists).
    #[error("Remote store rejected write: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a non-success HTTP status.
    ///
    /// Authentication failures count as transient: the credential can be
    /// refreshed without changing the event. A 404 is a rejection only when
    /// the body carries a database error raised by the function itself
    /// (`P0002` for an unknown session). PostgREST's own `PGRST*` codes, such
    /// as `PGRST202` for a missing function, and bare 404s from a proxy mean
    /// the endpoint is not deployed, which no event can fix.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };

        match status {
            401 | 403 | 408 | 425 | 429 => Self::Transient(message),
            404 => match database_error_code(body) {
                Some(code) if !code.starts_with("PGRST") => Self::Rejected(message),
                _ => Self::Transient(message),
            },
            400..=499 => Self::Rejected(message),
            _ => Self::Transient(message),
        }
    }
}

/// The `code` field of a PostgREST error body.
fn database_error_code(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("code")?.as_str().map(str::to_string)
}

/// Every client-side failure is transient. Builder errors (an unusable
/// header value or URL) happen before anything reaches the remote store,
/// so they say nothing about the event.
impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transient(e.to_string())
    }
}

/// Convenience Result type alias for remote writes.
pub type RemoteResult<T> = Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_faults_and_throttling_are_transient() {
        for status in [500, 502, 503, 504, 408, 429] {
            assert!(
                RemoteError::from_status(status, "").is_transient(),
                "status {status}"
            );
        }
    }

    #[test]
    fn auth_failures_are_transient() {
        assert!(RemoteError::from_status(401, "JWT expired").is_transient());
        assert!(RemoteError::from_status(403, "").is_transient());
    }

    #[test]
    fn client_errors_are_rejected() {
        for status in [400, 409, 422] {
            assert!(
                matches!(RemoteError::from_status(status, ""), RemoteError::Rejected(_)),
                "status {status}"
            );
        }
    }

    #[test]
    fn missing_function_is_transient() {
        let body = r#"{"code":"PGRST202","details":null,"hint":null,"message":"Could not find the function public.record_attendance"}"#;
        assert!(RemoteError::from_status(404, body).is_transient());
        assert!(RemoteError::from_status(404, "").is_transient());
        assert!(RemoteError::from_status(404, "<html>Not Found</html>").is_transient());
    }

    #[test]
    fn unknown_session_raised_by_function_is_rejected() {
        let body = r#"{"code":"P0002","details":null,"hint":null,"message":"session S9 not found"}"#;
        assert!(matches!(
            RemoteError::from_status(404, body),
            RemoteError::Rejected(_)
        ));
    }

    #[test]
    fn message_carries_status_and_body() {
        let err = RemoteError::from_status(409, "violates foreign key constraint");
        assert_eq!(
            err.to_string(),
            "Remote store rejected write: HTTP 409: violates foreign key constraint"
        );
        assert_eq!(
            RemoteError::from_status(503, "").to_string(),
            "Transient remote error: HTTP 503"
        );
    }
}
