//! Supabase REST adapter for attendance writes.

use crate::{RemoteError, RemoteResult, RemoteWriteAdapter};
use async_trait::async_trait;
use attendance_queue::AttendanceMark;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Remote function that inserts one attendance row keyed on `event_key` and
/// bumps the session's attendee count in the same transaction. A repeated
/// key inserts nothing and leaves the count alone; the function returns
/// whether the row was new.
const RECORD_FUNCTION: &str = "record_attendance";

/// Arguments for the `record_attendance` remote function.
#[derive(Debug, Serialize)]
pub struct RecordAttendanceArgs<'a> {
    pub p_event_key: Uuid,
    pub p_session_id: &'a str,
    pub p_member_id: &'a str,
    pub p_member_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_member_department: Option<&'a str>,
    pub p_marked_at: DateTime<Utc>,
}

impl<'a> From<&'a AttendanceMark> for RecordAttendanceArgs<'a> {
    fn from(mark: &'a AttendanceMark) -> Self {
        Self {
            p_event_key: mark.event_key,
            p_session_id: &mark.session_id,
            p_member_id: &mark.member_id,
            p_member_name: &mark.member_name,
            p_member_department: mark.member_department.as_deref(),
            p_marked_at: mark.marked_at,
        }
    }
}

/// Supabase REST client that commits attendance marks.
///
/// Only the interactive context holds an access token. Without one every
/// commit fails as transient and the mark stays queued.
#[derive(Clone)]
pub struct SupabaseAttendanceClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseAttendanceClient {
    /// Create a client.
    ///
    /// * `api_url` - project API URL (e.g. `https://xyz.supabase.co`)
    /// * `anon_key` - public API key
    /// * `timeout` - bound on one whole commit request
    pub fn new(
        api_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        let api_url: String = api_url.into();

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Replace (or clear) the bearer credential.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.read().is_some()
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.api_url, function)
    }

    async fn check_response(&self, response: reqwest::Response) -> RemoteResult<String> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let err = RemoteError::from_status(status.as_u16(), &body);
            match &err {
                RemoteError::Rejected(_) => {
                    error!(status = status.as_u16(), body = %body, "Remote store rejected attendance write")
                }
                RemoteError::Transient(_) => {
                    warn!(status = status.as_u16(), body = %body, "Remote store request failed")
                }
            }
            return Err(err);
        }
        Ok(body)
    }
}

#[async_trait]
impl RemoteWriteAdapter for SupabaseAttendanceClient {
    async fn commit(&self, mark: &AttendanceMark) -> RemoteResult<()> {
        let token = self.access_token.read().clone();
        let Some(access_token) = token else {
            return Err(RemoteError::Transient(
                "no access token available".to_string(),
            ));
        };

        let args = RecordAttendanceArgs::from(mark);
        debug!(
            event_key = %mark.event_key,
            session_id = %mark.session_id,
            member_id = %mark.member_id,
            "Committing attendance mark"
        );

        let response = self
            .http_client
            .post(self.rpc_url(RECORD_FUNCTION))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&args)
            .send()
            .await?;

        let body = self.check_response(response).await?;
        let inserted = parse_inserted(&body);

        debug!(
            event_key = %mark.event_key,
            inserted = ?inserted,
            "Attendance mark committed"
        );
        Ok(())
    }
}

/// Read the function's boolean result. `None` when the body is not a bool.
fn parse_inserted(body: &str) -> Option<bool> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.as_bool())
}

impl std::fmt::Debug for SupabaseAttendanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseAttendanceClient")
            .field("api_url", &self.api_url)
            .field("has_access_token", &self.has_access_token())
            .finish_non_exhaustive()
    }
}
