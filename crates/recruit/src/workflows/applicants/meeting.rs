use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("calendar request failed: {0}")]
    Transport(String),
    #[error("calendar provider answered with status {0}")]
    Status(u16),
    #[error("calendar response is missing a meeting link")]
    MissingLink,
}

/// Issues video-meeting links. The token is passed through untouched.
#[async_trait]
pub trait CalendarProvider: Send + Sync + 'static {
    async fn issue_meeting_url(
        &self,
        token: &str,
        title: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, CalendarError>;
}

/// Calendar REST client creating an event with an attached conference.
#[derive(Debug, Clone)]
pub struct HttpCalendarProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedEvent {
    hangout_link: Option<String>,
}

impl HttpCalendarProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|err| CalendarError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

fn request_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[async_trait]
impl CalendarProvider for HttpCalendarProvider {
    async fn issue_meeting_url(
        &self,
        token: &str,
        title: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, CalendarError> {
        let url = format!("{}/calendars/primary/events", self.base_url);
        let body = json!({
            "summary": title,
            "start": { "dateTime": start.to_rfc3339() },
            "end": { "dateTime": end.to_rfc3339() },
            "conferenceData": {
                "createRequest": {
                    "requestId": request_id(),
                    "conferenceSolutionKey": { "type": "hangoutsMeet" }
                }
            }
        });

        debug!(%url, "creating calendar event");
        let response = self
            .client
            .post(&url)
            .query(&[("conferenceDataVersion", "1")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| CalendarError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "calendar provider rejected event");
            return Err(CalendarError::Status(status.as_u16()));
        }

        let event: CreatedEvent = response
            .json()
            .await
            .map_err(|err| CalendarError::Transport(err.to_string()))?;
        event.hangout_link.ok_or(CalendarError::MissingLink)
    }
}
