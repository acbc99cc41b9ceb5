use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::body::EventBody;
use crate::error::{config_error, AppResult};

/// The part of the calendar API's event resource we report back
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedEvent {
    pub id: Option<String>,
    pub html_link: Option<String>,
}

/// Failure of a single remote calendar call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("Calendar API rejected the credentials: HTTP {status} - {body}")]
    Unauthorized { status: u16, body: String },

    #[error("Event already exists")]
    Conflict,

    #[error("{0}")]
    Transient(String),

    #[error("Calendar API error: HTTP {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to send calendar request: {0}")]
    Request(String),

    #[error("Failed to parse calendar response: {0}")]
    Decode(String),
}

impl CalendarError {
    /// Worth retrying when the request carries a dedup id
    pub fn is_transient(&self) -> bool {
        matches!(self, CalendarError::Transient(_))
    }
}

/// Remote calendar service
#[async_trait]
pub trait CalendarApi: Send + Sync + 'static {
    /// Insert an event into a calendar
    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<InsertedEvent, CalendarError>;

    /// Fetch an event by id
    async fn get_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<InsertedEvent, CalendarError>;
}

/// Google Calendar v3 over plain REST
pub struct GoogleCalendarApi {
    client: Client,
    base_url: Url,
}

impl GoogleCalendarApi {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| config_error(&format!("Invalid calendar API base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(config_error("Calendar API base URL cannot be a base"));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["calendars", calendar_id, "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        url
    }

    async fn read_event(response: reqwest::Response) -> Result<InsertedEvent, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<InsertedEvent>()
                .await
                .map_err(|e| CalendarError::Decode(e.to_string()));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        Err(classify_status(status, body))
    }
}

fn classify_status(status: StatusCode, body: String) -> CalendarError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CalendarError::Unauthorized {
            status: status.as_u16(),
            body,
        },
        StatusCode::CONFLICT => CalendarError::Conflict,
        StatusCode::TOO_MANY_REQUESTS => {
            CalendarError::Transient(format!("Calendar API error: HTTP {} - {}", status, body))
        }
        s if s.is_server_error() => {
            CalendarError::Transient(format!("Calendar API error: HTTP {} - {}", status, body))
        }
        _ => CalendarError::Rejected {
            status: status.as_u16(),
            body,
        },
    }
}

fn classify_send_error(err: reqwest::Error) -> CalendarError {
    if err.is_timeout() || err.is_connect() {
        CalendarError::Transient(format!("Calendar API unreachable: {}", err))
    } else {
        CalendarError::Request(err.to_string())
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarApi {
    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<InsertedEvent, CalendarError> {
        let response = self
            .client
            .post(self.events_url(calendar_id, None))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(classify_send_error)?;

        Self::read_event(response).await
    }

    async fn get_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<InsertedEvent, CalendarError> {
        let response = self
            .client
            .get(self.events_url(calendar_id, Some(event_id)))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(classify_send_error)?;

        Self::read_event(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_url() {
        let api = GoogleCalendarApi::new(
            "https://www.googleapis.com/calendar/v3/",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            api.events_url("primary", None).as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/primary/events"
        );
        assert_eq!(
            api.events_url("team@group.calendar.google.com", Some("abc")).as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@group.calendar.google.com/events/abc"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert_eq!(
            classify_status(StatusCode::CONFLICT, String::new()),
            CalendarError::Conflict
        );
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new()),
            CalendarError::Unauthorized { status: 401, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad".to_string()),
            CalendarError::Rejected { status: 400, .. }
        ));
    }
}
