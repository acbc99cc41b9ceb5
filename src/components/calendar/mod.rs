pub mod api;
pub mod body;
pub mod models;
pub mod time;

pub use api::{CalendarApi, CalendarError, GoogleCalendarApi, InsertedEvent};
pub use body::EventBody;
pub use models::{CreateEventsResponse, EventCandidate, EventCreationResult, Reminder};

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::components::session::TokenBundle;
use crate::config::Config;
use crate::error::{AppResult, Error};

/// Base delay between insert retries, doubled per attempt
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Turns event candidates into calendar inserts, one independent call each
pub struct EventRequestBuilder {
    api: Arc<dyn CalendarApi>,
    calendar_id: String,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl EventRequestBuilder {
    pub fn new(api: Arc<dyn CalendarApi>, config: &Config) -> Self {
        Self {
            api,
            calendar_id: config.calendar_id.clone(),
            timeout: config.request_timeout,
            retries: config.insert_retries,
            backoff: RETRY_BACKOFF,
        }
    }

    /// Override the retry backoff base delay
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Create every candidate in order. Credentials and input are checked up
    /// front; after that a failing candidate never stops the others.
    pub async fn create_events(
        &self,
        credentials: Option<&TokenBundle>,
        candidates: &[EventCandidate],
    ) -> AppResult<CreateEventsResponse> {
        let credentials = Self::authorize(credentials, candidates.len())?;
        let items = candidates.iter().cloned().map(Ok).collect();
        Ok(self.create_all(credentials, items).await)
    }

    /// Like [`Self::create_events`], for raw request entries. An entry that
    /// does not decode becomes a failed result at its own position.
    pub async fn create_events_from_json(
        &self,
        credentials: Option<&TokenBundle>,
        entries: &[Value],
    ) -> AppResult<CreateEventsResponse> {
        let credentials = Self::authorize(credentials, entries.len())?;
        let items = entries.iter().map(EventCandidate::from_value).collect();
        Ok(self.create_all(credentials, items).await)
    }

    fn authorize(credentials: Option<&TokenBundle>, count: usize) -> AppResult<&TokenBundle> {
        let credentials = credentials.ok_or(Error::AuthRequired)?;
        if count == 0 {
            return Err(Error::EmptyInput("No events provided".to_string()));
        }
        Ok(credentials)
    }

    async fn create_all(
        &self,
        credentials: &TokenBundle,
        items: Vec<Result<EventCandidate, String>>,
    ) -> CreateEventsResponse {
        let total = items.len();
        let mut results = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let outcome = match item {
                Ok(candidate) => self.create_one(&credentials.access_token, &candidate).await,
                Err(error) => Err(error),
            };
            let result = match outcome {
                Ok(event) => EventCreationResult::Created {
                    id: event.id.unwrap_or_else(|| "unknown".to_string()),
                    link: event.html_link.unwrap_or_default(),
                },
                Err(error) => {
                    warn!("Event {} of {} failed: {}", index + 1, total, error);
                    EventCreationResult::Failed { error }
                }
            };
            results.push(result);
        }

        let response = CreateEventsResponse::from_results(results);
        info!(
            "Created {} of {} events",
            response.results.iter().filter(|r| r.is_success()).count(),
            total
        );

        response
    }

    async fn create_one(
        &self,
        access_token: &str,
        candidate: &EventCandidate,
    ) -> Result<InsertedEvent, String> {
        let mut body = EventBody::from_candidate(candidate)?;
        if self.retries > 0 {
            body.id = Some(dedup_id());
        }

        self.submit(access_token, &body)
            .await
            .map_err(|e| e.to_string())
    }

    async fn submit(&self, access_token: &str, body: &EventBody) -> Result<InsertedEvent, CalendarError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self
                .bounded(self.api.insert_event(access_token, &self.calendar_id, body))
                .await;

            match (outcome, body.id.as_deref()) {
                (Ok(event), _) => return Ok(event),
                // An earlier attempt went through after all
                (Err(CalendarError::Conflict), Some(event_id)) if attempt > 0 => {
                    return self
                        .bounded(self.api.get_event(access_token, &self.calendar_id, event_id))
                        .await;
                }
                (Err(error), Some(_)) if error.is_transient() && attempt < self.retries => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    warn!("Retrying event insert in {:?}: {}", delay, error);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                (Err(error), _) => return Err(error),
            }
        }
    }

    async fn bounded<F>(&self, call: F) -> Result<InsertedEvent, CalendarError>
    where
        F: Future<Output = Result<InsertedEvent, CalendarError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CalendarError::Transient(format!(
                "Calendar request timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

/// Client-side event id; lowercase hex is valid base32hex for the API
fn dedup_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::session::models::sample_bundle;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted calendar: pops one outcome per insert call
    #[derive(Default)]
    struct ScriptedCalendar {
        outcomes: Mutex<Vec<Result<InsertedEvent, CalendarError>>>,
        bodies: Mutex<Vec<EventBody>>,
        delay: Option<Duration>,
    }

    impl ScriptedCalendar {
        fn new(mut outcomes: Vec<Result<InsertedEvent, CalendarError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CalendarApi for ScriptedCalendar {
        async fn insert_event(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            body: &EventBody,
        ) -> Result<InsertedEvent, CalendarError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.bodies.lock().unwrap().push(body.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(CalendarError::Request("script exhausted".to_string())))
        }

        async fn get_event(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            event_id: &str,
        ) -> Result<InsertedEvent, CalendarError> {
            Ok(InsertedEvent {
                id: Some(event_id.to_string()),
                html_link: Some(format!("https://calendar.google.com/event?eid={}", event_id)),
            })
        }
    }

    fn candidate(title: &str) -> EventCandidate {
        EventCandidate {
            title: Some(title.to_string()),
            date: Some("2024-01-01".to_string()),
            start_time: Some("09:00".to_string()),
            end_time: Some("10:00".to_string()),
            ..Default::default()
        }
    }

    fn builder(api: Arc<ScriptedCalendar>, retries: u32) -> EventRequestBuilder {
        let mut config = Config::for_tests();
        config.insert_retries = retries;
        config.request_timeout = Duration::from_millis(200);
        EventRequestBuilder::new(api, &config).with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_requires_credentials_before_anything_else() {
        let api = Arc::new(ScriptedCalendar::default());
        let result = builder(api.clone(), 0).create_events(None, &[candidate("A")]).await;

        assert!(matches!(result, Err(Error::AuthRequired)));
        assert!(api.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let api = Arc::new(ScriptedCalendar::default());
        let bundle = sample_bundle();
        let result = builder(api, 0).create_events(Some(&bundle), &[]).await;

        assert!(matches!(result, Err(Error::EmptyInput(_))));
    }

    /// Failures stay in place; nothing is dropped or reordered
    #[tokio::test]
    async fn test_partial_failure_keeps_order() {
        let api = Arc::new(ScriptedCalendar::new(vec![
            Ok(InsertedEvent {
                id: Some("a1".to_string()),
                html_link: None,
            }),
            Err(CalendarError::Rejected {
                status: 400,
                body: "bad request".to_string(),
            }),
            Ok(InsertedEvent::default()),
        ]));
        let bundle = sample_bundle();
        let mut bad = candidate("C");
        bad.start_time = Some("bad".to_string());

        let response = builder(api.clone(), 0)
            .create_events(
                Some(&bundle),
                &[candidate("A"), candidate("B"), bad, candidate("D")],
            )
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(
            response.results,
            vec![
                EventCreationResult::Created {
                    id: "a1".to_string(),
                    link: String::new()
                },
                EventCreationResult::Failed {
                    error: "Calendar API error: HTTP 400 - bad request".to_string()
                },
                EventCreationResult::Failed {
                    error: "invalid time 'bad'".to_string()
                },
                EventCreationResult::Created {
                    id: "unknown".to_string(),
                    link: String::new()
                },
            ]
        );
        // The malformed candidate never reached the API
        assert_eq!(api.bodies.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_slow_call_becomes_item_error() {
        let api = Arc::new(ScriptedCalendar {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let bundle = sample_bundle();

        let response = builder(api, 0)
            .create_events(Some(&bundle), &[candidate("A")])
            .await
            .unwrap();

        assert!(!response.success);
        assert!(matches!(
            &response.results[0],
            EventCreationResult::Failed { error } if error.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_no_retry_without_dedup_id() {
        let api = Arc::new(ScriptedCalendar::new(vec![
            Err(CalendarError::Transient("HTTP 503".to_string())),
            Ok(InsertedEvent::default()),
        ]));
        let bundle = sample_bundle();

        let response = builder(api.clone(), 0)
            .create_events(Some(&bundle), &[candidate("A")])
            .await
            .unwrap();

        assert!(!response.success);
        let bodies = api.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].id.is_none());
    }

    /// Retries reuse one dedup id, and a conflict means the first try landed
    #[tokio::test]
    async fn test_retry_recovers_from_conflict() {
        let api = Arc::new(ScriptedCalendar::new(vec![
            Err(CalendarError::Transient("HTTP 503".to_string())),
            Err(CalendarError::Conflict),
        ]));
        let bundle = sample_bundle();

        let response = builder(api.clone(), 2)
            .create_events(Some(&bundle), &[candidate("A")])
            .await
            .unwrap();

        assert!(response.success);
        let bodies = api.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        let id = bodies[0].id.clone().unwrap();
        assert_eq!(bodies[1].id.as_deref(), Some(id.as_str()));
        assert_eq!(
            response.results[0],
            EventCreationResult::Created {
                id: id.clone(),
                link: format!("https://calendar.google.com/event?eid={}", id),
            }
        );
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let api = Arc::new(ScriptedCalendar::new(vec![
            Err(CalendarError::Transient("HTTP 503".to_string())),
            Err(CalendarError::Transient("HTTP 503".to_string())),
            Err(CalendarError::Transient("HTTP 503".to_string())),
            Ok(InsertedEvent::default()),
        ]));
        let bundle = sample_bundle();

        let response = builder(api.clone(), 2)
            .create_events(Some(&bundle), &[candidate("A")])
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(api.bodies.lock().unwrap().len(), 3);
    }

    /// A mistyped entry fails alone and the rest of the batch still runs
    #[tokio::test]
    async fn test_raw_entries_fail_individually() {
        let api = Arc::new(ScriptedCalendar::new(vec![Ok(InsertedEvent {
            id: Some("a1".to_string()),
            html_link: Some("link".to_string()),
        })]));
        let bundle = sample_bundle();
        let entries = vec![
            serde_json::json!({"title": "A", "date": "2024-01-01", "start_time": "09:00", "end_time": "10:00"}),
            serde_json::json!({"title": "B", "date": "2024-01-01", "start_time": "09:00", "end_time": "10:00", "reminder": true}),
        ];

        let response = builder(api.clone(), 0)
            .create_events_from_json(Some(&bundle), &entries)
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(
            response.results[0],
            EventCreationResult::Created {
                id: "a1".to_string(),
                link: "link".to_string()
            }
        );
        assert!(matches!(
            &response.results[1],
            EventCreationResult::Failed { error } if error.starts_with("invalid event: ")
        ));
        assert_eq!(api.bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_raw_entries_check_credentials_first() {
        let api = Arc::new(ScriptedCalendar::default());
        let result = builder(api, 0).create_events_from_json(None, &[]).await;

        assert!(matches!(result, Err(Error::AuthRequired)));
    }
}
