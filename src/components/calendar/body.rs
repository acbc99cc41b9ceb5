use serde::Serialize;

use super::models::EventCandidate;
use super::time::compose_timestamp;

pub const EVENT_TIME_ZONE: &str = "UTC";

/// Request body for the calendar API's event insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    /// Client-chosen id, only set when inserts may be retried
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub summary: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Reminders>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    pub overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderOverride {
    pub method: String,
    pub minutes: u32,
}

impl EventDateTime {
    fn utc(date_time: String) -> Self {
        Self {
            date_time,
            time_zone: EVENT_TIME_ZONE.to_string(),
        }
    }
}

impl EventBody {
    /// Shape the insert body for one candidate
    pub fn from_candidate(candidate: &EventCandidate) -> Result<Self, String> {
        let title = required(&candidate.title, "title")?;
        let date = required(&candidate.date, "date")?;
        let start_time = required(&candidate.start_time, "start_time")?;
        let end_time = required(&candidate.end_time, "end_time")?;

        let start = compose_timestamp(date, start_time)?;
        let end = compose_timestamp(date, end_time)?;

        let recurrence = candidate
            .recurrence
            .as_ref()
            .filter(|rule| !rule.trim().is_empty())
            .map(|rule| vec![rule.clone()]);

        let reminders = match &candidate.reminder {
            Some(reminder) => reminder.minutes()?.map(|minutes| Reminders {
                use_default: false,
                overrides: vec![ReminderOverride {
                    method: "popup".to_string(),
                    minutes,
                }],
            }),
            None => None,
        };

        Ok(Self {
            id: None,
            summary: title.to_string(),
            start: EventDateTime::utc(start),
            end: EventDateTime::utc(end),
            recurrence,
            reminders,
        })
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, String> {
    field
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("missing field '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::calendar::models::Reminder;
    use serde_json::json;

    fn candidate() -> EventCandidate {
        EventCandidate {
            title: Some("Standup".to_string()),
            date: Some("2024-01-01".to_string()),
            start_time: Some("09:00".to_string()),
            end_time: Some("09:15".to_string()),
            ..Default::default()
        }
    }

    /// Absent recurrence and reminder leave no trace in the body
    #[test]
    fn test_minimal_body() {
        let body = EventBody::from_candidate(&candidate()).unwrap();

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "summary": "Standup",
                "start": {"dateTime": "2024-01-01T09:00:00", "timeZone": "UTC"},
                "end": {"dateTime": "2024-01-01T09:15:00", "timeZone": "UTC"}
            })
        );
    }

    #[test]
    fn test_recurrence_and_reminder() {
        let mut candidate = candidate();
        candidate.recurrence = Some("RRULE:FREQ=WEEKLY;BYDAY=MO".to_string());
        candidate.reminder = Some(Reminder::Minutes(10.0));

        let value = serde_json::to_value(EventBody::from_candidate(&candidate).unwrap()).unwrap();

        assert_eq!(value["recurrence"], json!(["RRULE:FREQ=WEEKLY;BYDAY=MO"]));
        assert_eq!(
            value["reminders"],
            json!({"useDefault": false, "overrides": [{"method": "popup", "minutes": 10}]})
        );
    }

    /// Blank values count as absent rather than producing empty placeholders
    #[test]
    fn test_blank_optionals_are_omitted() {
        let mut candidate = candidate();
        candidate.recurrence = Some("  ".to_string());
        candidate.reminder = Some(Reminder::Text(String::new()));

        let value = serde_json::to_value(EventBody::from_candidate(&candidate).unwrap()).unwrap();

        assert!(value.get("recurrence").is_none());
        assert!(value.get("reminders").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let mut missing = candidate();
        missing.end_time = None;
        assert_eq!(
            EventBody::from_candidate(&missing),
            Err("missing field 'end_time'".to_string())
        );

        let mut bad_time = candidate();
        bad_time.start_time = Some("bad".to_string());
        assert_eq!(
            EventBody::from_candidate(&bad_time),
            Err("invalid time 'bad'".to_string())
        );

        let mut bad_reminder = candidate();
        bad_reminder.reminder = Some(Reminder::Text("later".to_string()));
        assert!(EventBody::from_candidate(&bad_reminder).is_err());
    }
}
