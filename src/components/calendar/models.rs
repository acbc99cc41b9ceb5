use schemars::JsonSchema;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Largest reminder offset the calendar API accepts (four weeks)
pub const MAX_REMINDER_MINUTES: u32 = 40_320;

/// Event parameters as extracted by the assistant or sent by the client.
///
/// Every field is optional on the wire so that one malformed candidate only
/// fails its own entry in a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EventCandidate {
    /// Event title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Date of the event (YYYY-MM-DD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Start time (HH:MM, 24-hour clock, UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// End time (HH:MM, 24-hour clock, UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// RFC 5545 recurrence rule, e.g. "RRULE:FREQ=WEEKLY;COUNT=4"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
    /// Minutes before the start to show a popup reminder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Reminder>,
}

impl EventCandidate {
    /// Decode one raw batch entry; a mistyped field fails only this entry
    pub fn from_value(value: &serde_json::Value) -> Result<Self, String> {
        Self::deserialize(value).map_err(|e| format!("invalid event: {}", e))
    }
}

/// Reminder offset, accepted as a number or as a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Reminder {
    Minutes(f64),
    Text(String),
}

impl Reminder {
    /// Offset in minutes; `Ok(None)` when the value is blank
    pub fn minutes(&self) -> Result<Option<u32>, String> {
        let minutes = match self {
            Reminder::Text(text) if text.trim().is_empty() => return Ok(None),
            Reminder::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid reminder '{}'", text))?,
            Reminder::Minutes(minutes) => *minutes,
        };

        if !minutes.is_finite() || minutes < 0.0 || minutes.fract() != 0.0 {
            return Err(format!("invalid reminder '{}'", minutes));
        }
        if minutes > MAX_REMINDER_MINUTES as f64 {
            return Err(format!(
                "reminder of {} minutes exceeds the maximum of {}",
                minutes, MAX_REMINDER_MINUTES
            ));
        }

        Ok(Some(minutes as u32))
    }
}

/// Outcome for one candidate in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventCreationResult {
    Created { id: String, link: String },
    Failed { error: String },
}

impl EventCreationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, EventCreationResult::Created { .. })
    }
}

impl Serialize for EventCreationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EventCreationResult::Created { id, link } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("link", link)?;
                map.end()
            }
            EventCreationResult::Failed { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Body of a `POST /api/create-events` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateEventsResponse {
    pub success: bool,
    pub results: Vec<EventCreationResult>,
}

impl CreateEventsResponse {
    pub fn from_results(results: Vec<EventCreationResult>) -> Self {
        Self {
            success: results.iter().all(EventCreationResult::is_success),
            results,
        }
    }
}
