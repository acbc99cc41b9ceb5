use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parse a date in YYYY-MM-DD format
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").ok()
}

/// Parse a time of day in HH:MM or HH:MM:SS format
pub fn parse_time_of_day(time_str: &str) -> Option<NaiveTime> {
    let time_str = time_str.trim();
    NaiveTime::parse_from_str(time_str, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time_str, "%H:%M:%S"))
        .ok()
}

/// Join a date and a time of day into the `dateTime` string sent alongside
/// `timeZone: "UTC"`
pub fn compose_timestamp(date_str: &str, time_str: &str) -> Result<String, String> {
    let date = parse_date(date_str).ok_or_else(|| format!("invalid date '{}'", date_str))?;
    let time = parse_time_of_day(time_str).ok_or_else(|| format!("invalid time '{}'", time_str))?;

    Ok(NaiveDateTime::new(date, time)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string())
}
