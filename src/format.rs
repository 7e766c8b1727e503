//! Display helpers shared by the dashboard and review screens.

use chrono::{DateTime, TimeZone};

/// Render a timestamp as `15 Jan 2024, 02:45 pm`.
///
/// The value is rendered in whatever zone it carries; convert beforehand to
/// show local time.
pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let date = at.format("%d %b %Y");
    let time = at.format("%I:%M %p").to_string().to_lowercase();
    format!("{}, {}", date, time)
}

/// First word of a station name, used in compact preview rows.
pub fn short_station_name(station_name: &str) -> &str {
    station_name.split_whitespace().next().unwrap_or("")
}
