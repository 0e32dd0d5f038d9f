use crate::timeline::API_OFFSET;
use crate::ConfigError;
use chrono::{NaiveDate, NaiveDateTime};

/// Which side of the time window a bound describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Start,
    End,
}

/// Converts an operator-supplied time bound into the API timestamp form
///
/// Accepted inputs are `YYYY-MM-DD` and `YYYY-MM-DDTHH:MM:SS`; both are
/// interpreted in the API's fixed UTC+8 offset. A date-only end bound covers
/// the whole day and expands to its last millisecond. Every other form gets
/// zero milliseconds.
///
/// # Returns
///
/// * `Ok(None)` - The input was empty (unbounded)
/// * `Ok(Some(String))` - The bound, e.g. `2024-01-01T00:00:00.000+0800`
/// * `Err(ConfigError)` - The input matched neither accepted form
///
/// # Example
///
/// ```
/// use zsxq_harvest::timeline::{parse_time_arg, BoundKind};
///
/// let start = parse_time_arg("2024-01-01", BoundKind::Start).unwrap();
/// assert_eq!(start.as_deref(), Some("2024-01-01T00:00:00.000+0800"));
/// ```
pub fn parse_time_arg(input: &str, kind: BoundKind) -> Result<Option<String>, ConfigError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let time = match kind {
            BoundKind::Start => "00:00:00.000",
            BoundKind::End => "23:59:59.999",
        };
        return Ok(Some(format!(
            "{}T{}{}",
            date.format("%Y-%m-%d"),
            time,
            API_OFFSET
        )));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Some(format!(
            "{}.000{}",
            datetime.format("%Y-%m-%dT%H:%M:%S"),
            API_OFFSET
        )));
    }

    Err(ConfigError::InvalidTime(input.to_string()))
}
