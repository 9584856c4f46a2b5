//! Duration-string parsing, grounded on the teacher's regex-backed
//! `SimpleParam` value patterns (`settings/option/*` parse things like
//! throttle rates and durations the same way: one compiled regex, one
//! capture-group walk).

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DURATION_RE: Regex = Regex::new(
        r"^(?:(\d+)w)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?(?:(\d+)us)?$"
    )
    .expect("duration regex is valid");
}

/// Parses the grammar `(\d+w)?(\d+d)?(\d+h)?(\d+m)?(\d+s)?(\d+ms)?(\d+us)?`,
/// where every part is optional but at least one must be present.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let Some(captures) = DURATION_RE.captures(input) else {
        return Err(format!("invalid duration string: {input:?}"));
    };

    if captures.iter().skip(1).all(|c| c.is_none()) {
        return Err(format!("duration string has no components: {input:?}"));
    }

    let part = |idx: usize| -> u64 {
        captures
            .get(idx)
            .map(|m| m.as_str().parse::<u64>().expect("regex guarantees digits"))
            .unwrap_or(0)
    };

    let weeks = part(1);
    let days = part(2);
    let hours = part(3);
    let minutes = part(4);
    let seconds = part(5);
    let millis = part(6);
    let micros = part(7);

    let total_seconds = ((weeks * 7 + days) * 24 + hours) * 3600 + minutes * 60 + seconds;
    Ok(Duration::from_secs(total_seconds) + Duration::from_millis(millis) + Duration::from_micros(micros))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_only() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parses_compound_duration() {
        assert_eq!(
            parse_duration("1h30m").unwrap(),
            Duration::from_secs(3600 + 30 * 60)
        );
    }

    #[test]
    fn parses_milliseconds_and_microseconds() {
        assert_eq!(
            parse_duration("500ms").unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
    }

    #[test]
    fn rejects_empty_string() {
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("not a duration").is_err());
    }
}
