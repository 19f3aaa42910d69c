#![allow(clippy::expect_used, reason = "Static patterns are exercised by the parser tests")]

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::{DelaySource, RetryDelay};

static SECONDS_REGEX: OnceLock<Regex> = OnceLock::new();
static NEGATIVE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Obsolete HTTP-date forms still accepted by recipients (RFC 9110 §5.6.7).
const RFC850_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

fn get_seconds_regex() -> &'static Regex {
    SECONDS_REGEX.get_or_init(|| Regex::new(r"^\d+$").expect("Seconds regex is valid"))
}

fn get_negative_regex() -> &'static Regex {
    NEGATIVE_REGEX.get_or_init(|| Regex::new(r"^-\d+$").expect("Negative regex is valid"))
}

/// Parse a `Retry-After` header value relative to `now`.
///
/// Accepts delta-seconds and the three HTTP-date forms. Negative integers
/// and anything else yield `None`; dates in the past yield a zero delay.
pub fn parse_retry_after_at(value: Option<&str>, now: DateTime<Utc>) -> Option<RetryDelay> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }

    if get_seconds_regex().is_match(raw) {
        // All-digit input only fails to parse on overflow
        let seconds = raw.parse::<u64>().unwrap_or(u64::MAX);
        return Some(RetryDelay { delay_ms: seconds.saturating_mul(1000), source: DelaySource::HeaderSeconds });
    }

    if get_negative_regex().is_match(raw) {
        debug!(value = %raw, "Ignoring negative Retry-After");
        return None;
    }

    match parse_http_date(raw) {
        Some(at) => {
            let delta = at.signed_duration_since(now).num_milliseconds();
            let delay_ms = u64::try_from(delta).unwrap_or(0);
            Some(RetryDelay { delay_ms, source: DelaySource::HeaderDate })
        },
        None => {
            debug!(value = %raw, "Retry-After unparseable, falling back to exponential backoff");
            None
        },
    }
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    [RFC850_FORMAT, ASCTIME_FORMAT]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
