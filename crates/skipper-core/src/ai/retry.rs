//! Retry policy for completion requests
//!
//! Up to 7 attempts. Backoff doubles from a 2-second base and is clamped at
//! 8 seconds; a server-provided `Retry-After` (seconds or HTTP-date) replaces
//! the computed delay, under the same clamp.

use std::time::Duration;

use crate::constants::retry::{BASE_RETRY_DELAY, MAX_RETRY_DELAY};

/// Statuses worth retrying: request timeout, rate limiting, gateway trouble,
/// and anything in the 5xx band.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 502 | 503 | 504) || (500..600).contains(&status)
}

/// Delay before the retry following `attempt` (1-based).
pub fn retry_delay_for_attempt(attempt: u32) -> Duration {
    let factor = 1u32 << (attempt - 1).min(31);
    BASE_RETRY_DELAY
        .checked_mul(factor)
        .map(|d| d.min(MAX_RETRY_DELAY))
        .unwrap_or(MAX_RETRY_DELAY)
}

/// Parse a `Retry-After` header value.
///
/// Accepts an integer number of seconds or an HTTP-date. Non-positive delays
/// are treated as absent; everything is clamped at the retry ceiling.
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let v = header_value.trim();
    if v.is_empty() {
        return None;
    }

    if let Ok(seconds) = v.parse::<i64>() {
        if seconds <= 0 {
            return None;
        }
        return Some(Duration::from_secs(seconds as u64).min(MAX_RETRY_DELAY));
    }

    if let Ok(date) = httpdate::parse_http_date(v) {
        let delay = date.duration_since(std::time::SystemTime::now()).ok()?;
        if delay.is_zero() {
            return None;
        }
        return Some(delay.min(MAX_RETRY_DELAY));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::retry::MAX_REQUEST_ATTEMPTS;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(408));
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(502));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(504));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(599));
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn backoff_schedule_is_2_4_8_capped() {
        let secs: Vec<u64> = (1..MAX_REQUEST_ATTEMPTS)
            .map(|a| retry_delay_for_attempt(a).as_secs())
            .collect();
        assert_eq!(secs, vec![2, 4, 8, 8, 8, 8]);
    }

    #[test]
    fn retry_after_seconds_clamped() {
        assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(8)));
        assert_eq!(parse_retry_after("0"), None);
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after(""), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn retry_after_http_date() {
        let future = std::time::SystemTime::now() + Duration::from_secs(120);
        let header = httpdate::fmt_http_date(future);
        let parsed = parse_retry_after(&header).unwrap();
        assert_eq!(parsed, Duration::from_secs(8));

        let past = std::time::SystemTime::now() - Duration::from_secs(60);
        assert_eq!(parse_retry_after(&httpdate::fmt_http_date(past)), None);
    }
}
