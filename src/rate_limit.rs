//! Rate limit hints parsed from a throttled response.
//!
//! The Petfinder API answers with 429 once the daily or per-second quota is
//! used up. The client never waits on its own: a rate limit ends a paginated
//! fetch with the pages collected so far. The hints below are kept so a caller
//! can decide when to come back.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Information extracted from rate limit headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// How long the server asked us to wait (`Retry-After`).
    pub retry_after: Option<Duration>,

    /// When the quota window resets (`X-RateLimit-Reset` / `RateLimit-Reset`).
    pub reset_at: Option<SystemTime>,

    /// Requests left in the current window (`X-RateLimit-Remaining`).
    pub remaining: Option<u64>,

    /// Size of the quota window (`X-RateLimit-Limit`).
    pub limit: Option<u64>,
}

impl RateLimitInfo {
    /// Extracts rate limit information from response headers.
    ///
    /// # Examples
    ///
    /// ```
    /// use petfinder_client::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    /// use std::time::Duration;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "60".parse().unwrap());
    /// headers.insert("x-ratelimit-limit", "1000".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.retry_after, Some(Duration::from_secs(60)));
    /// assert_eq!(info.limit, Some(1000));
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            retry_after: retry_after(headers),
            reset_at: header_u64(headers, &["x-ratelimit-reset", "ratelimit-reset"])
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
            remaining: header_u64(headers, &["x-ratelimit-remaining", "ratelimit-remaining"]),
            limit: header_u64(headers, &["x-ratelimit-limit", "ratelimit-limit"]),
        }
    }

    /// Returns how long to wait before the quota is available again, if known.
    ///
    /// `Retry-After` wins over the reset timestamp.
    pub fn wait_hint(&self) -> Option<Duration> {
        self.retry_after.or_else(|| {
            self.reset_at
                .and_then(|reset| reset.duration_since(SystemTime::now()).ok())
        })
    }

    /// Returns `true` if no hint at all was present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `Retry-After` is either delay-seconds or an HTTP date.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;

    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    httpdate::parse_http_date(value)
        .ok()
        .map(|at| at.duration_since(SystemTime::now()).unwrap_or_default())
}

/// First header among `names` that parses as an integer.
fn header_u64(headers: &HeaderMap, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| {
        headers
            .get(*name)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    })
}
