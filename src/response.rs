//! Response types: what a transport returns and what the client hands back.
//!
//! [`RawResponse`] is the transport-level result: a status code, headers and the
//! body parsed as JSON. [`ResultEnvelope`] is one successfully fetched payload
//! tagged with its [`ResourceKind`]. [`BatchEntry`] is one item of a lookup by
//! id list.

use crate::flatten::ZeroOrMore;
use crate::normalize::{Generation, ResourceKind};
use crate::paginate::PageCursor;
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// A single HTTP response as returned by a [`Transport`](crate::transport::Transport).
///
/// Non-2xx responses are not errors at this level; the client classifies
/// them with [`Error::from_response`](crate::Error::from_response).
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The body parsed as JSON, or `Value::Null` if it is not valid JSON.
    pub body: Value,

    /// The raw response body.
    pub raw_body: String,

    /// Time from sending the request until the full body was read.
    pub latency: Duration,
}

impl RawResponse {
    /// Creates a `RawResponse`, parsing `raw_body` as JSON.
    pub fn new(status: StatusCode, headers: HeaderMap, raw_body: String, latency: Duration) -> Self {
        let body = serde_json::from_str(&raw_body).unwrap_or(Value::Null);
        Self {
            status,
            headers,
            body,
            raw_body,
            latency,
        }
    }

    /// Creates a `RawResponse` from an already-parsed JSON body.
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            raw_body: body.to_string(),
            body,
            latency: Duration::ZERO,
        }
    }

    /// Returns the status the payload itself reports, if any.
    ///
    /// Current error documents carry a numeric top-level `status`. Legacy
    /// documents carry `petfinder.header.status.code.$t`, which is mapped onto
    /// the equivalent HTTP status.
    pub fn payload_status(&self) -> Option<StatusCode> {
        if let Some(code) = self.body.get("status").and_then(Value::as_u64) {
            return u16::try_from(code)
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok());
        }

        let code = self
            .body
            .pointer("/petfinder/header/status/code/$t")
            .and_then(scalar_u64)?;

        let mapped = match code {
            100 => StatusCode::OK,
            200 => StatusCode::BAD_REQUEST,
            201 => StatusCode::NOT_FOUND,
            202 => StatusCode::TOO_MANY_REQUESTS,
            203 => StatusCode::FORBIDDEN,
            300 => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Some(mapped)
    }

    /// The status used for classification.
    ///
    /// A non-2xx HTTP status always wins; a 2xx response defers to the payload
    /// status when one is present.
    pub fn effective_status(&self) -> StatusCode {
        if self.status.is_success() {
            self.payload_status().unwrap_or(self.status)
        } else {
            self.status
        }
    }

    /// Returns `true` if the response is a usable success.
    pub fn is_success(&self) -> bool {
        self.effective_status().is_success()
    }

    /// The most specific human-readable message in the body.
    pub fn detail(&self) -> String {
        [
            "/detail",
            "/title",
            "/error_description",
            "/message",
            "/petfinder/header/status/message/$t",
        ]
        .iter()
        .find_map(|pointer| self.body.pointer(pointer).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| self.raw_body.clone())
    }

    /// Parameter names listed in a 400 response's `invalid-params`.
    pub fn invalid_params(&self) -> Vec<String> {
        self.body
            .get("invalid-params")
            .and_then(Value::as_array)
            .map(|params| {
                params
                    .iter()
                    .filter_map(|p| p.get("path").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

/// One fetched payload for a known resource kind.
///
/// Envelopes are transient: the paginator collects their records and the
/// normalizer turns them into rows.
#[derive(Debug, Clone)]
pub struct ResultEnvelope {
    /// Which resource shape the body holds.
    pub kind: ResourceKind,

    /// The HTTP status of the successful attempt.
    pub status: StatusCode,

    /// The parsed body.
    pub body: Value,

    /// Attempts needed to fetch this payload.
    pub attempts: usize,

    /// Latency of the successful attempt.
    pub latency: Duration,
}

impl ResultEnvelope {
    /// The records this payload carries, in server order.
    pub fn records(&self) -> ZeroOrMore<Value> {
        self.kind.records(&self.body)
    }

    /// The paging position reported by this payload, if any.
    pub fn cursor(&self) -> Option<PageCursor> {
        PageCursor::from_body(&self.body)
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}

/// Outcome of looking up one id.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The record as returned by the server.
    Found(Value),
    /// The server reported the id as unknown.
    NotFound,
}

/// One item of a lookup by id list.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// The id that was requested.
    pub id: String,

    /// The status the server answered with for this id.
    pub status: StatusCode,

    /// The API generation of the payload the record came from.
    pub generation: Generation,

    /// The record, or the not-found sentinel.
    pub lookup: Lookup,
}

impl BatchEntry {
    /// Returns the record if it was found.
    pub fn record(&self) -> Option<&Value> {
        match &self.lookup {
            Lookup::Found(record) => Some(record),
            Lookup::NotFound => None,
        }
    }

    /// Returns `true` if the id was unknown to the server.
    pub fn is_not_found(&self) -> bool {
        self.lookup == Lookup::NotFound
    }
}

/// Legacy documents encode numbers as strings.
pub(crate) fn scalar_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_json_body_is_kept_raw() {
        let response = RawResponse::new(
            StatusCode::BAD_GATEWAY,
            HeaderMap::new(),
            "<html>bad gateway</html>".to_string(),
            Duration::ZERO,
        );
        assert_eq!(response.body, Value::Null);
        assert_eq!(response.detail(), "<html>bad gateway</html>");
    }

    #[test]
    fn test_payload_status_overrides_success() {
        let response = RawResponse::json(StatusCode::OK, json!({"status": 429, "title": "Too Many"}));
        assert_eq!(response.effective_status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(!response.is_success());

        let legacy = RawResponse::json(
            StatusCode::OK,
            json!({"petfinder": {"header": {"status": {"code": {"$t": "100"}}}}}),
        );
        assert_eq!(legacy.effective_status(), StatusCode::OK);
    }

    #[test]
    fn test_record_status_strings_are_not_payload_status() {
        let response = RawResponse::json(
            StatusCode::OK,
            json!({"animal": {"id": 1, "status": "adoptable"}}),
        );
        assert_eq!(response.payload_status(), None);
        assert!(response.is_success());
    }

    #[test]
    fn test_detail_prefers_detail_field() {
        let response = RawResponse::json(
            StatusCode::UNAUTHORIZED,
            json!({"title": "Unauthorized", "detail": "Access token invalid or expired"}),
        );
        assert_eq!(response.detail(), "Access token invalid or expired");
    }
}
