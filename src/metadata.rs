//! Request metadata handed to a [`Transport`](crate::transport::Transport).

use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Everything needed to issue one request.
///
/// The path is relative to the transport's base URL (no leading slash).
/// Query pairs and form fields keep the order they were added in.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET or POST).
    pub method: Method,

    /// The request path, relative to the base URL.
    pub path: String,

    /// Headers for this request.
    pub headers: HeaderMap,

    /// Query string pairs.
    pub query_params: Vec<(String, String)>,

    /// URL-encoded form fields; sent as the body when non-empty.
    pub form: Vec<(String, String)>,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into().trim_start_matches('/').to_string(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            form: Vec::new(),
        }
    }

    /// Shorthand for a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the `Authorization: Bearer` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the token contains characters not allowed in a header.
    pub fn with_bearer(self, token: &str) -> Result<Self, crate::Error> {
        self.with_header(http::header::AUTHORIZATION.as_str(), format!("Bearer {token}"))
    }

    /// Sets a query parameter, replacing an earlier value for the same key.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.query_params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.query_params.push((key, value)),
        }
        self
    }

    /// Sets multiple query parameters.
    pub fn with_query_params(
        self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        params
            .into_iter()
            .fold(self, |metadata, (k, v)| metadata.with_query_param(k, v))
    }

    /// Adds a form field to the request body.
    pub fn with_form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Returns the value of a query parameter, if set.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_replaces_existing_key() {
        let metadata = RequestMetadata::get("/animals")
            .with_query_param("page", "1")
            .with_query_param("limit", "50")
            .with_query_param("page", "2");

        assert_eq!(metadata.path, "animals");
        assert_eq!(metadata.query_param("page"), Some("2"));
        assert_eq!(metadata.query_params.len(), 2);
    }

    #[test]
    fn test_bearer_header() {
        let metadata = RequestMetadata::get("types").with_bearer("abc").unwrap();
        assert_eq!(
            metadata.headers.get("authorization").unwrap(),
            "Bearer abc"
        );
    }
}
