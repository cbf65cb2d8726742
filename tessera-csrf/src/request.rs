//! Request view handed to the middleware by the HTTP layer.

use http::{HeaderMap, HeaderName, HeaderValue, Method, header};

/// The parts of an inbound request the CSRF check reads.
#[derive(Debug, Clone)]
pub struct CsrfRequest {
    /// HTTP method
    pub method: Method,
    /// Request headers
    pub headers: HeaderMap,
    /// Absolute request URI, when the server knows it
    pub absolute_uri: Option<String>,
    /// Raw request body (form or JSON), possibly empty
    pub body: Vec<u8>,
}

impl CsrfRequest {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            absolute_uri: None,
            body: Vec::new(),
        }
    }

    /// Build from the head of an `http::Request` plus its collected body.
    pub fn from_parts(parts: &http::request::Parts, body: impl Into<Vec<u8>>) -> Self {
        let absolute_uri = parts
            .uri
            .scheme()
            .is_some()
            .then(|| parts.uri.to_string());
        Self {
            method: parts.method.clone(),
            headers: parts.headers.clone(),
            absolute_uri,
            body: body.into(),
        }
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Add a `Cookie` header carrying a single cookie.
    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        self.with_header(header::COOKIE.as_str(), &format!("{name}={value}"))
    }

    /// Set the absolute request URI.
    pub fn with_absolute_uri(mut self, uri: impl Into<String>) -> Self {
        self.absolute_uri = Some(uri.into());
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `name` as a string, if present and valid UTF-8.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of the field `name` in a JSON object or URL-encoded form body.
    pub fn body_field(&self, name: &str) -> Option<String> {
        if self.body.is_empty() {
            return None;
        }

        // Try to parse as JSON
        if let Ok(json) = serde_json::from_slice::<serde_json::Value>(&self.body) {
            return json.get(name).and_then(|v| v.as_str()).map(str::to_string);
        }

        // Try to parse as form data
        if let Ok(form_data) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.body) {
            return form_data
                .into_iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value);
        }

        None
    }
}
