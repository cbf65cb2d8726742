//! Token cookie emission and lookup.

use crate::config::CsrfConfig;
use http::{HeaderMap, HeaderValue, header};

/// `SameSite` policy of the token cookie. Not configurable.
pub const SAME_SITE: &str = "Strict";

/// A token cookie to be sent with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl TokenCookie {
    /// Cookie carrying `token` with the attributes from `config`.
    pub fn new(config: &CsrfConfig, token: impl Into<String>) -> Self {
        Self {
            name: config.cookie_name().to_string(),
            value: token.into(),
            path: config.cookie_path().to_string(),
            domain: config.cookie_domain().map(str::to_string),
            secure: config.cookie_secure(),
            http_only: config.cookie_http_only(),
        }
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_string(&self) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, self.value, self.path);

        if let Some(ref domain) = self.domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }

        if self.secure {
            cookie.push_str("; Secure");
        }

        if self.http_only {
            cookie.push_str("; HttpOnly");
        }

        cookie.push_str(&format!("; SameSite={}", SAME_SITE));
        cookie
    }

    /// Append this cookie to response headers.
    pub fn append_to(&self, headers: &mut HeaderMap) -> Result<(), http::header::InvalidHeaderValue> {
        let value = HeaderValue::from_str(&self.to_header_string())?;
        headers.append(header::SET_COOKIE, value);
        Ok(())
    }
}

/// Value of the request cookie `name`, searching every `Cookie` header.
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}
