use crate::error::{CsrfError, Result};
use crate::origin::TrustedOrigin;
use crate::token::TokenCodec;
use http::HeaderName;
use std::time::Duration;

/// Default cookie carrying the token.
pub const DEFAULT_COOKIE_NAME: &str = "csrfToken";

/// Default header carrying the token on mutating requests. Also the session
/// key of the binding and the body field name.
pub const DEFAULT_HEADER_NAME: &str = "X-XSRF-TOKEN";

/// Default cookie path.
pub const DEFAULT_COOKIE_PATH: &str = "/";

/// Default token lifetime.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// CSRF protection configuration.
///
/// Built once through [`CsrfConfigBuilder`] and read-only afterwards. To
/// change settings at runtime build a new config and a new middleware.
#[derive(Clone)]
pub struct CsrfConfig {
    codec: TokenCodec,
    cookie_name: String,
    header_name: String,
    header: HeaderName,
    cookie_path: String,
    cookie_domain: Option<String>,
    cookie_secure: bool,
    cookie_http_only: bool,
    timeout: Duration,
    origin: Option<TrustedOrigin>,
    nag_https: bool,
}

impl std::fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("cookie_name", &self.cookie_name)
            .field("header_name", &self.header_name)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_http_only", &self.cookie_http_only)
            .field("timeout", &self.timeout)
            .field("origin", &self.origin)
            .field("nag_https", &self.nag_https)
            .finish_non_exhaustive()
    }
}

impl CsrfConfig {
    /// Start a configuration keyed with `secret`.
    pub fn builder(secret: impl Into<Vec<u8>>) -> CsrfConfigBuilder {
        CsrfConfigBuilder::new(secret)
    }

    /// Generate a random 32-byte secret key
    pub fn generate_secret() -> Vec<u8> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..32).map(|_| rng.r#gen()).collect()
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Header name as configured. Also used as the session key.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Parsed header name for lookups.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    pub fn cookie_path(&self) -> &str {
        &self.cookie_path
    }

    pub fn cookie_domain(&self) -> Option<&str> {
        self.cookie_domain.as_deref()
    }

    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    pub fn cookie_http_only(&self) -> bool {
        self.cookie_http_only
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn origin(&self) -> Option<&TrustedOrigin> {
        self.origin.as_ref()
    }

    pub fn nag_https(&self) -> bool {
        self.nag_https
    }
}

/// Builder for [`CsrfConfig`].
#[derive(Clone)]
pub struct CsrfConfigBuilder {
    secret: Vec<u8>,
    cookie_name: String,
    header_name: String,
    cookie_path: String,
    cookie_domain: Option<String>,
    cookie_secure: bool,
    cookie_http_only: bool,
    timeout: Duration,
    origin: Option<String>,
    nag_https: bool,
}

impl CsrfConfigBuilder {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            header_name: DEFAULT_HEADER_NAME.to_string(),
            cookie_path: DEFAULT_COOKIE_PATH.to_string(),
            cookie_domain: None,
            cookie_secure: false,
            cookie_http_only: false,
            timeout: DEFAULT_TIMEOUT,
            origin: None,
            nag_https: false,
        }
    }

    /// Set cookie name
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set header name (also the session key and body field name)
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Set cookie path
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set cookie domain
    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set cookie secure flag
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Set cookie HttpOnly flag
    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    /// Set how long an issued token stays valid
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Require requests to come from `origin` (scheme, host and port)
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Warn when requests arrive over plain HTTP
    pub fn with_nag_https(mut self, nag: bool) -> Self {
        self.nag_https = nag;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<CsrfConfig> {
        let codec = TokenCodec::new(&self.secret)?;

        validate_cookie_name(&self.cookie_name)?;
        let header = HeaderName::from_bytes(self.header_name.as_bytes()).map_err(|e| {
            CsrfError::Config(format!("invalid header name '{}': {}", self.header_name, e))
        })?;
        if self.cookie_path.is_empty() || self.cookie_path.contains(';') {
            return Err(CsrfError::Config(format!(
                "invalid cookie path '{}'",
                self.cookie_path
            )));
        }
        if let Some(domain) = &self.cookie_domain {
            if domain.is_empty() || domain.contains(';') {
                return Err(CsrfError::Config(format!("invalid cookie domain '{domain}'")));
            }
        }

        let origin = self.origin.as_deref().map(TrustedOrigin::parse).transpose()?;

        Ok(CsrfConfig {
            codec,
            cookie_name: self.cookie_name,
            header_name: self.header_name,
            header,
            cookie_path: self.cookie_path,
            cookie_domain: self.cookie_domain,
            cookie_secure: self.cookie_secure,
            cookie_http_only: self.cookie_http_only,
            timeout: self.timeout,
            origin,
            nag_https: self.nag_https,
        })
    }
}

fn validate_cookie_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '=' | ';' | ','));
    if invalid {
        return Err(CsrfError::Config(format!("invalid cookie name '{name}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CsrfConfig::builder(CsrfConfig::generate_secret())
            .build()
            .unwrap();
        assert_eq!(config.cookie_name(), DEFAULT_COOKIE_NAME);
        assert_eq!(config.header_name(), DEFAULT_HEADER_NAME);
        assert_eq!(config.cookie_path(), "/");
        assert!(!config.cookie_http_only());
        assert!(!config.cookie_secure());
        assert_eq!(config.timeout(), Duration::from_secs(1800));
        assert!(config.origin().is_none());
        assert!(!config.nag_https());
    }

    #[test]
    fn test_config_builder() {
        let config = CsrfConfig::builder("s3cret")
            .with_cookie_name("_csrf")
            .with_header_name("X-CSRF-Token")
            .with_cookie_path("/app")
            .with_cookie_http_only(true)
            .with_timeout(Duration::from_secs(60))
            .with_origin("https://app.example:443")
            .with_nag_https(true)
            .build()
            .unwrap();

        assert_eq!(config.cookie_name(), "_csrf");
        assert_eq!(config.header_name(), "X-CSRF-Token");
        assert_eq!(config.header().as_str(), "x-csrf-token");
        assert_eq!(config.cookie_path(), "/app");
        assert!(config.cookie_http_only());
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.origin().unwrap().host(), "app.example");
        assert!(config.nag_https());
    }

    #[test]
    fn test_generate_secret() {
        let secret = CsrfConfig::generate_secret();
        assert_eq!(secret.len(), 32);
        assert_ne!(secret, CsrfConfig::generate_secret());
    }

    #[test]
    fn test_empty_secret() {
        assert!(matches!(
            CsrfConfig::builder(Vec::<u8>::new()).build(),
            Err(CsrfError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_invalid_names() {
        assert!(CsrfConfig::builder("k").with_cookie_name("").build().is_err());
        assert!(CsrfConfig::builder("k").with_cookie_name("a b").build().is_err());
        assert!(CsrfConfig::builder("k").with_cookie_name("a=b").build().is_err());
        assert!(CsrfConfig::builder("k").with_header_name("bad header").build().is_err());
        assert!(CsrfConfig::builder("k").with_cookie_path("").build().is_err());
    }

    #[test]
    fn test_invalid_origin() {
        assert!(matches!(
            CsrfConfig::builder("k").with_origin("nope").build(),
            Err(CsrfError::InvalidOrigin { .. })
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = CsrfConfig::builder("super-secret-value").build().unwrap();
        assert!(!format!("{config:?}").contains("super-secret-value"));
    }
}
