//! Same-origin verification using the `Origin` and `Referer` headers.

use crate::error::{CsrfError, Result};
use tracing::trace;
use url::Url;

/// Scheme, host and port of a trusted origin.
///
/// Ports are normalized: a URL without an explicit port uses the scheme's
/// default, so `https://app.example` and `https://app.example:443` are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedOrigin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl TrustedOrigin {
    /// Parse a configured origin such as `https://app.example:8443`.
    pub fn parse(origin: &str) -> Result<Self> {
        let url = Url::parse(origin.trim()).map_err(|e| CsrfError::InvalidOrigin {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(&url).ok_or_else(|| CsrfError::InvalidOrigin {
            origin: origin.to_string(),
            reason: "origin has no host".to_string(),
        })
    }

    fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str()?.to_string(),
            port: url.port_or_known_default(),
        })
    }

    /// Scheme (lowercase).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host (lowercase for domain names).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit or default port.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    fn matches(&self, source: &str) -> bool {
        let Ok(url) = Url::parse(source.trim()) else {
            trace!("Invalid URI in Origin/Referer");
            return false;
        };
        match Self::from_url(&url) {
            Some(candidate) if candidate == *self => true,
            _ => {
                trace!("Protocol/Host/Port do not fully match");
                false
            }
        }
    }
}

/// Checks request provenance against an optional trusted origin.
#[derive(Debug, Clone, Default)]
pub struct OriginValidator {
    origin: Option<TrustedOrigin>,
}

impl OriginValidator {
    pub fn new(origin: Option<TrustedOrigin>) -> Self {
        Self { origin }
    }

    /// The trusted origin, if any.
    pub fn origin(&self) -> Option<&TrustedOrigin> {
        self.origin.as_ref()
    }

    /// Validate the request's `Origin` header, falling back to `Referer`.
    ///
    /// With no trusted origin configured every request is valid. Otherwise a
    /// request with neither header (or only blank ones) is rejected.
    pub fn validate(&self, origin_header: Option<&str>, referer_header: Option<&str>) -> bool {
        let Some(trusted) = &self.origin else {
            return true;
        };

        let source = match (non_blank(origin_header), non_blank(referer_header)) {
            (Some(origin), _) => origin,
            (None, Some(referer)) => referer,
            (None, None) => {
                trace!("ORIGIN and REFERER request headers are both absent/empty");
                return false;
            }
        };

        trusted.matches(source)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
