//! Loading [`CsrfConfig`] from files and environment variables.
//!
//! Recognized keys (file keys / env suffixes):
//!
//! | File             | Env                 | Meaning                              |
//! |------------------|---------------------|--------------------------------------|
//! | `secret`         | `SECRET`            | signing key (required)               |
//! | `cookieName`     | `COOKIE_NAME`       | token cookie name                    |
//! | `cookiePath`     | `COOKIE_PATH`       | token cookie path                    |
//! | `cookieHttpOnly` | `COOKIE_HTTP_ONLY`  | `HttpOnly` flag                      |
//! | `cookieSecure`   | `COOKIE_SECURE`     | `Secure` flag                        |
//! | `cookieDomain`   | `COOKIE_DOMAIN`     | `Domain` attribute                   |
//! | `headerName`     | `HEADER_NAME`       | token header / session key           |
//! | `timeout`        | `TIMEOUT`           | token lifetime in milliseconds       |
//! | `origin`         | `ORIGIN`            | trusted origin                       |
//! | `nagHttps`       | `NAG_HTTPS`         | warn on plain HTTP                   |
//!
//! Environment variables are prefixed, `TESSERA_CSRF_COOKIE_NAME` by default.

use crate::config::{CsrfConfig, CsrfConfigBuilder};
use crate::error::{CsrfError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "TESSERA_CSRF";

/// Unvalidated CSRF settings. Unset fields keep the builder defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CsrfSettings {
    pub secret: Option<String>,
    pub cookie_name: Option<String>,
    pub cookie_path: Option<String>,
    pub cookie_http_only: Option<bool>,
    pub cookie_secure: Option<bool>,
    pub cookie_domain: Option<String>,
    pub header_name: Option<String>,
    pub timeout: Option<u64>,
    pub origin: Option<String>,
    pub nag_https: Option<bool>,
}

impl CsrfSettings {
    /// Parse TOML. Keys may sit at the top level or in a `[csrf]` table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(content)
            .map_err(|e| CsrfError::Settings(format!("TOML parse error: {}", e)))?;

        let section = match table.remove("csrf") {
            Some(toml::Value::Table(csrf)) => csrf,
            Some(_) => {
                return Err(CsrfError::Settings("'csrf' must be a table".to_string()));
            }
            None => table,
        };

        toml::Value::Table(section)
            .try_into()
            .map_err(|e| CsrfError::Settings(format!("TOML settings error: {}", e)))
    }

    /// Parse a JSON object.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| CsrfError::Settings(format!("JSON parse error: {}", e)))
    }

    /// Load a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_str(&content),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&content),
            other => Err(CsrfError::Settings(format!(
                "Unsupported settings format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Read `TESSERA_CSRF_*` variables, loading a `.env` file first if present.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Read `{prefix}_*` variables, loading a `.env` file first if present.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(CsrfError::Settings(format!(".env error: {}", e))),
        }
        Self::from_vars(prefix, std::env::vars())
    }

    /// Build settings from an explicit set of variables.
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix = format!("{}_", prefix.trim_end_matches('_'));
        let mut settings = Self::default();

        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(&prefix) else {
                continue;
            };
            let value: String = value.into();
            match name {
                "SECRET" => settings.secret = Some(value),
                "COOKIE_NAME" => settings.cookie_name = Some(value),
                "COOKIE_PATH" => settings.cookie_path = Some(value),
                "COOKIE_HTTP_ONLY" => settings.cookie_http_only = Some(parse_bool(name, &value)?),
                "COOKIE_SECURE" => settings.cookie_secure = Some(parse_bool(name, &value)?),
                "COOKIE_DOMAIN" => settings.cookie_domain = Some(value),
                "HEADER_NAME" => settings.header_name = Some(value),
                "TIMEOUT" => {
                    settings.timeout = Some(value.trim().parse().map_err(|e| {
                        CsrfError::Settings(format!("{prefix}TIMEOUT must be milliseconds: {e}"))
                    })?)
                }
                "ORIGIN" => settings.origin = Some(value),
                "NAG_HTTPS" => settings.nag_https = Some(parse_bool(name, &value)?),
                _ => debug!(variable = %key.as_ref(), "Ignoring unknown CSRF variable"),
            }
        }

        Ok(settings)
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            secret: other.secret.or(self.secret),
            cookie_name: other.cookie_name.or(self.cookie_name),
            cookie_path: other.cookie_path.or(self.cookie_path),
            cookie_http_only: other.cookie_http_only.or(self.cookie_http_only),
            cookie_secure: other.cookie_secure.or(self.cookie_secure),
            cookie_domain: other.cookie_domain.or(self.cookie_domain),
            header_name: other.header_name.or(self.header_name),
            timeout: other.timeout.or(self.timeout),
            origin: other.origin.or(self.origin),
            nag_https: other.nag_https.or(self.nag_https),
        }
    }

    /// Apply the settings to a builder.
    pub fn into_builder(self) -> Result<CsrfConfigBuilder> {
        let secret = self
            .secret
            .ok_or_else(|| CsrfError::Settings("secret is required".to_string()))?;

        let mut builder = CsrfConfig::builder(secret);
        if let Some(name) = self.cookie_name {
            builder = builder.with_cookie_name(name);
        }
        if let Some(path) = self.cookie_path {
            builder = builder.with_cookie_path(path);
        }
        if let Some(http_only) = self.cookie_http_only {
            builder = builder.with_cookie_http_only(http_only);
        }
        if let Some(secure) = self.cookie_secure {
            builder = builder.with_cookie_secure(secure);
        }
        if let Some(domain) = self.cookie_domain {
            builder = builder.with_cookie_domain(domain);
        }
        if let Some(name) = self.header_name {
            builder = builder.with_header_name(name);
        }
        if let Some(ms) = self.timeout {
            builder = builder.with_timeout(Duration::from_millis(ms));
        }
        if let Some(origin) = self.origin {
            builder = builder.with_origin(origin);
        }
        if let Some(nag) = self.nag_https {
            builder = builder.with_nag_https(nag);
        }
        Ok(builder)
    }

    /// Validate into a [`CsrfConfig`].
    pub fn into_config(self) -> Result<CsrfConfig> {
        self.into_builder()?.build()
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CsrfError::Settings(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}
