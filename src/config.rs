//! Runtime settings shared by the library and the command line.
//!
//! Values start from [`Settings::default`], may be overlaid from the
//! environment with [`Settings::from_env`], and finally from explicit
//! `with_*` calls (the CLI uses these for its flags).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const ENV_CMS_BACKEND: &str = "NUPKG_SIGN_CMS_BACKEND";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "NUPKG_SIGN_HTTP_TIMEOUT_SECS";
pub const ENV_HTTP_MAX_RETRIES: &str = "NUPKG_SIGN_HTTP_MAX_RETRIES";

/// Which CMS engine [`CmsFactory`](crate::cms::CmsFactory) hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CmsBackend {
    /// Native when compiled with the `native` feature, managed otherwise.
    #[default]
    Auto,
    Managed,
    Native,
}

impl CmsBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmsBackend::Auto => "auto",
            CmsBackend::Managed => "managed",
            CmsBackend::Native => "native",
        }
    }

    /// Resolve `Auto` to a concrete engine for this build.
    pub fn resolve(self) -> CmsBackend {
        match self {
            CmsBackend::Auto if cfg!(feature = "native") => CmsBackend::Native,
            CmsBackend::Auto => CmsBackend::Managed,
            other => other,
        }
    }
}

impl fmt::Display for CmsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CmsBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CmsBackend::Auto),
            "managed" => Ok(CmsBackend::Managed),
            "native" => Ok(CmsBackend::Native),
            _ => Err(Error::InvalidConfig {
                key: ENV_CMS_BACKEND,
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub cms_backend: CmsBackend,
    /// Per-request timeout for HTTP Range reads.
    pub http_timeout: Duration,
    pub http_max_retries: u32,
    /// Base delay between retries, multiplied by the attempt number.
    pub http_retry_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cms_backend: CmsBackend::Auto,
            http_timeout: Duration::from_secs(30),
            http_max_retries: 10,
            http_retry_delay: Duration::from_millis(500),
        }
    }
}

impl Settings {
    /// Defaults overlaid with any `NUPKG_SIGN_*` environment variables.
    ///
    /// A variable that is set but cannot be parsed is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(value) = lookup(ENV_CMS_BACKEND) {
            settings.cms_backend = value.parse()?;
        }
        if let Some(value) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs = value.trim().parse::<u64>().map_err(|_| Error::InvalidConfig {
                key: ENV_HTTP_TIMEOUT_SECS,
                value: value.clone(),
            })?;
            settings.http_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = lookup(ENV_HTTP_MAX_RETRIES) {
            settings.http_max_retries =
                value.trim().parse().map_err(|_| Error::InvalidConfig {
                    key: ENV_HTTP_MAX_RETRIES,
                    value: value.clone(),
                })?;
        }

        Ok(settings)
    }

    pub fn with_cms_backend(mut self, backend: CmsBackend) -> Self {
        self.cms_backend = backend;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_http_max_retries(mut self, retries: u32) -> Self {
        self.http_max_retries = retries;
        self
    }

    pub fn with_http_retry_delay(mut self, delay: Duration) -> Self {
        self.http_retry_delay = delay;
        self
    }
}
