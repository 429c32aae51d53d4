//! Target server version discovery.
//!
//! The server's `GET /version` endpoint answers with `{"version": "10.3.1-rc.2"}`. Only the
//! leading `major.minor.patch` triple is kept; it keys both the spec cache directory and the
//! release artifact name.

use crate::error::{OpenApiToolsError, Result};
use crate::http::{join_path, parse_base_url, sanitize_reqwest_error};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static VERSION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)").expect("version prefix pattern is valid")
});

/// A `major.minor.patch` triple.
///
/// Components are kept as the decimal strings the server reported, so `10.02.0` and `10.2.0`
/// are distinct versions (and distinct cache entries).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: String,
    minor: String,
    patch: String,
}

impl Version {
    #[must_use]
    pub fn new(
        major: impl Into<String>,
        minor: impl Into<String>,
        patch: impl Into<String>,
    ) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
            patch: patch.into(),
        }
    }

    /// The release whose spec is used when the exact target version has no published artifact.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new("10", "2", "0")
    }

    /// Extract the leading `major.minor.patch` from a raw version string.
    ///
    /// Anything after the triple (`-rc.1`, `+build`, ...) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::VersionUnparsable`] if the string does not start with a
    /// numeric triple.
    pub fn parse(raw: &str) -> Result<Self> {
        let caps = VERSION_PREFIX
            .captures(raw)
            .ok_or_else(|| OpenApiToolsError::VersionUnparsable {
                raw: raw.to_string(),
            })?;
        Ok(Self::new(&caps[1], &caps[2], &caps[3]))
    }

    /// `v10-2-0`, as used in release artifact names.
    #[must_use]
    pub fn hyphenated(&self) -> String {
        format!("v{}-{}-{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = OpenApiToolsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Deserialize)]
struct VersionBody {
    version: String,
}

/// Asks a QueryPie server which version it runs.
#[derive(Debug, Clone, Copy)]
pub struct VersionResolver<'a> {
    client: &'a Client,
}

impl<'a> VersionResolver<'a> {
    #[must_use]
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// `GET {server_url}/version` and parse the reported version.
    ///
    /// # Errors
    ///
    /// - [`OpenApiToolsError::InvalidBaseUrl`] / [`OpenApiToolsError::Config`] if `server_url`
    ///   is malformed.
    /// - [`OpenApiToolsError::VersionUnreachable`] on transport failure, a non-200 status, or a
    ///   body that is not `{"version": "..."}`.
    /// - [`OpenApiToolsError::VersionUnparsable`] if the reported version has no numeric triple.
    pub async fn resolve(&self, server_url: &str) -> Result<Version> {
        let base = parse_base_url(server_url)?;
        let url = join_path(&base, "version")?;

        let unreachable = |message: String| OpenApiToolsError::VersionUnreachable {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| unreachable(sanitize_reqwest_error(&e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(unreachable(format!("unexpected status {status}")));
        }

        let body: VersionBody = response
            .json()
            .await
            .map_err(|e| unreachable(format!("failed to read version: {e}")))?;

        tracing::debug!(version = %body.version, "Target server reported version");
        Version::parse(&body.version)
    }
}
