//! Download of the per-version `OpenAPI` artifact.
//!
//! Artifacts live at
//! `{release_base}/releases/download/v{tool_version}/{vX-Y-Z}-openapi.yaml`. A target version
//! without a published artifact (HTTP 404) falls back once to [`Version::fallback`].

use crate::config::ReleaseConfig;
use crate::error::{OpenApiToolsError, Result};
use crate::http::sanitize_reqwest_error;
use crate::version::Version;
use reqwest::{Client, StatusCode};

/// How many times a 404 may be answered with the fallback version.
pub const MAX_FALLBACK_DEPTH: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct SpecFetcher<'a> {
    client: &'a Client,
    release: &'a ReleaseConfig,
}

enum Download {
    Found(Vec<u8>),
    Missing,
}

impl<'a> SpecFetcher<'a> {
    #[must_use]
    pub fn new(client: &'a Client, release: &'a ReleaseConfig) -> Self {
        Self { client, release }
    }

    #[must_use]
    pub fn artifact_url(&self, version: &Version) -> String {
        let tag = self.release.tool_version.trim_start_matches('v');
        format!(
            "{}/releases/download/v{tag}/{}-openapi.yaml",
            self.release.base_url.trim_end_matches('/'),
            version.hyphenated()
        )
    }

    /// Download the spec for `version`.
    ///
    /// `fallback_depth` counts fallbacks already taken; pass `0` to allow one substitution of
    /// the fallback version on a 404. Returns the bytes together with the version whose
    /// artifact was actually served.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::SpecUnavailable`] on transport failure, a non-200/404
    /// status, or a 404 once the fallback budget is spent.
    pub async fn fetch(&self, version: &Version, fallback_depth: u32) -> Result<(Version, Vec<u8>)> {
        let mut version = version.clone();
        let mut depth = fallback_depth;

        loop {
            let url = self.artifact_url(&version);
            match self.download(&url).await? {
                Download::Found(bytes) => {
                    tracing::debug!(url = %url, bytes = bytes.len(), "Downloaded OpenAPI spec");
                    return Ok((version, bytes));
                }
                Download::Missing if depth < MAX_FALLBACK_DEPTH => {
                    let fallback = Version::fallback();
                    tracing::warn!(
                        "No OpenAPI spec published for {version}; falling back to {fallback}"
                    );
                    version = fallback;
                    depth += 1;
                }
                Download::Missing => {
                    return Err(OpenApiToolsError::SpecUnavailable {
                        url,
                        message: "404 Not Found".to_string(),
                    });
                }
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Download> {
        let unavailable = |message: String| OpenApiToolsError::SpecUnavailable {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(sanitize_reqwest_error(&e)))?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| unavailable(format!("failed to read body: {}", sanitize_reqwest_error(&e))))?;
                Ok(Download::Found(bytes.to_vec()))
            }
            StatusCode::NOT_FOUND => Ok(Download::Missing),
            other => Err(unavailable(format!("unexpected status {other}"))),
        }
    }
}
