//! Shared outbound HTTP plumbing.
//!
//! One [`Client`] is built at startup and cloned into every component that talks to the network
//! (version lookup, artifact download, tool dispatch). `reqwest` clients share their connection
//! pool across clones and are safe to use from concurrent tasks.

use crate::config::{TOOL_NAME, TOOL_VERSION};
use crate::error::{OpenApiToolsError, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Build the process-wide HTTP client.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(format!("{TOOL_NAME}/{TOOL_VERSION}"));
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder
        .build()
        .map_err(|e| OpenApiToolsError::Config(format!("failed to build HTTP client: {e}")))
}

/// Parse an absolute `http(s)` base URL.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::InvalidBaseUrl`] if the URL does not parse, and
/// [`OpenApiToolsError::Config`] if it is not an `http(s)` URL.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|source| OpenApiToolsError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(OpenApiToolsError::Config(format!(
            "unsupported URL scheme '{}' in '{raw}' (expected http or https)",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Append `path` to the path of `base`, keeping any prefix the base already has
/// (`https://host/api` + `/version` => `https://host/api/version`).
///
/// # Errors
///
/// Returns an error if the joined URL does not parse.
pub fn join_path(base: &Url, path: &str) -> Result<Url> {
    let mut joined = base.clone();
    joined.set_query(None);
    joined.set_fragment(None);
    let raw = format!(
        "{}/{}",
        joined.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&raw).map_err(|source| OpenApiToolsError::InvalidBaseUrl { url: raw, source })
}

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Drop credentials, query and fragment before a URL lands in logs or tool results.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}
