//! Startup pipeline: version → cached or downloaded spec → tool definitions.

use crate::cache::SpecCache;
use crate::config::ToolsConfig;
use crate::error::{OpenApiToolsError, Result};
use crate::fetcher::SpecFetcher;
use crate::synth::{Diagnostic, synthesize};
use crate::tool::ToolDefinition;
use crate::version::{Version, VersionResolver};
use openapiv3::OpenAPI;
use reqwest::Client;
use url::Url;

/// Where the spec used for this run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecSource {
    Cache,
    Download,
}

#[derive(Debug)]
pub struct Bootstrap {
    /// Version reported by the target server.
    pub target_version: Version,
    /// Version whose spec was used; differs from the target after a fallback download.
    pub spec_version: Version,
    pub source: SpecSource,
    pub base_url: Url,
    pub tools: Vec<ToolDefinition>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a YAML (or JSON) `OpenAPI` 3.x document.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::SpecParse`] if the bytes are not a valid document.
pub fn parse_spec(bytes: &[u8]) -> Result<OpenAPI> {
    serde_yaml::from_slice(bytes).map_err(|source| OpenApiToolsError::SpecParse { source })
}

/// Run the whole startup pipeline.
///
/// Cache problems (stale, unreadable, unwritable) never fail startup; they are logged and the
/// spec is downloaded instead. A downloaded spec that was substituted by the fallback version is
/// cached under the target version's directory, so the fallback is not re-attempted for the
/// next TTL window.
///
/// # Errors
///
/// Fails if the version cannot be resolved, the spec cannot be obtained or parsed, or the server
/// URL is malformed.
pub async fn bootstrap(config: &ToolsConfig, client: &Client) -> Result<Bootstrap> {
    let target_version = VersionResolver::new(client).resolve(&config.server_url).await?;
    tracing::info!("Target QueryPie version: {target_version}");

    let cache = SpecCache::from_config(&config.cache);
    let mut cache_diagnostics = Vec::new();
    let (spec_version, source, bytes) = if config.no_cache {
        let (served, bytes) = SpecFetcher::new(client, &config.release)
            .fetch(&target_version, 0)
            .await?;
        (served, SpecSource::Download, bytes)
    } else {
        match cache.load(&target_version) {
            Ok(bytes) => {
                tracing::debug!(
                    path = %cache.entry_path(&target_version).display(),
                    "Using cached OpenAPI spec"
                );
                (target_version.clone(), SpecSource::Cache, bytes)
            }
            Err(reason) => {
                tracing::debug!("Spec cache miss: {reason}");
                let (served, bytes) = SpecFetcher::new(client, &config.release)
                    .fetch(&target_version, 0)
                    .await?;
                if let Err(e) = cache.store(&target_version, &bytes) {
                    tracing::warn!("Failed to cache OpenAPI spec: {e}");
                    cache_diagnostics.push(Diagnostic {
                        scope: "cache".to_string(),
                        message: format!("failed to store spec for {target_version}: {e}"),
                    });
                }
                (served, SpecSource::Download, bytes)
            }
        }
    };

    let spec = parse_spec(&bytes)?;
    let mut synthesis = synthesize(&spec, &config.server_url)?;
    synthesis.diagnostics.extend(cache_diagnostics);
    for diagnostic in &synthesis.diagnostics {
        tracing::debug!("Skipping {diagnostic}");
    }
    tracing::info!(
        tools = synthesis.tools.len(),
        skipped = synthesis.diagnostics.len(),
        "Loaded OpenAPI spec {spec_version}"
    );

    Ok(Bootstrap {
        target_version,
        spec_version,
        source,
        base_url: synthesis.base_url,
        tools: synthesis.tools,
        diagnostics: synthesis.diagnostics,
    })
}
