//! Version manifest lookups.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::validation::validate_version_id;

const USER_AGENT: &str = "mcserver-launcher";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub url: String,
}

/// Per-version metadata document referenced by a manifest entry.
#[derive(Debug, Deserialize)]
struct VersionMetadata {
    downloads: VersionDownloads,
}

#[derive(Debug, Deserialize)]
struct VersionDownloads {
    server: Option<DownloadRef>,
}

#[derive(Debug, Deserialize)]
struct DownloadRef {
    url: String,
}

/// A requested version and where its server artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub version: String,
    pub download_url: String,
}

impl VersionManifest {
    pub fn find(&self, version: &str) -> Option<&ManifestEntry> {
        self.versions.iter().find(|v| v.id == version)
    }
}

/// GET `url` as JSON. `timeout` bounds the whole exchange, body included.
async fn get_json<T: DeserializeOwned>(client: &Client, url: &str, timeout: Duration) -> Result<T> {
    let map_err = |e: reqwest::Error, what: &str| {
        if e.is_timeout() {
            AppError::timeout(&format!("GET {}", url), timeout.as_secs())
        } else {
            AppError::transport_with_url(url, format!("{}{}", what, e))
        }
    };

    let resp = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_err(e, ""))?;

    if !resp.status().is_success() {
        return Err(AppError::transport_with_url(url, resp.status().to_string()));
    }

    resp.json::<T>()
        .await
        .map_err(|e| map_err(e, "Failed to parse: "))
}

pub async fn fetch_manifest(
    client: &Client,
    manifest_url: &str,
    timeout: Duration,
) -> Result<VersionManifest> {
    get_json(client, manifest_url, timeout).await
}

/// Resolve `version` to its server download URL. The manifest is fetched on
/// every call; each request is bounded by `timeout`.
pub async fn resolve_version(
    client: &Client,
    manifest_url: &str,
    version: &str,
    timeout: Duration,
) -> Result<VersionDescriptor> {
    validate_version_id(version)?;

    let manifest = fetch_manifest(client, manifest_url, timeout).await.inspect_err(|e| {
        log::error!("Failed to get version manifest: {}", e);
    })?;

    let Some(entry) = manifest.find(version) else {
        log::error!("Version {} not found in manifest", version);
        return Err(AppError::version_not_found(version));
    };

    let metadata: VersionMetadata = get_json(client, &entry.url, timeout).await.inspect_err(|e| {
        log::error!("Failed to get version data for {}: {}", version, e);
    })?;

    // Very old versions publish no dedicated server download.
    let server = metadata.downloads.server.ok_or_else(|| {
        log::error!("Version {} has no server download", version);
        AppError::version_not_found(version)
    })?;

    Ok(VersionDescriptor {
        version: version.to_string(),
        download_url: server.url,
    })
}
