//! Release and asset models plus the source seam the resolver talks to.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::github::client::{GitHubClient, Transfer};
use crate::Result;

/// One release of a repository, newest-first in API order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    /// Display title; releases can be published without one.
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
}

impl Release {
    /// Title used for filtering; untitled releases filter as empty.
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub browser_download_url: String,
    #[serde(default)]
    pub content_type: String,
}

/// Per-chunk byte progress: `(received, total_if_known)`.
pub type ChunkFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Where releases come from. Faked in tests.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// All releases of `repo` (`owner/name`), newest first.
    async fn list_releases(&self, repo: &str) -> Result<Vec<Release>>;

    /// Assets attached to one release of `repo`.
    async fn list_assets(&self, repo: &str, release_id: u64) -> Result<Vec<ReleaseAsset>>;

    /// Stream `asset` to `dest`, polling `cancel` between chunks. A
    /// canceled transfer leaves its partial file behind for the caller.
    async fn fetch_asset(
        &self,
        asset: &ReleaseAsset,
        dest: &Path,
        cancel: &CancelToken,
        on_chunk: ChunkFn<'_>,
    ) -> Result<Transfer>;
}

/// GitHub-backed release source.
pub struct GitHubReleases {
    client: GitHubClient,
}

impl GitHubReleases {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn list_releases(&self, repo: &str) -> Result<Vec<Release>> {
        log::debug!("Listing releases for {repo}");
        let url = self.client.api_url(&format!("/repos/{repo}/releases"));
        self.client.get_paged(&url).await
    }

    async fn list_assets(&self, repo: &str, release_id: u64) -> Result<Vec<ReleaseAsset>> {
        log::debug!("Listing assets for {repo} release {release_id}");
        let url = self
            .client
            .api_url(&format!("/repos/{repo}/releases/{release_id}/assets"));
        self.client.get_paged(&url).await
    }

    async fn fetch_asset(
        &self,
        asset: &ReleaseAsset,
        dest: &Path,
        cancel: &CancelToken,
        on_chunk: ChunkFn<'_>,
    ) -> Result<Transfer> {
        log::debug!(
            "Downloading {} to {}",
            asset.browser_download_url,
            dest.display()
        );
        self.client
            .download(&asset.browser_download_url, dest, cancel, on_chunk)
            .await
    }
}
