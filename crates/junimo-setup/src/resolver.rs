//! Picks a release and an asset for each component.
//!
//! Selection semantics:
//! - Release titles are filtered by a start-anchored, case-sensitive regex.
//! - Releases are scanned newest-first; prereleases are skipped unless the
//!   component opts in; drafts are never eligible.
//! - Assets are chosen by the component's selector polarity, falling back
//!   to the first asset when nothing satisfies the selector.
//!
//! The resolver caches release lists per component and asset lists per
//! release for its whole lifetime, so a batch re-resolving a component hits
//! the network at most once per list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use regex::Regex;

use crate::github::{Release, ReleaseAsset, ReleaseSource};
use crate::manifest::{compile_pattern, ComponentSpec};
use crate::{Result, SetupError};

/// Start-anchored regex match: the match must begin at the first byte of
/// the haystack. Not a full-string match, not a substring search.
pub(crate) fn match_at_start(re: &Regex, text: &str) -> bool {
    re.find(text).is_some_and(|m| m.start() == 0)
}

pub struct ReleaseResolver {
    source: Arc<dyn ReleaseSource>,
    // Keyed by component name, not repository: two components sharing a
    // repository keep independent entries.
    releases: Mutex<HashMap<String, Vec<Release>>>,
    assets: Mutex<HashMap<u64, Vec<ReleaseAsset>>>,
}

impl ReleaseResolver {
    pub fn new(source: Arc<dyn ReleaseSource>) -> Self {
        Self {
            source,
            releases: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
        }
    }

    /// Handle to the underlying source, shared with the downloader.
    pub fn source(&self) -> Arc<dyn ReleaseSource> {
        Arc::clone(&self.source)
    }

    /// Resolve a component to both its release and its asset.
    pub async fn resolve(
        &self,
        name: &str,
        spec: &ComponentSpec,
    ) -> Result<(Release, ReleaseAsset)> {
        let release = self.resolve_release(name, spec).await?;
        let asset = self.resolve_asset(name, spec, &release).await?;
        Ok((release, asset))
    }

    /// Newest release that passes the component's title filter and
    /// prerelease gate.
    pub async fn resolve_release(&self, name: &str, spec: &ComponentSpec) -> Result<Release> {
        let releases = self.releases_for(name, &spec.repository).await?;
        let filter = match &spec.release_title_filter {
            Some(pattern) => Some(compile_pattern(name, pattern)?),
            None => None,
        };

        for release in &releases {
            if release.draft {
                continue;
            }
            if let Some(ref re) = filter {
                if !match_at_start(re, release.title()) {
                    continue;
                }
            }
            if release.prerelease && !spec.include_prerelease {
                continue;
            }
            log::debug!("Resolved {name} to {} ({})", release.tag_name, release.id);
            return Ok(release.clone());
        }

        Err(SetupError::ReleaseNotFound {
            component: name.to_string(),
        })
    }

    /// Asset of `release` chosen by the component's selector. With no
    /// selector, or when nothing satisfies it, the first asset wins; an
    /// empty asset list is an error.
    pub async fn resolve_asset(
        &self,
        name: &str,
        spec: &ComponentSpec,
        release: &Release,
    ) -> Result<ReleaseAsset> {
        let assets = self.assets_for(&spec.repository, release.id).await?;
        if assets.is_empty() {
            return Err(SetupError::AssetNotFound {
                component: name.to_string(),
            });
        }

        if let Some(selector) = &spec.asset_selector {
            let re = compile_pattern(name, &selector.pattern)?;
            for asset in &assets {
                if match_at_start(&re, &asset.name) == selector.is_match {
                    return Ok(asset.clone());
                }
            }
        }

        Ok(assets[0].clone())
    }

    async fn releases_for(&self, name: &str, repo: &str) -> Result<Vec<Release>> {
        if let Some(cached) = self
            .releases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Ok(cached.clone());
        }

        let fetched = match self.source.list_releases(repo).await {
            Ok(list) => list,
            Err(SetupError::HttpStatus { status: 404, .. }) => {
                return Err(SetupError::ReleaseNotFound {
                    component: name.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        self.releases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), fetched.clone());
        Ok(fetched)
    }

    async fn assets_for(&self, repo: &str, release_id: u64) -> Result<Vec<ReleaseAsset>> {
        if let Some(cached) = self
            .assets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&release_id)
        {
            return Ok(cached.clone());
        }

        let fetched = self.source.list_assets(repo, release_id).await?;
        self.assets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(release_id, fetched.clone());
        Ok(fetched)
    }
}
