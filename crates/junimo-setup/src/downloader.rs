//! Batch download of resolved release assets.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::event::Notifier;
use crate::github::{ReleaseAsset, Transfer};
use crate::manifest::SharedManifest;
use crate::resolver::ReleaseResolver;
use crate::Result;

/// How a single component's fetch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Asset streamed to disk.
    Downloaded(PathBuf),
    /// The file was already present; no transfer happened.
    AlreadyPresent(PathBuf),
    /// The flag was observed mid-transfer; the partial file was removed.
    Canceled,
}

impl FetchOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FetchOutcome::Downloaded(path) | FetchOutcome::AlreadyPresent(path) => Some(path),
            FetchOutcome::Canceled => None,
        }
    }
}

/// What happened across a whole download batch.
#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    pub downloaded: Vec<String>,
    pub already_present: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub canceled: bool,
}

impl DownloadSummary {
    /// Every component fetched, nothing failed, nothing canceled.
    pub fn fully_successful(&self) -> bool {
        self.failed.is_empty() && !self.canceled
    }
}

/// Local file name for an asset: `{stem}_{asset_id}{ext}`. Distinct assets
/// with the same filename never collide, and a re-run finds the previous
/// download.
fn asset_file_name(asset: &ReleaseAsset) -> String {
    let name = Path::new(&asset.name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| asset.name.clone());
    match name.extension() {
        Some(ext) => format!("{stem}_{}.{}", asset.id, ext.to_string_lossy()),
        None => format!("{stem}_{}", asset.id),
    }
}

pub struct Downloader {
    resolver: Arc<ReleaseResolver>,
    manifest: SharedManifest,
    download_dir: PathBuf,
    cancel: CancelToken,
    notifier: Arc<dyn Notifier>,
}

impl Downloader {
    pub fn new(
        resolver: Arc<ReleaseResolver>,
        manifest: SharedManifest,
        download_dir: impl Into<PathBuf>,
        cancel: CancelToken,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resolver,
            manifest,
            download_dir: download_dir.into(),
            cancel,
            notifier,
        }
    }

    /// Request cancellation of this download batch.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn local_path(&self, asset: &ReleaseAsset) -> PathBuf {
        self.download_dir.join(asset_file_name(asset))
    }

    /// Resolve and download one component's asset.
    pub async fn fetch(&self, name: &str) -> Result<FetchOutcome> {
        let spec = {
            let manifest = self.manifest.lock().unwrap_or_else(|e| e.into_inner());
            manifest.component(name)?.clone()
        };

        let (release, asset) = self.resolver.resolve(name, &spec).await?;
        let dest = self.local_path(&asset);

        if dest.exists() {
            log::debug!("{} already at {}", asset.name, dest.display());
            self.notifier.notify(&format!("{name} is already downloaded"));
            return Ok(FetchOutcome::AlreadyPresent(dest));
        }

        self.notifier
            .notify(&format!("Downloading {name} {}...", release.tag_name));
        let on_chunk = |received, total| self.notifier.download_progress(name, received, total);

        match self
            .resolver
            .source()
            .fetch_asset(&asset, &dest, &self.cancel, &on_chunk)
            .await
        {
            Ok(Transfer::Complete) => Ok(FetchOutcome::Downloaded(dest)),
            Ok(Transfer::Canceled) => {
                if dest.exists() {
                    tokio::fs::remove_file(&dest).await?;
                }
                self.notifier
                    .notify(&format!("Canceled download of {name}"));
                Ok(FetchOutcome::Canceled)
            }
            Err(e) => {
                // A partial file must not satisfy the dedup check next run.
                let _ = tokio::fs::remove_file(&dest).await;
                Err(e)
            }
        }
    }

    /// Download every configured component in mapping order.
    ///
    /// The flag is checked before each component; per-component failures
    /// are reported through the notifier and the batch moves on. The
    /// downloads-complete signal fires exactly once however the batch
    /// ends, including early cancellation.
    pub async fn fetch_all(&self) -> DownloadSummary {
        let names: Vec<String> = {
            let manifest = self.manifest.lock().unwrap_or_else(|e| e.into_inner());
            manifest.components.keys().cloned().collect()
        };

        let mut summary = DownloadSummary::default();

        for name in names {
            if self.cancel.is_canceled() {
                summary.canceled = true;
                break;
            }

            match self.fetch(&name).await {
                Ok(FetchOutcome::Downloaded(path)) => {
                    self.record_download_path(&name, path);
                    self.notifier
                        .notify(&format!("Finished downloading {name}"));
                    summary.downloaded.push(name);
                }
                Ok(FetchOutcome::AlreadyPresent(path)) => {
                    self.record_download_path(&name, path);
                    summary.already_present.push(name);
                }
                Ok(FetchOutcome::Canceled) => {
                    summary.canceled = true;
                    break;
                }
                Err(e) => {
                    if e.is_component_failure() {
                        log::warn!("Download of {name} failed: {e}");
                    } else {
                        log::error!("Download of {name} failed: {e}");
                    }
                    self.notifier
                        .notify(&format!("Failed to download {name}: {e}"));
                    summary.failed.push((name, e.to_string()));
                }
            }
        }

        self.notifier.downloads_complete(&summary);
        summary
    }

    fn record_download_path(&self, name: &str, path: PathBuf) {
        let mut manifest = self.manifest.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(spec) = manifest.component_mut(name) {
            spec.download_path = Some(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: u64, name: &str) -> ReleaseAsset {
        ReleaseAsset {
            id,
            name: name.to_string(),
            size: 0,
            browser_download_url: String::new(),
            content_type: String::new(),
        }
    }

    #[test]
    fn file_name_keeps_stem_id_and_extension() {
        assert_eq!(
            asset_file_name(&asset(314, "SMAPI-4.1.10-installer.zip")),
            "SMAPI-4.1.10-installer_314.zip"
        );
    }

    #[test]
    fn same_name_different_assets_never_collide() {
        let a = asset_file_name(&asset(1, "mod.zip"));
        let b = asset_file_name(&asset(2, "mod.zip"));
        assert_ne!(a, b);
    }

    #[test]
    fn extensionless_names_still_get_the_id() {
        assert_eq!(asset_file_name(&asset(9, "install")), "install_9");
    }

    #[test]
    fn dotted_versions_stay_in_the_stem() {
        // Only the final extension moves behind the id.
        assert_eq!(
            asset_file_name(&asset(7, "stardew-access-1.6.2.zip")),
            "stardew-access-1.6.2_7.zip"
        );
    }
}
