//! Installer manifest: the ordered set of components to resolve, download
//! and install.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::{Result, SetupError};

/// Name of the bootstrap component when the manifest does not say otherwise.
pub const DEFAULT_LOADER: &str = "SMAPI";

fn default_loader() -> String {
    DEFAULT_LOADER.to_string()
}

/// Manifest shared between the download and install workers. The downloader
/// annotates `download_path`; the driving layer may flip per-component
/// toggles between runs. One writer at a time.
pub type SharedManifest = Arc<Mutex<Manifest>>;

/// Root configuration document (`installer.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Name of the bootstrap component (the mod loader). Installed first;
    /// ordinary components are unusable without it.
    #[serde(default = "default_loader")]
    pub loader: String,

    /// Components in download and install order.
    pub components: IndexMap<String, ComponentSpec>,

    /// Candidate game directories per platform, used for auto-detection.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub game_paths: IndexMap<String, Vec<String>>,
}

/// One installable component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// `owner/repo` slug on the release host.
    pub repository: String,

    /// Mandatory components cannot be skipped.
    #[serde(default)]
    pub is_mandatory: bool,

    /// Whether the prerelease toggle may be offered to the user.
    #[serde(default)]
    pub offer_prerelease: bool,

    /// Whether prereleases are eligible during resolution.
    #[serde(default)]
    pub include_prerelease: bool,

    /// Start-anchored, case-sensitive regex over release titles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_title_filter: Option<String>,

    /// Picks one asset out of a release; absent means "first asset".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_selector: Option<AssetSelector>,

    /// Where the asset landed on disk. Written by the downloader, read by
    /// the installer; never part of the config file.
    #[serde(skip)]
    pub download_path: Option<PathBuf>,
}

/// Chooses one asset of a release by filename pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSelector {
    /// Start-anchored, case-sensitive regex over asset filenames.
    pub pattern: String,

    /// `true`: first asset matching the pattern. `false`: first asset NOT
    /// matching it.
    #[serde(rename = "match", default)]
    pub is_match: bool,

    /// Human label for the variant this selector toggles.
    #[serde(default)]
    pub name: String,
}

impl Manifest {
    /// Parse and validate a manifest from JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate a manifest file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Structural checks that must pass before any network or file
    /// activity: a non-empty component set, well-formed `owner/repo` slugs,
    /// compilable patterns, and a loader that is actually configured.
    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(SetupError::InvalidManifest {
                message: "no components configured".to_string(),
            });
        }
        if !self.components.contains_key(&self.loader) {
            return Err(SetupError::InvalidManifest {
                message: format!("loader component {:?} is not configured", self.loader),
            });
        }
        for (name, spec) in &self.components {
            let mut parts = spec.repository.split('/');
            let valid_slug = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty()
            );
            if !valid_slug {
                return Err(SetupError::InvalidManifest {
                    message: format!(
                        "component {name:?} repository {:?} is not an owner/repo slug",
                        spec.repository
                    ),
                });
            }
            if let Some(pattern) = &spec.release_title_filter {
                compile_pattern(name, pattern)?;
            }
            if let Some(selector) = &spec.asset_selector {
                compile_pattern(name, &selector.pattern)?;
            }
        }
        Ok(())
    }

    pub fn component(&self, name: &str) -> Result<&ComponentSpec> {
        self.components
            .get(name)
            .ok_or_else(|| SetupError::ComponentNotConfigured {
                name: name.to_string(),
            })
    }

    pub fn component_mut(&mut self, name: &str) -> Result<&mut ComponentSpec> {
        self.components
            .get_mut(name)
            .ok_or_else(|| SetupError::ComponentNotConfigured {
                name: name.to_string(),
            })
    }

    /// Opt a component into (or out of) prereleases. Only allowed for
    /// components that offer the toggle.
    pub fn set_include_prerelease(&mut self, name: &str, value: bool) -> Result<()> {
        let spec = self.component_mut(name)?;
        if !spec.offer_prerelease {
            return Err(SetupError::InvalidManifest {
                message: format!("component {name:?} does not offer prereleases"),
            });
        }
        spec.include_prerelease = value;
        Ok(())
    }

    /// Flip a component's asset variant selector.
    pub fn toggle_variant(&mut self, name: &str) -> Result<()> {
        let spec = self.component_mut(name)?;
        match spec.asset_selector.as_mut() {
            Some(selector) => {
                selector.is_match = !selector.is_match;
                Ok(())
            }
            None => Err(SetupError::InvalidManifest {
                message: format!("component {name:?} has no asset variants"),
            }),
        }
    }

    /// Drop a component from the run. Mandatory components and the loader
    /// stay.
    pub fn remove_component(&mut self, name: &str) -> Result<()> {
        if name == self.loader {
            return Err(SetupError::InvalidManifest {
                message: format!("cannot skip the loader component {name:?}"),
            });
        }
        let spec = self.component(name)?;
        if spec.is_mandatory {
            return Err(SetupError::InvalidManifest {
                message: format!("component {name:?} is mandatory"),
            });
        }
        self.components.shift_remove(name);
        Ok(())
    }

    /// First configured candidate directory that exists and contains the
    /// game executable.
    pub fn detect_game_dir(&self, platform: Platform) -> Option<PathBuf> {
        let candidates = self.game_paths.get(platform.as_str())?;
        for candidate in candidates {
            let expanded = shellexpand::tilde(candidate);
            let path = Path::new(expanded.as_ref());
            if path.is_dir() && path.join(platform.game_executable()).is_file() {
                return Some(path.to_path_buf());
            }
        }
        None
    }

    pub fn into_shared(self) -> SharedManifest {
        Arc::new(Mutex::new(self))
    }
}

pub(crate) fn compile_pattern(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| SetupError::InvalidPattern {
        name: name.to_string(),
        message: e.to_string(),
    })
}
