//! Install orchestration: loader first, mods staged, one final merge.
//!
//! All extraction happens inside a temporary staging area that is removed
//! on every exit path. The game directory is only written to twice: when
//! the staged loader payload is merged in, and when the staged mods are
//! merged into `Mods/` at the very end.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use crate::cancel::CancelToken;
use crate::event::Notifier;
use crate::fsutil;
use crate::manifest::SharedManifest;
use crate::platform::Platform;
use crate::stager::{Stager, MODS_DIR};
use crate::{Result, SetupError};

const GAME_DEPS_FILE: &str = "Stardew Valley.deps.json";
const LOADER_DEPS_FILE: &str = "StardewModdingAPI.deps.json";

/// Phases of an install run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Idle,
    InstallingLoader,
    InstallingMods,
    Merging,
    Complete,
    Canceled,
    Failed,
}

impl InstallPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallPhase::Complete | InstallPhase::Canceled | InstallPhase::Failed
        )
    }
}

/// Terminal report of an install run.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub phase: InstallPhase,
    /// Components whose files reached the game directory or the staged
    /// merge, in install order.
    pub installed: Vec<String>,
    /// Whether the game directory looks like a Steam install; lets the
    /// driving layer route its follow-up instructions.
    pub steam_install: bool,
}

impl InstallOutcome {
    pub fn is_complete(&self) -> bool {
        self.phase == InstallPhase::Complete
    }

    pub fn is_canceled(&self) -> bool {
        self.phase == InstallPhase::Canceled
    }
}

pub struct Installer {
    manifest: SharedManifest,
    game_dir: PathBuf,
    platform: Platform,
    cancel: CancelToken,
    notifier: Arc<dyn Notifier>,
    phase: Mutex<InstallPhase>,
    staging_parent: Option<PathBuf>,
}

impl Installer {
    pub fn new(
        manifest: SharedManifest,
        game_dir: impl Into<PathBuf>,
        platform: Platform,
        cancel: CancelToken,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            manifest,
            game_dir: game_dir.into(),
            platform,
            cancel,
            notifier,
            phase: Mutex::new(InstallPhase::Idle),
            staging_parent: None,
        }
    }

    /// Create each run's staging directory inside `dir` instead of the
    /// system temp location.
    pub fn with_staging_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_parent = Some(dir.into());
        self
    }

    pub fn phase(&self) -> InstallPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: InstallPhase) {
        log::debug!("Install phase: {phase:?}");
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Request cancellation of this install run.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Run the whole install batch.
    ///
    /// Cancellation observed at a checkpoint is an outcome, not an error.
    /// Errors end the run with phase `Failed` and no rollback of steps
    /// already applied.
    pub fn install_all(&self) -> Result<InstallOutcome> {
        match self.run() {
            Ok(outcome) => {
                if outcome.is_complete() {
                    self.notifier.install_complete(&outcome);
                }
                Ok(outcome)
            }
            Err(e) => {
                self.set_phase(InstallPhase::Failed);
                self.notifier.notify(&format!("Installation failed: {e}"));
                Err(e)
            }
        }
    }

    fn run(&self) -> Result<InstallOutcome> {
        self.check_game_dir()?;

        // RAII: the staging area disappears on every return path.
        let staging = match &self.staging_parent {
            Some(parent) => TempDir::new_in(parent)?,
            None => TempDir::new()?,
        };
        let stager = Stager::new(staging.path(), self.platform);

        let (loader_name, order) = {
            let manifest = self.manifest.lock().unwrap_or_else(|e| e.into_inner());
            (
                manifest.loader.clone(),
                manifest.components.keys().cloned().collect::<Vec<_>>(),
            )
        };

        let mut installed = Vec::new();

        if self.cancel.is_canceled() {
            return Ok(self.canceled_outcome(installed));
        }

        // The loader always goes first, whatever the mapping order says.
        self.set_phase(InstallPhase::InstallingLoader);
        self.install_loader(&stager, &loader_name)?;
        installed.push(loader_name.clone());

        self.set_phase(InstallPhase::InstallingMods);
        for name in order.iter().filter(|name| **name != loader_name) {
            if self.cancel.is_canceled() {
                return Ok(self.canceled_outcome(installed));
            }
            let archive = self.downloaded_file(name)?;
            self.notifier.notify(&format!("Installing {name}..."));
            stager.stage_mod(&archive)?;
            installed.push(name.clone());
        }

        if self.cancel.is_canceled() {
            return Ok(self.canceled_outcome(installed));
        }

        self.set_phase(InstallPhase::Merging);
        let staged_mods = stager.mods_dir();
        if staged_mods.is_dir() {
            let target = self.game_dir.join(MODS_DIR);
            self.notifier
                .notify(&format!("Moving mods to {}", target.display()));
            fsutil::merge_dir(&staged_mods, &target)?;
        }

        self.set_phase(InstallPhase::Complete);
        self.notifier.notify("Installation complete");
        Ok(InstallOutcome {
            phase: InstallPhase::Complete,
            installed,
            steam_install: self.is_steam_install(),
        })
    }

    /// Unpack the nested loader bundle and merge its payload into the game
    /// directory, then write the companion deps file the loader expects.
    fn install_loader(&self, stager: &Stager, name: &str) -> Result<()> {
        let bundle = self.downloaded_file(name)?;
        self.notifier.notify(&format!("Installing {name}..."));

        let inner = stager.open_loader_bundle(&bundle)?;
        let payload = stager.stage_loader_payload(&inner)?;
        fsutil::merge_dir(&payload, &self.game_dir)?;
        self.copy_deps_file()?;

        log::debug!("Loader {name} merged into {}", self.game_dir.display());
        Ok(())
    }

    /// The loader reads its dependency manifest under its own name; the
    /// game only ships `Stardew Valley.deps.json`.
    fn copy_deps_file(&self) -> Result<()> {
        let source = self.game_dir.join(GAME_DEPS_FILE);
        if !source.is_file() {
            return Err(SetupError::GameFileMissing { path: source });
        }
        std::fs::copy(&source, self.game_dir.join(LOADER_DEPS_FILE))?;
        Ok(())
    }

    fn downloaded_file(&self, name: &str) -> Result<PathBuf> {
        let manifest = self.manifest.lock().unwrap_or_else(|e| e.into_inner());
        let spec = manifest.component(name)?;
        match &spec.download_path {
            Some(path) if path.is_file() => Ok(path.clone()),
            _ => Err(SetupError::DownloadedFileMissing {
                component: name.to_string(),
            }),
        }
    }

    fn check_game_dir(&self) -> Result<()> {
        if !self.game_dir.exists() {
            return Err(SetupError::GameDirMissing {
                path: self.game_dir.clone(),
            });
        }
        if !self.game_dir.is_dir() {
            return Err(SetupError::NotADirectory {
                path: self.game_dir.clone(),
            });
        }
        Ok(())
    }

    fn canceled_outcome(&self, installed: Vec<String>) -> InstallOutcome {
        self.set_phase(InstallPhase::Canceled);
        self.notifier.notify("Installation canceled");
        InstallOutcome {
            phase: InstallPhase::Canceled,
            installed,
            steam_install: self.is_steam_install(),
        }
    }

    fn is_steam_install(&self) -> bool {
        self.game_dir
            .to_string_lossy()
            .to_lowercase()
            .contains("steamapps")
    }
}
