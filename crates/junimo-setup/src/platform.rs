//! Platform detection for the loader bundle layout.

use crate::{Result, SetupError};

/// Platforms the loader bundle ships payloads for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    /// Detect the running platform.
    pub fn current() -> Result<Self> {
        match std::env::consts::OS {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::MacOs),
            other => Err(SetupError::UnsupportedPlatform {
                os: other.to_string(),
            }),
        }
    }

    /// Directory name used inside the loader bundle. The `macOS` spelling
    /// is the bundle's, not ours.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOs => "macOS",
        }
    }

    /// File name of the game executable on this platform.
    pub fn game_executable(&self) -> &'static str {
        match self {
            Platform::Windows => "Stardew Valley.exe",
            _ => "Stardew Valley",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
