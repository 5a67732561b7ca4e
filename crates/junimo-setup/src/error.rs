use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    // Manifest/configuration errors
    #[error("Failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Component not configured: {name}")]
    ComponentNotConfigured { name: String },

    #[error("Invalid pattern for {name}: {message}")]
    InvalidPattern { name: String, message: String },

    #[error("Unsupported platform: {os}")]
    UnsupportedPlatform { os: String },

    // Resolution errors
    #[error("No matching release found for {component}")]
    ReleaseNotFound { component: String },

    #[error("No release asset found for {component}")]
    AssetNotFound { component: String },

    // Transfer errors
    #[error("Network error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Max retries exceeded for {url}")]
    MaxRetries { url: String },

    #[error("Failed to decode response from {url}: {message}")]
    ResponseDecode { url: String, message: String },

    // Staging/install errors
    #[error("No downloaded file for {component}")]
    DownloadedFileMissing { component: String },

    #[error("Archive member not found in {}: {member}", .archive.display())]
    ArchiveMemberNotFound { archive: PathBuf, member: String },

    #[error("Corrupt archive {}: {source}", .archive.display())]
    ArchiveCorrupt {
        archive: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("Unsafe path in archive: {path}")]
    UnsafeArchivePath { path: String },

    // Environment errors
    #[error("Game directory does not exist: {}", .path.display())]
    GameDirMissing { path: PathBuf },

    #[error("Not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("Expected game file is missing: {}", .path.display())]
    GameFileMissing { path: PathBuf },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SetupError {
    /// True for failures scoped to one component's resolution or transfer.
    /// The download batch reports these and moves on to the next component.
    pub fn is_component_failure(&self) -> bool {
        matches!(
            self,
            SetupError::ReleaseNotFound { .. }
                | SetupError::AssetNotFound { .. }
                | SetupError::Request(_)
                | SetupError::HttpStatus { .. }
                | SetupError::MaxRetries { .. }
                | SetupError::ResponseDecode { .. }
                | SetupError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_failures_cover_resolution_and_transfer() {
        assert!(SetupError::ReleaseNotFound {
            component: "SMAPI".to_string()
        }
        .is_component_failure());
        assert!(SetupError::HttpStatus {
            status: 503,
            url: "https://api.github.com".to_string()
        }
        .is_component_failure());
        assert!(!SetupError::InvalidManifest {
            message: "empty".to_string()
        }
        .is_component_failure());
        assert!(!SetupError::DownloadedFileMissing {
            component: "SMAPI".to_string()
        }
        .is_component_failure());
    }

    #[test]
    fn messages_name_the_component() {
        let err = SetupError::ReleaseNotFound {
            component: "Stardew Access".to_string(),
        };
        assert!(err.to_string().contains("Stardew Access"));
    }
}
