pub mod cancel;
pub mod downloader;
pub mod error;
pub mod event;
pub mod fsutil;
pub mod github;
pub mod installer;
pub mod manifest;
pub mod platform;
pub mod resolver;
pub mod stager;

pub use cancel::CancelToken;
pub use downloader::{DownloadSummary, Downloader, FetchOutcome};
pub use error::{Result, SetupError};
pub use event::{Notifier, NullNotifier};
pub use github::{
    GitHubClient, GitHubClientConfig, GitHubReleases, Release, ReleaseAsset, ReleaseSource,
    Transfer,
};
pub use installer::{InstallOutcome, InstallPhase, Installer};
pub use manifest::{AssetSelector, ComponentSpec, Manifest, SharedManifest};
pub use platform::Platform;
pub use resolver::ReleaseResolver;
pub use stager::Stager;
