//! GitHub releases API access.

pub mod client;
pub mod releases;

pub use client::{GitHubClient, GitHubClientConfig, Transfer};
pub use releases::{ChunkFn, GitHubReleases, Release, ReleaseAsset, ReleaseSource};
