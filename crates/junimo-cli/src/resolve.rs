//! Resolve command - show what each component would download, without
//! downloading anything.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::style;
use indicatif::HumanBytes;

use junimo_setup::{GitHubClient, GitHubClientConfig, GitHubReleases, Manifest, ReleaseResolver};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Include prereleases for a component (repeatable)
    #[arg(long, value_name = "NAME")]
    pub prerelease: Vec<String>,

    /// Print machine-readable JSON instead of styled text
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ResolveArgs, mut manifest: Manifest, token: Option<String>) -> Result<i32> {
    for name in &args.prerelease {
        manifest.set_include_prerelease(name, true)?;
    }

    let client = GitHubClient::with_config(GitHubClientConfig::new().with_token(token))?;
    let resolver = ReleaseResolver::new(Arc::new(GitHubReleases::new(client)));

    let mut failures = 0;
    let mut report = Vec::new();

    for (name, spec) in &manifest.components {
        match resolver.resolve(name, spec).await {
            Ok((release, asset)) => {
                if args.json {
                    report.push(serde_json::json!({
                        "component": name,
                        "repository": spec.repository,
                        "tag": release.tag_name,
                        "title": release.title(),
                        "prerelease": release.prerelease,
                        "published_at": release.published_at,
                        "asset": asset.name,
                        "size": asset.size,
                        "url": asset.browser_download_url,
                    }));
                    continue;
                }
                println!("{} {}", style(name).cyan().bold(), release.tag_name);
                if !release.title().is_empty() {
                    println!("  release: {}", release.title());
                }
                if let Some(published) = release.published_at {
                    println!("  published: {}", published.format("%Y-%m-%d"));
                }
                println!("  asset: {} ({})", asset.name, HumanBytes(asset.size));
            }
            Err(e) => {
                failures += 1;
                if args.json {
                    report.push(serde_json::json!({
                        "component": name,
                        "repository": spec.repository,
                        "error": e.to_string(),
                    }));
                    continue;
                }
                println!("{} {e}", style(name).red().bold());
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(if failures == 0 { 0 } else { 1 })
}
