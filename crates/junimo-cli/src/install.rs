//! Install command - the full pipeline: resolve, download, stage, merge.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use directories::ProjectDirs;

use junimo_setup::{
    CancelToken, Downloader, GitHubClient, GitHubClientConfig, GitHubReleases, Installer,
    Manifest, Platform, ReleaseResolver,
};

use crate::notifier::ConsoleNotifier;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Game directory; auto-detected from known install locations when omitted
    #[arg(long, value_name = "PATH")]
    pub game_dir: Option<PathBuf>,

    /// Where downloaded assets are kept between runs
    #[arg(long, value_name = "PATH")]
    pub download_dir: Option<PathBuf>,

    /// Include prereleases for a component (repeatable)
    #[arg(long, value_name = "NAME")]
    pub prerelease: Vec<String>,

    /// Switch a component to its alternate asset variant (repeatable)
    #[arg(long, value_name = "NAME")]
    pub variant: Vec<String>,

    /// Leave an optional component out of this run (repeatable)
    #[arg(long, value_name = "NAME")]
    pub skip: Vec<String>,
}

pub async fn execute(args: InstallArgs, mut manifest: Manifest, token: Option<String>) -> Result<i32> {
    let platform = Platform::current()?;

    for name in &args.prerelease {
        manifest.set_include_prerelease(name, true)?;
    }
    for name in &args.variant {
        manifest.toggle_variant(name)?;
    }
    for name in &args.skip {
        manifest.remove_component(name)?;
    }

    let game_dir = match args.game_dir {
        Some(dir) => dir,
        None => manifest
            .detect_game_dir(platform)
            .context("No Stardew Valley install found; pass --game-dir")?,
    };
    println!("{} {}", style("Game directory:").cyan(), game_dir.display());

    let download_dir = match args.download_dir {
        Some(dir) => dir,
        None => default_download_dir()?,
    };
    log::debug!("Downloads kept in {}", download_dir.display());

    let client = GitHubClient::with_config(GitHubClientConfig::new().with_token(token))?;
    let resolver = Arc::new(ReleaseResolver::new(Arc::new(GitHubReleases::new(client))));
    let notifier = Arc::new(ConsoleNotifier::new());
    let manifest = manifest.into_shared();

    let download_cancel = CancelToken::new();
    let install_cancel = CancelToken::new();

    // Ctrl-C flips both flags; each worker winds down at its next
    // checkpoint rather than being killed mid-write.
    {
        let download_cancel = download_cancel.clone();
        let install_cancel = install_cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping...");
                download_cancel.cancel();
                install_cancel.cancel();
            }
        });
    }

    let downloader = Downloader::new(
        resolver,
        manifest.clone(),
        &download_dir,
        download_cancel,
        notifier.clone(),
    );
    let summary = tokio::spawn(async move { downloader.fetch_all().await })
        .await
        .context("Download task failed")?;

    if summary.canceled {
        return Ok(130);
    }
    if !summary.failed.is_empty() {
        for (name, reason) in &summary.failed {
            eprintln!("{} {name}: {reason}", style("Failed:").red());
        }
        eprintln!("Nothing was installed.");
        return Ok(1);
    }

    let installer = Installer::new(manifest, &game_dir, platform, install_cancel, notifier);
    let outcome = tokio::task::spawn_blocking(move || installer.install_all())
        .await
        .context("Install task failed")??;

    if outcome.is_canceled() {
        return Ok(130);
    }

    println!();
    print_launch_hint(&game_dir, platform, outcome.steam_install);
    Ok(0)
}

/// SMAPI only hooks into the game when launched through its own
/// executable; Steam users additionally want the overlay kept alive.
fn print_launch_hint(game_dir: &Path, platform: Platform, steam_install: bool) {
    let loader = match platform {
        Platform::Windows => "StardewModdingAPI.exe",
        _ => "StardewModdingAPI",
    };
    let loader_path = game_dir.join(loader);

    if steam_install {
        println!("{} Steam install detected.", style("Note:").cyan());
        println!("To keep achievements and the overlay, set the game's launch options in Steam to:");
        println!("    \"{}\" %command%", loader_path.display());
    } else {
        println!("Launch the game through {}", loader_path.display());
    }
}

fn default_download_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "junimo")
        .context("No usable home directory for downloads; pass --download-dir")?;
    Ok(dirs.data_dir().join("downloads"))
}
