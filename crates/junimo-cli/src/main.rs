mod install;
mod notifier;
mod resolve;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use junimo_setup::Manifest;

/// Component list compiled into the binary; `--manifest` overrides it.
const DEFAULT_MANIFEST: &str = include_str!("../data/installer.json");

const TOKEN_ENV: &str = "JUNIMO_GITHUB_TOKEN";
const TOKEN_ENV_FALLBACK: &str = "GITHUB_TOKEN";

#[derive(Parser, Debug)]
#[command(name = "junimo")]
#[command(about = "Installs SMAPI and accessibility mods for Stardew Valley")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Manifest file overriding the built-in component list
    #[arg(long, global = true, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// GitHub personal access token (raises the API rate limit)
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which release and asset each component resolves to
    Resolve(resolve::ResolveArgs),

    /// Download every component and install it into the game directory
    Install(install::InstallArgs),
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);

    let manifest = load_manifest(args.manifest.as_deref())?;
    let token = args.token.or_else(env_token);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| anyhow::anyhow!("Failed to create async runtime: {e}"))?;
    match args.command {
        Commands::Resolve(resolve_args) => rt.block_on(resolve::execute(resolve_args, manifest, token)),
        Commands::Install(install_args) => rt.block_on(install::execute(install_args, manifest, token)),
    }
}

/// `RUST_LOG` wins; the `-v` flags only raise the default level.
fn init_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbosity {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        2 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.init();
}

fn load_manifest(path: Option<&Path>) -> Result<Manifest> {
    match path {
        Some(path) => Manifest::from_file(path)
            .with_context(|| format!("Failed to load manifest {}", path.display())),
        None => Manifest::parse(DEFAULT_MANIFEST).context("Built-in manifest is invalid"),
    }
}

fn env_token() -> Option<String> {
    [TOKEN_ENV, TOKEN_ENV_FALLBACK]
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|token| !token.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_manifest_is_valid() {
        let manifest = Manifest::parse(DEFAULT_MANIFEST).unwrap();
        assert_eq!(manifest.loader, "SMAPI");
        assert!(manifest.components.len() >= 2);
        for platform in ["windows", "linux", "macOS"] {
            assert!(manifest.game_paths.contains_key(platform), "{platform}");
        }
    }

    #[test]
    fn built_in_loader_is_mandatory() {
        let manifest = Manifest::parse(DEFAULT_MANIFEST).unwrap();
        assert!(manifest.component("SMAPI").unwrap().is_mandatory);
    }

    #[test]
    fn manifest_flag_overrides_the_built_in_list() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(
            &path,
            r#"{"components": {"SMAPI": {"repository": "Pathoschild/SMAPI"}}}"#,
        )
        .unwrap();
        let manifest = load_manifest(Some(&path)).unwrap();
        assert_eq!(manifest.components.len(), 1);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
