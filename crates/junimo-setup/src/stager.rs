//! Archive staging: the loader bundle and ordinary mod archives.
//!
//! The loader ships as a nested archive: an outer zip with one top-level
//! directory holding per-platform payloads under `internal/{platform}/`,
//! each payload itself a zip of the files that belong in the game
//! directory. Ordinary mods are plain zips carrying their own top-level
//! folder.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::platform::Platform;
use crate::{Result, SetupError};

const LOADER_INTERNAL_DIR: &str = "internal";
const LOADER_PAYLOAD_NAME: &str = "install.dat";
const LOADER_STAGE_DIR: &str = "loader";

/// Name of the mods directory, both in staging and in the game directory.
pub const MODS_DIR: &str = "Mods";

pub struct Stager {
    staging_dir: PathBuf,
    platform: Platform,
}

impl Stager {
    pub fn new(staging_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            platform,
        }
    }

    /// Staging subdirectory the mod archives extract into.
    pub fn mods_dir(&self) -> PathBuf {
        self.staging_dir.join(MODS_DIR)
    }

    /// The member path this platform's payload lives at inside a bundle
    /// rooted at `root`.
    fn payload_member(&self, root: &str) -> String {
        format!(
            "{root}{LOADER_INTERNAL_DIR}/{}/{LOADER_PAYLOAD_NAME}",
            self.platform.as_str()
        )
    }

    /// Extract just the platform payload out of the loader bundle and
    /// return its staged location. No other member is touched.
    pub fn open_loader_bundle(&self, path: &Path) -> Result<PathBuf> {
        let mut archive = open_archive(path)?;

        let member = {
            let root = archive
                .name_for_index(0)
                .and_then(|first| first.find('/').map(|i| &first[..=i]))
                .unwrap_or("");
            self.payload_member(root)
        };
        check_entry_name(&member)?;

        let mut entry = archive.by_name(&member).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => SetupError::ArchiveMemberNotFound {
                archive: path.to_path_buf(),
                member: member.clone(),
            },
            other => SetupError::ArchiveCorrupt {
                archive: path.to_path_buf(),
                source: other,
            },
        })?;

        // Keep the archive-relative path, like a full extraction would.
        let dest = self.staging_dir.join(&member);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;

        log::debug!("Staged loader payload at {}", dest.display());
        Ok(dest)
    }

    /// Extract the inner loader payload (itself a zip) into the staging
    /// `loader/` directory and return that directory.
    pub fn stage_loader_payload(&self, inner: &Path) -> Result<PathBuf> {
        let dest = self.staging_dir.join(LOADER_STAGE_DIR);
        extract_all(inner, &dest)?;
        Ok(dest)
    }

    /// Extract an ordinary component's archive into the staging mods
    /// directory. Archives keep their own top-level folder.
    pub fn stage_mod(&self, path: &Path) -> Result<PathBuf> {
        let dest = self.mods_dir();
        extract_all(path, &dest)?;
        Ok(dest)
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| SetupError::ArchiveCorrupt {
        archive: path.to_path_buf(),
        source: e,
    })
}

/// Refuses entry names that would resolve outside the extraction root:
/// rooted paths, drive prefixes and `..` components. Joining such a name
/// onto the staging directory would replace or climb out of it.
fn check_entry_name(name: &str) -> Result<()> {
    let escapes = Path::new(name).components().any(|c| {
        matches!(
            c,
            Component::RootDir | Component::Prefix(_) | Component::ParentDir
        )
    });
    if escapes {
        return Err(SetupError::UnsafeArchivePath {
            path: name.to_string(),
        });
    }
    Ok(())
}

/// Extract a whole zip into `dest_dir`, refusing traversal and restoring
/// unix permission bits.
fn extract_all(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let mut archive = open_archive(archive_path)?;
    fs::create_dir_all(dest_dir)?;
    let dest_canonical = dest_dir.canonicalize()?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| SetupError::ArchiveCorrupt {
                archive: archive_path.to_path_buf(),
                source: e,
            })?;

        let name = entry.name().to_string();
        if name.is_empty() {
            continue;
        }
        check_entry_name(&name)?;

        let outpath = dest_dir.join(&name);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }

        // Canonicalize via the parent for files that don't exist yet.
        let outpath_canonical = outpath.canonicalize().unwrap_or_else(|_| {
            match (outpath.parent(), outpath.file_name()) {
                (Some(parent), Some(file_name)) => parent
                    .canonicalize()
                    .map(|p| p.join(file_name))
                    .unwrap_or_else(|_| outpath.clone()),
                _ => outpath.clone(),
            }
        });
        if !outpath_canonical.starts_with(&dest_canonical) {
            return Err(SetupError::UnsafeArchivePath { path: name });
        }

        let mut out = File::create(&outpath)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, contents) in entries {
            if name.ends_with('/') {
                writer.add_directory(name.to_string(), options).unwrap();
            } else {
                writer.start_file(name.to_string(), options).unwrap();
                writer.write_all(contents).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, contents) in entries {
            writer.start_file(name.to_string(), options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn loader_bundle(dir: &Path, platform: Platform) -> PathBuf {
        let inner = zip_bytes(&[
            ("StardewModdingAPI.dll", b"loader".as_slice()),
            ("smapi-internal/config.json", b"{}".as_slice()),
        ]);
        let bundle = dir.join("smapi-installer.zip");
        write_zip(
            &bundle,
            &[
                ("SMAPI 4.1.10 installer/", b"".as_slice()),
                (
                    &format!("SMAPI 4.1.10 installer/internal/{}/install.dat", platform),
                    inner.as_slice(),
                ),
                (
                    "SMAPI 4.1.10 installer/README.txt",
                    b"see docs".as_slice(),
                ),
            ],
        );
        bundle
    }

    #[test]
    fn extracts_only_the_platform_payload() {
        let staging = TempDir::new().unwrap();
        let platform = Platform::current().unwrap();
        let bundle = loader_bundle(staging.path(), platform);
        let stager = Stager::new(staging.path(), platform);

        let inner = stager.open_loader_bundle(&bundle).unwrap();

        assert!(inner.ends_with(format!("internal/{platform}/install.dat")));
        assert!(inner.is_file());
        // Nothing else from the bundle was written.
        assert!(!staging
            .path()
            .join("SMAPI 4.1.10 installer/README.txt")
            .exists());
    }

    #[test]
    fn staged_payload_unpacks_into_loader_dir() {
        let staging = TempDir::new().unwrap();
        let platform = Platform::current().unwrap();
        let bundle = loader_bundle(staging.path(), platform);
        let stager = Stager::new(staging.path(), platform);

        let inner = stager.open_loader_bundle(&bundle).unwrap();
        let payload = stager.stage_loader_payload(&inner).unwrap();

        assert!(payload.join("StardewModdingAPI.dll").is_file());
        assert!(payload.join("smapi-internal/config.json").is_file());
    }

    #[test]
    fn missing_platform_member_names_the_member() {
        let staging = TempDir::new().unwrap();
        let bundle = staging.path().join("bad-bundle.zip");
        write_zip(&bundle, &[("SMAPI installer/README.txt", b"".as_slice())]);
        let stager = Stager::new(staging.path(), Platform::current().unwrap());

        let err = stager.open_loader_bundle(&bundle).unwrap_err();
        match err {
            SetupError::ArchiveMemberNotFound { member, .. } => {
                assert!(member.contains("internal/"));
                assert!(member.ends_with("install.dat"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_file_reports_corrupt_archive() {
        let staging = TempDir::new().unwrap();
        let not_a_zip = staging.path().join("mod.zip");
        fs::write(&not_a_zip, b"this is not a zip file").unwrap();
        let stager = Stager::new(staging.path(), Platform::current().unwrap());

        let err = stager.stage_mod(&not_a_zip).unwrap_err();
        assert!(matches!(err, SetupError::ArchiveCorrupt { .. }));
    }

    #[test]
    fn mods_extract_under_the_mods_dir() {
        let staging = TempDir::new().unwrap();
        let archive = staging.path().join("stardew-access.zip");
        write_zip(
            &archive,
            &[
                ("Stardew Access/manifest.json", b"{}".as_slice()),
                ("Stardew Access/StardewAccess.dll", b"dll".as_slice()),
            ],
        );
        let stager = Stager::new(staging.path(), Platform::current().unwrap());

        let mods = stager.stage_mod(&archive).unwrap();

        assert_eq!(mods, stager.mods_dir());
        assert!(mods.join("Stardew Access/manifest.json").is_file());
        assert!(mods.join("Stardew Access/StardewAccess.dll").is_file());
    }

    #[test]
    fn two_mods_share_the_staging_mods_dir() {
        let staging = TempDir::new().unwrap();
        let a = staging.path().join("a.zip");
        let b = staging.path().join("b.zip");
        write_zip(&a, &[("Mod A/manifest.json", b"{}".as_slice())]);
        write_zip(&b, &[("Mod B/manifest.json", b"{}".as_slice())]);
        let stager = Stager::new(staging.path(), Platform::current().unwrap());

        stager.stage_mod(&a).unwrap();
        stager.stage_mod(&b).unwrap();

        assert!(stager.mods_dir().join("Mod A/manifest.json").is_file());
        assert!(stager.mods_dir().join("Mod B/manifest.json").is_file());
    }

    #[test]
    fn traversal_entries_are_refused() {
        let staging = TempDir::new().unwrap();
        let archive = staging.path().join("evil.zip");
        write_zip(&archive, &[("../evil.txt", b"break out".as_slice())]);
        let stager = Stager::new(staging.path(), Platform::current().unwrap());

        let err = stager.stage_mod(&archive).unwrap_err();
        assert!(matches!(err, SetupError::UnsafeArchivePath { .. }));
    }

    #[test]
    fn rooted_entries_are_refused() {
        let staging = TempDir::new().unwrap();
        let archive = staging.path().join("evil.zip");
        write_zip(&archive, &[("/tmp/evil.txt", b"break out".as_slice())]);
        let stager = Stager::new(staging.path(), Platform::current().unwrap());

        let err = stager.stage_mod(&archive).unwrap_err();
        assert!(matches!(err, SetupError::UnsafeArchivePath { .. }));
    }

    #[test]
    fn rooted_bundle_member_never_leaves_staging() {
        let dir = TempDir::new().unwrap();
        let platform = Platform::current().unwrap();
        // A rooted first entry makes the computed payload member rooted,
        // which would turn the staging join into an absolute write.
        let bundle = dir.path().join("rooted.zip");
        write_zip(
            &bundle,
            &[(
                &format!("/internal/{platform}/install.dat"),
                b"payload".as_slice(),
            )],
        );
        let stage_root = dir.path().join("stage");
        let stager = Stager::new(&stage_root, platform);

        let err = stager.open_loader_bundle(&bundle).unwrap_err();
        match err {
            SetupError::UnsafeArchivePath { path } => assert!(path.starts_with('/'), "{path}"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!stage_root.exists());
    }
}
