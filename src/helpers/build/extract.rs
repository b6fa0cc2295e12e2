//! Archive extraction
//!
//! Formats are tried in a fixed order (zip, tar, platform installer) by a
//! table of probe/extract pairs. The first probe that accepts the file wins;
//! when none does, the archive is reported as unsupported.
//!
//! Zip and tar are unpacked natively; the installer path shells out to 7-Zip.

use crate::core::output;
use crate::error::{SyncError, SyncResult};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use super::super::internal::progress;
use super::super::tool::ToolRunner;
use super::installer::{self, InstallerConfig};
use super::sniff;

/// Container format an archive was extracted as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    Installer,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::Installer => "installer",
        };
        f.write_str(name)
    }
}

/// Everything an extraction strategy needs.
pub struct Extraction<'a> {
    pub archive: &'a Path,
    /// Output directory; created by the extractor
    pub dest: &'a Path,
    pub installer: &'a InstallerConfig,
    pub runner: &'a dyn ToolRunner,
}

struct Strategy {
    format: ArchiveFormat,
    probe: fn(&Extraction<'_>) -> SyncResult<bool>,
    extract: fn(&Extraction<'_>) -> SyncResult<()>,
}

/// Tried in order; zip first so self-extracting zips are unpacked natively.
const STRATEGIES: &[Strategy] = &[
    Strategy {
        format: ArchiveFormat::Zip,
        probe: probe_zip,
        extract: extract_zip,
    },
    Strategy {
        format: ArchiveFormat::Tar,
        probe: probe_tar,
        extract: extract_tar_any,
    },
    Strategy {
        format: ArchiveFormat::Installer,
        probe: probe_installer,
        extract: installer::extract_installer,
    },
];

/// Detect the archive's format and unpack it into `ex.dest`.
pub fn extract_archive(ex: &Extraction<'_>) -> SyncResult<ArchiveFormat> {
    for strategy in STRATEGIES {
        if !(strategy.probe)(ex)? {
            continue;
        }

        let filename = ex
            .archive
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive".to_string());

        let pb = progress::create_spinner(&format!("extracting {} ({})", filename, strategy.format));
        let result = (strategy.extract)(ex);
        pb.finish_and_clear();

        result?;
        output::detail(&format!("extracted {} to {}", filename, ex.dest.display()));
        return Ok(strategy.format);
    }

    Err(SyncError::UnsupportedFormat {
        path: ex.archive.to_path_buf(),
    })
}

fn probe_zip(ex: &Extraction<'_>) -> SyncResult<bool> {
    sniff::is_zip(ex.archive).map_err(SyncError::io("cannot read", ex.archive))
}

fn probe_tar(ex: &Extraction<'_>) -> SyncResult<bool> {
    sniff::is_tar(ex.archive).map_err(SyncError::io("cannot read", ex.archive))
}

fn probe_installer(ex: &Extraction<'_>) -> SyncResult<bool> {
    Ok(ex.installer.matches(ex.archive))
}

// ============================================================================
// Native archive extraction
// ============================================================================

fn normalize_lexical(path: &Path) -> PathBuf {
    // Lexically normalize a path (no filesystem access). This is used to
    // validate link targets without following symlinks.
    let mut out = PathBuf::new();
    let mut has_root = false;

    for c in path.components() {
        match c {
            Component::Prefix(p) => {
                out.clear();
                out.push(p.as_os_str());
                has_root = true;
            }
            Component::RootDir => {
                out.push(Component::RootDir.as_os_str());
                has_root = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = out
                    .components()
                    .next_back()
                    .is_some_and(|last| matches!(last, Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !has_root {
                    // Preserve leading ".." for relative paths.
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }

    out
}

fn ensure_no_symlink_components(dest: &Path, full_path: &Path) -> SyncResult<()> {
    let rel = full_path.strip_prefix(dest).map_err(|_| {
        SyncError::UnsafeEntry(format!("path outside destination: {}", full_path.display()))
    })?;

    // Reject if any existing path component (including leaf) is a symlink.
    let mut cur = dest.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(md) = std::fs::symlink_metadata(&cur)
            && md.file_type().is_symlink()
        {
            return Err(SyncError::UnsafeEntry(format!(
                "symlink in path component: {}",
                cur.display()
            )));
        }
    }

    Ok(())
}

fn ensure_link_target_within_dest(
    dest: &Path,
    link_parent: &Path,
    link_name: &Path,
) -> SyncResult<()> {
    if link_name.is_absolute()
        || link_name
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return Err(SyncError::UnsafeEntry(format!(
            "absolute link target: {}",
            link_name.display()
        )));
    }

    // Resolve relative to the link's parent, then ensure it stays within dest.
    let candidate = normalize_lexical(&link_parent.join(link_name));
    let norm_dest = normalize_lexical(dest);
    if candidate.strip_prefix(&norm_dest).is_err() {
        return Err(SyncError::UnsafeEntry(format!(
            "link target escapes destination: {} -> {}",
            link_parent.display(),
            link_name.display()
        )));
    }

    Ok(())
}

/// Unpack a (decompressed) tar stream into `dest`.
fn extract_tar<R: Read>(reader: R, archive_path: &Path, dest: &Path) -> SyncResult<()> {
    let corrupt = |e: std::io::Error| SyncError::CorruptArchive {
        path: archive_path.to_path_buf(),
        message: e.to_string(),
    };

    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;

        let path = entry.path().map_err(corrupt)?.into_owned();

        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(SyncError::UnsafeEntry(path.display().to_string()));
        }

        // Some archives contain a "." entry; treat it as a no-op.
        if path.as_os_str().is_empty() || path == Path::new(".") {
            continue;
        }

        let full_path = dest.join(&path);

        // Block tar "symlink swap" escapes: writing through an existing
        // symlink component could leave `dest` even for a clean path.
        ensure_no_symlink_components(dest, &full_path)?;

        if let Some(parent) = full_path.parent() {
            if parent.starts_with(dest) {
                ensure_no_symlink_components(dest, parent)?;
            }
            std::fs::create_dir_all(parent).map_err(SyncError::io("cannot create", parent))?;
        }

        match entry.header().entry_type() {
            // Hard link targets name another entry, relative to the archive root
            tar::EntryType::Link => {
                let target = link_target(&entry, &path, corrupt)?;
                ensure_link_target_within_dest(dest, dest, &target)?;
                let source = dest.join(&target);
                ensure_no_symlink_components(dest, &source)?;
                link_within_dest(&source, &full_path)?;
            }
            tar::EntryType::Symlink => {
                let target = link_target(&entry, &path, corrupt)?;
                let link_parent = full_path.parent().unwrap_or(dest);
                ensure_link_target_within_dest(dest, link_parent, &target)?;
                entry
                    .unpack(&full_path)
                    .map_err(SyncError::io("cannot unpack", &full_path))?;
            }
            _ => {
                entry
                    .unpack(&full_path)
                    .map_err(SyncError::io("cannot unpack", &full_path))?;
            }
        }
    }

    Ok(())
}

fn link_target<R: Read>(
    entry: &tar::Entry<'_, R>,
    path: &Path,
    corrupt: impl Fn(std::io::Error) -> SyncError,
) -> SyncResult<PathBuf> {
    match entry.link_name().map_err(corrupt)? {
        Some(target) => Ok(target.into_owned()),
        None => Err(SyncError::UnsafeEntry(format!(
            "link without target: {}",
            path.display()
        ))),
    }
}

/// Create `link` as a hard link to the already extracted `source`.
fn link_within_dest(source: &Path, link: &Path) -> SyncResult<()> {
    if source == link {
        return Ok(());
    }
    // Later entries replace earlier ones with the same path
    if std::fs::symlink_metadata(link).is_ok_and(|m| !m.is_dir()) {
        std::fs::remove_file(link).map_err(SyncError::io("cannot replace", link))?;
    }
    std::fs::hard_link(source, link).map_err(SyncError::io("cannot link", link))
}

/// Extract a tar archive, decompressing according to its magic bytes.
fn extract_tar_any(ex: &Extraction<'_>) -> SyncResult<()> {
    std::fs::create_dir_all(ex.dest).map_err(SyncError::io("cannot create", ex.dest))?;
    let (_, reader) =
        sniff::open_decompressed(ex.archive).map_err(SyncError::io("cannot open", ex.archive))?;
    extract_tar(reader, ex.archive, ex.dest)
}

/// Extract a zip archive
fn extract_zip(ex: &Extraction<'_>) -> SyncResult<()> {
    let dest = ex.dest;
    let corrupt = |e: zip::result::ZipError| SyncError::CorruptArchive {
        path: ex.archive.to_path_buf(),
        message: e.to_string(),
    };

    std::fs::create_dir_all(dest).map_err(SyncError::io("cannot create", dest))?;

    let file = File::open(ex.archive).map_err(SyncError::io("cannot open", ex.archive))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(corrupt)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(corrupt)?;

        let outpath = match file.enclosed_name() {
            Some(path) => dest.join(path),
            None => return Err(SyncError::UnsafeEntry(file.name().to_string())),
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(SyncError::io("cannot create", &outpath))?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).map_err(SyncError::io("cannot create", parent))?;
            }

            let mut outfile =
                File::create(&outpath).map_err(SyncError::io("cannot create", &outpath))?;
            std::io::copy(&mut file, &mut outfile).map_err(SyncError::io("cannot write", &outpath))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
                }
            }
        }
    }

    Ok(())
}
