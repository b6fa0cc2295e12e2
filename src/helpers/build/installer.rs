//! Self-extracting installer unpacking
//!
//! Some vendors ship Windows toolchains only as NSIS installers (LLVM's
//! `LLVM-<version>-win64.exe`). 7-Zip can unpack those: the payload lands in
//! one top-level directory next to NSIS bookkeeping entries like `$PLUGINSDIR`,
//! and that directory's contents become the dependency's output tree.

use crate::error::{SyncError, SyncResult};
use std::path::{Path, PathBuf};

use super::super::tool::{self, ToolCommand, ToolRunner};
use super::extract::Extraction;

/// Which files are installers, and how to unpack them.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    patterns: Vec<glob::Pattern>,
    pub sevenzip: PathBuf,
}

impl InstallerConfig {
    /// Build from file name globs; invalid patterns are rejected.
    pub fn new(patterns: &[String], sevenzip: impl Into<PathBuf>) -> Result<Self, glob::PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            sevenzip: sevenzip.into(),
        })
    }

    /// Whether `archive`'s file name matches a known installer pattern.
    pub fn matches(&self, archive: &Path) -> bool {
        let Some(name) = archive.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.patterns.iter().any(|p| p.matches(name))
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        let patterns = crate::core::config::DEFAULT_INSTALLER_PATTERNS
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();
        Self {
            patterns,
            sevenzip: crate::core::config::ToolPaths::default().sevenzip,
        }
    }
}

/// Unpack an installer with 7-Zip and move its payload into `ex.dest`.
///
/// The scratch directory lives next to the output directory so the final
/// moves are same-filesystem renames; it is removed whether or not
/// extraction succeeds.
pub fn extract_installer(ex: &Extraction<'_>) -> SyncResult<()> {
    let parent = ex.dest.parent().unwrap_or_else(|| Path::new("."));
    let stem = ex
        .dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "installer".to_string());

    let scratch = tempfile::Builder::new()
        .prefix(&format!("{}_temp", stem))
        .tempdir_in(parent)
        .map_err(SyncError::io("cannot create temporary directory in", parent))?;

    let mut out_flag = std::ffi::OsString::from("-o");
    out_flag.push(scratch.path());

    let command = ToolCommand::new(&ex.installer.sevenzip)
        .arg("x")
        .arg("-y")
        .arg(out_flag)
        .arg(ex.archive);
    tool::run_checked(ex.runner, &command)?;

    let payload = find_payload_dir(scratch.path())?;
    move_contents(&payload, ex.dest)?;

    let scratch_path = scratch.path().to_path_buf();
    scratch
        .close()
        .map_err(SyncError::io("cannot remove", scratch_path))?;
    Ok(())
}

/// The single top-level directory not named like NSIS metadata (`$...`).
fn find_payload_dir(extracted: &Path) -> SyncResult<PathBuf> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(extracted).map_err(SyncError::io("cannot read", extracted))? {
        let entry = entry.map_err(SyncError::io("cannot read", extracted))?;
        let is_dir = entry
            .file_type()
            .map_err(SyncError::io("cannot stat", entry.path()))?
            .is_dir();
        if is_dir && !entry.file_name().to_string_lossy().starts_with('$') {
            candidates.push(entry.path());
        }
    }

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        found => Err(SyncError::InstallerLayout {
            dir: extracted.to_path_buf(),
            found,
        }),
    }
}

fn move_contents(from: &Path, to: &Path) -> SyncResult<()> {
    std::fs::create_dir_all(to).map_err(SyncError::io("cannot create", to))?;
    for entry in std::fs::read_dir(from).map_err(SyncError::io("cannot read", from))? {
        let entry = entry.map_err(SyncError::io("cannot read", from))?;
        let target = to.join(entry.file_name());
        std::fs::rename(entry.path(), &target).map_err(SyncError::io("cannot move to", &target))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::tool::ToolOutput;
    use std::cell::RefCell;

    /// Pretends to be 7-Zip: lays out `layout` under the `-o` directory.
    struct Fake7z {
        layout: Vec<&'static str>,
        exit_code: i32,
        calls: RefCell<Vec<ToolCommand>>,
    }

    impl Fake7z {
        fn new(layout: Vec<&'static str>) -> Self {
            Self {
                layout,
                exit_code: 0,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ToolRunner for Fake7z {
        fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
            self.calls.borrow_mut().push(command.clone());
            let out_dir = command
                .args
                .iter()
                .find_map(|a| a.to_str().and_then(|s| s.strip_prefix("-o")))
                .map(PathBuf::from)
                .expect("missing -o argument");

            for rel in &self.layout {
                let path = out_dir.join(rel);
                if rel.ends_with('/') {
                    std::fs::create_dir_all(&path)?;
                } else {
                    std::fs::create_dir_all(path.parent().unwrap())?;
                    std::fs::write(&path, rel.as_bytes())?;
                }
            }

            Ok(ToolOutput {
                code: Some(self.exit_code),
                stdout: String::new(),
                stderr: if self.exit_code == 0 {
                    String::new()
                } else {
                    "ERROR: Can not open the file as archive".to_string()
                },
            })
        }
    }

    fn run(runner: &Fake7z, pkg: &Path) -> SyncResult<()> {
        let archive = pkg.join("LLVM-13.0.0-win64.exe");
        std::fs::write(&archive, b"MZ not really an installer").unwrap();
        let dest = pkg.join("llvm");
        let installer = InstallerConfig::new(&["LLVM-*-win64.exe".to_string()], "7z").unwrap();
        extract_installer(&Extraction {
            archive: &archive,
            dest: &dest,
            installer: &installer,
            runner,
        })
    }

    fn leftover_temp_dirs(pkg: &Path) -> Vec<String> {
        std::fs::read_dir(pkg)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.contains("_temp"))
            .collect()
    }

    #[test]
    fn test_payload_moved_into_output() {
        let pkg = tempfile::tempdir().unwrap();
        let runner = Fake7z::new(vec![
            "$PLUGINSDIR/System.dll",
            "Uninstall.exe",
            "payload/bin/clang.exe",
            "payload/lib/",
        ]);

        run(&runner, pkg.path()).unwrap();

        let dest = pkg.path().join("llvm");
        assert!(dest.join("bin/clang.exe").is_file());
        assert!(dest.join("lib").is_dir());
        assert!(!dest.join("$PLUGINSDIR").exists());
        assert!(!dest.join("Uninstall.exe").exists());
        assert!(leftover_temp_dirs(pkg.path()).is_empty());

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("7z"));
        assert_eq!(calls[0].args[0], "x");
        assert_eq!(calls[0].args[1], "-y");
        assert_eq!(
            calls[0].args.last().unwrap(),
            pkg.path().join("LLVM-13.0.0-win64.exe").as_os_str()
        );
    }

    #[test]
    fn test_tool_failure_cleans_scratch() {
        let pkg = tempfile::tempdir().unwrap();
        let mut runner = Fake7z::new(vec!["payload/partial.txt"]);
        runner.exit_code = 2;

        let err = run(&runner, pkg.path()).unwrap_err();
        assert!(matches!(err, SyncError::ToolFailed { code: Some(2), .. }), "got: {err}");
        assert!(!pkg.path().join("llvm").exists());
        assert!(leftover_temp_dirs(pkg.path()).is_empty());
    }

    #[test]
    fn test_ambiguous_payload_rejected() {
        let pkg = tempfile::tempdir().unwrap();
        let runner = Fake7z::new(vec!["one/a.txt", "two/b.txt"]);

        let err = run(&runner, pkg.path()).unwrap_err();
        assert!(
            matches!(err, SyncError::InstallerLayout { found: 2, .. }),
            "got: {err}"
        );
    }

    #[test]
    fn test_pattern_matching() {
        let config = InstallerConfig::default();
        assert!(config.matches(Path::new("/pkg/LLVM-13.0.0-win64.exe")));
        assert!(config.matches(Path::new("LLVM-17.0.6-win64.exe")));
        assert!(!config.matches(Path::new("/pkg/LLVM-13.0.0-win32.exe")));
        assert!(!config.matches(Path::new("/pkg/llvm.tar.xz")));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(InstallerConfig::new(&["[".to_string()], "7z").is_err());
    }
}
