//! Patch application
//!
//! Patches run in manifest order with `patch -p1 --batch <target> <patchfile>`. The
//! first failure stops the sequence; earlier patches are not reverted since a
//! failed dependency is re-extracted from scratch on the next run.

use crate::core::output;
use crate::error::{SyncError, SyncResult};
use crate::manifest::PatchSpec;
use std::path::Path;

use super::tool::{self, ToolCommand, ToolRunner};

/// Strip level passed to `patch`
const STRIP_LEVEL: u32 = 1;

/// Apply `patches` to the tree in `output_dir`.
///
/// Patch file paths resolve against `patch_root`; targets against `output_dir`.
/// Returns the number of patches applied.
pub fn apply_patches(
    patches: &[PatchSpec],
    output_dir: &Path,
    patch_root: &Path,
    patch_tool: &Path,
    runner: &dyn ToolRunner,
) -> SyncResult<usize> {
    for (idx, patch) in patches.iter().enumerate() {
        let patch_file = patch_root.join(&patch.patch_file);
        if !patch_file.is_file() {
            return Err(SyncError::PatchMissing { path: patch_file });
        }

        let target = output_dir.join(&patch.target_file);
        output::detail(&format!(
            "patch {}/{}: {}",
            idx + 1,
            patches.len(),
            patch.target_file.display()
        ));

        let command = ToolCommand::new(patch_tool)
            .arg(format!("-p{}", STRIP_LEVEL))
            .arg("--batch")
            .arg(&target)
            .arg(&patch_file)
            .current_dir(output_dir);
        tool::run_checked(runner, &command)?;
    }

    Ok(patches.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::tool::{SystemRunner, ToolOutput};
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Records invocations; fails the Nth one (1-based) if configured.
    struct FakePatch {
        fail_on: Option<usize>,
        calls: RefCell<Vec<ToolCommand>>,
    }

    impl ToolRunner for FakePatch {
        fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
            self.calls.borrow_mut().push(command.clone());
            let n = self.calls.borrow().len();
            let failed = self.fail_on == Some(n);
            Ok(ToolOutput {
                code: Some(if failed { 1 } else { 0 }),
                stdout: String::new(),
                stderr: if failed { "1 out of 1 hunk FAILED".to_string() } else { String::new() },
            })
        }
    }

    fn spec(file: &str, patch: &str) -> PatchSpec {
        PatchSpec {
            target_file: PathBuf::from(file),
            patch_file: PathBuf::from(patch),
        }
    }

    fn setup(patch_names: &[&str]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("patches")).unwrap();
        std::fs::create_dir_all(root.path().join("out")).unwrap();
        for name in patch_names {
            std::fs::write(root.path().join("patches").join(name), "--- a\n+++ b\n").unwrap();
        }
        root
    }

    #[test]
    fn test_patches_applied_in_order() {
        let root = setup(&["one.patch", "two.patch"]);
        let out = root.path().join("out");
        let runner = FakePatch {
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        };

        let applied = apply_patches(
            &[spec("CMakeLists.txt", "patches/one.patch"), spec("src/zutil.c", "patches/two.patch")],
            &out,
            root.path(),
            Path::new("patch"),
            &runner,
        )
        .unwrap();

        assert_eq!(applied, 2);
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args[0], "-p1");
        assert_eq!(calls[0].args[1], "--batch");
        assert_eq!(calls[0].args[2], out.join("CMakeLists.txt").as_os_str());
        assert_eq!(calls[0].args[3], root.path().join("patches/one.patch").as_os_str());
        assert_eq!(calls[1].args[2], out.join("src/zutil.c").as_os_str());
        assert_eq!(calls[0].cwd.as_deref(), Some(out.as_path()));
    }

    #[test]
    fn test_failure_stops_remaining_patches() {
        let root = setup(&["one.patch", "two.patch", "three.patch"]);
        let runner = FakePatch {
            fail_on: Some(2),
            calls: RefCell::new(Vec::new()),
        };

        let err = apply_patches(
            &[
                spec("a.c", "patches/one.patch"),
                spec("b.c", "patches/two.patch"),
                spec("c.c", "patches/three.patch"),
            ],
            &root.path().join("out"),
            root.path(),
            Path::new("patch"),
            &runner,
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::ToolFailed { code: Some(1), .. }), "got: {err}");
        assert_eq!(runner.calls.borrow().len(), 2);
    }

    #[test]
    fn test_missing_patch_file() {
        let root = setup(&[]);
        let runner = FakePatch {
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        };

        let err = apply_patches(
            &[spec("a.c", "patches/missing.patch")],
            &root.path().join("out"),
            root.path(),
            Path::new("patch"),
            &runner,
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::PatchMissing { .. }));
        assert!(runner.calls.borrow().is_empty());
    }

    fn patch_available() -> bool {
        std::process::Command::new("patch")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    #[test]
    fn test_real_patch_tool() {
        if !patch_available() {
            return;
        }

        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("hello.txt"), "hello\nworld\n").unwrap();
        std::fs::write(
            root.path().join("good.patch"),
            "--- a/hello.txt\n+++ b/hello.txt\n@@ -1,2 +1,2 @@\n hello\n-world\n+patched\n",
        )
        .unwrap();
        std::fs::write(
            root.path().join("bad.patch"),
            "--- a/hello.txt\n+++ b/hello.txt\n@@ -1,2 +1,2 @@\n nothing\n-matches\n+here\n",
        )
        .unwrap();

        apply_patches(
            &[spec("hello.txt", "good.patch")],
            &out,
            root.path(),
            Path::new("patch"),
            &SystemRunner,
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(out.join("hello.txt")).unwrap(),
            "hello\npatched\n"
        );

        let err = apply_patches(
            &[spec("hello.txt", "bad.patch")],
            &out,
            root.path(),
            Path::new("patch"),
            &SystemRunner,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::ToolFailed { .. }), "got: {err}");
    }
}
