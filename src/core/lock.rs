//! Package directory lock
//!
//! Two `levitate-deps sync` runs against the same package directory would delete each
//! other's output directories mid-extraction; the lock makes the second fail fast.
//! The lock file holds the owner's pid so the error can name it.

use anyhow::{Context, Result, bail};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Lock file name inside the package directory
pub const LOCK_FILE_NAME: &str = ".deps.lock";

/// Lock files untouched for this long are left over from a crashed run
const STALE_AFTER: Duration = Duration::from_secs(2 * 60 * 60);

/// Exclusive hold on a package directory; released and removed on drop.
#[derive(Debug)]
pub struct PackageLock {
    file: File,
    path: PathBuf,
}

impl PackageLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PackageLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn is_stale(lock_path: &Path) -> bool {
    std::fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_AFTER)
}

/// Lock `package_dir` for this process.
pub fn acquire_package_lock(package_dir: &Path) -> Result<PackageLock> {
    let lock_path = package_dir.join(LOCK_FILE_NAME);

    if is_stale(&lock_path) {
        let _ = std::fs::remove_file(&lock_path);
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

    if file.try_lock_exclusive().is_err() {
        let mut holder = String::new();
        let _ = file.read_to_string(&mut holder);
        let holder = match holder.trim() {
            "" => String::new(),
            pid => format!(" (pid {})", pid),
        };
        bail!(
            "Package directory '{}' is already being synchronized by another process{}. \
             If this is incorrect, delete '{}'",
            package_dir.display(),
            holder,
            lock_path.display()
        );
    }

    file.set_len(0)
        .and_then(|()| file.rewind())
        .and_then(|()| write!(file, "{}", std::process::id()))
        .with_context(|| format!("Failed to write lock file: {}", lock_path.display()))?;

    Ok(PackageLock {
        file,
        path: lock_path,
    })
}
