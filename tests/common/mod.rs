//! Common test utilities for synchronization tests.

#![allow(dead_code)]

use levitate_deps::helpers::acquire::HttpFetcher;
use levitate_deps::helpers::internal::hash::sha256_reader;
use levitate_deps::helpers::tool::{ToolCommand, ToolOutput, ToolRunner};
use levitate_deps::{DependencySpec, PatchSpec, SyncConfig, Synchronizer, ToolPaths};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Project root with a `patches/` directory; the package directory is `<root>/package`.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("patches")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn package_dir(&self) -> PathBuf {
        self.root().join("package")
    }

    pub fn config(&self) -> SyncConfig {
        SyncConfig::new(self.root())
            .with_platform("Linux")
            .with_tools(ToolPaths {
                sevenzip: PathBuf::from("7z"),
                patch: PathBuf::from("patch"),
            })
    }

    pub fn write_patch(&self, name: &str) -> PathBuf {
        let rel = PathBuf::from("patches").join(name);
        std::fs::write(self.root().join(&rel), "--- a/x\n+++ b/x\n").unwrap();
        rel
    }

    pub fn synchronizer(&self, config: SyncConfig, tools: &FakeTools) -> Synchronizer {
        Synchronizer::with_backends(
            config,
            Box::new(HttpFetcher::new(Duration::from_secs(5))),
            Box::new(tools.clone()),
        )
        .unwrap()
    }

    pub fn marker(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.package_dir().join(format!("{}.sha256", name))).ok()
    }
}

/// Stands in for `7z` and `patch`.
///
/// `7z` lays out `installer_layout` under its `-o` directory; `patch` exits
/// non-zero while `fail_patch` is set. Every invocation is recorded.
#[derive(Clone, Default)]
pub struct FakeTools {
    pub installer_layout: Vec<&'static str>,
    pub fail_patch: Arc<Mutex<bool>>,
    pub calls: Arc<Mutex<Vec<ToolCommand>>>,
}

impl FakeTools {
    pub fn set_fail_patch(&self, fail: bool) {
        *self.fail_patch.lock().unwrap() = fail;
    }

    pub fn calls_to(&self, program: &str) -> Vec<ToolCommand> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program == Path::new(program))
            .cloned()
            .collect()
    }
}

impl ToolRunner for FakeTools {
    fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
        self.calls.lock().unwrap().push(command.clone());

        if command.program == Path::new("7z") {
            let out_dir = command
                .args
                .iter()
                .find_map(|a| a.to_str().and_then(|s| s.strip_prefix("-o")))
                .map(PathBuf::from)
                .expect("7z called without -o");
            for rel in &self.installer_layout {
                let path = out_dir.join(rel);
                std::fs::create_dir_all(path.parent().unwrap())?;
                std::fs::write(&path, rel.as_bytes())?;
            }
            return Ok(ok());
        }

        if *self.fail_patch.lock().unwrap() {
            return Ok(ToolOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "Hunk #1 FAILED at 1.".to_string(),
            });
        }
        Ok(ok())
    }
}

fn ok() -> ToolOutput {
    ToolOutput {
        code: Some(0),
        stdout: String::new(),
        stderr: String::new(),
    }
}

pub fn dep(name: &str, url: String, hash: Option<String>) -> DependencySpec {
    DependencySpec {
        name: name.to_string(),
        url,
        platform_filter: None,
        expected_hash: hash,
        patches: Vec::new(),
    }
}

pub fn patch_spec(file: &str, patch: PathBuf) -> PatchSpec {
    PatchSpec {
        target_file: PathBuf::from(file),
        patch_file: patch,
    }
}

pub fn digest(bytes: &[u8]) -> String {
    sha256_reader(bytes).unwrap()
}

pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, content) in files {
        writer.start_file(*path, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Relative path -> contents of every file under `dir`.
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(dir).unwrap().to_path_buf();
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect()
}
