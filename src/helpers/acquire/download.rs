//! Archive download
//!
//! Blocking HTTP retrieval into the package directory. There is no retry or
//! resume: a failed download aborts the dependency and the next run starts over.

use crate::core::output;
use crate::error::{SyncError, SyncResult};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use super::super::internal::progress::{self, upgrade_to_bytes};

/// User agent sent with every request
const USER_AGENT: &str = concat!("levitate-deps/", env!("CARGO_PKG_VERSION"));

/// Retrieves a remote archive to a local path.
pub trait Fetch {
    /// Download `url` to `dest`, replacing any existing file.
    /// Returns the number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> SyncResult<u64>;
}

/// Fetches over HTTP(S) with ureq.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// `timeout` bounds connecting and each individual read, not the whole
    /// transfer, so large archives on slow links still complete.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> SyncResult<u64> {
        let filename = dest
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "download".to_string());

        let pb = progress::create_spinner(&format!("downloading {}", filename));
        let result = self.download_with_progress(url, dest, &pb);
        pb.finish_and_clear();

        let total_bytes = result?;
        output::detail(&format!("downloaded {} ({} bytes)", filename, total_bytes));
        Ok(total_bytes)
    }
}

impl HttpFetcher {
    fn download_with_progress(
        &self,
        url: &str,
        dest: &Path,
        pb: &indicatif::ProgressBar,
    ) -> SyncResult<u64> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => SyncError::HttpStatus {
                url: url.to_string(),
                code,
            },
            ureq::Error::Transport(t) => SyncError::Transport {
                url: url.to_string(),
                message: t.to_string(),
            },
        })?;

        if let Some(len) = response
            .header("content-length")
            .and_then(|s| s.parse().ok())
        {
            upgrade_to_bytes(pb, len);
        }

        let file = std::fs::File::create(dest).map_err(SyncError::io("cannot create", dest))?;
        let mut writer = BufWriter::new(file);

        let mut reader = response.into_reader();
        let mut buffer = [0u8; 8192];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader.read(&mut buffer).map_err(|e| SyncError::Transport {
                url: url.to_string(),
                message: format!("read error: {}", e),
            })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(SyncError::io("cannot write", dest))?;

            total_bytes += bytes_read as u64;
            pb.set_position(total_bytes);
        }

        writer.flush().map_err(SyncError::io("cannot write", dest))?;
        Ok(total_bytes)
    }
}
