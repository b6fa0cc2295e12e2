//! SHA-256 file hashing
//!
//! Archives can be several hundred megabytes, so files are streamed through
//! the hasher in fixed-size chunks instead of being read into memory.

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use super::progress;

/// Chunk size for reading files during hashing (64KB)
const CHUNK_SIZE: usize = 64 * 1024;

/// Threshold for showing progress (100MB)
const PROGRESS_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Compute the hex-encoded SHA-256 digest of a file.
///
/// Shows progress for files larger than 100MB.
pub fn sha256_file(file: &Path) -> std::io::Result<String> {
    let mut f = std::fs::File::open(file)?;
    let file_size = f.metadata().map(|m| m.len()).unwrap_or(0);

    if file_size > PROGRESS_THRESHOLD {
        let pb = progress::create_byte_progress(file_size);
        pb.set_message("checksum");
        let digest = sha256_reader(pb.wrap_read(&mut f));
        pb.finish_and_clear();
        digest
    } else {
        sha256_reader(&mut f)
    }
}

/// Compute the hex-encoded SHA-256 digest of everything `reader` yields.
pub fn sha256_reader(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compare two hex digests, ignoring case and surrounding whitespace.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
