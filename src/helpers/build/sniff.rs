//! Archive format detection by content
//!
//! Upstream URLs are unreliable predictors of container type, so formats are
//! detected from the bytes on disk rather than from the file extension.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Size of a tar header block
const TAR_BLOCK_SIZE: usize = 512;

/// Byte range of the checksum field inside a tar header
const TAR_CHKSUM_RANGE: std::ops::Range<usize> = 148..156;

/// Compression layer wrapped around a tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
    Bzip2,
    Zstd,
}

impl Compression {
    /// Identify the compression layer from the first bytes of a file.
    pub fn from_magic(head: &[u8]) -> Self {
        if head.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Self::Xz
        } else if head.starts_with(b"BZh") {
            Self::Bzip2
        } else if head.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }
}

/// Open `path` and wrap it in the decompressor its magic bytes call for.
pub fn open_decompressed(path: &Path) -> std::io::Result<(Compression, Box<dyn Read>)> {
    let mut head = [0u8; 6];
    let n = read_up_to(&mut File::open(path)?, &mut head)?;
    let compression = Compression::from_magic(&head[..n]);

    let reader = BufReader::new(File::open(path)?);
    let decoded: Box<dyn Read> = match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
    };
    Ok((compression, decoded))
}

/// Whether `path` is a zip container.
///
/// Opens the central directory, so zip payloads appended to other data
/// (self-extracting zips) are recognized too.
pub fn is_zip(path: &Path) -> std::io::Result<bool> {
    let file = File::open(path)?;
    Ok(zip::ZipArchive::new(BufReader::new(file)).is_ok())
}

/// Whether `path` is a tar stream, optionally compressed.
///
/// Decodes the first header block and validates its checksum; decoder errors
/// mean "not a tar" rather than failure.
pub fn is_tar(path: &Path) -> std::io::Result<bool> {
    let (_, mut reader) = match open_decompressed(path) {
        Ok(opened) => opened,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(e),
        Err(_) => return Ok(false),
    };

    let mut block = [0u8; TAR_BLOCK_SIZE];
    match read_up_to(&mut reader, &mut block) {
        Ok(TAR_BLOCK_SIZE) => Ok(is_tar_header(&block)),
        _ => Ok(false),
    }
}

/// Validate a tar header block by its checksum field.
///
/// The stored checksum is the sum of all header bytes with the checksum field
/// itself counted as spaces. Some historic writers summed signed bytes, so
/// both interpretations are accepted. An all-zero block is an end-of-archive
/// marker, not a header.
pub fn is_tar_header(block: &[u8; TAR_BLOCK_SIZE]) -> bool {
    let Some(stored) = parse_octal(&block[TAR_CHKSUM_RANGE]) else {
        return false;
    };

    let mut unsigned: u64 = 0;
    let mut signed: i64 = 0;
    for (i, &b) in block.iter().enumerate() {
        let b = if TAR_CHKSUM_RANGE.contains(&i) { b' ' } else { b };
        unsigned += u64::from(b);
        signed += i64::from(b as i8);
    }

    stored == unsigned || i64::try_from(stored).is_ok_and(|s| s == signed)
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(field).ok()?;
    let digits = text.trim_matches(|c: char| c == '\0' || c == ' ');
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 8).ok()
}

/// Fill as much of `buf` as the reader can provide.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
