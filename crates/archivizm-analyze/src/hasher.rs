//! Streaming MD5 content hashing.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use thiserror::Error;

use archivizm_core::ContentDigest;

/// Default read chunk: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Why a file could not be digested.
#[derive(Debug, Error)]
pub enum HashError {
    /// Open or read failed.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Fewer bytes than recorded at traversal time.
    #[error("{path} was truncated: expected {expected} bytes, read {actual}")]
    Truncated {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// More bytes than recorded at traversal time.
    #[error("{path} grew while hashing: expected {expected} bytes, read more")]
    SizeChanged { path: PathBuf, expected: u64 },
}

/// Computes content digests of files.
pub trait ContentHasher: Send + Sync {
    /// Digest the whole file, which must be exactly `expected_len` bytes.
    fn hash_file(&self, path: &Path, expected_len: u64) -> Result<ContentDigest, HashError>;
}

impl<H: ContentHasher + ?Sized> ContentHasher for &H {
    fn hash_file(&self, path: &Path, expected_len: u64) -> Result<ContentDigest, HashError> {
        (**self).hash_file(path, expected_len)
    }
}

/// MD5 over fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct Md5Hasher {
    chunk_size: usize,
}

impl Md5Hasher {
    /// Hasher reading in [`DEFAULT_CHUNK_SIZE`] chunks.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use a different chunk size (at least one byte).
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Largest read issued per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Buffer length for a file of `expected_len` bytes: never larger than
    /// the chunk size, nor than the file plus the one byte that detects growth.
    fn buffer_len(&self, expected_len: u64) -> usize {
        usize::try_from(expected_len.saturating_add(1))
            .map_or(self.chunk_size, |len| len.min(self.chunk_size))
    }
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher for Md5Hasher {
    fn hash_file(&self, path: &Path, expected_len: u64) -> Result<ContentDigest, HashError> {
        let io_err = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_err)?;
        let mut buffer = vec![0u8; self.buffer_len(expected_len)];

        // One byte past the expected length is enough to notice growth.
        let limited = file.take(expected_len.saturating_add(1));
        let (digest, read) = digest_reader(limited, &mut buffer).map_err(io_err)?;

        if read < expected_len {
            return Err(HashError::Truncated {
                path: path.to_path_buf(),
                expected: expected_len,
                actual: read,
            });
        }
        if read > expected_len {
            return Err(HashError::SizeChanged {
                path: path.to_path_buf(),
                expected: expected_len,
            });
        }

        tracing::trace!(path = %path.display(), %digest, "hashed");
        Ok(digest)
    }
}

/// Digest everything a reader yields, reusing `buffer` for every chunk.
///
/// Returns the digest and the number of bytes consumed.
pub fn digest_reader<R: Read>(mut reader: R, buffer: &mut [u8]) -> io::Result<(ContentDigest, u64)> {
    let mut hasher = Md5::new();
    let mut total = 0u64;

    loop {
        let n = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    Ok((finish(hasher), total))
}

/// Digest an in-memory byte slice.
pub fn digest_bytes(bytes: &[u8]) -> ContentDigest {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    finish(hasher)
}

fn finish(hasher: Md5) -> ContentDigest {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hasher.finalize());
    ContentDigest::new(bytes)
}
