//! Streaming content hasher.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing content digests
//! of files without loading them into memory, and the [`ContentHash`] type
//! the hash store persists.
//!
//! Digests are BLAKE3 output truncated to 128 bits. BLAKE3 is an extendable
//! output function, so the first 16 bytes are a well-defined shorter digest,
//! and the hex form stays compact enough to store one per file.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

use super::HashError;

/// Size of each read when streaming a file through the hasher.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Number of bytes in a [`ContentHash`].
pub const HASH_LEN: usize = 16;

/// A 128-bit content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Digest an in-memory byte slice.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        Self::from_blake3(&hasher)
    }

    fn from_blake3(hasher: &blake3::Hasher) -> Self {
        let mut out = [0u8; HASH_LEN];
        hasher.finalize_xof().fill(&mut out);
        Self(out)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex encoding (32 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Error returned when a stored hex digest cannot be decoded.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid content hash '{0}'")]
pub struct ParseHashError(pub String);

impl FromStr for ContentHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_LEN * 2 || !s.is_ascii() {
            return Err(ParseHashError(s.to_string()));
        }
        let mut out = [0u8; HASH_LEN];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseHashError(s.to_string()))?;
        }
        Ok(Self(out))
    }
}

/// Streaming file hasher.
///
/// Reads files in fixed-size chunks so memory use is bounded regardless of
/// file size. The hasher holds no per-file state and can be shared across
/// worker threads.
#[derive(Debug, Clone)]
pub struct Hasher {
    chunk_size: usize,
}

impl Hasher {
    /// Create a hasher with the default chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Create a hasher with a custom chunk size (clamped to at least 1 byte).
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// The configured read chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Compute the content digest of a file.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file is missing or cannot be read.
    pub fn hash_file(&self, path: &Path) -> Result<ContentHash, HashError> {
        self.hash_file_counted(path).map(|(hash, _)| hash)
    }

    /// Compute the content digest of a file, also returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file is missing or cannot be read.
    pub fn hash_file_counted(&self, path: &Path) -> Result<(ContentHash, u64), HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total = 0u64;

        loop {
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..read]);
            total += read as u64;
        }

        log::trace!("Hashed {} ({} bytes)", path.display(), total);
        Ok((ContentHash::from_blake3(&hasher), total))
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}
