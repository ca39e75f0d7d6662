//! Streaming file checksums

use crate::error::{Error, Result};
use md5::Md5;
use sha2::{Digest as HashDigest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Read size used while hashing
const CHUNK_SIZE: usize = 64 * 1024;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Md5,
    Sha256,
}

impl Algorithm {
    /// Digest length in bytes
    pub fn digest_length(&self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha256 => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha256" => Ok(Algorithm::Sha256),
            other => Err(Error::InvalidInput(format!(
                "Unsupported hash algorithm: {}",
                other
            ))),
        }
    }
}

/// A computed digest tagged with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: Algorithm,
    bytes: Vec<u8>,
}

impl Digest {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Checksum engine
pub struct Checksum;

impl Checksum {
    /// Hash a file in fixed-size chunks
    pub fn compute(path: impl AsRef<Path>, algorithm: Algorithm) -> Result<Digest> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Self::compute_reader(file, algorithm)
    }

    /// Hash any reader in fixed-size chunks
    pub fn compute_reader<R: Read>(reader: R, algorithm: Algorithm) -> Result<Digest> {
        let bytes = match algorithm {
            Algorithm::Md5 => digest_stream::<Md5, _>(reader)?,
            Algorithm::Sha256 => digest_stream::<Sha256, _>(reader)?,
        };
        Ok(Digest { algorithm, bytes })
    }

    /// Render a digest as lowercase hex
    pub fn hash2string(digest: &Digest) -> String {
        digest.to_hex()
    }
}

fn digest_stream<D: HashDigest, R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        };
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().to_vec())
}
