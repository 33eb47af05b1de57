use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use clap::ValueEnum;
use serde::Serialize;
use sha2::Digest as _;

use crate::error::HashError;

/// Read buffer used when streaming a file through the digest
const CHUNK_SIZE: usize = 64 * 1024;

/// Supported content digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// SHA-256
    Sha256,
    /// BLAKE3 (faster, same digest width)
    Blake3,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Blake3 => "blake3",
        }
    }
}

/// Content digest, persisted as `<algorithm>:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    pub algorithm: Algorithm,
    pub hex: String,
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.hex)
    }
}

impl FromStr for Digest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, hex) = s
            .split_once(':')
            .ok_or_else(|| format!("digest without algorithm prefix: {s}"))?;
        let algorithm = Algorithm::from_str(name, true)?;
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("malformed digest: {s}"));
        }
        Ok(Digest {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }
}

/// Size and modification time used to decide whether a stored hash is still valid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingerprint {
    pub size: u64,
    /// Seconds since the Unix epoch
    pub mtime: f64,
}

impl Fingerprint {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Fingerprint {
            size: metadata.len(),
            mtime,
        }
    }

    /// Fingerprint of the file `path` resolves to (symlinks are followed)
    pub fn of(path: &Path) -> Result<Self, HashError> {
        let metadata = fs::metadata(path).map_err(|e| HashError::from_io(path, e))?;
        Ok(Self::from_metadata(&metadata))
    }
}

/// Result of hashing one file
#[derive(Debug, Clone, PartialEq)]
pub struct HashedFile {
    pub digest: Digest,
    pub fingerprint: Fingerprint,
}

/// Computes the content digest of a single file.
pub trait Hasher: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn hash_file(&self, path: &Path) -> Result<HashedFile, HashError>;
}

/// Hashes files by streaming them in fixed-size chunks, so memory use does
/// not grow with file size.
#[derive(Debug, Clone, Copy)]
pub struct StreamingHasher {
    algorithm: Algorithm,
}

impl StreamingHasher {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }
}

impl Hasher for StreamingHasher {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn hash_file(&self, path: &Path) -> Result<HashedFile, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        // Taken from the open handle so size and mtime describe the bytes we read
        let metadata = file.metadata().map_err(|e| HashError::from_io(path, e))?;
        let mut reader = BufReader::new(file);

        let hex = match self.algorithm {
            Algorithm::Sha256 => {
                let mut hasher = sha2::Sha256::new();
                stream(path, &mut reader, |chunk| hasher.update(chunk))?;
                format!("{:x}", hasher.finalize())
            }
            Algorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                stream(path, &mut reader, |chunk| {
                    hasher.update(chunk);
                })?;
                hasher.finalize().to_hex().to_string()
            }
        };

        log::trace!("hashed {}", path.display());

        Ok(HashedFile {
            digest: Digest {
                algorithm: self.algorithm,
                hex,
            },
            fingerprint: Fingerprint::from_metadata(&metadata),
        })
    }
}

fn stream<R, F>(path: &Path, reader: &mut R, mut update: F) -> Result<(), HashError>
where
    R: Read,
    F: FnMut(&[u8]),
{
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| HashError::from_io(path, e))?;
        if bytes_read == 0 {
            return Ok(());
        }
        update(&buffer[..bytes_read]);
    }
}
