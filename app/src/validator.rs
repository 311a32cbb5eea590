// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Preflight checks for manifest, annotation and matrix inputs
//              (existence, size, compression sniffing) and output checksums
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

// HM450 manifests are ~200 MB uncompressed; EPIC matrices can run larger
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024; // 2 GiB

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Compression detected from the file's leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

#[derive(Debug)]
pub struct ValidatedInput {
    pub size: u64,
    pub compression: Compression,
}

pub struct InputValidator {
    max_file_size: u64,
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
        }
    }

    pub fn with_max_file_size(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn validate(&self, path: &Path) -> Result<ValidatedInput> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Input file not accessible: {}", path.display()))?;

        if !metadata.is_file() {
            anyhow::bail!("Input path is not a regular file: {}", path.display());
        }

        let size = metadata.len();
        if size == 0 {
            anyhow::bail!("Input file is empty: {}", path.display());
        }
        if size > self.max_file_size {
            anyhow::bail!(
                "File too large: {} bytes (max: {} bytes): {}",
                size,
                self.max_file_size,
                path.display()
            );
        }

        let compression = if verify_magic_number(&GZIP_MAGIC, &read_magic_number(path)?) {
            Compression::Gzip
        } else {
            Compression::None
        };

        debug!(
            "Validated {} ({} bytes, {:?})",
            path.display(),
            size,
            compression
        );

        Ok(ValidatedInput { size, compression })
    }

    /// Validate `path` and open it, decompressing gzip transparently
    pub fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        let validated = self.validate(path)?;
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        Ok(match validated.compression {
            Compression::Gzip => Box::new(GzDecoder::new(BufReader::new(file))),
            Compression::None => Box::new(BufReader::new(file)),
        })
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn read_magic_number(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::with_capacity(GZIP_MAGIC.len());
    file.by_ref()
        .take(GZIP_MAGIC.len() as u64)
        .read_to_end(&mut buffer)?;
    Ok(buffer)
}

fn verify_magic_number(expected: &[u8], actual: &[u8]) -> bool {
    expected.len() <= actual.len() && expected.iter().zip(actual.iter()).all(|(e, a)| e == a)
}

/// Hex SHA-256 of a file's contents
pub fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression as GzLevel;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_plain_file_is_detected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "probe\ts1").unwrap();
        file.flush().unwrap();

        let validated = InputValidator::new().validate(file.path()).unwrap();
        assert_eq!(validated.compression, Compression::None);
    }

    #[test]
    fn test_gzip_is_detected_and_decoded() {
        let mut file = NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
        encoder.write_all(b"probe\ts1\n").unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let validator = InputValidator::new();
        assert_eq!(
            validator.validate(file.path()).unwrap().compression,
            Compression::Gzip
        );

        let mut contents = String::new();
        validator
            .open(file.path())
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "probe\ts1\n");
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(InputValidator::new().validate(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = InputValidator::new().validate(&dir.path().join("absent.tsv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_size_cap() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let err = InputValidator::with_max_file_size(4)
            .validate(file.path())
            .unwrap_err();
        assert!(err.to_string().contains("File too large"));
    }

    #[test]
    fn test_compute_sha256() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();

        assert_eq!(
            compute_sha256(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
