//! Byte-prefix hash: BLAKE3 over the first bytes of the file.
//!
//! Cheap and exact. Re-encodes, retagged files and different bit rates all
//! produce different hashes.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use super::{Computed, Deadline, FingerprintError, TimedReader};

/// Bytes hashed when nothing else is configured (1 MiB).
pub const DEFAULT_PREFIX_BYTES: u64 = 1024 * 1024;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Hash up to `prefix_bytes` of `path`. Reported duration is always zero.
pub(crate) fn fingerprint(path: &Path, prefix_bytes: u64, deadline: &Deadline) -> Result<Computed, FingerprintError> {
    let file = File::open(path).map_err(|e| FingerprintError::from_io(path, e))?;
    let mut reader = TimedReader::new(file, *deadline).take(prefix_bytes);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(deadline.map_io(path, e)),
        };
        hasher.update(&buffer[..n]);
        total += n as u64;
        deadline.check()?;
    }

    if total == 0 {
        return Err(FingerprintError::EmptyStream);
    }

    Ok(Computed {
        fingerprint: hasher.finalize().to_hex().to_string(),
        duration_secs: 0.0,
    })
}

/// Hex BLAKE3 digest of `bytes`.
#[must_use]
pub fn hash_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_identical_files_hash_equal() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.mp3", b"identical content");
        let b = write(&dir, "b.mp3", b"identical content");

        let fa = fingerprint(&a, DEFAULT_PREFIX_BYTES, &Deadline::unlimited()).unwrap();
        let fb = fingerprint(&b, DEFAULT_PREFIX_BYTES, &Deadline::unlimited()).unwrap();
        assert_eq!(fa, fb);
        assert_eq!(fa.fingerprint, hash_hex(b"identical content"));
    }

    #[test]
    fn test_only_prefix_is_hashed() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.mp3", b"0123456789-tail-one");
        let b = write(&dir, "b.mp3", b"0123456789-tail-two");

        let fa = fingerprint(&a, 10, &Deadline::unlimited()).unwrap();
        let fb = fingerprint(&b, 10, &Deadline::unlimited()).unwrap();
        assert_eq!(fa.fingerprint, fb.fingerprint);

        let fa = fingerprint(&a, 64, &Deadline::unlimited()).unwrap();
        let fb = fingerprint(&b, 64, &Deadline::unlimited()).unwrap();
        assert_ne!(fa.fingerprint, fb.fingerprint);
    }

    #[test]
    fn test_prefix_larger_than_buffer() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let path = write(&dir, "big.wav", &content);

        let computed = fingerprint(&path, DEFAULT_PREFIX_BYTES, &Deadline::unlimited()).unwrap();
        assert_eq!(computed.fingerprint, hash_hex(&content));
    }

    #[test]
    fn test_empty_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.mp3", b"");
        assert!(matches!(
            fingerprint(&path, DEFAULT_PREFIX_BYTES, &Deadline::unlimited()),
            Err(FingerprintError::EmptyStream)
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = fingerprint(Path::new("/missing.mp3"), 16, &Deadline::unlimited()).unwrap_err();
        assert!(matches!(err, FingerprintError::NotFound(_)));
    }
}
