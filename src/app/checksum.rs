//! File digest computation and verification

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::app::hash::Md5Hash;
use crate::constants::files;

/// Computes the MD5 digest of local files and compares it to an expected value
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Stream a file through MD5 without loading it into memory
    pub async fn compute(path: &Path) -> std::io::Result<Md5Hash> {
        let mut file = File::open(path).await?;
        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; files::HASH_BUFFER_SIZE];

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            context.consume(&buffer[..read]);
        }

        Ok(Md5Hash::from_digest(context.compute()))
    }

    /// Compare a file's digest with the expected one
    ///
    /// Returns the actual digest on mismatch so callers can log it.
    pub async fn verify(path: &Path, expected: &Md5Hash) -> std::io::Result<Result<(), Md5Hash>> {
        let actual = Self::compute(path).await?;
        if actual == *expected {
            Ok(Ok(()))
        } else {
            Ok(Err(actual))
        }
    }
}
