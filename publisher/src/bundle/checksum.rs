//! MD5 content digests for manifest file entries

use std::fs;
use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

use crate::errors::PublishError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Lowercase 32-char hex MD5 digest of a buffer
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Lowercase hex MD5 digest of a file, read in chunks
pub fn file_checksum(path: &Path) -> Result<String, PublishError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        hasher.update(&chunk[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
