//! Gzip-compressed tar archive writer
//!
//! Members are written with fixed metadata (mode 0644, mtime 0) so the same
//! inputs always produce the same archive bytes.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::errors::PublishError;

const MEMBER_MODE: u32 = 0o644;

/// Archive being written; members appear in the order they are added
pub struct ArchiveWriter<W: Write> {
    builder: tar::Builder<GzEncoder<W>>,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        let encoder = GzEncoder::new(writer, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.mode(tar::HeaderMode::Deterministic);
        Self { builder }
    }

    /// Append an in-memory buffer under `name`
    pub fn add_buffer(&mut self, name: &str, contents: &[u8]) -> Result<(), PublishError> {
        let mut header = member_header(contents.len() as u64);
        self.builder.append_data(&mut header, name, contents)?;
        debug!("added buffer: {}", name);
        Ok(())
    }

    /// Append `base_dir/rel_path` under its normalized member name
    pub fn add_file(&mut self, rel_path: &str, base_dir: &Path) -> Result<(), PublishError> {
        let (name, path) = resolve_member_path(rel_path, base_dir)?;
        let file = fs::File::open(&path)?;
        let size = file.metadata()?.len();

        let mut header = member_header(size);
        self.builder.append_data(&mut header, &name, file)?;
        debug!("added file: {}", path.display());
        Ok(())
    }

    /// Write the tar trailer, flush the gzip stream and return the sink
    pub fn finish(self) -> Result<W, PublishError> {
        let encoder = self.builder.into_inner()?;
        Ok(encoder.finish()?)
    }
}

fn member_header(size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(size);
    header.set_mode(MEMBER_MODE);
    header.set_mtime(0);
    header
}

/// Normalized archive name of a bundle-relative path
///
/// `.` components and empty segments are dropped and the rest joined with
/// `/`. Absolute paths and `..` components are rejected so nothing outside
/// the base directory ends up in a bundle.
pub fn member_name(rel_path: &str) -> Result<String, PublishError> {
    let invalid = || {
        PublishError::Validation(format!(
            "bundle path must be relative to the notebook directory: {}",
            rel_path
        ))
    };

    let mut parts = Vec::new();
    for component in Path::new(rel_path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(invalid)?),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid())
            }
        }
    }
    if parts.is_empty() {
        return Err(invalid());
    }
    Ok(parts.join("/"))
}

/// Member name of `rel_path` and its location under `base_dir`
pub fn resolve_member_path(rel_path: &str, base_dir: &Path) -> Result<(String, PathBuf), PublishError> {
    let name = member_name(rel_path)?;
    let path = base_dir.join(&name);
    Ok((name, path))
}

/// Member names of a bundle, in archive order
pub fn list_members(bundle: &[u8]) -> Result<Vec<String>, PublishError> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bundle)));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        names.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Contents of one named member, or `None` if the bundle lacks it
pub fn read_member(bundle: &[u8], name: &str) -> Result<Option<Vec<u8>>, PublishError> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bundle)));
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_string_lossy() == name {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            return Ok(Some(contents));
        }
    }
    Ok(None)
}
