//! Bundle assembly
//!
//! Every bundle is written from a member plan: the manifest registers the
//! plan's members in order, then the archive receives `manifest.json`
//! followed by the same members in the same order.

use std::collections::HashSet;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use connect_models::AppMode;
use tracing::debug;

use crate::bundle::archive::{member_name, ArchiveWriter};
use crate::bundle::manifest::{Manifest, MANIFEST_NAME};
use crate::environment::Environment;
use crate::errors::PublishError;

/// What to bundle, one variant per app mode
#[derive(Debug, Clone)]
pub enum BundleSource {
    /// Prebuilt HTML rendered from a notebook
    Static {
        output_name: String,
        output: Vec<u8>,
    },

    /// Notebook source plus the environment needed to render it
    Source {
        notebook_name: String,
        notebook: Vec<u8>,
        environment: Environment,
        extra_files: Vec<String>,
        base_dir: PathBuf,
    },
}

impl BundleSource {
    pub fn mode(&self) -> AppMode {
        match self {
            BundleSource::Static { .. } => AppMode::Static,
            BundleSource::Source { .. } => AppMode::JupyterStatic,
        }
    }
}

enum Member<'a> {
    Buffer { name: &'a str, contents: &'a [u8] },
    File { name: String, base_dir: &'a Path },
}

/// A finished bundle: gzip tarball bytes with an independent read position
#[derive(Debug, Clone)]
pub struct Bundle {
    mode: AppMode,
    data: Cursor<Vec<u8>>,
}

impl Bundle {
    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.data.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.get_ref().is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.get_ref()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

impl Read for Bundle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

impl Seek for Bundle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.data.seek(pos)
    }
}

/// Build a bundle for any source
pub fn make_bundle(source: &BundleSource) -> Result<Bundle, PublishError> {
    let mode = source.mode();
    let (mut manifest, members) = match source {
        BundleSource::Static {
            output_name,
            output,
        } => {
            let manifest = Manifest::new(output_name, None, mode)?;
            let members = vec![Member::Buffer {
                name: output_name,
                contents: output,
            }];
            (manifest, members)
        }
        BundleSource::Source {
            notebook_name,
            notebook,
            environment,
            extra_files,
            base_dir,
        } => {
            let manifest = Manifest::new(notebook_name, Some(environment), mode)?;
            let reserved = [
                MANIFEST_NAME,
                notebook_name.as_str(),
                environment.package_file_name.as_str(),
            ];
            let extra_names = extra_member_names(extra_files, &reserved)?;
            let mut members = vec![
                Member::Buffer {
                    name: notebook_name,
                    contents: notebook,
                },
                Member::Buffer {
                    name: &environment.package_file_name,
                    contents: &environment.package_file_contents,
                },
            ];
            members.extend(extra_names.into_iter().map(|name| Member::File {
                name,
                base_dir: base_dir.as_path(),
            }));
            (manifest, members)
        }
    };

    for member in &members {
        match member {
            Member::Buffer { name, contents } => manifest.register_buffer(name, contents),
            Member::File { name, base_dir } => manifest.register_file(name, base_dir)?,
        }
    }
    debug!("manifest: {:?}", manifest);

    let mut writer = ArchiveWriter::new(Vec::new());
    writer.add_buffer(MANIFEST_NAME, &manifest.to_json()?)?;
    for member in &members {
        match member {
            Member::Buffer { name, contents } => writer.add_buffer(name, contents)?,
            Member::File { name, base_dir } => writer.add_file(name, base_dir)?,
        }
    }
    let bytes = writer.finish()?;

    debug!(mode = %mode, size = bytes.len(), "created bundle");
    Ok(Bundle {
        mode,
        data: Cursor::new(bytes),
    })
}

/// Normalized member names of `extra_files`
///
/// An extra file may not repeat another one or shadow a generated member.
fn extra_member_names(extra_files: &[String], reserved: &[&str]) -> Result<Vec<String>, PublishError> {
    let mut seen: HashSet<String> = reserved.iter().map(|name| name.to_string()).collect();
    let mut names = Vec::with_capacity(extra_files.len());
    for rel_path in extra_files {
        let name = member_name(rel_path)?;
        if !seen.insert(name.clone()) {
            return Err(PublishError::Validation(format!(
                "duplicate bundle member: {}",
                name
            )));
        }
        names.push(name);
    }
    Ok(names)
}

/// Bundle one rendered HTML document with a static manifest
pub fn make_static_bundle(output_name: &str, output: &[u8]) -> Result<Bundle, PublishError> {
    make_bundle(&BundleSource::Static {
        output_name: output_name.to_string(),
        output: output.to_vec(),
    })
}

/// Bundle a notebook, its package spec file and `extra_files` (relative to
/// `base_dir`, kept in the given order) with a jupyter-static manifest
pub fn make_source_bundle(
    notebook_name: &str,
    notebook: &[u8],
    environment: &Environment,
    extra_files: &[String],
    base_dir: &Path,
) -> Result<Bundle, PublishError> {
    make_bundle(&BundleSource::Source {
        notebook_name: notebook_name.to_string(),
        notebook: notebook.to_vec(),
        environment: environment.clone(),
        extra_files: extra_files.to_vec(),
        base_dir: base_dir.to_path_buf(),
    })
}
