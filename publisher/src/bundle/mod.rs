//! Bundle construction
//!
//! A bundle is a gzip-compressed tarball whose first member is
//! `manifest.json`, followed by the entrypoint and its dependencies.

pub mod archive;
pub mod assembler;
pub mod checksum;
pub mod manifest;

pub use assembler::{make_bundle, make_source_bundle, make_static_bundle, Bundle, BundleSource};
pub use manifest::{Manifest, MANIFEST_NAME};
