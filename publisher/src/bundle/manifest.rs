//! Bundle manifest (`manifest.json`)

use std::fmt;
use std::path::Path;

use connect_models::AppMode;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bundle::archive::resolve_member_path;
use crate::bundle::checksum::{checksum, file_checksum};
use crate::environment::Environment;
use crate::errors::PublishError;

pub const MANIFEST_NAME: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

/// Descriptor embedded as the first member of every bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub metadata: ManifestMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<PythonSection>,
    #[serde(default)]
    pub files: FileTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub appmode: AppMode,
    pub entrypoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PythonSection {
    pub version: String,
    pub package_manager: PackageManagerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManagerSection {
    pub name: String,
    pub version: String,
    pub package_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub checksum: String,
}

/// Relative path to checksum table, kept in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTable(Vec<(String, FileEntry)>);

impl FileTable {
    /// Insert or replace an entry; a replaced entry keeps its position
    pub fn insert(&mut self, path: String, entry: FileEntry) {
        match self.0.iter_mut().find(|(p, _)| *p == path) {
            Some(slot) => slot.1 = entry,
            None => self.0.push((path, entry)),
        }
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.0.iter().find(|(p, _)| p == path).map(|(_, e)| e)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FileTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (path, entry) in &self.0 {
            map.serialize_entry(path, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FileTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = FileTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of file paths to checksum entries")
            }

            fn visit_map<A>(self, mut access: A) -> Result<FileTable, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = FileTable::default();
                while let Some((path, entry)) = access.next_entry::<String, FileEntry>()? {
                    table.insert(path, entry);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

impl Manifest {
    /// Build an empty manifest for `entrypoint`
    ///
    /// Static manifests carry no interpreter section; jupyter-static
    /// manifests require the environment.
    pub fn new(
        entrypoint: &str,
        environment: Option<&Environment>,
        mode: AppMode,
    ) -> Result<Self, PublishError> {
        let (locale, python, primary_html) = match mode {
            AppMode::Static => (None, None, Some(entrypoint.to_string())),
            AppMode::JupyterStatic => {
                let env = environment.ok_or_else(|| {
                    PublishError::Validation(
                        "environment is required for jupyter-static app_mode".to_string(),
                    )
                })?;
                let python = PythonSection {
                    version: env.interpreter_version.clone(),
                    package_manager: PackageManagerSection {
                        name: env.package_manager.as_str().to_string(),
                        version: env.package_manager_version.clone(),
                        package_file: env.package_file_name.clone(),
                    },
                };
                (Some(env.locale.clone()), Some(python), None)
            }
        };

        Ok(Self {
            version: MANIFEST_VERSION,
            metadata: ManifestMetadata {
                appmode: mode,
                entrypoint: entrypoint.to_string(),
                primary_html,
            },
            locale,
            python,
            files: FileTable::default(),
        })
    }

    /// Record the checksum of `base_dir/rel_path` under its normalized member name
    pub fn register_file(&mut self, rel_path: &str, base_dir: &Path) -> Result<(), PublishError> {
        let (name, path) = resolve_member_path(rel_path, base_dir)?;
        let entry = FileEntry {
            checksum: file_checksum(&path)?,
        };
        self.files.insert(name, entry);
        Ok(())
    }

    /// Record the checksum of an in-memory buffer under `name`
    pub fn register_buffer(&mut self, name: &str, contents: &[u8]) {
        let entry = FileEntry {
            checksum: checksum(contents),
        };
        self.files.insert(name.to_string(), entry);
    }

    pub fn to_json(&self) -> Result<Vec<u8>, PublishError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, PublishError> {
        Ok(serde_json::from_slice(data)?)
    }
}
