//! Python environment description and detection
//!
//! The bundle assembler only consumes an [`Environment`]. Detection runs
//! external tools (`pip`, `conda`, `python`) and is kept behind the
//! [`EnvironmentIntrospector`] trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use endpoint_models::{EnvironmentPayload, PackageManagerName};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::PublishError;
use crate::filesys::file::File;

pub const REQUIREMENTS_FILE: &str = "requirements.txt";
pub const CONDA_ENVIRONMENT_FILE: &str = "environment.yml";
const DEFAULT_LOCALE: &str = "en_US.UTF-8";

/// Package manager that produced the package spec file
pub type PackageManager = PackageManagerName;

/// Immutable description of the interpreter environment a notebook runs in
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub package_manager: PackageManager,
    pub package_file_name: String,
    pub package_file_contents: Vec<u8>,
    pub interpreter_version: String,
    pub package_manager_version: String,
    pub locale: String,
}

impl From<EnvironmentPayload> for Environment {
    fn from(payload: EnvironmentPayload) -> Self {
        Self {
            package_manager: payload.package_manager,
            package_file_name: payload.filename,
            package_file_contents: payload.contents.into_bytes(),
            interpreter_version: payload.python,
            package_manager_version: payload.package_manager_version,
            locale: payload.locale,
        }
    }
}

impl Environment {
    /// Wire form, as printed by `--detect-environment`
    pub fn to_payload(&self, source: Option<&str>) -> EnvironmentPayload {
        EnvironmentPayload {
            package_manager: self.package_manager,
            filename: self.package_file_name.clone(),
            contents: String::from_utf8_lossy(&self.package_file_contents).into_owned(),
            python: self.interpreter_version.clone(),
            package_manager_version: self.package_manager_version.clone(),
            locale: self.locale.clone(),
            source: source.map(str::to_string),
        }
    }
}

/// Detects the environment for a notebook directory
#[async_trait]
pub trait EnvironmentIntrospector: Send + Sync {
    async fn detect(&self, dir: &Path) -> Result<Environment, PublishError>;
}

/// Introspects the Python installation found in `bin_dir` (or on `PATH`)
#[derive(Debug, Clone, Default)]
pub struct PythonIntrospector {
    bin_dir: Option<PathBuf>,
}

impl PythonIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the executables of a specific interpreter installation
    pub fn with_bin_dir(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: Some(bin_dir.into()),
        }
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    async fn run(&self, name: &str, args: &[&str]) -> Result<String, PublishError> {
        let program = self.program(name);
        debug!("Running {} {}", program.display(), args.join(" "));

        let output = Command::new(&program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                PublishError::Environment(format!("Error running '{}': {}", name, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let msg = if stderr.trim().is_empty() {
                format!("exited with code {}", output.status.code().unwrap_or(-1))
            } else {
                stderr.trim().to_string()
            };
            return Err(PublishError::Environment(format!(
                "Error during {} {}: {}",
                name,
                args.join(" "),
                msg
            )));
        }

        // Older interpreters print their version to stderr
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }

    async fn version_of(&self, name: &str) -> Result<String, PublishError> {
        let output = self.run(name, &["--version"]).await?;
        extract_version(&output).ok_or_else(|| {
            PublishError::Environment(format!(
                "Failed to get version of '{}' from the output of: {} --version",
                name, name
            ))
        })
    }

    async fn package_spec(&self, dir: &Path) -> Result<(PackageManager, String, Vec<u8>), PublishError> {
        let requirements = File::new(dir.join(REQUIREMENTS_FILE));
        if requirements.exists().await {
            info!("Using {}", requirements.path().display());
            let contents = requirements.read_bytes().await?;
            return Ok((PackageManager::Pip, REQUIREMENTS_FILE.to_string(), contents));
        }

        let conda_env = File::new(dir.join(CONDA_ENVIRONMENT_FILE));
        if conda_env.exists().await {
            info!("Using {}", conda_env.path().display());
            let contents = conda_env.read_bytes().await?;
            return Ok((PackageManager::Conda, CONDA_ENVIRONMENT_FILE.to_string(), contents));
        }

        info!("No package spec file in {}, using pip freeze", dir.display());
        let frozen = self.run("pip", &["freeze"]).await?;
        Ok((PackageManager::Pip, REQUIREMENTS_FILE.to_string(), frozen.into_bytes()))
    }
}

#[async_trait]
impl EnvironmentIntrospector for PythonIntrospector {
    async fn detect(&self, dir: &Path) -> Result<Environment, PublishError> {
        let (package_manager, package_file_name, package_file_contents) =
            self.package_spec(dir).await?;

        Ok(Environment {
            package_manager,
            package_file_name,
            package_file_contents,
            interpreter_version: self.version_of("python").await?,
            package_manager_version: self.version_of(package_manager.as_str()).await?,
            locale: default_locale(),
        })
    }
}

/// First `N.N[.N]` run in a tool's version output
pub fn extract_version(output: &str) -> Option<String> {
    output
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter_map(|word| {
            let parts: Vec<&str> = word
                .split('.')
                .take_while(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
                .take(3)
                .collect();
            (parts.len() >= 2).then(|| parts.join("."))
        })
        .next()
}

/// Locale from the usual environment variables
pub fn default_locale() -> String {
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
}
