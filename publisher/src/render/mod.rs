//! Notebook to HTML rendering

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::PublishError;

/// Rendered document ready to bundle
#[derive(Debug, Clone)]
pub struct RenderedOutput {
    pub filename: String,
    pub html: Vec<u8>,
}

/// Renders a notebook into a standalone HTML document
#[async_trait]
pub trait NotebookRenderer: Send + Sync {
    async fn render(&self, notebook: &Path, title: &str) -> Result<RenderedOutput, PublishError>;
}

/// Renders through `jupyter nbconvert`
#[derive(Debug, Clone)]
pub struct NbconvertRenderer {
    jupyter: PathBuf,
}

impl NbconvertRenderer {
    pub fn new() -> Self {
        Self {
            jupyter: PathBuf::from("jupyter"),
        }
    }

    pub fn with_executable(jupyter: impl Into<PathBuf>) -> Self {
        Self {
            jupyter: jupyter.into(),
        }
    }
}

impl Default for NbconvertRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotebookRenderer for NbconvertRenderer {
    async fn render(&self, notebook: &Path, title: &str) -> Result<RenderedOutput, PublishError> {
        info!("Rendering {} ({})", notebook.display(), title);

        let title_arg = format!("--HTMLExporter.title={}", title);
        let mut command = Command::new(&self.jupyter);
        command
            .args(["nbconvert", "--to", "html", "--stdout"])
            .arg(&title_arg)
            .arg(notebook);

        let output = command.output().await.map_err(|e| {
            PublishError::Render(format!("Could not run {}: {}", self.jupyter.display(), e))
        })?;

        if !output.status.success() {
            return Err(PublishError::Render(format!(
                "nbconvert failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let filename = output_filename(notebook)?;
        debug!("Rendered {} ({} bytes)", filename, output.stdout.len());
        Ok(RenderedOutput {
            filename,
            html: output.stdout,
        })
    }
}

/// `<notebook stem>.html`
pub fn output_filename(notebook: &Path) -> Result<String, PublishError> {
    let stem = notebook
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            PublishError::Render(format!("Not a notebook file: {}", notebook.display()))
        })?;
    Ok(format!("{}.html", stem))
}
