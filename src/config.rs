//! Runtime configuration: toolbox install folders and execution settings.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Toolbox;

fn default_threads() -> u32 {
    4
}

/// Settings persisted as a JSON file. Everything is optional; with no
/// configured folders the `gpt` launcher is resolved from `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpfConfig {
    /// BEAM installation folder (the directory containing `bin/`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam_folder: Option<PathBuf>,
    /// SNAP installation folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_folder: Option<PathBuf>,
    /// Folder holding saved model files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_folder: Option<PathBuf>,
    #[serde(default = "default_threads")]
    pub threads: u32,
}

impl Default for GpfConfig {
    fn default() -> Self {
        GpfConfig {
            beam_folder: None,
            snap_folder: None,
            models_folder: None,
            threads: default_threads(),
        }
    }
}

impl GpfConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        debug!(file = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn folder(&self, toolbox: Toolbox) -> Option<&Path> {
        match toolbox {
            Toolbox::Beam => self.beam_folder.as_deref(),
            Toolbox::Snap => self.snap_folder.as_deref(),
        }
    }

    /// Resolves the `gpt` launcher for a toolbox. BEAM ships it as a batch
    /// script (`gpt.bat` on Windows, `gpt.sh` elsewhere) while SNAP uses a
    /// plain `bin/gpt`. Without a configured folder, falls back to whatever
    /// `gpt` is on `PATH`.
    pub fn gpt_path(&self, toolbox: Toolbox) -> Result<PathBuf> {
        if let Some(folder) = self.folder(toolbox) {
            let launcher = match toolbox {
                Toolbox::Beam if cfg!(windows) => "gpt.bat",
                Toolbox::Beam => "gpt.sh",
                Toolbox::Snap => "gpt",
            };
            return Ok(folder.join("bin").join(launcher));
        }
        which::which("gpt").map_err(|_| Error::GptNotFound { toolbox })
    }
}
