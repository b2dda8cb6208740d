//! Unique output paths for trimmed files.

use crate::config::OutputConfig;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Generates `<dir>/<prefix><uuid>.<extension>` paths.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// Build a namer from config, expanding `~` in the directory.
    pub fn from_config(config: &OutputConfig) -> Self {
        let dir = shellexpand::tilde(&config.dir.to_string_lossy()).into_owned();
        Self::new(dir, config.prefix.clone(), config.extension.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a given id.
    pub fn file_name(&self, id: Uuid) -> String {
        if self.extension.is_empty() {
            format!("{}{}", self.prefix, id)
        } else {
            format!("{}{}.{}", self.prefix, id, self.extension)
        }
    }

    /// Create the output directory if needed and return a fresh absolute path.
    pub fn next_path(&self) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let dir = if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            std::env::current_dir()?.join(&self.dir)
        };
        Ok(dir.join(self.file_name(Uuid::new_v4())))
    }
}

impl Default for OutputNamer {
    fn default() -> Self {
        Self::from_config(&OutputConfig::default())
    }
}
