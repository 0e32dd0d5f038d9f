use crate::output::traits::{BinarySink, OutputError, OutputResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem-backed store for downloaded media and attachments
#[derive(Debug, Clone)]
pub struct FsBinarySink {
    root: PathBuf,
}

impl FsBinarySink {
    pub fn new(output_root: &Path) -> Self {
        Self {
            root: output_root.to_path_buf(),
        }
    }
}

impl BinarySink for FsBinarySink {
    fn destination(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> OutputResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| OutputError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, bytes).map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
