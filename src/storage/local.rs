//! Filesystem object store: `<root>/<bucket>/<key>`

use super::ObjectStore;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Destination path for an object
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("Invalid bucket or key: {}/{}", bucket, key);
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put_object(&self, bucket: &str, key: &str, file_path: &Path) -> Result<()> {
        let destination = self.object_path(bucket, key)?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        fs::copy(file_path, &destination).with_context(|| {
            format!("Failed to copy {:?} to {:?}", file_path, destination)
        })?;

        debug!("Stored object at {:?}", destination);
        Ok(())
    }
}
