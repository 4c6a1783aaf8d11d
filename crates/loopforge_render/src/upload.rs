use crate::error::{RenderError, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

/// Hands finished artifacts to some destination after a job succeeds.
pub trait Uploader: Send + Sync {
    /// Deliver `files` and return where each one ended up.
    fn upload(&self, files: &[PathBuf]) -> impl Future<Output = Result<Vec<PathBuf>>> + Send;
}

/// Copies artifacts into a folder, typically one watched by a sync client.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    dest: PathBuf,
}

impl DirectoryUploader {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }
}

impl Uploader for DirectoryUploader {
    async fn upload(&self, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.dest)
            .await
            .map_err(|e| RenderError::Upload(format!("{}: {e}", self.dest.display())))?;

        let mut delivered = Vec::with_capacity(files.len());
        for file in files {
            let Some(name) = file.file_name() else {
                return Err(RenderError::Upload(format!(
                    "not a file path: {}",
                    file.display()
                )));
            };
            let target = self.dest.join(name);
            tokio::fs::copy(file, &target)
                .await
                .map_err(|e| RenderError::Upload(format!("{}: {e}", file.display())))?;
            tracing::info!(file = %file.display(), dest = %target.display(), "uploaded");
            delivered.push(target);
        }
        Ok(delivered)
    }
}
