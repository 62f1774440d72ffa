//! Post-processing of successfully uploaded files.

use std::path::{Path, PathBuf};

use crate::config::ProcessingConfig;
use crate::Result;

/// Action taken on a source file after its upload succeeds.
///
/// Applied on terminal success only. Failures here are housekeeping
/// warnings for the caller; the upload outcome is already settled and is
/// never reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcess {
    /// Leave the file in place.
    Keep,
    /// Delete the source file.
    Delete,
    /// Move the file into the given folder.
    Move(PathBuf),
}

impl PostProcess {
    /// Derive the action from configuration. Deletion wins over moving.
    #[must_use]
    pub fn from_config(processing: &ProcessingConfig) -> Self {
        if processing.delete_after_upload {
            Self::Delete
        } else if let Some(folder) = &processing.processed_folder {
            Self::Move(folder.clone())
        } else {
            Self::Keep
        }
    }

    /// Apply the action to an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete or move fails. The caller logs this as
    /// a housekeeping warning.
    pub async fn apply(&self, path: &Path) -> Result<()> {
        match self {
            Self::Keep => Ok(()),
            Self::Delete => {
                tokio::fs::remove_file(path).await?;
                tracing::info!(path = %path.display(), "Deleted uploaded file");
                Ok(())
            }
            Self::Move(folder) => {
                tokio::fs::create_dir_all(folder).await?;
                let target = unique_target(folder, path).await;
                tokio::fs::rename(path, &target).await?;
                tracing::info!(
                    path = %path.display(),
                    target = %target.display(),
                    "Moved uploaded file"
                );
                Ok(())
            }
        }
    }
}

/// Pick a collision-free name in the target folder by appending a counter
/// before the extension. Never overwrites.
async fn unique_target(folder: &Path, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
    let stem = source
        .file_stem()
        .map_or_else(|| "file".to_string(), |s| s.to_string_lossy().into_owned());
    let suffix = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut target = folder.join(name);
    let mut counter = 1u32;

    while tokio::fs::try_exists(&target).await.unwrap_or(false) {
        target = folder.join(format!("{stem}_{counter}{suffix}"));
        counter += 1;
    }

    target
}
