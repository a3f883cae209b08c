//! Upload collaborator — hands an encoded clip to storage and gets back a
//! path or URL. Failures are reported to the caller; there is no retry.

use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::UploadError;

pub trait Uploader: Send + Sync {
    /// Store `bytes` under `file_name`, returning where it ended up.
    fn upload(&self, bytes: Vec<u8>, file_name: &str) -> impl Future<Output = Result<String, UploadError>> + Send;
}

/// What a successful crop-and-submit produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedClip {
    pub file_url: String,
    pub file_type: String,
}

/// Writes uploads into a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryUploader { root: root.into() }
    }
}

impl Uploader for DirectoryUploader {
    fn upload(&self, bytes: Vec<u8>, file_name: &str) -> impl Future<Output = Result<String, UploadError>> + Send {
        // Colons from the time stamps are not portable in file names
        let path = self.root.join(file_name.replace(':', "-"));
        async move {
            let target = path.clone();
            tokio::task::spawn_blocking(move || std::fs::write(&target, bytes))
                .await
                .map_err(|e| UploadError::Rejected { reason: e.to_string() })?
                .map_err(|e| UploadError::Rejected { reason: format!("{}: {e}", path.display()) })?;
            info!("Uploaded clip to {}", path.display());
            Ok(path.display().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_uploader_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = DirectoryUploader::new(dir.path());
        let path = uploader.upload(vec![1, 2, 3], "cropped_audio_00:01-00:05_160kbps.wav").await.unwrap();
        assert!(path.ends_with("cropped_audio_00-01-00-05_160kbps.wav"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = DirectoryUploader::new(dir.path().join("missing"));
        let err = uploader.upload(vec![0], "x.wav").await.unwrap_err();
        assert_eq!(err.code(), "upload.rejected");
    }
}
