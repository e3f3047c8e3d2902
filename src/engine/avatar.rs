use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use super::EngineError;

/// On-disk cache of avatar images keyed by individual id.
#[async_trait(?Send)]
pub trait AvatarCache {
    /// Path the avatar for `id` is stored at, whether or not it exists yet.
    fn cached_path(&self, id: &str) -> PathBuf;
    /// Persist image data for `id` and return its file URI.
    async fn store_avatar(&self, id: &str, data: &[u8]) -> Result<String, EngineError>;
}

pub struct FileAvatarCache {
    dir: PathBuf,
}

impl FileAvatarCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Turn a local path into a `file://` URI. Relative paths are passed through.
pub fn file_uri(path: &Path) -> String {
    Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|_| path.to_string_lossy().into_owned())
}

#[async_trait(?Send)]
impl AvatarCache for FileAvatarCache {
    fn cached_path(&self, id: &str) -> PathBuf {
        let digest = Sha256::digest(id.as_bytes());
        let name: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(name)
    }

    async fn store_avatar(&self, id: &str, data: &[u8]) -> Result<String, EngineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| EngineError::Failed(format!("avatar cache: {e}")))?;
        let path = self.cached_path(id);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| EngineError::Failed(format!("avatar cache: {e}")))?;
        debug!(id, path = %path.display(), bytes = data.len(), "stored avatar");
        Ok(file_uri(&path))
    }
}
