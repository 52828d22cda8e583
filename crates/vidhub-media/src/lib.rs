use anyhow::{Result, bail};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 10;

/// A successfully stored asset.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub url: String,
    pub storage_id: String,
}

/// Object storage for avatars, cover images, thumbnails and video files.
///
/// Each asset is a flat file at `{dir}/{storage_id}` where the storage id is
/// a fresh UUID plus the uploaded file's extension. Public URLs are
/// `{public_base_url}/{storage_id}`.
pub struct MediaStore {
    dir: PathBuf,
    public_base_url: String,
}

impl MediaStore {
    pub async fn new(dir: PathBuf, public_base_url: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, storage_id: &str) -> String {
        format!("{}/{}", self.public_base_url, storage_id)
    }

    /// Store `data` under a new storage id.
    pub async fn upload(&self, data: &[u8], file_name: Option<&str>) -> Result<StoredMedia> {
        if data.is_empty() {
            bail!("Refusing to store an empty asset");
        }

        let storage_id = match file_name.and_then(extension_of) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        let mut hasher = Sha256::new();
        hasher.update(data);
        let sha256 = hex::encode(hasher.finalize());

        let path = self.dir.join(&storage_id);
        let file = fs::File::create(&path).await?;
        write_or_remove(&path, file, data).await?;

        info!("Stored asset {} ({} bytes, sha256 {})", storage_id, data.len(), sha256);
        Ok(StoredMedia {
            url: self.url_for(&storage_id),
            storage_id,
        })
    }

    /// Delete an asset. A missing file is not an error.
    pub async fn delete(&self, storage_id: &str) -> Result<()> {
        let Some(path) = self.resolve(storage_id) else {
            bail!("Invalid storage id: {}", storage_id);
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted asset {}", storage_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Asset {} already gone", storage_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Map a storage id to its on-disk path. Returns `None` for anything
    /// that is not a storage id this store could have issued, which rules
    /// out path traversal.
    pub fn resolve(&self, storage_id: &str) -> Option<PathBuf> {
        let (stem, ext) = match storage_id.split_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (storage_id, None),
        };
        stem.parse::<Uuid>().ok()?;
        if let Some(ext) = ext {
            if ext.is_empty()
                || ext.len() > MAX_EXTENSION_LEN
                || !ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            {
                return None;
            }
        }
        Some(self.dir.join(storage_id))
    }

    /// Content type guessed from the storage id's extension.
    pub fn content_type(storage_id: &str) -> String {
        mime_guess::from_path(storage_id)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// Write `data` through `file`. On failure the partial file at `path` is
/// removed, since no caller ever learns its storage id.
async fn write_or_remove<W>(path: &Path, mut file: W, data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(data).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path).await {
            warn!("Failed to remove partial asset {}: {}", path.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

fn extension_of(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}
