//! Filesystem storage for post images.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use slug::slugify;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// Result of storing an uploaded image.
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Path relative to the media root, as persisted on the post row.
    pub stored_path: String,
    pub size_bytes: usize,
}

/// Post images live on disk under a single media root and are addressed by
/// relative paths recorded on the owning post row.
#[derive(Debug)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Initialise storage rooted at the provided directory, creating it if
    /// necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store an uploaded image and return where it landed. Names are never
    /// trusted: the stored path is date-sharded, keyed by a fresh UUID, and
    /// keeps only a slugified remnant of the client's filename.
    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredImage, MediaStoreError> {
        if data.is_empty() {
            return Err(MediaStoreError::EmptyPayload);
        }

        let stored_path = self.build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&absolute, &data).await?;

        Ok(StoredImage {
            stored_path,
            size_bytes: data.len(),
        })
    }

    /// Read a stored image into memory.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, MediaStoreError> {
        let absolute = self.resolve(stored_path)?;
        Ok(Bytes::from(fs::read(absolute).await?))
    }

    /// Remove a stored image. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), MediaStoreError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// Resolve a stored path against the media root. Only plain relative
    /// components are accepted; anything that could climb out is rejected.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf, MediaStoreError> {
        let relative = Path::new(stored_path);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if relative.is_absolute() || escapes {
            return Err(MediaStoreError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }

    fn build_stored_path(&self, original_name: &str) -> String {
        let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
        let directory = format!("posts/{year}/{:02}/{:02}", month as u8, day);
        let identifier = Uuid::new_v4();
        let filename = sanitize_filename(original_name);
        format!("{directory}/{identifier}-{filename}")
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut name = slugify(stem);
    if name.is_empty() {
        name = "image".to_string();
    }

    if let Some(ext) = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty())
    {
        name.push('.');
        name.push_str(&ext);
    }

    name
}
