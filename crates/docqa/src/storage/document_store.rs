//! Uploaded originals kept on the local filesystem

use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{FileType, SourceDocument};

/// Directory of uploaded files, one file per document name
#[derive(Debug, Clone)]
pub struct DocumentStore {
    storage_dir: PathBuf,
}

impl DocumentStore {
    /// Open the store, creating the directory if needed
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        std::fs::create_dir_all(&storage_dir)?;
        Ok(Self { storage_dir })
    }

    fn doc_path(&self, filename: &str) -> Result<PathBuf> {
        let name = sanitize_filename(filename)
            .ok_or_else(|| Error::file_parse(filename, "invalid file name"))?;
        Ok(self.storage_dir.join(name))
    }

    /// Save (or overwrite) an original
    pub async fn store(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.doc_path(filename)?;
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Write an original next to its final location without replacing it.
    ///
    /// The staged copy is invisible to `load_all` until `publish` renames it.
    pub async fn stage(&self, filename: &str, data: &[u8]) -> Result<StagedFile> {
        let target = self.doc_path(filename)?;
        let staged = staged_path(&target);
        tokio::fs::write(&staged, data).await?;
        Ok(StagedFile { staged, target })
    }

    /// Move staged originals into place
    pub async fn publish(&self, files: Vec<StagedFile>) -> Result<()> {
        let mut files = files.into_iter();
        while let Some(file) = files.next() {
            if let Err(e) = tokio::fs::rename(&file.staged, &file.target).await {
                self.discard(std::iter::once(file).chain(files).collect()).await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Drop staged originals; the stored versions stay as they were
    pub async fn discard(&self, files: Vec<StagedFile>) {
        for file in files {
            if let Err(e) = tokio::fs::remove_file(&file.staged).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", file.staged.display(), e);
                }
            }
        }
    }

    /// Delete an original; missing files are not an error
    pub async fn delete(&self, filename: &str) -> Result<bool> {
        let path = self.doc_path(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every stored file with a supported extension, sorted by name
    pub async fn load_all(&self) -> Result<Vec<SourceDocument>> {
        let mut docs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.storage_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if FileType::from_filename(filename).is_none() {
                tracing::debug!("Skipping unsupported file {}", path.display());
                continue;
            }

            let data = tokio::fs::read(&path).await?;
            docs.push(SourceDocument::new(filename.to_string(), Bytes::from(data)));
        }

        docs.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(docs)
    }

    /// Remove every stored original; returns how many were removed
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for doc in self.load_all().await? {
            if self.delete(&doc.filename).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// An original written to a temporary name, waiting for `publish`
#[derive(Debug)]
pub struct StagedFile {
    staged: PathBuf,
    target: PathBuf,
}

fn staged_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.staged", name))
}

/// Final path component of an uploaded name, or `None` if nothing usable remains
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
