use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use super::{ContentError, ContentMetadata};

/// Source of stored content, selected by the scheme of a locator
pub trait ContentBackend: Send + Sync {
    /// Locator scheme this backend serves, e.g. `file`
    fn scheme(&self) -> &str;

    /// Open the content described by `metadata`, positioned at its offset
    fn open(&self, metadata: &ContentMetadata) -> Result<Box<dyn Read + Send>, ContentError>;
}

/// Reads content from local files, addressed as `file:<path>`
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBackend;

impl ContentBackend for FileBackend {
    fn scheme(&self) -> &str {
        "file"
    }

    fn open(&self, metadata: &ContentMetadata) -> Result<Box<dyn Read + Send>, ContentError> {
        let path = metadata
            .locator_key(self.scheme())
            .ok_or_else(|| ContentError::UnsupportedLocator(metadata.locator.clone()))?;
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(metadata.offset))?;
        Ok(Box::new(file))
    }
}

/// External object storage holding content uploaded by other components
pub trait ObjectStorage: Send + Sync {
    /// Open the object stored under `key` from its first byte
    fn open(&self, key: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Reads content from an [`ObjectStorage`], addressed as `object:<key>`
pub struct ObjectStorageBackend {
    storage: Arc<dyn ObjectStorage>,
}

impl ObjectStorageBackend {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

impl ContentBackend for ObjectStorageBackend {
    fn scheme(&self) -> &str {
        "object"
    }

    fn open(&self, metadata: &ContentMetadata) -> Result<Box<dyn Read + Send>, ContentError> {
        let key = metadata
            .locator_key(self.scheme())
            .ok_or_else(|| ContentError::UnsupportedLocator(metadata.locator.clone()))?;
        let mut reader = self.storage.open(key)?;

        // Object streams cannot seek; discard the prefix instead
        let skipped = io::copy(&mut reader.by_ref().take(metadata.offset), &mut io::sink())?;
        if skipped < metadata.offset {
            return Err(ContentError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("object '{}' is shorter than offset {}", key, metadata.offset),
            )));
        }
        Ok(reader)
    }
}
