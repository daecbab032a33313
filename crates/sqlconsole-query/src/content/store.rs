use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;

use super::{BinaryContent, ContentBackend, FileBackend, ValueEncoding};

const SPOOL_PREFIX: &str = "sqlconsole-";
const SPOOL_FILE: &str = "content.spool";

/// Errors raised by the content store
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("no content stored for table {table_id} row {row} column {col}")]
    NotFound {
        table_id: String,
        row: usize,
        col: usize,
    },

    #[error("skip {skip} is beyond content size {size}")]
    SkipOutOfRange { skip: u64, size: u64 },

    #[error("no content backend for locator '{0}'")]
    UnsupportedLocator(String),

    #[error("content store has been discarded")]
    Discarded,

    #[error("content I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a piece of content physically lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// Scheme-prefixed address, e.g. `file:/tmp/x/content.spool`
    pub locator: String,
    /// Byte offset of the content inside the addressed resource
    pub offset: u64,
    /// Content size in bytes
    pub length: u64,
}

impl ContentMetadata {
    pub fn new(locator: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            locator: locator.into(),
            offset,
            length,
        }
    }

    /// Scheme part of the locator
    pub fn scheme(&self) -> Option<&str> {
        self.locator.split_once(':').map(|(scheme, _)| scheme)
    }

    /// Locator with `scheme:` removed, if the locator uses that scheme
    pub fn locator_key(&self, scheme: &str) -> Option<&str> {
        self.locator
            .strip_prefix(scheme)
            .and_then(|rest| rest.strip_prefix(':'))
    }
}

/// A cell value that lives in the content store instead of its result table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualElement {
    pub table_id: String,
    pub row: usize,
    pub col: usize,
    pub type_name: String,
    pub column_name: String,
    pub content: ContentMetadata,
}

type ElementKey = (String, usize, usize);

struct Spool {
    // Keeps the directory alive; dropping it deletes the spool
    _dir: TempDir,
    path: PathBuf,
    file: File,
}

impl Spool {
    fn create(parent: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SPOOL_PREFIX);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().join(SPOOL_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            _dir: dir,
            path,
            file,
        })
    }

    /// Append `bytes`, returning the offset they start at.
    ///
    /// The offset comes from the file itself, so bytes left behind by an
    /// earlier failed write never shift later content.
    fn append(&mut self, bytes: &[u8]) -> std::io::Result<u64> {
        let offset = self.file.metadata()?.len();
        if let Err(e) = self.file.write_all(bytes) {
            if let Err(truncate) = self.file.set_len(offset) {
                tracing::warn!(error = %truncate, "failed to roll back partial spool write");
            }
            return Err(e);
        }
        Ok(offset)
    }
}

/// Session-scoped store of virtual cell content
///
/// Elements are kept in a flat map keyed by `(table_id, row, col)`. Content
/// spooled by the engine itself lands in an append-only file inside a
/// private temporary directory, created on first use and removed when the
/// store is discarded or dropped.
pub struct ContentStore {
    elements: RwLock<HashMap<ElementKey, VirtualElement>>,
    spool: Mutex<Option<Spool>>,
    spool_parent: Option<PathBuf>,
    backends: RwLock<Vec<Arc<dyn ContentBackend>>>,
    discarded: AtomicBool,
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore {
    /// Create a store that spools into the system temp directory
    pub fn new() -> Self {
        Self {
            elements: RwLock::new(HashMap::new()),
            spool: Mutex::new(None),
            spool_parent: None,
            backends: RwLock::new(vec![Arc::new(FileBackend)]),
            discarded: AtomicBool::new(false),
        }
    }

    /// Spool into a directory under `dir` instead of the system temp directory
    pub fn with_spool_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.spool_parent = dir;
        self
    }

    /// Register a backend; it takes precedence over earlier ones for its scheme
    pub fn register_backend(&self, backend: Arc<dyn ContentBackend>) {
        self.backends.write().push(backend);
    }

    /// Record an element whose content already lives somewhere reachable
    pub fn put(&self, element: VirtualElement) -> Result<(), ContentError> {
        if self.is_discarded() {
            return Err(ContentError::Discarded);
        }
        let key = (element.table_id.clone(), element.row, element.col);
        self.elements.write().insert(key, element);
        Ok(())
    }

    pub fn get(&self, table_id: &str, row: usize, col: usize) -> Option<VirtualElement> {
        self.elements
            .read()
            .get(&(table_id.to_string(), row, col))
            .cloned()
    }

    /// Write `bytes` to the session spool and record them as an element
    pub fn spool(
        &self,
        table_id: &str,
        row: usize,
        col: usize,
        type_name: &str,
        column_name: &str,
        bytes: &[u8],
    ) -> Result<VirtualElement, ContentError> {
        if self.is_discarded() {
            return Err(ContentError::Discarded);
        }

        let content = {
            let mut guard = self.spool.lock();
            if guard.is_none() {
                *guard = Some(Spool::create(self.spool_parent.as_deref())?);
            }
            let Some(spool) = guard.as_mut() else {
                return Err(ContentError::Discarded);
            };
            let offset = spool.append(bytes)?;
            ContentMetadata::new(
                format!("file:{}", spool.path.display()),
                offset,
                bytes.len() as u64,
            )
        };

        let element = VirtualElement {
            table_id: table_id.to_string(),
            row,
            col,
            type_name: type_name.to_string(),
            column_name: column_name.to_string(),
            content,
        };
        self.put(element.clone())?;
        tracing::trace!(table_id, row, col, size = bytes.len(), "spooled cell content");
        Ok(element)
    }

    /// Read a window of an element's content.
    ///
    /// Returns at most `limit` bytes starting `skip` bytes in, encoded as
    /// requested. `size` always reports the full content size.
    pub fn read(
        &self,
        table_id: &str,
        row: usize,
        col: usize,
        skip: u64,
        limit: u64,
        encoding: ValueEncoding,
    ) -> Result<BinaryContent, ContentError> {
        let element = self
            .get(table_id, row, col)
            .ok_or_else(|| ContentError::NotFound {
                table_id: table_id.to_string(),
                row,
                col,
            })?;

        let size = element.content.length;
        if skip > size {
            return Err(ContentError::SkipOutOfRange { skip, size });
        }
        let window = limit.min(size - skip);

        let mut metadata = element.content.clone();
        metadata.offset += skip;
        let backend = self.backend_for(&metadata)?;
        let reader = backend.open(&metadata)?;

        let mut data = Vec::with_capacity(window as usize);
        reader.take(window).read_to_end(&mut data)?;

        Ok(BinaryContent {
            data: encoding.encode(data),
            size,
            encoding,
        })
    }

    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }

    /// Drop every element and delete the spool. Later writes are refused.
    pub fn discard(&self) {
        self.discarded.store(true, Ordering::SeqCst);
        self.elements.write().clear();
        self.spool.lock().take();
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::SeqCst)
    }

    fn backend_for(&self, metadata: &ContentMetadata) -> Result<Arc<dyn ContentBackend>, ContentError> {
        let scheme = metadata.scheme();
        self.backends
            .read()
            .iter()
            .rev()
            .find(|backend| Some(backend.scheme()) == scheme)
            .cloned()
            .ok_or_else(|| ContentError::UnsupportedLocator(metadata.locator.clone()))
    }
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("elements", &self.len())
            .field("discarded", &self.is_discarded())
            .finish()
    }
}
