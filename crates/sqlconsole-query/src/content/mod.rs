//! Virtual content storage
//!
//! Large cell values are not kept inside result tables. They are written to
//! a per-session spool and addressed by `(table_id, row, col)`; clients page
//! through them with [`ContentStore::read`].

mod backend;
mod encoding;
mod store;
#[cfg(test)]
mod tests;

pub use backend::{ContentBackend, FileBackend, ObjectStorage, ObjectStorageBackend};
pub use encoding::{BinaryContent, ValueEncoding};
pub use store::{ContentError, ContentMetadata, ContentStore, VirtualElement};
