//! Tests for the content store

use super::*;
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

fn file_element(path: &std::path::Path, offset: u64, length: u64) -> VirtualElement {
    VirtualElement {
        table_id: "t1".to_string(),
        row: 0,
        col: 1,
        type_name: "CLOB".to_string(),
        column_name: "body".to_string(),
        content: ContentMetadata::new(format!("file:{}", path.display()), offset, length),
    }
}

mod read_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_window_reports_full_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.bin");
        std::fs::write(&path, b"abcd").unwrap();

        let store = ContentStore::new();
        store.put(file_element(&path, 0, 4)).unwrap();

        let content = store.read("t1", 0, 1, 2, 1, ValueEncoding::Txt).unwrap();
        assert_eq!(content.data, b"c".to_vec());
        assert_eq!(content.size, 4);
        assert_eq!(content.as_text(), "c");
    }

    #[test]
    fn test_read_honors_element_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.bin");
        std::fs::write(&path, b"xxxxhello").unwrap();

        let store = ContentStore::new();
        store.put(file_element(&path, 4, 5)).unwrap();

        let content = store.read("t1", 0, 1, 1, 100, ValueEncoding::Txt).unwrap();
        assert_eq!(content.as_text(), "ello");
        assert_eq!(content.size, 5);
    }

    #[test]
    fn test_read_at_end_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.bin");
        std::fs::write(&path, b"abcd").unwrap();

        let store = ContentStore::new();
        store.put(file_element(&path, 0, 4)).unwrap();

        let content = store.read("t1", 0, 1, 4, 10, ValueEncoding::Txt).unwrap();
        assert!(content.data.is_empty());
        assert_eq!(content.size, 4);
    }

    #[test]
    fn test_read_skip_beyond_size_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.bin");
        std::fs::write(&path, b"abcd").unwrap();

        let store = ContentStore::new();
        store.put(file_element(&path, 0, 4)).unwrap();

        let err = store.read("t1", 0, 1, 5, 1, ValueEncoding::Txt).unwrap_err();
        assert!(matches!(err, ContentError::SkipOutOfRange { skip: 5, size: 4 }));
    }

    #[test]
    fn test_read_missing_element() {
        let store = ContentStore::new();
        let err = store.read("nope", 3, 4, 0, 1, ValueEncoding::Txt).unwrap_err();
        assert!(matches!(err, ContentError::NotFound { row: 3, col: 4, .. }));
    }

    #[test]
    fn test_read_unknown_scheme() {
        let store = ContentStore::new();
        store
            .put(VirtualElement {
                table_id: "t".to_string(),
                row: 0,
                col: 0,
                type_name: "BLOB".to_string(),
                column_name: "b".to_string(),
                content: ContentMetadata::new("s3:bucket/key", 0, 3),
            })
            .unwrap();
        let err = store.read("t", 0, 0, 0, 3, ValueEncoding::Txt).unwrap_err();
        assert!(matches!(err, ContentError::UnsupportedLocator(_)));
    }
}

mod encoding_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encodings() {
        assert_eq!(ValueEncoding::Txt.encode(b"Hi".to_vec()), b"Hi".to_vec());
        assert_eq!(ValueEncoding::Hex.encode(vec![0xAB, 0x01]), b"ab01".to_vec());
        assert_eq!(ValueEncoding::Base64.encode(b"Hi".to_vec()), b"SGk=".to_vec());
    }

    #[test]
    fn test_parse_encoding() {
        assert_eq!("HEX".parse::<ValueEncoding>(), Ok(ValueEncoding::Hex));
        assert_eq!("text".parse::<ValueEncoding>(), Ok(ValueEncoding::Txt));
        assert!("utf16".parse::<ValueEncoding>().is_err());
    }
}

mod spool_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spool_then_read_pages() {
        let parent = tempfile::tempdir().unwrap();
        let store = ContentStore::new().with_spool_dir(Some(parent.path().to_path_buf()));

        let first = store.spool("t1", 0, 0, "TEXT", "a", b"first value").unwrap();
        let second = store.spool("t1", 1, 0, "BLOB", "a", &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

        assert_eq!(first.content.offset, 0);
        assert_eq!(second.content.offset, 11);
        assert_eq!(store.len(), 2);

        let page = store.read("t1", 0, 0, 6, 5, ValueEncoding::Txt).unwrap();
        assert_eq!(page.as_text(), "value");

        let page = store.read("t1", 1, 0, 0, 2, ValueEncoding::Hex).unwrap();
        assert_eq!(page.as_text(), "dead");
        assert_eq!(page.size, 4);
    }

    #[test]
    fn test_stray_spool_bytes_do_not_shift_later_content() {
        use std::io::Write;

        let parent = tempfile::tempdir().unwrap();
        let store = ContentStore::new().with_spool_dir(Some(parent.path().to_path_buf()));
        let first = store.spool("t1", 0, 0, "TEXT", "a", b"first").unwrap();

        // Leftovers of an interrupted write
        let path = first.content.locator_key("file").map(std::path::PathBuf::from).unwrap();
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"junk").unwrap();

        let second = store.spool("t1", 1, 0, "TEXT", "a", b"second").unwrap();
        assert_eq!(second.content.offset, 9);

        let page = store.read("t1", 1, 0, 0, 100, ValueEncoding::Txt).unwrap();
        assert_eq!(page.as_text(), "second");
        let page = store.read("t1", 0, 0, 0, 100, ValueEncoding::Txt).unwrap();
        assert_eq!(page.as_text(), "first");
    }

    #[test]
    fn test_discard_deletes_spool() {
        let parent = tempfile::tempdir().unwrap();
        let store = ContentStore::new().with_spool_dir(Some(parent.path().to_path_buf()));
        let element = store.spool("t1", 0, 0, "TEXT", "a", b"payload").unwrap();
        let path = element
            .content
            .locator_key("file")
            .map(std::path::PathBuf::from)
            .unwrap();
        assert!(path.exists());

        store.discard();

        assert!(store.is_discarded());
        assert!(store.is_empty());
        assert!(!path.exists());
        assert!(matches!(
            store.spool("t1", 1, 0, "TEXT", "a", b"late"),
            Err(ContentError::Discarded)
        ));
    }
}

mod object_storage_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct MemoryStorage {
        objects: HashMap<String, Vec<u8>>,
    }

    impl ObjectStorage for MemoryStorage {
        fn open(&self, key: &str) -> io::Result<Box<dyn Read + Send>> {
            self.objects
                .get(key)
                .map(|bytes| Box::new(Cursor::new(bytes.clone())) as Box<dyn Read + Send>)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, key.to_string()))
        }
    }

    #[test]
    fn test_object_backend_reads_window() {
        let mut objects = HashMap::new();
        objects.insert("results/big".to_string(), b"0123456789".to_vec());
        let store = ContentStore::new();
        store.register_backend(Arc::new(ObjectStorageBackend::new(Arc::new(MemoryStorage {
            objects,
        }))));
        store
            .put(VirtualElement {
                table_id: "t".to_string(),
                row: 2,
                col: 3,
                type_name: "BLOB".to_string(),
                column_name: "data".to_string(),
                content: ContentMetadata::new("object:results/big", 2, 6),
            })
            .unwrap();

        let page = store.read("t", 2, 3, 1, 3, ValueEncoding::Base64).unwrap();
        assert_eq!(page.as_text(), "MzQ1");
        assert_eq!(page.size, 6);
    }

    #[test]
    fn test_object_backend_missing_object() {
        let store = ContentStore::new();
        store.register_backend(Arc::new(ObjectStorageBackend::new(Arc::new(MemoryStorage {
            objects: HashMap::new(),
        }))));
        store
            .put(VirtualElement {
                table_id: "t".to_string(),
                row: 0,
                col: 0,
                type_name: "BLOB".to_string(),
                column_name: "data".to_string(),
                content: ContentMetadata::new("object:missing", 0, 1),
            })
            .unwrap();

        let err = store.read("t", 0, 0, 0, 1, ValueEncoding::Txt).unwrap_err();
        assert!(matches!(err, ContentError::Io(_)));
    }
}
