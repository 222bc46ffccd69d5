//! Filesystem RCA store.
//!
//! Layout: `<dir>/<prefix><incident id>/<yyyymmdd_HHMMSS>_<document id>_rca.json`.
//! Each document is written to a temp file and renamed into place, so a
//! reader never sees a half-written file and a re-run never overwrites an
//! earlier record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use coordination::RcaDocument;

use super::{RcaStore, StoreError};

pub struct FsRcaStore {
    root: PathBuf,
    prefix: String,
}

impl FsRcaStore {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `document` is written
    pub fn path_for(&self, document: &RcaDocument) -> PathBuf {
        let dir = format!("{}{}", self.prefix, sanitize(&document.incident_id));
        let file = format!(
            "{}_{}_rca.json",
            document.generated_at.format("%Y%m%d_%H%M%S"),
            document.document_id
        );
        self.root.join(dir).join(file)
    }
}

/// Keep ids usable as a single path component
fn sanitize(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unidentified".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl RcaStore for FsRcaStore {
    async fn store(&self, document: &RcaDocument) -> Result<String, StoreError> {
        let path = self.path_for(document);
        let json = document
            .to_json()
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json.as_bytes()).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::{Incident, RcaParts};

    fn document(id: &str) -> RcaDocument {
        RcaDocument::assemble(RcaParts::new(Incident::new(id, "Glue job failed"))).unwrap()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("INC0012345"), "INC0012345");
        assert_eq!(sanitize("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize(""), "unidentified");
        assert_eq!(sanitize("a b/c"), "a_b_c");
    }

    #[tokio::test]
    async fn test_store_writes_readable_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRcaStore::new(dir.path(), "rca/");
        let doc = document("INC100");

        let locator = store.store(&doc).await.unwrap();
        assert!(locator.starts_with("file://"));
        assert!(locator.ends_with("_rca.json"));

        let path = store.path_for(&doc);
        assert!(path.starts_with(dir.path().join("rca").join("INC100")));
        let back = RcaDocument::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.document_id, doc.document_id);
        assert!(back.verify_digest());
    }

    #[tokio::test]
    async fn test_rerun_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRcaStore::new(dir.path(), "");
        store.store(&document("INC7")).await.unwrap();
        store.store(&document("INC7")).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path().join("INC7"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(files.len(), 2);
        assert!(files
            .iter()
            .all(|f| !f.file_name().to_string_lossy().ends_with(".tmp")));
    }

    #[tokio::test]
    async fn test_unwritable_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = FsRcaStore::new(&blocker, "rca/");
        let err = store.store(&document("INC8")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)), "{err}");
    }
}
