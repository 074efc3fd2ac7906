//! Put/get/list/delete over the flat storage directory.
//!
//! All operations are synchronous; HTTP handlers call them from
//! `tokio::task::spawn_blocking`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::storage::crypto::{self, CodecError, SymmetricKey};
use crate::storage::naming::{NameError, NamingPolicy, StoredId};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid file name: {0}")]
    InvalidName(#[from] NameError),

    #[error("file not found: {0}")]
    NotFound(String),

    /// Key invalid, record malformed or authentication tag mismatch.
    #[error("stored object could not be decoded: {0}")]
    CodecFailure(#[from] CodecError),

    #[error("{context}: {source}")]
    IoFailure {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl GatewayError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::IoFailure {
            context: context.into(),
            source,
        }
    }
}

pub struct StorageGateway {
    root: PathBuf,
    naming: NamingPolicy,
    key: Option<SymmetricKey>,
}

impl StorageGateway {
    /// Open the storage directory, creating it if needed.
    ///
    /// Objects are encrypted at rest iff a key is supplied.
    pub fn open(root: impl Into<PathBuf>, key: Option<SymmetricKey>) -> Result<Self, GatewayError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            GatewayError::io(
                format!("failed to create storage directory {}", root.display()),
                e,
            )
        })?;

        Ok(Self {
            root,
            naming: NamingPolicy::new(key.is_some()),
            key,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    pub fn naming(&self) -> NamingPolicy {
        self.naming
    }

    fn object_path(&self, logical_name: &str) -> Result<(StoredId, PathBuf), GatewayError> {
        let stored_id = self.naming.to_stored_id(logical_name)?;
        let path = self.root.join(&stored_id);
        Ok((stored_id, path))
    }

    /// Store `plaintext` under `logical_name`, replacing any existing object.
    ///
    /// The payload is written to a temporary file in the same directory and
    /// renamed over the target, so readers never observe a partial object.
    pub fn put(&self, logical_name: &str, plaintext: &[u8]) -> Result<(), GatewayError> {
        let (stored_id, path) = self.object_path(logical_name)?;

        let payload = match &self.key {
            Some(key) => crypto::encode(plaintext, key)?,
            None => plaintext.to_vec(),
        };

        let mut tmp = NamedTempFile::new_in(&self.root)
            .map_err(|e| GatewayError::io("failed to create temporary file", e))?;
        tmp.write_all(&payload)
            .map_err(|e| GatewayError::io(format!("failed to write {}", stored_id), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| GatewayError::io(format!("failed to sync {}", stored_id), e))?;
        tmp.persist(&path)
            .map_err(|e| GatewayError::io(format!("failed to replace {}", stored_id), e.error))?;

        tracing::debug!(
            "Stored {} as {} ({} bytes, {} on disk)",
            logical_name,
            stored_id,
            plaintext.len(),
            payload.len()
        );
        Ok(())
    }

    /// Read and, when encryption is configured, decrypt an object.
    pub fn get(&self, logical_name: &str) -> Result<Vec<u8>, GatewayError> {
        let (stored_id, path) = self.object_path(logical_name)?;

        let raw = std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GatewayError::NotFound(logical_name.to_string()),
            _ => GatewayError::io(format!("failed to read {}", stored_id), e),
        })?;

        match &self.key {
            Some(key) => Ok(crypto::decode(&raw, key)?),
            None => Ok(raw),
        }
    }

    /// Logical names of all stored objects, sorted lexicographically by byte.
    ///
    /// Directory entries that are not regular files, are not valid UTF-8, or
    /// do not map back to a logical name are skipped.
    pub fn list(&self) -> Result<Vec<String>, GatewayError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            GatewayError::io(
                format!("failed to list storage directory {}", self.root.display()),
                e,
            )
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| GatewayError::io("failed to read directory entry", e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| GatewayError::io("failed to stat directory entry", e))?
                .is_file();
            if !is_file {
                continue;
            }
            let file_name = entry.file_name();
            let Some(stored_id) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = self.naming.from_stored_id(stored_id) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn delete(&self, logical_name: &str) -> Result<(), GatewayError> {
        let (stored_id, path) = self.object_path(logical_name)?;

        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GatewayError::NotFound(logical_name.to_string()),
            _ => GatewayError::io(format!("failed to delete {}", stored_id), e),
        })?;

        tracing::debug!("Deleted {} ({})", logical_name, stored_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypted_gateway() -> (tempfile::TempDir, StorageGateway) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = StorageGateway::open(dir.path(), Some(SymmetricKey::generate())).unwrap();
        (dir, gateway)
    }

    fn plaintext_gateway() -> (tempfile::TempDir, StorageGateway) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = StorageGateway::open(dir.path(), None).unwrap();
        (dir, gateway)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (_dir, gateway) = encrypted_gateway();
        let bytes = b"%PDF-1.7 pretend this is a report".to_vec();
        gateway.put("report.pdf", &bytes).unwrap();
        assert_eq!(gateway.get("report.pdf").unwrap(), bytes);
    }

    #[test]
    fn test_encrypted_object_is_ciphertext_on_disk() {
        let (dir, gateway) = encrypted_gateway();
        gateway.put("notes.txt", b"meet at noon").unwrap();

        assert!(!dir.path().join("notes.txt").exists());
        let on_disk = std::fs::read(dir.path().join("notes.txt.enc")).unwrap();
        assert_eq!(on_disk.len(), crypto::NONCE_LEN + 12 + crypto::TAG_LEN);
        assert!(!on_disk.windows(4).any(|w| w == b"noon"));
    }

    #[test]
    fn test_plaintext_object_stored_verbatim() {
        let (dir, gateway) = plaintext_gateway();
        gateway.put("notes.txt", b"meet at noon").unwrap();
        assert_eq!(std::fs::read(dir.path().join("notes.txt")).unwrap(), b"meet at noon");
        assert_eq!(gateway.get("notes.txt").unwrap(), b"meet at noon");
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let (_dir, gateway) = encrypted_gateway();
        assert!(matches!(gateway.get("missing.txt"), Err(GatewayError::NotFound(n)) if n == "missing.txt"));
        assert!(matches!(gateway.delete("missing.txt"), Err(GatewayError::NotFound(_))));
    }

    #[test]
    fn test_overwrite_last_writer_wins() {
        let (_dir, gateway) = encrypted_gateway();
        gateway.put("a.txt", b"X").unwrap();
        gateway.put("a.txt", b"Y").unwrap();
        assert_eq!(gateway.get("a.txt").unwrap(), b"Y");
        assert_eq!(gateway.list().unwrap(), vec!["a.txt".to_string()]);
    }

    #[test]
    fn test_list_after_delete() {
        let (_dir, gateway) = encrypted_gateway();
        gateway.put("x", b"1").unwrap();
        gateway.put("y", b"2").unwrap();
        gateway.delete("x").unwrap();
        assert_eq!(gateway.list().unwrap(), vec!["y".to_string()]);
    }

    #[test]
    fn test_list_is_sorted() {
        let (_dir, gateway) = plaintext_gateway();
        for name in ["zeta", "Alpha", "beta", "alpha"] {
            gateway.put(name, b"").unwrap();
        }
        assert_eq!(gateway.list().unwrap(), vec!["Alpha", "alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_list_skips_foreign_entries() {
        let (dir, gateway) = encrypted_gateway();
        gateway.put("kept.txt", b"data").unwrap();
        std::fs::write(dir.path().join("legacy-plain.txt"), b"old").unwrap();
        std::fs::write(dir.path().join(".tmpXYZ"), b"partial").unwrap();
        std::fs::create_dir(dir.path().join("subdir.enc")).unwrap();

        assert_eq!(gateway.list().unwrap(), vec!["kept.txt".to_string()]);
    }

    #[test]
    fn test_traversal_rejected_before_touching_storage() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("uploads");
        let gateway = StorageGateway::open(&root, Some(SymmetricKey::generate())).unwrap();

        let err = gateway.put("../escaped.txt", b"data").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidName(NameError::Separator)));
        let err = gateway.put("../../etc/passwd", b"data").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidName(_)));

        assert!(!outer.path().join("escaped.txt").exists());
        assert!(!outer.path().join("escaped.txt.enc").exists());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
        assert!(matches!(gateway.get(".."), Err(GatewayError::InvalidName(_))));
        assert!(matches!(gateway.delete(""), Err(GatewayError::InvalidName(NameError::Empty))));
    }

    #[test]
    fn test_tampered_object_is_codec_failure_not_not_found() {
        let (dir, gateway) = encrypted_gateway();
        gateway.put("doc", b"original").unwrap();

        let path = dir.path().join("doc.enc");
        let mut raw = std::fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(&path, raw).unwrap();

        assert!(matches!(
            gateway.get("doc"),
            Err(GatewayError::CodecFailure(CodecError::DecryptFailed))
        ));
    }

    #[test]
    fn test_truncated_object_is_codec_failure() {
        let (dir, gateway) = encrypted_gateway();
        std::fs::write(dir.path().join("short.enc"), [1u8, 2, 3]).unwrap();
        assert!(matches!(
            gateway.get("short"),
            Err(GatewayError::CodecFailure(CodecError::RecordTooShort { len: 3 }))
        ));
    }

    #[test]
    fn test_wrong_key_is_codec_failure() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StorageGateway::open(dir.path(), Some(SymmetricKey::generate())).unwrap();
        writer.put("secret", b"payload").unwrap();

        let reader = StorageGateway::open(dir.path(), Some(SymmetricKey::generate())).unwrap();
        assert!(matches!(reader.get("secret"), Err(GatewayError::CodecFailure(_))));
    }

    #[test]
    fn test_open_creates_directory() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("nested").join("uploads");
        let gateway = StorageGateway::open(&root, None).unwrap();
        assert!(root.is_dir());
        assert!(gateway.list().unwrap().is_empty());
        assert!(!gateway.is_encrypted());
    }

    #[test]
    fn test_put_leaves_no_temporary_files() {
        let (dir, gateway) = encrypted_gateway();
        gateway.put("one", b"1").unwrap();
        gateway.put("one", b"2").unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["one.enc".to_string()]);
    }
}
