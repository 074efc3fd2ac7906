//! Mapping between client-supplied file names and on-disk object names.
//!
//! The storage namespace is a single flat directory, so a valid logical name
//! is exactly one path component. Encrypted objects carry the `.enc` suffix.

use std::fmt;

use thiserror::Error;

/// Suffix marking a stored object as an encrypted record.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Longest stored id the filesystem will accept as a single component.
pub const MAX_STORED_ID_LEN: usize = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,

    #[error("file name must not contain path separators")]
    Separator,

    #[error("file name must not contain control characters")]
    ControlCharacter,

    /// Covers `.` and `..` as well as dot-files, which the store reserves
    /// for in-flight temporary files.
    #[error("file name must not start with '.'")]
    Hidden,

    #[error("file name too long ({len} bytes, max {max})")]
    TooLong { len: usize, max: usize },
}

/// Identifier of an object inside the storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoredId(String);

impl StoredId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for StoredId {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingPolicy {
    encrypted: bool,
}

impl NamingPolicy {
    pub fn new(encrypted: bool) -> Self {
        Self { encrypted }
    }

    pub fn encrypted(&self) -> bool {
        self.encrypted
    }

    fn suffix(&self) -> &'static str {
        if self.encrypted {
            ENCRYPTED_SUFFIX
        } else {
            ""
        }
    }

    /// Validate a logical name and compute where its payload lives.
    ///
    /// Names are rejected rather than rewritten, so two distinct accepted
    /// names can never share a stored id.
    pub fn to_stored_id(&self, logical_name: &str) -> Result<StoredId, NameError> {
        validate(logical_name)?;

        let max = MAX_STORED_ID_LEN - self.suffix().len();
        if logical_name.len() > max {
            return Err(NameError::TooLong {
                len: logical_name.len(),
                max,
            });
        }

        Ok(StoredId(format!("{}{}", logical_name, self.suffix())))
    }

    /// Recover the logical name from a directory entry.
    ///
    /// Returns `None` for entries that `to_stored_id` could not have
    /// produced (temporary files, foreign files, plaintext leftovers in an
    /// encrypted namespace).
    pub fn from_stored_id(&self, stored_id: &str) -> Option<String> {
        let logical = stored_id.strip_suffix(self.suffix())?;
        let candidate = self.to_stored_id(logical).ok()?;
        (candidate.as_str() == stored_id).then(|| logical.to_string())
    }
}

fn validate(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.contains(['/', '\\']) {
        return Err(NameError::Separator);
    }
    if name.chars().any(char::is_control) {
        return Err(NameError::ControlCharacter);
    }
    if name.starts_with('.') {
        return Err(NameError::Hidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_policy_keeps_name() {
        let policy = NamingPolicy::new(false);
        assert_eq!(policy.to_stored_id("report.pdf").unwrap().as_str(), "report.pdf");
        assert_eq!(policy.from_stored_id("report.pdf").as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_encrypted_policy_appends_suffix() {
        let policy = NamingPolicy::new(true);
        let id = policy.to_stored_id("report.pdf").unwrap();
        assert_eq!(id.as_str(), "report.pdf.enc");
        assert_eq!(policy.from_stored_id(id.as_str()).as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_encrypted_policy_ignores_unsuffixed_entries() {
        let policy = NamingPolicy::new(true);
        assert_eq!(policy.from_stored_id("report.pdf"), None);
        assert_eq!(policy.from_stored_id(".enc"), None);
    }

    #[test]
    fn test_logical_name_may_itself_end_in_enc() {
        let policy = NamingPolicy::new(true);
        let id = policy.to_stored_id("backup.enc").unwrap();
        assert_eq!(id.as_str(), "backup.enc.enc");
        assert_eq!(policy.from_stored_id(id.as_str()).as_deref(), Some("backup.enc"));
    }

    #[test]
    fn test_temp_files_are_not_objects() {
        for policy in [NamingPolicy::new(false), NamingPolicy::new(true)] {
            assert_eq!(policy.from_stored_id(".tmpA1b2C3"), None);
            assert_eq!(policy.from_stored_id(".tmpA1b2C3.enc"), None);
        }
    }

    #[test]
    fn test_traversal_rejected() {
        let policy = NamingPolicy::new(true);
        assert_eq!(policy.to_stored_id("../../etc/passwd"), Err(NameError::Separator));
        assert_eq!(policy.to_stored_id("..\\secret"), Err(NameError::Separator));
        assert_eq!(policy.to_stored_id(".."), Err(NameError::Hidden));
        assert_eq!(policy.to_stored_id("."), Err(NameError::Hidden));
        assert_eq!(policy.to_stored_id("/etc/passwd"), Err(NameError::Separator));
        assert_eq!(policy.to_stored_id("a/b"), Err(NameError::Separator));
    }

    #[test]
    fn test_empty_and_control_rejected() {
        let policy = NamingPolicy::new(false);
        assert_eq!(policy.to_stored_id(""), Err(NameError::Empty));
        assert_eq!(policy.to_stored_id("a\0b"), Err(NameError::ControlCharacter));
        assert_eq!(policy.to_stored_id("line\nbreak"), Err(NameError::ControlCharacter));
    }

    #[test]
    fn test_length_limit_accounts_for_suffix() {
        let plain = NamingPolicy::new(false);
        let encrypted = NamingPolicy::new(true);
        let name = "a".repeat(MAX_STORED_ID_LEN);

        assert!(plain.to_stored_id(&name).is_ok());
        assert_eq!(
            encrypted.to_stored_id(&name),
            Err(NameError::TooLong {
                len: MAX_STORED_ID_LEN,
                max: MAX_STORED_ID_LEN - ENCRYPTED_SUFFIX.len(),
            })
        );
        assert!(encrypted
            .to_stored_id(&"a".repeat(MAX_STORED_ID_LEN - ENCRYPTED_SUFFIX.len()))
            .is_ok());
    }

    #[test]
    fn test_distinct_names_never_collide() {
        let names = [
            "a", "a.enc", "a.enc.enc", "A", "a ", "report.pdf", "report.pdf.enc", "résumé.txt",
            "..a", "a..", "x.y.z",
        ];
        for policy in [NamingPolicy::new(false), NamingPolicy::new(true)] {
            let ids: Vec<StoredId> = names
                .iter()
                .filter_map(|n| policy.to_stored_id(n).ok())
                .collect();
            for (i, a) in ids.iter().enumerate() {
                for b in &ids[i + 1..] {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_inverse_of_every_accepted_name() {
        let policy = NamingPolicy::new(true);
        for name in ["x", "with space.txt", "ünïcode", "a..", "trailing.enc"] {
            let id = policy.to_stored_id(name).unwrap();
            assert_eq!(policy.from_stored_id(id.as_str()).as_deref(), Some(name));
        }
    }
}
