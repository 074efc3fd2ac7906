use std::path::Path;

use crate::storage::crypto::SymmetricKey;

/// File name of the generated storage key inside `data_dir`.
pub const KEY_FILE_NAME: &str = "storage.key";

/// Resolve the storage key once at startup.
///
/// A hex key from config wins. Otherwise the raw key in
/// `data_dir/storage.key` is loaded, or a random 256-bit key is generated
/// and written there on first boot.
pub fn load_storage_key(
    configured_hex: Option<&str>,
    data_dir: &str,
) -> Result<SymmetricKey, Box<dyn std::error::Error>> {
    if let Some(encoded) = configured_hex.filter(|s| !s.trim().is_empty()) {
        let key = SymmetricKey::from_hex(encoded)
            .map_err(|e| format!("Invalid configured encryption key: {}", e))?;
        tracing::info!("Storage key loaded from configuration ({} bits)", key.len() * 8);
        return Ok(key);
    }
    load_or_generate_storage_key(data_dir)
}

pub fn load_or_generate_storage_key(
    data_dir: &str,
) -> Result<SymmetricKey, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let key_path = Path::new(data_dir).join(KEY_FILE_NAME);

    if key_path.exists() {
        let bytes = std::fs::read(&key_path)?;
        // An existing key file is never replaced.
        let key = SymmetricKey::new(bytes).map_err(|e| {
            format!("Storage key file {} is invalid: {}", key_path.display(), e)
        })?;
        tracing::info!("Storage key loaded from {}", key_path.display());
        return Ok(key);
    }

    let key = SymmetricKey::generate();
    write_key_file(&key_path, key.as_bytes())?;
    tracing::info!("Storage key generated at {}", key_path.display());
    Ok(key)
}

#[cfg(unix)]
fn write_key_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_key_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}
