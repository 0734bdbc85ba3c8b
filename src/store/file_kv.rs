// src/store/file_kv.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{error::AppError, store::SnapshotStore};

/// Durable key/value store with one file per key under a directory.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::info!("Snapshot store at {}", dir.display());
        Ok(Self { dir })
    }

    /// Keys map to file names one-to-one: ASCII letters, digits and `-` are
    /// kept, every other byte (`_` included) becomes `_xx` in hex.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(byte as char);
            } else {
                name.push_str(&format!("_{:02x}", byte));
            }
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.path_for(key);
        // write-then-rename so a crash never leaves a half-written snapshot
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSnapshotStore::open(dir.path()).unwrap();
            store.set("test-progress:user@example.com", "{\"a\":1}").unwrap();
        }

        let store = FileSnapshotStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("test-progress:user@example.com").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
    }

    #[test]
    fn similar_user_ids_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();

        store.set("test-progress:a.b", "alice").unwrap();
        assert_eq!(store.get("test-progress:a_b").unwrap(), None);

        store.set("test-progress:jo.doe@x.com", "jo").unwrap();
        store.set("test-progress:jo_doe_x_com", "other").unwrap();
        store.remove("test-progress:jo_doe_x_com").unwrap();
        assert_eq!(
            store.get("test-progress:jo.doe@x.com").unwrap().as_deref(),
            Some("jo")
        );
        assert_eq!(store.get("test-progress:a.b").unwrap().as_deref(), Some("alice"));
    }

    #[test]
    fn missing_key_and_double_remove_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        assert_eq!(store.get("nope").unwrap(), None);
        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
