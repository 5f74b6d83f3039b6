use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{PortError, Result};

/// Lock file guarding a snapshot for the whole run.
pub fn lock_path_for(snapshot: &Path) -> PathBuf {
    let mut name = snapshot
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    snapshot.with_file_name(name)
}

/// Acquire an exclusive lock on a file, returning the locked File handle.
/// The lock is released when the File is dropped.
pub fn acquire_lock(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    file.try_lock_exclusive()
        .map_err(|_| PortError::Locked(path.display().to_string()))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_lock_fails_until_first_is_dropped() {
        let dir = tempdir().unwrap();
        let lock_path = lock_path_for(&dir.path().join("dest.json"));
        assert!(lock_path.ends_with("dest.json.lock"));

        let file = acquire_lock(&lock_path).unwrap();
        assert!(matches!(acquire_lock(&lock_path), Err(PortError::Locked(_))));
        drop(file);
        let _file = acquire_lock(&lock_path).unwrap();
    }
}
