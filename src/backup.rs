//! Backup-before-write file discipline
//!
//! Every destructive write to a data file first copies the current file to
//! a suffix-appended backup path. If the write fails the backup is restored
//! over the partial file, so a crash mid-write never costs the prior state.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// The backup path for `path`: the file name with `suffix` appended.
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Run `write` against `path` with the previous contents backed up.
///
/// On failure the backup is copied back over whatever the failed write left
/// behind (or the partial file is removed when there was nothing to back
/// up), and the error propagates.
pub fn backed_up_write<F>(path: &Path, suffix: &str, write: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let backup = backup_path(path, suffix);
    let had_previous = path.exists();
    if had_previous {
        fs::copy(path, &backup)?;
    }

    match write() {
        Ok(()) => Ok(()),
        Err(err) => {
            if had_previous {
                // Best effort: the original error is the one worth seeing.
                let _ = fs::copy(&backup, path);
            } else {
                let _ = fs::remove_file(path);
            }
            Err(err)
        }
    }
}
