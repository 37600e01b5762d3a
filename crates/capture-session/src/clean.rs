//! Post-session cleanup

use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};

/// Recursively delete the working area
pub fn purge_working_area(path: &Path) -> SessionResult<()> {
    fs::remove_dir_all(path).map_err(|e| SessionError::cleanup(path, e))?;
    debug!("Removed working area {}", path.display());
    Ok(())
}

/// Delete every file at the source root, except one named exactly `keep`.
/// Returns the number of files removed.
pub fn drain_source(source: &Path, keep: Option<&OsStr>) -> SessionResult<usize> {
    let entries = fs::read_dir(source).map_err(|e| SessionError::cleanup(source, e))?;

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| SessionError::cleanup(source, e))?;
        let path = entry.path();

        if keep.is_some_and(|name| entry.file_name().as_os_str() == name) {
            debug!("Keeping {} on capture source", path.display());
            continue;
        }
        let is_file = entry
            .file_type()
            .map_err(|e| SessionError::cleanup(&path, e))?
            .is_file();
        if !is_file {
            continue;
        }

        fs::remove_file(&path).map_err(|e| SessionError::cleanup(&path, e))?;
        removed += 1;
    }

    info!("Drained {} files from {}", removed, source.display());
    Ok(removed)
}
