//! Locating the ht controller binary

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SessionError;

/// Environment variable naming an explicit ht binary
pub const HT_BIN_ENV: &str = "HTTY_HT_BIN";

const HT_EXE: &str = if cfg!(windows) { "ht.exe" } else { "ht" };

/// Find the ht binary.
///
/// Checked in order: `$HTTY_HT_BIN`, `ht` on `PATH`, then `ht` next to the
/// running executable.
pub fn find_ht_binary() -> Result<PathBuf, SessionError> {
    let mut searched = Vec::new();

    if let Some(path) = std::env::var_os(HT_BIN_ENV).map(PathBuf::from) {
        if path.is_file() {
            debug!("Using ht from {}: {}", HT_BIN_ENV, path.display());
            return Ok(path);
        }
        searched.push(path);
    }

    match which::which(HT_EXE) {
        Ok(path) => {
            debug!("Found ht on PATH: {}", path.display());
            return Ok(path);
        }
        Err(_) => searched.push(PathBuf::from(format!("{} on PATH", HT_EXE))),
    }

    if let Some(dir) = std::env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
    {
        let path = dir.join(HT_EXE);
        if path.is_file() {
            debug!("Found ht next to current executable: {}", path.display());
            return Ok(path);
        }
        searched.push(path);
    }

    Err(SessionError::BinaryNotFound { searched })
}

/// Resolve a configured path, or discover one.
pub(crate) fn resolve(configured: Option<&Path>) -> Result<PathBuf, SessionError> {
    match configured {
        Some(path) if path.components().count() == 1 && !path.is_file() => {
            // Bare name: look it up on PATH like a shell would
            which::which(path).map_err(|_| SessionError::BinaryNotFound {
                searched: vec![path.to_path_buf()],
            })
        }
        Some(path) => Ok(path.to_path_buf()),
        None => find_ht_binary(),
    }
}
