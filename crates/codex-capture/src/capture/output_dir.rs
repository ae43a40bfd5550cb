//! Capture directory resolution
//!
//! Order: explicit configuration, then `CODEX_CAPTURE_DIR`, then
//! `<executable dir>/../captures`. The working directory is never consulted.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CaptureError, Result};

/// Environment variable naming the capture directory
pub const CAPTURE_DIR_ENV: &str = "CODEX_CAPTURE_DIR";

/// Resolve the capture directory for this process and make sure it exists
pub fn resolve(explicit: Option<&Path>) -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| CaptureError::Config(format!("Cannot locate running executable: {}", e)))?;
    let dir = resolve_from(explicit, std::env::var_os(CAPTURE_DIR_ENV), &exe)?;
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Pure resolution step, without touching the filesystem
pub fn resolve_from(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    exe_path: &Path,
) -> Result<PathBuf> {
    if let Some(dir) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(dir.to_path_buf());
    }

    if let Some(dir) = env_value.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let exe_dir = exe_path.parent().ok_or_else(|| {
        CaptureError::Config(format!(
            "Executable path has no parent directory: {}",
            exe_path.display()
        ))
    })?;
    Ok(exe_dir.join("..").join("captures"))
}

/// Create `dir` and its parents; failure here is a startup error
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        CaptureError::Config(format!(
            "Failed to create capture directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    debug!("Capture directory ready: {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exe() -> PathBuf {
        PathBuf::from("/opt/codex-capture/bin/codex-capture")
    }

    #[test]
    fn test_explicit_wins() {
        let dir = resolve_from(
            Some(Path::new("/data/explicit")),
            Some(OsString::from("/data/env")),
            &exe(),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/data/explicit"));
    }

    #[test]
    fn test_env_used_when_no_explicit() {
        let dir = resolve_from(None, Some(OsString::from("/data/env")), &exe()).unwrap();
        assert_eq!(dir, PathBuf::from("/data/env"));
    }

    #[test]
    fn test_empty_values_fall_through() {
        let dir = resolve_from(Some(Path::new("")), Some(OsString::new()), &exe()).unwrap();
        assert_eq!(dir, PathBuf::from("/opt/codex-capture/bin/../captures"));
    }

    #[test]
    fn test_default_is_relative_to_executable() {
        let dir = resolve_from(None, None, &exe()).unwrap();
        assert!(dir.starts_with("/opt/codex-capture/bin"));
        assert!(dir.ends_with("captures"));
    }

    #[test]
    fn test_ensure_dir_creates_parents() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b").join("captures");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Already existing is fine
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dir_fails_on_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("occupied");
        std::fs::write(&blocker, b"x").unwrap();

        let err = ensure_dir(&blocker.join("captures")).unwrap_err();
        assert!(matches!(err, CaptureError::Config(_)));
    }
}
