//! Executable validation utilities.

use duet_common::{LaunchError, LaunchResult, ServiceRole};
use std::io;
use std::path::{Path, PathBuf};

/// Path of a platform executable named `stem` inside `dir`
/// (`ollama` becomes `ollama.exe` on Windows).
pub fn platform_executable(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}{}", stem, std::env::consts::EXE_SUFFIX))
}

/// Validate that a service executable exists and is a regular file.
pub fn validate_executable(role: ServiceRole, path: &Path) -> LaunchResult<()> {
    if path.as_os_str().is_empty() {
        return Err(LaunchError::configuration(format!(
            "{} executable path cannot be empty",
            role
        )));
    }

    if !path.is_file() {
        return Err(LaunchError::binary_not_found(role, path));
    }

    Ok(())
}

/// Make sure the executable bit is set for the owner, group and others.
///
/// Returns `Ok(true)` when the mode had to be changed. Always `Ok(false)` on
/// Windows, which has no executable bit.
pub fn ensure_executable(path: &Path) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = std::fs::metadata(path)?.permissions();
        let mode = permissions.mode();
        if mode & 0o111 == 0o111 {
            return Ok(false);
        }
        permissions.set_mode(mode | 0o111);
        std::fs::set_permissions(path, permissions)?;
        Ok(true)
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(false)
    }
}
