//! Path management for the arduino-cli installation.
//!
//! The tool lives under the user's home directory:
//!
//! - Linux/macOS: `~/ex-installer/arduino-cli/arduino-cli`
//! - Windows: `C:\Users\<User>\ex-installer\arduino-cli\arduino-cli.exe`
//!
//! Downloads are staged under the OS temp directory.

use std::fs;
use std::path::{Path, PathBuf};

/// Application directory under the user's home.
const APP_DIR: &str = "ex-installer";

/// Subdirectory holding the arduino-cli binary.
const TOOL_DIR: &str = "arduino-cli";

const SETTINGS_FILE: &str = "settings.json";

// ============================================================================
// Path Resolution
// ============================================================================

/// Returns `~/ex-installer`. Falls back to the temp directory when the OS
/// reports no home directory.
pub fn default_install_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Returns the directory the arduino-cli archive is extracted into.
pub fn tool_dir(install_root: &Path) -> PathBuf {
    install_root.join(TOOL_DIR)
}

/// Platform-specific executable file name.
pub fn executable_name() -> &'static str {
    #[cfg(windows)]
    let name = "arduino-cli.exe";

    #[cfg(not(windows))]
    let name = "arduino-cli";

    name
}

/// Returns the full path to the arduino-cli executable under `install_root`.
pub fn cli_file_path(install_root: &Path) -> PathBuf {
    tool_dir(install_root).join(executable_name())
}

/// Returns the default settings file location.
///
/// Path: `~/ex-installer/settings.json`
pub fn settings_path() -> PathBuf {
    default_install_root().join(SETTINGS_FILE)
}

/// Returns the directory release archives are downloaded into.
///
/// Path: `{temp}/ex-installer/`
pub fn download_dir() -> PathBuf {
    std::env::temp_dir().join(APP_DIR)
}

// ============================================================================
// Installation State
// ============================================================================

/// Returns true if `path` is an existing regular file the current user may
/// execute. Never fails: anything unreadable counts as not installed.
pub fn is_executable_file(path: &Path) -> bool {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };

    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
