//! Operating-system helpers: hidden-file detection and default locations.

use std::path::{Path, PathBuf};

/// Name of the per-user application directory.
const APP_DIR_NAME: &str = "tidyfolder";

/// Returns true if the entry at `path` is hidden on this platform.
///
/// On Windows this checks the `FILE_ATTRIBUTE_HIDDEN` attribute; elsewhere
/// a name starting with `.` is hidden. Any error reading the entry counts as
/// not hidden.
pub fn is_hidden(path: &Path) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

        std::fs::metadata(path)
            .map(|meta| meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
            .unwrap_or(false)
    }

    #[cfg(not(windows))]
    {
        path.file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false)
    }
}

/// Per-user configuration directory for the application.
///
/// Falls back to `~/.tidyfolder` when the platform reports no config dir.
pub fn config_dir() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(APP_DIR_NAME),
        None => home_dir().join(format!(".{}", APP_DIR_NAME)),
    }
}

/// Directory holding the undo journal slots.
pub fn undo_dir() -> PathBuf {
    config_dir().join("undo")
}

/// Default settings file location.
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.toml")
}

/// The user's desktop directory, used as the default organize target.
pub fn desktop_dir() -> PathBuf {
    dirs::desktop_dir().unwrap_or_else(|| home_dir().join("Desktop"))
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
