//! Where settings, word pools and learner progress live on disk.
//!
//! Settings and word pools are configuration and go under the platform
//! config dir.  Learner progress is data: one `<learner>.json` per learner
//! under `progress/` in the local data dir, which `store.data_dir` may
//! override.
//!
//! ```text
//! Linux:   ~/.config/pronunciation-coach/{settings.toml, word-pools.json}
//!          ~/.local/share/pronunciation-coach/progress/
//! macOS:   ~/Library/Application Support/pronunciation-coach/...
//! Windows: %APPDATA%\pronunciation-coach\  and  %LOCALAPPDATA%\...\progress\
//! ```

use std::path::{Path, PathBuf};

const APP_NAME: &str = "pronunciation-coach";
const SETTINGS_FILE: &str = "settings.toml";
const WORD_POOLS_FILE: &str = "word-pools.json";
const PROGRESS_DIR: &str = "progress";

/// Resolved locations of the coach's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub settings_file: PathBuf,
    /// Optional; the built-in English pool is used when it is absent.
    pub word_pools_file: PathBuf,
    /// Default directory of the JSON progress store.
    pub progress_dir: PathBuf,
}

impl AppPaths {
    /// Platform layout.  A platform without standard dirs falls back to the
    /// working directory.
    pub fn new() -> Self {
        let config_root = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_root = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::split(&config_root.join(APP_NAME), &data_root.join(APP_NAME))
    }

    /// Everything under a single directory, e.g. for a self-contained
    /// deployment or a test.
    pub fn under(root: &Path) -> Self {
        Self::split(root, root)
    }

    fn split(config_dir: &Path, data_dir: &Path) -> Self {
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            word_pools_file: config_dir.join(WORD_POOLS_FILE),
            progress_dir: data_dir.join(PROGRESS_DIR),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
