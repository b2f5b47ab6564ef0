use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const APP_NAME: &str = "wakecast";
pub const STORE_FILE: &str = "store.json";
pub const SPOOL_FILE: &str = "notifications.json";

/// On-disk layout of the command line host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Uses `data_dir` when given, otherwise the per-user data directory.
    pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => directories::ProjectDirs::from("", "", APP_NAME)
                .map(|dirs| dirs.data_dir().to_path_buf())
                .context("unable to determine a data directory; pass --data-dir")?,
        };
        Ok(Self { data_dir })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn spool_path(&self) -> PathBuf {
        self.data_dir.join(SPOOL_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
