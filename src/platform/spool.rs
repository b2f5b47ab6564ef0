use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::platform::{NotificationPlatform, NotificationRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpoolFile {
    #[serde(default = "default_permission")]
    permission_granted: bool,
    #[serde(default)]
    pending: Vec<NotificationRequest>,
}

impl Default for SpoolFile {
    fn default() -> Self {
        Self {
            permission_granted: default_permission(),
            pending: Vec::new(),
        }
    }
}

fn default_permission() -> bool {
    true
}

/// Notification platform for the command line: pending notifications live in
/// a JSON spool file and are delivered by whoever drains [`take_due`].
///
/// [`take_due`]: SpoolPlatform::take_due
#[derive(Debug)]
pub struct SpoolPlatform {
    path: PathBuf,
    spool: SpoolFile,
}

impl SpoolPlatform {
    pub fn open(path: &Path) -> Result<Self, PlatformError> {
        let spool = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| PlatformError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => SpoolFile::default(),
            Err(source) => {
                return Err(PlatformError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            spool,
        })
    }

    pub fn set_permission(&mut self, granted: bool) -> Result<(), PlatformError> {
        self.spool.permission_granted = granted;
        self.flush()
    }

    /// Removes and returns every notification whose trigger time has passed,
    /// earliest first.
    pub fn take_due(&mut self, now: DateTime<Local>) -> Result<Vec<NotificationRequest>, PlatformError> {
        let (mut due, rest): (Vec<_>, Vec<_>) = self
            .spool
            .pending
            .drain(..)
            .partition(|request| request.trigger_at <= now);
        self.spool.pending = rest;
        if !due.is_empty() {
            self.flush()?;
        }
        due.sort_by_key(|request| request.trigger_at);
        debug!("{} notification(s) due at {}", due.len(), now.to_rfc3339());
        Ok(due)
    }

    fn flush(&self) -> Result<(), PlatformError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| PlatformError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text =
            serde_json::to_string_pretty(&self.spool).map_err(|source| PlatformError::Json {
                path: self.path.clone(),
                source,
            })?;
        fs::write(&self.path, format!("{text}\n")).map_err(|source| PlatformError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl NotificationPlatform for SpoolPlatform {
    fn is_supported(&self) -> bool {
        true
    }

    fn has_permission(&self) -> Result<bool, PlatformError> {
        Ok(self.spool.permission_granted)
    }

    // There is nobody to prompt; the stored grant is the answer.
    fn request_permission(&mut self) -> Result<bool, PlatformError> {
        Ok(self.spool.permission_granted)
    }

    fn schedule(&mut self, request: NotificationRequest) -> Result<String, PlatformError> {
        let identifier = request.identifier.clone();
        self.spool
            .pending
            .retain(|pending| pending.identifier != identifier);
        info!(
            "spooled notification {identifier} for {}",
            request.trigger_at.to_rfc3339()
        );
        self.spool.pending.push(request);
        self.flush()?;
        Ok(identifier)
    }

    fn cancel(&mut self, identifier: &str) -> Result<(), PlatformError> {
        let before = self.spool.pending.len();
        self.spool
            .pending
            .retain(|pending| pending.identifier != identifier);
        if self.spool.pending.len() != before {
            self.flush()?;
        }
        Ok(())
    }

    fn pending(&self) -> Result<Vec<NotificationRequest>, PlatformError> {
        Ok(self.spool.pending.clone())
    }
}
