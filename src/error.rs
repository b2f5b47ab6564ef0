use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by one of the platform collaborators (notifications,
/// audio, key-value storage).
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("notifications are not supported on this platform")]
    Unsupported,
    #[error("notification rejected for '{identifier}': {reason}")]
    Rejected { identifier: String, reason: String },
    #[error("audio source not found: {0}")]
    AudioNotFound(String),
    #[error("unable to decode {uri}: {reason}")]
    UnsupportedAudio { uri: String, reason: String },
    #[error("audio output unavailable: {0}")]
    AudioOutput(String),
    #[error("unknown sound handle {0}")]
    UnknownSound(u64),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("unable to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// User-facing validation failure raised by the create/edit flows before
/// anything is persisted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("alarm '{0}' has no recorded audio")]
    MissingAudio(String),
    #[error("hour {0} is out of range, expected 1-12")]
    HourOutOfRange(u32),
    #[error("minute {0} is out of range, expected 0-59")]
    MinuteOutOfRange(u32),
    #[error("invalid time '{0}', expected HH:MM (24h) or H:MM AM/PM")]
    InvalidTime(String),
    #[error("invalid weekday '{0}', expected Sun..Sat, all, weekdays, weekends or none")]
    InvalidWeekday(String),
    #[error("invalid theme '{0}', expected light, dark or system")]
    InvalidTheme(String),
    #[error("snooze duration must be at least one minute")]
    InvalidSnooze,
    #[error("alarm '{0}' not found")]
    UnknownAlarm(String),
    #[error("duplicate alarm id: {0}")]
    DuplicateId(String),
    #[error("invalid alarm id '{0}', ids must not contain ':'")]
    InvalidId(String),
}
