pub mod audio;
#[cfg(test)]
pub mod memory;
pub mod spool;
pub mod storage;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlatformError;

/// A timed local notification as handed to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub identifier: String,
    pub title: String,
    pub body: String,
    pub data: Value,
    pub trigger_at: DateTime<Local>,
    pub sound: bool,
}

pub trait NotificationPlatform {
    fn is_supported(&self) -> bool;
    fn has_permission(&self) -> Result<bool, PlatformError>;
    fn request_permission(&mut self) -> Result<bool, PlatformError>;
    /// Registers (or replaces) the notification keyed by `request.identifier`.
    fn schedule(&mut self, request: NotificationRequest) -> Result<String, PlatformError>;
    /// Cancelling an identifier with nothing pending is not an error.
    fn cancel(&mut self, identifier: &str) -> Result<(), PlatformError>;
    fn pending(&self) -> Result<Vec<NotificationRequest>, PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub looping: bool,
    /// 0.0 to 1.0
    pub volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundHandle(pub u64);

pub trait AudioPlayer {
    fn play(&mut self, uri: &str, options: PlaybackOptions) -> Result<SoundHandle, PlatformError>;
    fn stop(&mut self, sound: SoundHandle) -> Result<(), PlatformError>;
    fn unload(&mut self, sound: SoundHandle) -> Result<(), PlatformError>;
}

/// String-valued key-value persistence, the shape of a mobile app's local
/// storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PlatformError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PlatformError>;
    fn remove(&mut self, key: &str) -> Result<(), PlatformError>;
}
