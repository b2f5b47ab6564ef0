use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, ValidationError};
use crate::platform::KeyValueStore;

pub const SNOOZE_KEY: &str = "snoozeTime";
pub const VOLUME_KEY: &str = "alarmVolume";
pub const THEME_KEY: &str = "theme";

pub const DEFAULT_SNOOZE_MINUTES: u32 = 5;
pub const DEFAULT_VOLUME_PERCENT: u8 = 80;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        })
    }
}

impl FromStr for Theme {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            _ => Err(ValidationError::InvalidTheme(s.to_string())),
        }
    }
}

/// User preferences kept next to the alarm list in the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub snooze_minutes: u32,
    pub volume_percent: u8,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            volume_percent: DEFAULT_VOLUME_PERCENT,
            theme: Theme::default(),
        }
    }
}

impl Settings {
    /// Missing or unreadable values fall back to their defaults.
    pub fn load(storage: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        let snooze_minutes = read_value(storage, SNOOZE_KEY, |raw| {
            raw.parse::<u32>().ok().filter(|minutes| *minutes >= 1)
        })
        .unwrap_or(defaults.snooze_minutes);
        let volume_percent = read_value(storage, VOLUME_KEY, |raw| {
            raw.parse::<f64>()
                .ok()
                .filter(|volume| volume.is_finite())
                .map(|volume| volume.round().clamp(0.0, 100.0) as u8)
        })
        .unwrap_or(defaults.volume_percent);
        let theme = read_value(storage, THEME_KEY, |raw| raw.parse::<Theme>().ok())
            .unwrap_or(defaults.theme);

        Self {
            snooze_minutes,
            volume_percent,
            theme,
        }
    }

    pub fn save(&self, storage: &mut dyn KeyValueStore) -> Result<(), PlatformError> {
        storage.set(SNOOZE_KEY, &self.snooze_minutes.to_string())?;
        storage.set(VOLUME_KEY, &self.volume_percent.to_string())?;
        storage.set(THEME_KEY, &self.theme.to_string())?;
        Ok(())
    }
}

fn read_value<T>(
    storage: &dyn KeyValueStore,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!("unable to read setting {key}: {err}");
            return None;
        }
    };
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!("ignoring invalid {key} value '{raw}'");
    }
    parsed
}
