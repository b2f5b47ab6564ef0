use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_HOUR: u32 = 8;
pub const DEFAULT_MINUTE: u32 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[default]
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Period::Am => "AM",
            Period::Pm => "PM",
        })
    }
}

pub fn to_24_hour(hour: u32, period: Period) -> u32 {
    match period {
        Period::Pm if hour < 12 => hour + 12,
        Period::Am if hour == 12 => 0,
        _ => hour,
    }
}

pub fn from_24_hour(hour: u32) -> (u32, Period) {
    let period = if hour >= 12 { Period::Pm } else { Period::Am };
    let display = match hour % 12 {
        0 => 12,
        other => other,
    };
    (display, period)
}

/// Armed weekdays, indexed Sunday(0)..Saturday(6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdaySet([bool; 7]);

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

impl Default for WeekdaySet {
    fn default() -> Self {
        Self::all()
    }
}

impl WeekdaySet {
    pub const fn all() -> Self {
        Self([true; 7])
    }

    pub const fn none() -> Self {
        Self([false; 7])
    }

    pub const fn from_flags(flags: [bool; 7]) -> Self {
        Self(flags)
    }

    pub fn from_days(days: &[Weekday]) -> Self {
        let mut set = Self::none();
        for day in days {
            set.set(*day, true);
        }
        set
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0[day.num_days_from_sunday() as usize]
    }

    pub fn set(&mut self, day: Weekday, armed: bool) {
        self.0[day.num_days_from_sunday() as usize] = armed;
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|armed| *armed)
    }

    pub fn flags(&self) -> [bool; 7] {
        self.0
    }

    /// Parses `all`, `none`, `weekdays`, `weekends` or a comma separated
    /// list of day names (`mon,wed,fri`).
    pub fn parse_list(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "all" | "daily" | "every day" => return Ok(Self::all()),
            "none" | "" => return Ok(Self::none()),
            "weekdays" => {
                return Ok(Self::from_flags([
                    false, true, true, true, true, true, false,
                ]));
            }
            "weekends" => {
                return Ok(Self::from_flags([
                    true, false, false, false, false, false, true,
                ]));
            }
            _ => {}
        }

        let mut set = Self::none();
        for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let day = Weekday::from_str(token)
                .map_err(|_| ValidationError::InvalidWeekday(token.to_string()))?;
            set.set(day, true);
        }
        Ok(set)
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::all() {
            return f.write_str("every day");
        }
        if self.is_empty() {
            return f.write_str("never");
        }
        let labels = WEEKDAY_LABELS
            .iter()
            .zip(self.0)
            .filter(|(_, armed)| *armed)
            .map(|(label, _)| *label)
            .collect::<Vec<_>>();
        f.write_str(&labels.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    #[serde(alias = "hours")]
    pub hour: u32,
    #[serde(alias = "minutes")]
    pub minute: u32,
    pub period: Period,
    pub days: WeekdaySet,
    #[serde(alias = "audioPath")]
    pub audio_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Alarm {
    pub fn hour_24(&self) -> u32 {
        to_24_hour(self.hour, self.period)
    }

    /// `None` when the stored hour/minute do not form a valid time of day.
    pub fn time_24h(&self) -> Option<NaiveTime> {
        if !(1..=12).contains(&self.hour) {
            return None;
        }
        NaiveTime::from_hms_opt(self.hour_24(), self.minute, 0)
    }

    /// Label with blank text treated as absent.
    pub fn label(&self) -> Option<&str> {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
    }

    pub fn display_time(&self) -> String {
        format!("{}:{:02} {}", self.hour, self.minute, self.period)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=12).contains(&self.hour) {
            return Err(ValidationError::HourOutOfRange(self.hour));
        }
        if self.minute > 59 {
            return Err(ValidationError::MinuteOutOfRange(self.minute));
        }
        if self.audio_ref.trim().is_empty() {
            return Err(ValidationError::MissingAudio(self.id.clone()));
        }
        Ok(())
    }
}

/// Partial alarm used by the create and edit flows. Absent fields keep the
/// existing value (edit) or take the default (create).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmPatch {
    pub id: String,
    #[serde(default, alias = "hours")]
    pub hour: Option<u32>,
    #[serde(default, alias = "minutes")]
    pub minute: Option<u32>,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub days: Option<WeekdaySet>,
    #[serde(default, alias = "audioPath")]
    pub audio_ref: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AlarmPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_time(mut self, hour: u32, minute: u32, period: Period) -> Self {
        self.hour = Some(hour);
        self.minute = Some(minute);
        self.period = Some(period);
        self
    }

    pub fn with_days(mut self, days: WeekdaySet) -> Self {
        self.days = Some(days);
        self
    }

    pub fn with_audio(mut self, audio_ref: impl Into<String>) -> Self {
        self.audio_ref = Some(audio_ref.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn into_alarm(self, created_at: DateTime<Utc>) -> Alarm {
        Alarm {
            id: self.id,
            hour: self.hour.unwrap_or(DEFAULT_HOUR),
            minute: self.minute.unwrap_or(DEFAULT_MINUTE),
            period: self.period.unwrap_or_default(),
            days: self.days.unwrap_or_default(),
            audio_ref: self.audio_ref.unwrap_or_default(),
            label: self.label.filter(|label| !label.trim().is_empty()),
            is_active: self.is_active.unwrap_or(true),
            created_at: self.created_at.unwrap_or(created_at),
        }
    }

    /// Merges the patch over `alarm`. The id and creation time never change;
    /// an empty label clears it.
    pub fn apply_to(&self, alarm: &mut Alarm) {
        if let Some(hour) = self.hour {
            alarm.hour = hour;
        }
        if let Some(minute) = self.minute {
            alarm.minute = minute;
        }
        if let Some(period) = self.period {
            alarm.period = period;
        }
        if let Some(days) = self.days {
            alarm.days = days;
        }
        if let Some(audio_ref) = &self.audio_ref {
            alarm.audio_ref = audio_ref.clone();
        }
        if let Some(label) = &self.label {
            alarm.label = Some(label.clone()).filter(|label| !label.trim().is_empty());
        }
        if let Some(is_active) = self.is_active {
            alarm.is_active = is_active;
        }
    }
}

/// Accepts `7:30 PM`, `7:30pm`, `12:05 am` or 24-hour `19:30`.
pub fn parse_time_of_day(input: &str) -> Result<(u32, u32, Period), ValidationError> {
    let invalid = || ValidationError::InvalidTime(input.to_string());
    let normalized = input.trim().to_ascii_uppercase();
    let (clock, period) = if let Some(rest) = normalized.strip_suffix("AM") {
        (rest.trim(), Some(Period::Am))
    } else if let Some(rest) = normalized.strip_suffix("PM") {
        (rest.trim(), Some(Period::Pm))
    } else {
        (normalized.as_str(), None)
    };

    let (hour, minute) = clock.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.trim().parse().map_err(|_| invalid())?;
    let minute: u32 = minute.trim().parse().map_err(|_| invalid())?;
    if minute > 59 {
        return Err(ValidationError::MinuteOutOfRange(minute));
    }

    match period {
        Some(period) => {
            if !(1..=12).contains(&hour) {
                return Err(ValidationError::HourOutOfRange(hour));
            }
            Ok((hour, minute, period))
        }
        None => {
            if hour > 23 {
                return Err(invalid());
            }
            let (hour, period) = from_24_hour(hour);
            Ok((hour, minute, period))
        }
    }
}

/// Parses a persisted alarm list. Duplicate ids keep the first record.
pub fn parse_alarm_list(content: &str) -> Result<Vec<Alarm>> {
    let raw = serde_json::from_str::<Vec<Alarm>>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    let mut ids = HashSet::new();
    let mut alarms = Vec::with_capacity(raw.len());
    for alarm in raw {
        if !ids.insert(alarm.id.clone()) {
            warn!("dropping duplicate alarm id {}", alarm.id);
            continue;
        }
        alarms.push(alarm);
    }
    Ok(alarms)
}
