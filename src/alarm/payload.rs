use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::alarm::model::Alarm;

pub const SNOOZE_ACTION: &str = "SNOOZE";
pub const DISMISS_ACTION: &str = "DISMISS";

const SNOOZE_SUFFIX: &str = ":snooze";

/// Notification identifier of an alarm's one-shot snooze trigger, kept apart
/// from the recurring trigger keyed by the bare alarm id.
pub fn snooze_identifier(alarm_id: &str) -> String {
    format!("{alarm_id}{SNOOZE_SUFFIX}")
}

/// The data carried by every alarm notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmPayload {
    pub alarm_id: String,
    pub audio_ref: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub snooze: bool,
}

impl AlarmPayload {
    pub fn for_alarm(alarm: &Alarm) -> Self {
        Self {
            alarm_id: alarm.id.clone(),
            audio_ref: alarm.audio_ref.clone(),
            label: alarm.label().map(str::to_string),
            snooze: false,
        }
    }

    pub fn snoozed(&self) -> Self {
        Self {
            snooze: true,
            ..self.clone()
        }
    }

    /// Validates untrusted notification data. Anything that is not an object
    /// with non-empty `alarmId` and `audioRef` strings is rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        let payload = match Self::deserialize(value) {
            Ok(payload) => payload,
            Err(err) => {
                debug!("rejecting notification payload: {err}");
                return None;
            }
        };
        if payload.alarm_id.trim().is_empty() || payload.audio_ref.trim().is_empty() {
            return None;
        }
        Some(payload)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "alarmId": self.alarm_id,
            "audioRef": self.audio_ref,
            "label": self.label,
            "snooze": self.snooze,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    Snooze,
    Dismiss,
}

impl ResponseAction {
    /// Anything other than `SNOOZE` (including a plain tap on the
    /// notification) dismisses.
    pub fn from_action_id(action_id: &str) -> Self {
        if action_id.trim().eq_ignore_ascii_case(SNOOZE_ACTION) {
            ResponseAction::Snooze
        } else {
            ResponseAction::Dismiss
        }
    }

    pub fn action_id(self) -> &'static str {
        match self {
            ResponseAction::Snooze => SNOOZE_ACTION,
            ResponseAction::Dismiss => DISMISS_ACTION,
        }
    }
}
