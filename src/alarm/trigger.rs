use chrono::Duration;
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::alarm::payload::{AlarmPayload, ResponseAction};
use crate::alarm::scheduler::NotificationScheduler;
use crate::platform::{AudioPlayer, PlaybackOptions, SoundHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Ringing { alarm_id: String, audio_ref: String },
    Snoozed { alarm_id: String },
}

/// Reacts to delivered notifications and the user's response to them.
/// Holds at most one sound at a time.
pub struct TriggerHandler {
    audio: Box<dyn AudioPlayer>,
    state: TriggerState,
    sound: Option<SoundHandle>,
    volume: f32,
}

impl TriggerHandler {
    pub fn new(audio: Box<dyn AudioPlayer>, volume_percent: u8) -> Self {
        Self {
            audio,
            state: TriggerState::Idle,
            sound: None,
            volume: volume_fraction(volume_percent),
        }
    }

    pub fn state(&self) -> &TriggerState {
        &self.state
    }

    pub fn set_volume(&mut self, volume_percent: u8) {
        self.volume = volume_fraction(volume_percent);
    }

    pub fn on_received(&mut self, data: &Value) -> bool {
        match AlarmPayload::from_value(data) {
            Some(payload) => self.ring(&payload),
            None => {
                warn!("ignoring notification with malformed payload: {data}");
                false
            }
        }
    }

    /// Starts looping playback for `payload`. A repeated delivery for the
    /// alarm already ringing restarts its sound rather than adding a second.
    pub fn ring(&mut self, payload: &AlarmPayload) -> bool {
        if let TriggerState::Ringing { alarm_id, .. } = &self.state
            && *alarm_id == payload.alarm_id
        {
            debug!("alarm {alarm_id} delivered again while ringing, restarting");
        }
        self.release_sound();

        let options = PlaybackOptions {
            looping: true,
            volume: self.volume,
        };
        match self.audio.play(&payload.audio_ref, options) {
            Ok(sound) => {
                self.sound = Some(sound);
                self.state = TriggerState::Ringing {
                    alarm_id: payload.alarm_id.clone(),
                    audio_ref: payload.audio_ref.clone(),
                };
                info!("alarm {} ringing", payload.alarm_id);
                true
            }
            Err(err) => {
                error!(
                    "failed to play {} for alarm {}: {err}",
                    payload.audio_ref, payload.alarm_id
                );
                self.state = TriggerState::Idle;
                false
            }
        }
    }

    /// Stops the sound, then either snoozes through `scheduler` or dismisses.
    /// Snoozing never touches the alarm's weekly schedule.
    pub fn on_responded(
        &mut self,
        data: &Value,
        action: ResponseAction,
        scheduler: &mut NotificationScheduler,
        snooze_minutes: u32,
    ) -> bool {
        self.release_sound();
        let Some(payload) = AlarmPayload::from_value(data) else {
            warn!("ignoring response with malformed payload: {data}");
            self.state = TriggerState::Idle;
            return false;
        };

        match action {
            ResponseAction::Dismiss => {
                info!("alarm {} dismissed", payload.alarm_id);
                self.state = TriggerState::Idle;
                true
            }
            ResponseAction::Snooze => {
                let at = scheduler.now() + Duration::minutes(i64::from(snooze_minutes));
                if scheduler.schedule_snooze(&payload, at) {
                    self.state = TriggerState::Snoozed {
                        alarm_id: payload.alarm_id,
                    };
                    true
                } else {
                    self.state = TriggerState::Idle;
                    false
                }
            }
        }
    }

    /// Silences whatever is ringing without any rescheduling.
    pub fn stop(&mut self) {
        self.release_sound();
        self.state = TriggerState::Idle;
    }

    fn release_sound(&mut self) {
        let Some(sound) = self.sound.take() else {
            return;
        };
        if let Err(err) = self.audio.stop(sound) {
            warn!("failed to stop alarm sound: {err}");
        }
        if let Err(err) = self.audio.unload(sound) {
            warn!("failed to release alarm sound: {err}");
        }
    }
}

impl Drop for TriggerHandler {
    fn drop(&mut self) {
        self.release_sound();
    }
}

fn volume_fraction(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}
