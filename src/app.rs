use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use log::{error, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::alarm::model::{Alarm, AlarmPatch};
use crate::alarm::payload::{AlarmPayload, ResponseAction};
use crate::alarm::scheduler::{NotificationScheduler, SchedulerConfig};
use crate::alarm::store::AlarmStore;
use crate::alarm::trigger::{TriggerHandler, TriggerState};
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::platform::{AudioPlayer, KeyValueStore, NotificationPlatform, NotificationRequest};
use crate::settings::{Settings, Theme};

/// Everything the core needs from the host platform.
pub struct Collaborators {
    pub storage: Box<dyn KeyValueStore>,
    pub platform: Box<dyn NotificationPlatform>,
    pub audio: Box<dyn AudioPlayer>,
    pub clock: Box<dyn Clock>,
}

/// Owned application state: the alarm list, the notification scheduler, the
/// ringing state machine and user settings.
pub struct AlarmApp {
    store: AlarmStore,
    scheduler: NotificationScheduler,
    trigger: TriggerHandler,
    settings: Settings,
}

impl AlarmApp {
    pub fn init(collaborators: Collaborators, config: SchedulerConfig) -> Self {
        let Collaborators {
            storage,
            platform,
            audio,
            clock,
        } = collaborators;
        let store = AlarmStore::open(storage);
        let settings = Settings::load(store.storage());
        let scheduler = NotificationScheduler::new(platform, clock, config);
        let trigger = TriggerHandler::new(audio, settings.volume_percent);
        info!("loaded {} alarms", store.len());
        Self {
            store,
            scheduler,
            trigger,
            settings,
        }
    }

    pub fn shutdown(mut self) {
        self.trigger.stop();
        info!("alarm app stopped");
    }

    pub fn alarms(&self) -> &[Alarm] {
        self.store.alarms()
    }

    pub fn alarm(&self, id: &str) -> Option<&Alarm> {
        self.store.get(id)
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn trigger_state(&self) -> &TriggerState {
        self.trigger.state()
    }

    pub fn now(&self) -> DateTime<Local> {
        self.scheduler.now()
    }

    pub fn next_trigger(&self, id: &str) -> Option<DateTime<Local>> {
        self.store
            .get(id)
            .and_then(|alarm| self.scheduler.next_trigger(alarm))
    }

    pub fn pending_notifications(&self) -> Vec<NotificationRequest> {
        self.scheduler.pending()
    }

    /// Re-arms every active alarm, e.g. after the host restarts.
    pub fn resync(&mut self) -> usize {
        self.scheduler.schedule_all(self.store.alarms())
    }

    /// Creation flow. An empty id gets a fresh UUID; the record must carry a
    /// recording and a valid time before anything is persisted.
    pub fn create_alarm(&mut self, mut patch: AlarmPatch) -> Result<Alarm, ValidationError> {
        if patch.id.trim().is_empty() {
            patch.id = Uuid::new_v4().to_string();
        }
        if patch.id.contains(':') {
            return Err(ValidationError::InvalidId(patch.id));
        }
        if self.store.get(&patch.id).is_some() {
            return Err(ValidationError::DuplicateId(patch.id));
        }
        patch
            .clone()
            .into_alarm(self.scheduler.now().with_timezone(&Utc))
            .validate()?;
        Ok(self.store.upsert(patch, &mut self.scheduler))
    }

    pub fn edit_alarm(&mut self, patch: AlarmPatch) -> Result<Alarm, ValidationError> {
        let mut merged = self
            .store
            .get(&patch.id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownAlarm(patch.id.clone()))?;
        patch.apply_to(&mut merged);
        merged.validate()?;
        Ok(self.store.upsert(patch, &mut self.scheduler))
    }

    pub fn toggle_alarm(&mut self, id: &str, is_active: bool) -> Result<Alarm, ValidationError> {
        self.store
            .set_active(id, is_active, &mut self.scheduler)
            .ok_or_else(|| ValidationError::UnknownAlarm(id.to_string()))
    }

    pub fn delete_alarm(&mut self, id: &str) -> bool {
        self.store.remove(id, &mut self.scheduler)
    }

    pub fn clear_alarms(&mut self) -> usize {
        self.store.clear(&mut self.scheduler)
    }

    pub fn export_json(&self) -> Result<String> {
        self.store.export_json()
    }

    pub fn storage_footprint(&self) -> usize {
        self.store.storage_footprint()
    }

    /// Platform callback for a delivered notification. A recurring delivery
    /// also arms the alarm's following occurrence, since platform date
    /// triggers fire once.
    pub fn on_notification_received(&mut self, data: &Value) -> bool {
        let ringing = self.trigger.on_received(data);
        if let Some(payload) = AlarmPayload::from_value(data)
            && !payload.snooze
            && let Some(alarm) = self.store.get(&payload.alarm_id)
            && alarm.is_active
        {
            self.scheduler.schedule(alarm);
        }
        ringing
    }

    /// A snooze for an alarm deleted while it was ringing only silences it.
    pub fn on_notification_responded(&mut self, data: &Value, action_id: &str) -> bool {
        let action = ResponseAction::from_action_id(action_id);
        if action == ResponseAction::Snooze
            && let Some(payload) = AlarmPayload::from_value(data)
            && self.store.get(&payload.alarm_id).is_none()
        {
            warn!("alarm {} no longer exists, not snoozing", payload.alarm_id);
            self.trigger.stop();
            return false;
        }
        self.trigger.on_responded(
            data,
            action,
            &mut self.scheduler,
            self.settings.snooze_minutes,
        )
    }

    /// Response to an alarm identified only by id, looked up in the store.
    pub fn respond_to_alarm(
        &mut self,
        id: &str,
        action: ResponseAction,
    ) -> Result<bool, ValidationError> {
        let payload = self
            .store
            .get(id)
            .map(AlarmPayload::for_alarm)
            .ok_or_else(|| ValidationError::UnknownAlarm(id.to_string()))?;
        Ok(self.on_notification_responded(&payload.to_value(), action.action_id()))
    }

    pub fn set_snooze_minutes(&mut self, minutes: u32) -> Result<(), ValidationError> {
        if minutes == 0 {
            return Err(ValidationError::InvalidSnooze);
        }
        self.settings.snooze_minutes = minutes;
        self.persist_settings();
        Ok(())
    }

    pub fn set_volume(&mut self, percent: u8) {
        let percent = percent.min(100);
        if percent != self.settings.volume_percent {
            info!(
                "alarm volume changed from {}% to {percent}%",
                self.settings.volume_percent
            );
        }
        self.settings.volume_percent = percent;
        self.trigger.set_volume(percent);
        self.persist_settings();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.settings.theme = theme;
        self.persist_settings();
    }

    fn persist_settings(&mut self) {
        if let Err(err) = self.settings.save(self.store.storage_mut()) {
            error!("failed to save settings: {err}");
        }
    }
}
