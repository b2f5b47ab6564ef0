use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info, warn};

use crate::alarm::model::{Alarm, AlarmPatch, parse_alarm_list};
use crate::alarm::scheduler::NotificationScheduler;
use crate::platform::KeyValueStore;

pub const ALARMS_KEY: &str = "alarms";

/// In-memory alarm list with write-through persistence. Every mutation keeps
/// the platform's pending notifications in step through the scheduler it is
/// handed.
pub struct AlarmStore {
    storage: Box<dyn KeyValueStore>,
    alarms: Vec<Alarm>,
}

impl AlarmStore {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            alarms: Vec::new(),
        }
    }

    pub fn open(storage: Box<dyn KeyValueStore>) -> Self {
        let mut store = Self::new(storage);
        store.load();
        store
    }

    /// Reloads from storage; a read or parse failure leaves the store empty.
    pub fn load(&mut self) -> &[Alarm] {
        self.alarms = match self.read_alarms() {
            Ok(alarms) => alarms,
            Err(err) => {
                error!("failed to load alarms, starting with none: {err:#}");
                Vec::new()
            }
        };
        &self.alarms
    }

    fn read_alarms(&self) -> Result<Vec<Alarm>> {
        let Some(content) = self
            .storage
            .get(ALARMS_KEY)
            .context("unable to read stored alarms")?
        else {
            return Ok(Vec::new());
        };
        parse_alarm_list(&content)
    }

    /// Writes the full list. Failures are logged and reported as `false`.
    pub fn save(&mut self) -> bool {
        let text = match serde_json::to_string(&self.alarms) {
            Ok(text) => text,
            Err(err) => {
                error!("failed to serialize alarms: {err}");
                return false;
            }
        };
        match self.storage.set(ALARMS_KEY, &text) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to save alarms: {err}");
                false
            }
        }
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn get(&self, id: &str) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Inserts a new alarm (missing fields defaulted) or merges the patch
    /// into the existing one, then re-arms or cancels its notification.
    pub fn upsert(&mut self, patch: AlarmPatch, scheduler: &mut NotificationScheduler) -> Alarm {
        let alarm = match self.alarms.iter().position(|alarm| alarm.id == patch.id) {
            Some(index) => {
                let existing = &mut self.alarms[index];
                patch.apply_to(existing);
                let updated = existing.clone();
                if updated.is_active {
                    scheduler.schedule(&updated);
                } else {
                    scheduler.cancel(&updated.id);
                }
                info!("updated alarm {}", updated.id);
                updated
            }
            None => {
                let created = patch.into_alarm(scheduler.now().with_timezone(&Utc));
                self.alarms.push(created.clone());
                if created.is_active {
                    scheduler.schedule(&created);
                }
                info!("created alarm {}", created.id);
                created
            }
        };
        self.save();
        alarm
    }

    /// Toggle flow; unknown ids are left alone.
    pub fn set_active(
        &mut self,
        id: &str,
        is_active: bool,
        scheduler: &mut NotificationScheduler,
    ) -> Option<Alarm> {
        self.get(id)?;
        Some(self.upsert(AlarmPatch::new(id).with_active(is_active), scheduler))
    }

    /// Cancels first so no notification outlives its alarm.
    pub fn remove(&mut self, id: &str, scheduler: &mut NotificationScheduler) -> bool {
        scheduler.cancel(id);
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.id != id);
        if self.alarms.len() == before {
            warn!("no alarm {id} to delete");
            return false;
        }
        self.save();
        info!("deleted alarm {id}");
        true
    }

    pub fn clear(&mut self, scheduler: &mut NotificationScheduler) -> usize {
        for alarm in &self.alarms {
            scheduler.cancel(&alarm.id);
        }
        let cleared = self.alarms.len();
        self.alarms.clear();
        self.save();
        info!("cleared {cleared} alarms");
        cleared
    }

    pub fn export_json(&self) -> Result<String> {
        let text = serde_json::to_string_pretty(&self.alarms).context("unable to export alarms")?;
        Ok(format!("{text}\n"))
    }

    /// Bytes used by the persisted alarm list.
    pub fn storage_footprint(&self) -> usize {
        match self.storage.get(ALARMS_KEY) {
            Ok(Some(content)) => content.len(),
            Ok(None) => 0,
            Err(err) => {
                warn!("unable to measure stored alarms: {err}");
                0
            }
        }
    }

    pub fn storage(&self) -> &dyn KeyValueStore {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> &mut dyn KeyValueStore {
        self.storage.as_mut()
    }
}
