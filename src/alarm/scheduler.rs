use chrono::{DateTime, Datelike, Duration, Local, Timelike};
use log::{debug, error, info, warn};

use crate::alarm::model::Alarm;
use crate::alarm::payload::{AlarmPayload, snooze_identifier};
use crate::alarm::recurrence::{default_lookahead, next_occurrence};
use crate::clock::Clock;
use crate::platform::{NotificationPlatform, NotificationRequest};

pub const DEFAULT_TITLE: &str = "Alarm";
pub const NOTIFICATION_BODY: &str = "Your custom alarm is going off!";

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Minimum distance between "now" and a scheduled trigger.
    pub lookahead: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: default_lookahead(),
        }
    }
}

/// Keeps the platform's pending notifications in step with alarm records.
pub struct NotificationScheduler {
    platform: Box<dyn NotificationPlatform>,
    clock: Box<dyn Clock>,
    config: SchedulerConfig,
    permission_prompted: bool,
}

impl NotificationScheduler {
    pub fn new(
        platform: Box<dyn NotificationPlatform>,
        clock: Box<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            platform,
            clock,
            config,
            permission_prompted: false,
        }
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn next_trigger(&self, alarm: &Alarm) -> Option<DateTime<Local>> {
        next_occurrence(alarm, &self.clock.now(), self.config.lookahead)
    }

    /// (Re)arms the recurring notification for `alarm`. Returns whether a
    /// notification is now pending for it.
    pub fn schedule(&mut self, alarm: &Alarm) -> bool {
        if !self.platform.is_supported() {
            debug!("notifications unsupported, not scheduling alarm {}", alarm.id);
            return false;
        }
        // A stale trigger at the old time must go even when nothing new can
        // be armed.
        self.cancel_identifier(&alarm.id);
        if !self.ensure_permission() {
            return false;
        }
        if !alarm.is_active {
            return false;
        }

        let now = self.clock.now();
        let Some(trigger_at) = next_occurrence(alarm, &now, self.config.lookahead) else {
            debug!("alarm {} has nothing to schedule", alarm.id);
            return false;
        };
        if trigger_at <= now + self.config.lookahead {
            warn!(
                "alarm {} resolved to {} which is too close to now",
                alarm.id,
                trigger_at.to_rfc3339()
            );
            return false;
        }

        let request = NotificationRequest {
            identifier: alarm.id.clone(),
            title: alarm.label().unwrap_or(DEFAULT_TITLE).to_string(),
            body: NOTIFICATION_BODY.to_string(),
            data: AlarmPayload::for_alarm(alarm).to_value(),
            trigger_at,
            sound: true,
        };
        match self.platform.schedule(request) {
            Ok(identifier) => {
                info!(
                    "scheduled alarm {identifier} for {}",
                    format_next_trigger(Some(trigger_at))
                );
                true
            }
            Err(err) => {
                error!("failed to schedule alarm {}: {err}", alarm.id);
                false
            }
        }
    }

    /// Cancels both the recurring and the snooze notification of an alarm.
    /// Nothing pending is fine.
    pub fn cancel(&mut self, alarm_id: &str) {
        self.cancel_identifier(alarm_id);
        self.cancel_identifier(&snooze_identifier(alarm_id));
    }

    pub fn schedule_all(&mut self, alarms: &[Alarm]) -> usize {
        let mut active = 0;
        let mut armed = 0;
        for alarm in alarms.iter().filter(|alarm| alarm.is_active) {
            active += 1;
            if self.schedule(alarm) {
                armed += 1;
            }
        }
        info!("scheduled {armed} of {active} active alarms");
        armed
    }

    /// One-shot trigger at `at` for an alarm that just rang. The recurring
    /// notification keyed by the alarm id is left alone.
    pub fn schedule_snooze(&mut self, payload: &AlarmPayload, at: DateTime<Local>) -> bool {
        if !self.platform.is_supported() || !self.ensure_permission() {
            return false;
        }
        let identifier = snooze_identifier(&payload.alarm_id);
        self.cancel_identifier(&identifier);

        if at <= self.clock.now() {
            warn!("snooze for alarm {} is already in the past", payload.alarm_id);
            return false;
        }

        let request = NotificationRequest {
            identifier: identifier.clone(),
            title: payload.label.as_deref().unwrap_or(DEFAULT_TITLE).to_string(),
            body: NOTIFICATION_BODY.to_string(),
            data: payload.snoozed().to_value(),
            trigger_at: at,
            sound: true,
        };
        match self.platform.schedule(request) {
            Ok(_) => {
                info!(
                    "snoozed alarm {} until {}",
                    payload.alarm_id,
                    format_next_trigger(Some(at))
                );
                true
            }
            Err(err) => {
                error!("failed to snooze alarm {}: {err}", payload.alarm_id);
                false
            }
        }
    }

    pub fn pending(&self) -> Vec<NotificationRequest> {
        match self.platform.pending() {
            Ok(pending) => pending,
            Err(err) => {
                warn!("unable to list pending notifications: {err}");
                Vec::new()
            }
        }
    }

    fn ensure_permission(&mut self) -> bool {
        match self.platform.has_permission() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => {
                error!("unable to query notification permission: {err}");
                return false;
            }
        }
        if self.permission_prompted {
            return false;
        }
        self.permission_prompted = true;
        match self.platform.request_permission() {
            Ok(true) => true,
            Ok(false) => {
                warn!("notification permission denied; alarms will not ring");
                false
            }
            Err(err) => {
                error!("notification permission request failed: {err}");
                false
            }
        }
    }

    fn cancel_identifier(&mut self, identifier: &str) {
        if !self.platform.is_supported() {
            return;
        }
        if let Err(err) = self.platform.cancel(identifier) {
            warn!("failed to cancel notification {identifier}: {err}");
        }
    }
}

pub fn format_next_trigger(next: Option<DateTime<Local>>) -> String {
    match next {
        Some(dt) => {
            let (is_pm, hour12) = dt.hour12();
            let meridiem = if is_pm { "PM" } else { "AM" };
            format!(
                "{} {:04}-{:02}-{:02} {}:{:02} {}",
                dt.weekday(),
                dt.year(),
                dt.month(),
                dt.day(),
                hour12,
                dt.minute(),
                meridiem
            )
        }
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc, Weekday};

    use super::*;
    use crate::alarm::model::{AlarmPatch, Period, WeekdaySet};
    use crate::clock::FixedClock;
    use crate::platform::memory::MemoryPlatform;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, s)
            .single()
            .expect("unambiguous local time")
    }

    fn monday_alarm(id: &str) -> Alarm {
        AlarmPatch::new(id)
            .with_time(8, 0, Period::Am)
            .with_days(WeekdaySet::from_days(&[Weekday::Mon]))
            .with_audio(format!("/recordings/{id}.m4a"))
            .with_label("Work")
            .into_alarm(Utc::now())
    }

    fn scheduler_at(
        platform: &MemoryPlatform,
        now: DateTime<Local>,
    ) -> (NotificationScheduler, FixedClock) {
        let clock = FixedClock::new(now);
        let scheduler = NotificationScheduler::new(
            Box::new(platform.clone()),
            Box::new(clock.clone()),
            SchedulerConfig::default(),
        );
        (scheduler, clock)
    }

    #[test]
    fn schedules_next_occurrence_with_payload() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        let alarm = monday_alarm("wake");

        assert!(scheduler.schedule(&alarm));
        let request = platform.pending_request("wake").expect("pending notification");
        assert_eq!(request.trigger_at, local(2026, 1, 5, 8, 0, 0));
        assert_eq!(request.title, "Work");
        assert_eq!(request.body, NOTIFICATION_BODY);
        assert!(request.sound);
        let payload = AlarmPayload::from_value(&request.data).expect("payload");
        assert_eq!(payload, AlarmPayload::for_alarm(&alarm));
    }

    #[test]
    fn scheduling_twice_leaves_one_pending() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        let alarm = monday_alarm("wake");

        assert!(scheduler.schedule(&alarm));
        assert!(scheduler.schedule(&alarm));
        assert_eq!(platform.pending_ids(), vec!["wake".to_string()]);
    }

    #[test]
    fn past_time_schedules_next_week() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 9, 0, 0));
        assert!(scheduler.schedule(&monday_alarm("wake")));
        let request = platform.pending_request("wake").expect("pending");
        assert_eq!(request.trigger_at, local(2026, 1, 12, 8, 0, 0));
    }

    #[test]
    fn inactive_or_dayless_alarms_are_not_scheduled() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));

        let mut inactive = monday_alarm("off");
        inactive.is_active = false;
        assert!(!scheduler.schedule(&inactive));

        let mut dayless = monday_alarm("never");
        dayless.days = WeekdaySet::none();
        assert!(!scheduler.schedule(&dayless));

        assert!(platform.pending_ids().is_empty());
    }

    #[test]
    fn rescheduling_dayless_alarm_drops_stale_notification() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        let mut alarm = monday_alarm("wake");
        assert!(scheduler.schedule(&alarm));

        alarm.days = WeekdaySet::none();
        assert!(!scheduler.schedule(&alarm));
        assert!(platform.pending_ids().is_empty());
    }

    #[test]
    fn revoked_permission_still_drops_stale_notification() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        let mut alarm = monday_alarm("wake");
        assert!(scheduler.schedule(&alarm));

        platform.set_permission(false);
        alarm.hour = 9;
        assert!(!scheduler.schedule(&alarm));
        assert!(platform.pending_ids().is_empty());
    }

    #[test]
    fn unsupported_platform_is_a_no_op() {
        let platform = MemoryPlatform::unsupported();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        assert!(!scheduler.schedule(&monday_alarm("wake")));
        scheduler.cancel("wake");
        assert_eq!(platform.permission_requests(), 0);
    }

    #[test]
    fn permission_is_requested_once() {
        let platform = MemoryPlatform::without_permission(false);
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        assert!(!scheduler.schedule(&monday_alarm("a")));
        assert!(!scheduler.schedule(&monday_alarm("b")));
        assert_eq!(platform.permission_requests(), 1);
        assert!(platform.pending_ids().is_empty());
    }

    #[test]
    fn granted_permission_prompt_schedules() {
        let platform = MemoryPlatform::without_permission(true);
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        assert!(scheduler.schedule(&monday_alarm("a")));
        assert_eq!(platform.permission_requests(), 1);
    }

    #[test]
    fn platform_failure_returns_false() {
        let platform = MemoryPlatform::new();
        platform.set_fail_all(true);
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        assert!(!scheduler.schedule(&monday_alarm("wake")));
        scheduler.cancel("wake");
    }

    #[test]
    fn schedule_all_survives_single_failure() {
        let platform = MemoryPlatform::new();
        platform.fail_identifier("b");
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 7, 0, 0));
        let mut inactive = monday_alarm("d");
        inactive.is_active = false;
        let alarms = vec![
            monday_alarm("a"),
            monday_alarm("b"),
            monday_alarm("c"),
            inactive,
        ];

        assert_eq!(scheduler.schedule_all(&alarms), 2);
        assert_eq!(
            platform.pending_ids(),
            vec!["a".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn buffer_window_rolls_late_alarm_forward() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 7, 23, 58, 45));
        let alarm = AlarmPatch::new("late")
            .with_time(11, 59, Period::Pm)
            .with_days(WeekdaySet::from_days(&[Weekday::Wed]))
            .with_audio("late.m4a")
            .into_alarm(Utc::now());
        assert!(scheduler.schedule(&alarm));
        let request = platform.pending_request("late").expect("pending");
        assert_eq!(request.trigger_at, local(2026, 1, 14, 23, 59, 0));
    }

    #[test]
    fn snooze_is_separate_from_recurring_trigger() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 8, 0, 0));
        let alarm = monday_alarm("wake");
        assert!(scheduler.schedule(&alarm));

        let payload = AlarmPayload::for_alarm(&alarm);
        assert!(scheduler.schedule_snooze(&payload, local(2026, 1, 5, 8, 5, 0)));
        let snooze = platform
            .pending_request("wake:snooze")
            .expect("snooze pending");
        assert_eq!(snooze.trigger_at, local(2026, 1, 5, 8, 5, 0));
        let snooze_payload = AlarmPayload::from_value(&snooze.data).expect("payload");
        assert!(snooze_payload.snooze);
        assert_eq!(snooze_payload.alarm_id, "wake");

        // Re-arming the weekly trigger keeps the snooze.
        assert!(scheduler.schedule(&alarm));
        assert_eq!(platform.pending_count_for("wake"), 2);

        scheduler.cancel("wake");
        assert_eq!(platform.pending_count_for("wake"), 0);
    }

    #[test]
    fn snooze_in_the_past_is_refused() {
        let platform = MemoryPlatform::new();
        let (mut scheduler, _clock) = scheduler_at(&platform, local(2026, 1, 5, 8, 0, 0));
        let payload = AlarmPayload::for_alarm(&monday_alarm("wake"));
        assert!(!scheduler.schedule_snooze(&payload, local(2026, 1, 5, 7, 59, 0)));
        assert!(platform.pending_ids().is_empty());
    }

    #[test]
    fn formats_next_trigger() {
        assert_eq!(
            format_next_trigger(Some(local(2026, 1, 5, 20, 5, 0))),
            "Mon 2026-01-05 8:05 PM"
        );
        assert_eq!(format_next_trigger(None), "-");
    }
}
