//! Daily trigger computation.
//!
//! Only the daily cron form `M H * * *` is understood. Times are UTC.
//! Triggers that were missed while the process was not running are
//! skipped; the next fire time is always in the future.

use crate::config::ScheduleSettings;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    start_date: NaiveDate,
}

impl DailySchedule {
    pub fn new(at: NaiveTime, start_date: NaiveDate) -> Self {
        Self { at, start_date }
    }

    pub fn from_settings(settings: &ScheduleSettings) -> Result<Self> {
        Self::from_cron(&settings.cron, settings.start_date)
    }

    /// Parse a daily cron expression such as `0 15 * * *`.
    pub fn from_cron(expr: &str, start_date: NaiveDate) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::Schedule(format!(
                "expected 5 cron fields, got {} in {:?}",
                fields.len(),
                expr
            )));
        }
        if fields[2..].iter().any(|field| *field != "*") {
            return Err(Error::Schedule(format!(
                "only daily schedules (M H * * *) are supported, got {:?}",
                expr
            )));
        }

        let minute = parse_field(fields[0], 59, "minute")?;
        let hour = parse_field(fields[1], 23, "hour")?;
        let at = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| Error::Schedule(format!("invalid time in {:?}", expr)))?;

        Ok(Self::new(at, start_date))
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// First trigger strictly after `now`, never earlier than the start date.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let first = self.start_date.and_time(self.at).and_utc();
        if now < first {
            return first;
        }

        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }

    /// Time to wait from `now` until the next trigger.
    pub fn wait_from(&self, now: DateTime<Utc>) -> Duration {
        (self.next_fire_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

fn parse_field(field: &str, max: u32, name: &str) -> Result<u32> {
    match field.parse::<u32>() {
        Ok(value) if value <= max => Ok(value),
        _ => Err(Error::Schedule(format!(
            "invalid {} field {:?} (expected 0-{})",
            name, field, max
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule() -> DailySchedule {
        DailySchedule::from_cron("0 15 * * *", NaiveDate::from_ymd_opt(2021, 10, 7).unwrap())
            .unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parse_daily_cron() {
        let s = schedule();
        assert_eq!(s.at(), NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        assert_eq!(s.start_date(), NaiveDate::from_ymd_opt(2021, 10, 7).unwrap());
    }

    #[test]
    fn test_reject_non_daily_cron() {
        let start = NaiveDate::from_ymd_opt(2021, 10, 7).unwrap();
        assert!(DailySchedule::from_cron("0 15 * * 1", start).is_err());
        assert!(DailySchedule::from_cron("0 15 *", start).is_err());
        assert!(DailySchedule::from_cron("61 15 * * *", start).is_err());
        assert!(DailySchedule::from_cron("0 24 * * *", start).is_err());
        assert!(DailySchedule::from_cron("*/5 15 * * *", start).is_err());
    }

    #[test]
    fn test_never_fires_before_start_date() {
        let next = schedule().next_fire_after(utc(2020, 1, 1, 0, 0));
        assert_eq!(next, utc(2021, 10, 7, 15, 0));
    }

    #[test]
    fn test_fires_later_today() {
        let next = schedule().next_fire_after(utc(2024, 3, 10, 9, 30));
        assert_eq!(next, utc(2024, 3, 10, 15, 0));
    }

    #[test]
    fn test_fires_tomorrow_once_today_has_passed() {
        let next = schedule().next_fire_after(utc(2024, 3, 10, 15, 0));
        assert_eq!(next, utc(2024, 3, 11, 15, 0));
    }

    #[test]
    fn test_missed_runs_are_not_replayed() {
        // a process started long after the start date only sees the next trigger
        let now = utc(2025, 6, 1, 16, 0);
        let next = schedule().next_fire_after(now);
        assert_eq!(next, utc(2025, 6, 2, 15, 0));
        assert_eq!(schedule().wait_from(now), Duration::from_secs(23 * 3600));
    }
}
