use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use cron::Schedule;
use nudge_core::config::AnnouncerConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid calendar trigger `{expression}`: {source}")]
    InvalidExpression { expression: String, source: cron::error::Error },
    #[error("calendar trigger must name at least one weekday")]
    EmptyWeekdays,
    #[error("calendar trigger time {hour:02}:{minute:02} is out of range")]
    TimeOutOfRange { hour: u8, minute: u8 },
}

/// Calendar trigger: fire at `hour:minute` local time in `timezone`, on the
/// given weekdays. Immutable for the process lifetime once constructed.
#[derive(Clone, Debug)]
pub struct ScheduleSpec {
    weekdays: Vec<Weekday>,
    hour: u8,
    minute: u8,
    timezone: Tz,
    schedule: Schedule,
}

impl ScheduleSpec {
    pub fn new(
        weekdays: Vec<Weekday>,
        hour: u8,
        minute: u8,
        timezone: Tz,
    ) -> Result<Self, ScheduleError> {
        if weekdays.is_empty() {
            return Err(ScheduleError::EmptyWeekdays);
        }
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::TimeOutOfRange { hour, minute });
        }

        // The cron crate wants seven fields: sec min hour dom month dow year.
        let days = weekdays.iter().map(Weekday::to_string).collect::<Vec<_>>().join(",");
        let expression = format!("0 {minute} {hour} * * {days} *");
        let schedule = Schedule::from_str(&expression)
            .map_err(|source| ScheduleError::InvalidExpression { expression, source })?;

        Ok(Self { weekdays, hour, minute, timezone, schedule })
    }

    pub fn from_config(config: &AnnouncerConfig) -> Result<Self, ScheduleError> {
        Self::new(config.weekdays.clone(), config.hour, config.minute, config.timezone)
    }

    /// Next matching calendar instant strictly after `after`.
    ///
    /// Evaluation happens in the trigger's own timezone, so daylight-saving
    /// transitions shift the UTC instant while the local wall-clock time
    /// stays fixed. Pure function of its input; tests drive it with a
    /// virtual clock instead of waiting on the real one.
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule.after(&local).next().map(|instant| instant.with_timezone(&Utc))
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.weekdays.iter().map(Weekday::to_string).collect::<Vec<_>>().join(",");
        write!(f, "{days} {:02}:{:02} {}", self.hour, self.minute, self.timezone)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc, Weekday};

    use super::{ScheduleError, ScheduleSpec};

    fn shipped_spec() -> ScheduleSpec {
        ScheduleSpec::new(
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
            12,
            0,
            chrono_tz::America::New_York,
        )
        .expect("spec should build")
    }

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .expect("timestamp should be unambiguous")
    }

    #[test]
    fn fires_at_noon_new_york_on_the_next_matching_weekday() {
        // Tue Jan 9 2024, 11:00 EST -> Wed Jan 10 2024, 12:00 EST (17:00 UTC).
        let next = shipped_spec().next_occurrence(utc(2024, 1, 9, 16, 0, 0));
        assert_eq!(next, Some(utc(2024, 1, 10, 17, 0, 0)));
    }

    #[test]
    fn fires_later_the_same_day_when_noon_has_not_passed() {
        // Wed Jan 10 2024, 11:59 EST -> same day at noon.
        let next = shipped_spec().next_occurrence(utc(2024, 1, 10, 16, 59, 0));
        assert_eq!(next, Some(utc(2024, 1, 10, 17, 0, 0)));
    }

    #[test]
    fn skips_to_friday_once_wednesday_noon_has_passed() {
        // Wed Jan 10 2024, 12:00:30 EST -> Fri Jan 12 2024, 12:00 EST.
        let next = shipped_spec().next_occurrence(utc(2024, 1, 10, 17, 0, 30));
        assert_eq!(next, Some(utc(2024, 1, 12, 17, 0, 0)));
    }

    #[test]
    fn never_fires_on_thursday_noon() {
        // Thu Jan 11 2024, 12:00 EST is not a match; next is Friday noon.
        let next = shipped_spec().next_occurrence(utc(2024, 1, 11, 17, 0, 0));
        assert_eq!(next, Some(utc(2024, 1, 12, 17, 0, 0)));
    }

    #[test]
    fn skips_the_weekend_entirely() {
        // Sat Jan 13 2024, 00:00 UTC -> Mon Jan 15 2024, 12:00 EST.
        let next = shipped_spec().next_occurrence(utc(2024, 1, 13, 0, 0, 0));
        assert_eq!(next, Some(utc(2024, 1, 15, 17, 0, 0)));
    }

    #[test]
    fn daylight_saving_shifts_the_utc_instant_but_not_local_noon() {
        // Tue Jul 9 2024, EDT season -> Wed Jul 10 2024, 12:00 EDT (16:00 UTC).
        let next = shipped_spec().next_occurrence(utc(2024, 7, 9, 12, 0, 0));
        assert_eq!(next, Some(utc(2024, 7, 10, 16, 0, 0)));
    }

    #[test]
    fn minute_field_is_honoured() {
        let spec = ScheduleSpec::new(
            vec![Weekday::Wed],
            9,
            30,
            chrono_tz::America::New_York,
        )
        .expect("spec should build");

        // Wed Jan 10 2024, 09:00 EST -> 09:30 EST (14:30 UTC).
        let next = spec.next_occurrence(utc(2024, 1, 10, 14, 0, 0));
        assert_eq!(next, Some(utc(2024, 1, 10, 14, 30, 0)));
    }

    #[test]
    fn other_minutes_on_a_matching_weekday_do_not_fire() {
        // From Wed 12:01 EST the next firing is Friday, not later on Wednesday.
        let next = shipped_spec().next_occurrence(utc(2024, 1, 10, 17, 1, 0));
        assert_eq!(next, Some(utc(2024, 1, 12, 17, 0, 0)));
    }

    #[test]
    fn empty_weekdays_are_rejected() {
        let result = ScheduleSpec::new(vec![], 12, 0, chrono_tz::America::New_York);
        assert!(matches!(result, Err(ScheduleError::EmptyWeekdays)));
    }

    #[test]
    fn out_of_range_time_is_rejected() {
        let result =
            ScheduleSpec::new(vec![Weekday::Mon], 24, 0, chrono_tz::America::New_York);
        assert!(matches!(result, Err(ScheduleError::TimeOutOfRange { hour: 24, minute: 0 })));
    }

    #[test]
    fn display_names_the_trigger() {
        assert_eq!(shipped_spec().to_string(), "Mon,Wed,Fri 12:00 America/New_York");
    }
}
