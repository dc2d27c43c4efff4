//! Local timezone resolution and day windows.
//!
//! [`LocalZone`] is resolved once at startup and passed explicitly to
//! everything that needs local time. [`DayWindow`] is the half-open local
//! interval covering one calendar day, used to bound the event query.

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while resolving zones or building windows.
#[derive(Debug, Error)]
pub enum TimeError {
    /// The operating system did not report a timezone.
    #[error("could not determine the local timezone: {0}")]
    Detect(#[from] iana_time_zone::GetTimezoneError),

    /// The reported zone name is not in the timezone database.
    #[error("unknown timezone '{name}'")]
    UnknownZone { name: String },

    /// The date has no following day representable by chrono.
    #[error("date {date} is out of range")]
    OutOfRange { date: NaiveDate },
}

/// The resolved local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalZone {
    tz: Tz,
}

impl LocalZone {
    /// Wraps an already-parsed zone.
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parses an IANA zone name such as `Europe/Paris`.
    pub fn from_name(name: &str) -> Result<Self, TimeError> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| TimeError::UnknownZone {
                name: name.to_string(),
            })
    }

    /// Asks the operating system for the local zone.
    pub fn detect() -> Result<Self, TimeError> {
        let name = iana_time_zone::get_timezone()?;
        debug!(zone = %name, "detected local timezone");
        Self::from_name(&name)
    }

    /// Like [`detect`](Self::detect), but falls back to UTC with a warning.
    pub fn detect_or_utc() -> Self {
        Self::detect().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to UTC");
            Self::new(Tz::UTC)
        })
    }

    /// Returns the IANA name of the zone.
    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    /// Returns today's date in this zone.
    pub fn today(&self) -> NaiveDate {
        self.today_at(Utc::now())
    }

    /// Returns the date in this zone at the given instant.
    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Converts an instant to this zone.
    pub fn localize<Z: TimeZone>(&self, dt: &DateTime<Z>) -> DateTime<Tz> {
        dt.with_timezone(&self.tz)
    }

    /// Returns the first instant of `date` in this zone.
    ///
    /// When midnight is repeated the earlier one wins. When midnight is
    /// skipped by a DST transition the day starts at the first valid local
    /// time after it.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Tz> {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        match self.tz.from_local_datetime(&midnight) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => self.first_valid_after(midnight),
        }
    }

    fn first_valid_after(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        (1..=8)
            .map(|step| naive + Duration::minutes(15 * step))
            .find_map(|candidate| self.tz.from_local_datetime(&candidate).earliest())
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
    }
}

/// A half-open local interval `[midnight of date, midnight of next date)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWindow {
    date: NaiveDate,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
}

impl DayWindow {
    /// Builds the window for `date` in `zone`.
    pub fn for_date(date: NaiveDate, zone: &LocalZone) -> Result<Self, TimeError> {
        let next = date
            .checked_add_days(Days::new(1))
            .ok_or(TimeError::OutOfRange { date })?;

        Ok(Self {
            date,
            start: zone.start_of_day(date),
            end: zone.start_of_day(next),
        })
    }

    /// The target date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Start of the window (inclusive).
    pub fn start(&self) -> &DateTime<Tz> {
        &self.start
    }

    /// End of the window (exclusive).
    pub fn end(&self) -> &DateTime<Tz> {
        &self.end
    }

    /// Lower bound formatted for the calendar API, with the local offset.
    pub fn time_min(&self) -> String {
        self.start.to_rfc3339()
    }

    /// Upper bound formatted for the calendar API, with the local offset.
    pub fn time_max(&self) -> String {
        self.end.to_rfc3339()
    }

    /// Elapsed time between the bounds (23 or 25 hours on DST change days).
    pub fn elapsed(&self) -> Duration {
        self.end.clone().signed_duration_since(self.start.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn zone(name: &str) -> LocalZone {
        LocalZone::from_name(name).unwrap()
    }

    #[test]
    fn zone_from_name() {
        let z = zone("Europe/Paris");
        assert_eq!(z.name(), "Europe/Paris");
        assert!(LocalZone::from_name("Not/AZone").is_err());
    }

    #[test]
    fn today_uses_zone() {
        let now: DateTime<Utc> = "2025-02-05T03:00:00Z".parse().unwrap();
        assert_eq!(zone("UTC").today_at(now), date(2025, 2, 5));
        assert_eq!(zone("America/New_York").today_at(now), date(2025, 2, 4));
    }

    #[test]
    fn window_bounds_in_utc_zone() {
        let w = DayWindow::for_date(date(2025, 2, 5), &zone("UTC")).unwrap();
        assert_eq!(w.time_min(), "2025-02-05T00:00:00+00:00");
        assert_eq!(w.time_max(), "2025-02-06T00:00:00+00:00");
    }

    #[test]
    fn window_bounds_carry_local_offset() {
        let w = DayWindow::for_date(date(2025, 2, 5), &zone("America/New_York")).unwrap();
        assert_eq!(w.time_min(), "2025-02-05T00:00:00-05:00");
        assert_eq!(w.time_max(), "2025-02-06T00:00:00-05:00");
    }

    #[test]
    fn window_spans_one_local_day() {
        let zones = ["UTC", "America/New_York", "Europe/Berlin", "Asia/Kolkata", "Australia/Sydney"];
        let dates = [
            date(2024, 1, 1),
            date(2024, 2, 29),
            date(2024, 3, 10),
            date(2024, 3, 31),
            date(2024, 10, 6),
            date(2024, 11, 3),
            date(2024, 12, 31),
        ];

        for name in zones {
            let z = zone(name);
            for d in dates {
                let w = DayWindow::for_date(d, &z).unwrap();
                let wall_clock = w.end().naive_local() - w.start().naive_local();
                assert_eq!(wall_clock, Duration::hours(24), "{name} {d}");
                assert_eq!(w.start().naive_local(), d.and_time(chrono::NaiveTime::MIN));
                assert_eq!(w.date(), d);
            }
        }
    }

    #[test]
    fn dst_days_have_different_elapsed_length() {
        let z = zone("America/New_York");
        let spring = DayWindow::for_date(date(2024, 3, 10), &z).unwrap();
        let fall = DayWindow::for_date(date(2024, 11, 3), &z).unwrap();
        assert_eq!(spring.elapsed(), Duration::hours(23));
        assert_eq!(fall.elapsed(), Duration::hours(25));
    }

    #[test]
    fn skipped_midnight_starts_at_first_valid_time() {
        // Santiago moved clocks from 00:00 to 01:00 on 2024-09-08.
        let w = DayWindow::for_date(date(2024, 9, 8), &zone("America/Santiago")).unwrap();
        assert_eq!(w.start().naive_local(), date(2024, 9, 8).and_hms_opt(1, 0, 0).unwrap());
    }

    #[test]
    fn consecutive_windows_share_a_bound() {
        let z = zone("Europe/Berlin");
        let today = DayWindow::for_date(date(2024, 10, 27), &z).unwrap();
        let tomorrow = DayWindow::for_date(date(2024, 10, 28), &z).unwrap();
        assert_eq!(today.end(), tomorrow.start());
        assert_eq!(today.time_max(), tomorrow.time_min());
    }

    #[test]
    fn last_representable_date_is_out_of_range() {
        let result = DayWindow::for_date(NaiveDate::MAX, &zone("UTC"));
        assert!(matches!(result, Err(TimeError::OutOfRange { .. })));
    }
}
