//! CF calendars, time units and normalization to Gregorian date-times
//!
//! Climate model output frequently uses calendars other than the Gregorian
//! one, most commonly the fixed 365-day `noleap` calendar. Offsets stored in a
//! time coordinate are decoded with the arithmetic of their own calendar into
//! [`CalendarDateTime`] values. [`normalize`] converts those into
//! [`NaiveDateTime`]s where a real date exists, while
//! [`CalendarDateTime::elapsed`] places every value on its calendar's own time
//! line so `360_day` and `all_leap` series order and split without a Gregorian
//! counterpart.

use crate::attributes::{text_attr, Attributes};
use crate::errors::{Result, SplitVarError};
use chrono::format::{Item, Numeric, Pad, StrftimeItems};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use log::debug;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

const SECONDS_PER_DAY: i64 = 86_400;
/// Offsets beyond about 31 million years cannot be real time values
const MAX_OFFSET_SECONDS: f64 = 1e15;
const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Calendars understood by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Calendar {
    /// `standard` / `gregorian`, treated as proleptic Gregorian
    Standard,
    ProlepticGregorian,
    /// `noleap` / `365_day`
    NoLeap,
    /// `all_leap` / `366_day`
    AllLeap,
    /// `360_day`: twelve 30-day months
    Day360,
}

impl Calendar {
    /// Canonical CF name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ProlepticGregorian => "proleptic_gregorian",
            Self::NoLeap => "noleap",
            Self::AllLeap => "all_leap",
            Self::Day360 => "360_day",
        }
    }

    /// Whether dates of this calendar are already Gregorian dates
    #[must_use]
    pub const fn is_gregorian(self) -> bool {
        matches!(self, Self::Standard | Self::ProlepticGregorian)
    }

    /// Read the `calendar` attribute, defaulting to `standard` when absent
    pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
        match text_attr(attrs, "calendar") {
            Some(name) => name.parse(),
            None => Ok(Self::Standard),
        }
    }

    fn is_leap(self, year: i32) -> bool {
        match self {
            Self::Standard | Self::ProlepticGregorian => {
                (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
            }
            Self::AllLeap => true,
            Self::NoLeap | Self::Day360 => false,
        }
    }

    /// Number of days in `month` (1-based) of `year`
    #[must_use]
    pub fn days_in_month(self, year: i32, month: u32) -> u32 {
        if self == Self::Day360 {
            return 30;
        }
        if month == 2 && self.is_leap(year) {
            29
        } else {
            MONTH_LENGTHS[(month as usize).saturating_sub(1).min(11)]
        }
    }

    /// Year length for the fixed-length calendars
    fn fixed_year_length(self) -> Option<i64> {
        match self {
            Self::NoLeap => Some(365),
            Self::AllLeap => Some(366),
            Self::Day360 => Some(360),
            Self::Standard | Self::ProlepticGregorian => None,
        }
    }

    /// Days since 0000-01-01 for a fixed-length calendar
    fn days_from_civil(self, year: i32, month: u32, day: u32, year_length: i64) -> i64 {
        let before_month: u32 = (1..month).map(|m| self.days_in_month(year, m)).sum();
        i64::from(year) * year_length + i64::from(before_month) + i64::from(day) - 1
    }

    /// Inverse of [`Calendar::days_from_civil`]
    fn civil_from_days(self, days: i64, year_length: i64) -> (i32, u32, u32) {
        let year = days.div_euclid(year_length) as i32;
        let mut remaining = days.rem_euclid(year_length) as u32;
        let mut month = 1;
        while month < 12 && remaining >= self.days_in_month(year, month) {
            remaining -= self.days_in_month(year, month);
            month += 1;
        }
        (year, month, remaining + 1)
    }
}

impl FromStr for Calendar {
    type Err = SplitVarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Self::Standard),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            "noleap" | "365_day" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            _ => Err(SplitVarError::UnsupportedCalendar(s.to_string())),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A broken-down date-time in a specific calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDateTime {
    pub calendar: Calendar,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanosecond: u32,
}

impl CalendarDateTime {
    /// Build a date-time, checking the date exists in `calendar`
    pub fn new(
        calendar: Calendar,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self> {
        let value = Self {
            calendar,
            year,
            month,
            day,
            hour,
            minute,
            second,
            nanosecond: 0,
        };
        let valid = (1..=12).contains(&month)
            && day >= 1
            && day <= calendar.days_in_month(year, month)
            && hour < 24
            && minute < 60
            && second < 60;
        if valid {
            Ok(value)
        } else {
            Err(value.invalid())
        }
    }

    /// Wrap a Gregorian date-time
    #[must_use]
    pub fn from_naive(calendar: Calendar, value: NaiveDateTime) -> Self {
        Self {
            calendar,
            year: value.year(),
            month: value.month(),
            day: value.day(),
            hour: value.hour(),
            minute: value.minute(),
            second: value.second(),
            nanosecond: value.nanosecond(),
        }
    }

    /// The Gregorian date-time with the same components.
    ///
    /// Every `noleap` date exists in the Gregorian calendar; `all_leap` and
    /// `360_day` dates such as February 30 do not and are rejected.
    pub fn to_real_datetime(&self) -> Result<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|d| d.and_hms_nano_opt(self.hour, self.minute, self.second, self.nanosecond))
            .ok_or_else(|| self.invalid())
    }

    /// Format with a strftime pattern.
    ///
    /// Dates without a Gregorian counterpart keep their own numeric fields,
    /// so 360-day February 30 renders as `02-30`.
    pub fn format(&self, pattern: &str) -> Result<String> {
        validate_time_format(pattern)?;
        match self.to_real_datetime() {
            Ok(real) => Ok(real.format(pattern).to_string()),
            Err(_) => Ok(self.format_native(pattern)),
        }
    }

    fn format_native(&self, pattern: &str) -> String {
        // Week days and month names come from the nearest real date
        let proxy_day = self.day.min(Calendar::Standard.days_in_month(self.year, self.month));
        let proxy = NaiveDate::from_ymd_opt(self.year, self.month, proxy_day)
            .and_then(|d| d.and_hms_nano_opt(self.hour, self.minute, self.second, self.nanosecond));

        let mut out = String::new();
        for item in StrftimeItems::new(pattern) {
            let field = match &item {
                Item::Literal(text) | Item::Space(text) => Some((*text).to_string()),
                Item::Numeric(numeric, pad) => self.numeric_field(numeric).map(|(value, width)| pad_field(value, width, *pad)),
                _ => None,
            };
            match (field, &proxy) {
                (Some(text), _) => out.push_str(&text),
                (None, Some(proxy)) => out.push_str(&proxy.format_with_items(std::iter::once(item)).to_string()),
                (None, None) => {}
            }
        }
        out
    }

    fn numeric_field(&self, numeric: &Numeric) -> Option<(i64, usize)> {
        let field = match numeric {
            Numeric::Year => (i64::from(self.year), 4),
            Numeric::YearDiv100 => (i64::from(self.year).div_euclid(100), 2),
            Numeric::YearMod100 => (i64::from(self.year).rem_euclid(100), 2),
            Numeric::Month => (i64::from(self.month), 2),
            Numeric::Day => (i64::from(self.day), 2),
            Numeric::Ordinal => (i64::from(self.day_of_year()), 3),
            Numeric::Hour => (i64::from(self.hour), 2),
            Numeric::Minute => (i64::from(self.minute), 2),
            Numeric::Second => (i64::from(self.second), 2),
            _ => return None,
        };
        Some(field)
    }

    /// 1-based day of the year in this value's calendar
    #[must_use]
    pub fn day_of_year(&self) -> u32 {
        (1..self.month)
            .map(|m| self.calendar.days_in_month(self.year, m))
            .sum::<u32>()
            + self.day
    }

    /// Midnight of the same day
    #[must_use]
    pub fn start_of_day(&self) -> Self {
        Self {
            hour: 0,
            minute: 0,
            second: 0,
            nanosecond: 0,
            ..*self
        }
    }

    /// Position on the calendar's own time line.
    ///
    /// Gregorian and `noleap` values sit on the real time line, so a noleap
    /// series keeps the gap where February 29 would be. `all_leap` and
    /// `360_day` values count the days of their own calendar. Only differences
    /// between values of one calendar are meaningful.
    pub fn elapsed(&self) -> Result<Duration> {
        if self.year < NaiveDate::MIN.year() || self.year > NaiveDate::MAX.year() {
            return Err(self.invalid());
        }
        let seconds = match (self.calendar, self.calendar.fixed_year_length()) {
            (Calendar::AllLeap | Calendar::Day360, Some(year_length)) => {
                let days = self.calendar.days_from_civil(self.year, self.month, self.day, year_length);
                days * SECONDS_PER_DAY + self.seconds_of_day()
            }
            _ => self.to_real_datetime()?.and_utc().timestamp(),
        };
        Duration::try_seconds(seconds)
            .map(|whole| whole + Duration::nanoseconds(i64::from(self.nanosecond)))
            .ok_or_else(|| self.invalid())
    }

    fn seconds_of_day(&self) -> i64 {
        i64::from(self.hour) * 3600 + i64::from(self.minute) * 60 + i64::from(self.second)
    }

    fn invalid(&self) -> SplitVarError {
        SplitVarError::InvalidDate {
            date: self.to_string(),
            calendar: self.calendar.to_string(),
        }
    }
}

impl fmt::Display for CalendarDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Unit of a CF time offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Parse a unit name such as `days`, `hour` or `s`
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "microseconds" | "microsecond" | "us" => Some(Self::Microseconds),
            "milliseconds" | "millisecond" | "ms" => Some(Self::Milliseconds),
            "seconds" | "second" | "secs" | "sec" | "s" => Some(Self::Seconds),
            "minutes" | "minute" | "mins" | "min" => Some(Self::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(Self::Hours),
            "days" | "day" | "d" => Some(Self::Days),
            _ => None,
        }
    }

    /// Length of one unit in seconds
    #[must_use]
    pub fn seconds(self) -> f64 {
        match self {
            Self::Microseconds => 1e-6,
            Self::Milliseconds => 1e-3,
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
            Self::Days => 86_400.0,
        }
    }
}

fn epoch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(-?\d{1,4})-(\d{1,2})-(\d{1,2})(?:[ T]+(\d{1,2}):(\d{1,2})(?::(\d{1,2})(?:\.\d*)?)?)?",
        )
        .expect("epoch pattern is valid")
    })
}

/// Parsed `<unit> since <epoch>` time units
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub epoch: CalendarDateTime,
    raw: String,
}

impl TimeUnits {
    /// Parse CF time units in the given calendar
    pub fn parse(units: &str, calendar: Calendar) -> Result<Self> {
        let invalid = |reason: &str| SplitVarError::InvalidTimeUnits {
            units: units.to_string(),
            reason: reason.to_string(),
        };

        let (unit_name, epoch_text) = units
            .split_once(" since ")
            .ok_or_else(|| invalid("expected '<unit> since <date>'"))?;
        let unit = TimeUnit::parse(unit_name).ok_or_else(|| invalid("unknown time unit"))?;

        let caps = epoch_pattern()
            .captures(epoch_text.trim())
            .ok_or_else(|| invalid("unparseable reference date"))?;
        let field = |i: usize| -> u32 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };
        let year: i32 = caps[1].parse().map_err(|_| invalid("bad year"))?;
        let epoch = CalendarDateTime::new(
            calendar,
            year,
            field(2),
            field(3),
            field(4),
            field(5),
            field(6),
        )?;

        Ok(Self {
            unit,
            epoch,
            raw: units.to_string(),
        })
    }

    /// The units string as written in the file
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decode one numeric offset into a date-time of the epoch's calendar
    pub fn decode(&self, offset: f64) -> Result<CalendarDateTime> {
        let calendar = self.epoch.calendar;
        if !offset.is_finite() {
            return Err(SplitVarError::InvalidDate {
                date: offset.to_string(),
                calendar: calendar.to_string(),
            });
        }

        let out_of_range = || SplitVarError::InvalidDate {
            date: format!("{} + {offset} {:?}", self.epoch, self.unit),
            calendar: calendar.to_string(),
        };
        let total = offset * self.unit.seconds();
        if total.abs() > MAX_OFFSET_SECONDS {
            return Err(out_of_range());
        }
        let mut whole = total.floor() as i64;
        let mut nanos = ((total - total.floor()) * 1e9).round() as i64;
        if nanos >= 1_000_000_000 {
            whole += 1;
            nanos -= 1_000_000_000;
        }

        match calendar.fixed_year_length() {
            None => {
                let epoch = self.epoch.to_real_datetime()?;
                let value = Duration::try_seconds(whole)
                    .and_then(|delta| epoch.checked_add_signed(delta))
                    .and_then(|t| t.checked_add_signed(Duration::nanoseconds(nanos)))
                    .ok_or_else(out_of_range)?;
                Ok(CalendarDateTime::from_naive(calendar, value))
            }
            Some(year_length) => {
                let epoch_days =
                    calendar.days_from_civil(self.epoch.year, self.epoch.month, self.epoch.day, year_length);
                let seconds = epoch_days
                    .checked_mul(SECONDS_PER_DAY)
                    .and_then(|s| s.checked_add(self.epoch.seconds_of_day()))
                    .and_then(|s| s.checked_add(whole))
                    .ok_or_else(out_of_range)?;
                let (year, month, day) =
                    calendar.civil_from_days(seconds.div_euclid(SECONDS_PER_DAY), year_length);
                let of_day = seconds.rem_euclid(SECONDS_PER_DAY);
                Ok(CalendarDateTime {
                    calendar,
                    year,
                    month,
                    day,
                    hour: (of_day / 3600) as u32,
                    minute: (of_day % 3600 / 60) as u32,
                    second: (of_day % 60) as u32,
                    nanosecond: nanos as u32,
                })
            }
        }
    }
}

/// Convert calendar date-times into Gregorian date-times.
///
/// The calendar of the first value decides whether a conversion is needed.
/// Values are never coerced implicitly: non-Gregorian dates are rebuilt
/// component by component and rejected when no Gregorian date matches.
pub fn normalize(values: &[CalendarDateTime]) -> Result<Vec<NaiveDateTime>> {
    let Some(first) = values.first() else {
        return Ok(Vec::new());
    };
    if !first.calendar.is_gregorian() {
        debug!(
            "Converting {} {} time values to Gregorian date-times",
            values.len(),
            first.calendar
        );
    }
    values.iter().map(CalendarDateTime::to_real_datetime).collect()
}

/// Decoded time coordinate of a dataset
#[derive(Debug, Clone)]
pub struct TimeAxis {
    /// Name of the time dimension and its coordinate variable
    pub dim: String,
    pub units: TimeUnits,
    pub calendar: Calendar,
    pub values: Vec<CalendarDateTime>,
}

impl TimeAxis {
    /// Decode raw offsets using the `units` and `calendar` attributes
    pub fn decode(dim: &str, offsets: &[f64], attrs: &Attributes) -> Result<Self> {
        let calendar = Calendar::from_attributes(attrs)?;
        let units_text = text_attr(attrs, "units").ok_or(SplitVarError::NoTimeCoordinate)?;
        let units = TimeUnits::parse(units_text, calendar)?;
        let values = offsets
            .iter()
            .map(|&offset| units.decode(offset))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            dim: dim.to_string(),
            units,
            calendar,
            values,
        })
    }

    /// Number of time steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Gregorian view of the axis
    pub fn normalized(&self) -> Result<Vec<NaiveDateTime>> {
        normalize(&self.values)
    }
}

fn pad_field(value: i64, width: usize, pad: Pad) -> String {
    match pad {
        Pad::Zero => format!("{value:0width$}"),
        Pad::Space => format!("{value:width$}"),
        Pad::None => value.to_string(),
    }
}

/// Render an interval the way the command line reports data frequencies,
/// e.g. `1 days 00:00:00`
#[must_use]
pub fn format_interval(interval: &Duration) -> String {
    let total = interval.num_seconds();
    let days = total.div_euclid(SECONDS_PER_DAY);
    let rest = total.rem_euclid(SECONDS_PER_DAY);
    format!(
        "{days} days {:02}:{:02}:{:02}",
        rest / 3600,
        rest % 3600 / 60,
        rest % 60
    )
}

/// Check a strftime pattern before it is used for file names
pub fn validate_time_format(pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(SplitVarError::InvalidTimeFormat(pattern.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noleap_days_skip_february_29() {
        let units = TimeUnits::parse("days since 2000-02-27", Calendar::NoLeap).unwrap();
        let next = units.decode(2.0).unwrap();
        assert_eq!((next.year, next.month, next.day), (2000, 3, 1));
    }

    #[test]
    fn noleap_year_is_365_days() {
        let units = TimeUnits::parse("days since 1678-01-01 00:00:00", Calendar::NoLeap).unwrap();
        let t = units.decode(365.0 * 322.0 + 0.5).unwrap();
        assert_eq!((t.year, t.month, t.day, t.hour), (2000, 1, 1, 12));
    }

    #[test]
    fn standard_calendar_uses_gregorian_arithmetic() {
        let units = TimeUnits::parse("hours since 2000-02-28T00:00:00Z", Calendar::Standard).unwrap();
        let t = units.decode(24.0).unwrap();
        assert_eq!((t.month, t.day), (2, 29));
    }

    #[test]
    fn negative_offsets_count_backwards() {
        let units = TimeUnits::parse("days since 2001-01-01", Calendar::Day360).unwrap();
        let t = units.decode(-1.0).unwrap();
        assert_eq!((t.year, t.month, t.day), (2000, 12, 30));
    }

    #[test]
    fn huge_offsets_are_rejected() {
        // Default netCDF fill value for doubles
        let fill = 9.969_209_968_386_869e36;
        for calendar in [Calendar::Standard, Calendar::NoLeap, Calendar::Day360] {
            let units = TimeUnits::parse("seconds since 1970-01-01", calendar).unwrap();
            assert!(matches!(units.decode(fill), Err(SplitVarError::InvalidDate { .. })));
            assert!(matches!(units.decode(-fill), Err(SplitVarError::InvalidDate { .. })));
        }
        let days = TimeUnits::parse("days since 2000-01-01", Calendar::NoLeap).unwrap();
        assert!(days.decode(1e13).is_err());
        assert!(days.decode(365.0 * 1000.0).is_ok());
    }

    #[test]
    fn day360_dates_have_their_own_time_line() {
        let feb30 = CalendarDateTime::new(Calendar::Day360, 2000, 2, 30, 0, 0, 0).unwrap();
        let mar1 = CalendarDateTime::new(Calendar::Day360, 2000, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(mar1.elapsed().unwrap() - feb30.elapsed().unwrap(), Duration::days(1));
        assert_eq!(feb30.day_of_year(), 60);
        assert_eq!(feb30.format("%Y-%m-%d %j").unwrap(), "2000-02-30 060");
        assert_eq!(feb30.format("%Y%m").unwrap(), "200002");
    }

    #[test]
    fn noleap_dates_sit_on_the_real_time_line() {
        let feb28 = CalendarDateTime::new(Calendar::NoLeap, 2000, 2, 28, 0, 0, 0).unwrap();
        let mar1 = CalendarDateTime::new(Calendar::NoLeap, 2000, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(mar1.elapsed().unwrap() - feb28.elapsed().unwrap(), Duration::days(2));
    }

    #[test]
    fn interval_rendering() {
        assert_eq!(format_interval(&Duration::days(1)), "1 days 00:00:00");
        assert_eq!(format_interval(&Duration::hours(6)), "0 days 06:00:00");
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(TimeUnits::parse("fortnights since 2000-01-01", Calendar::Standard).is_err());
        assert!(TimeUnits::parse("days", Calendar::Standard).is_err());
        assert!("julian".parse::<Calendar>().is_err());
    }
}
