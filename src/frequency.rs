//! Partition frequencies
//!
//! Frequencies use the familiar offset aliases of climate tooling: an optional
//! multiplier followed by a unit, e.g. `5D`, `6H`, `1MS` or `12MS`.
//! `time.year` is accepted as a synonym for `AS` (one file per calendar year).

use crate::calendar::CalendarDateTime;
use crate::errors::{Result, SplitVarError};
use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Unit of a partition frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Second,
    Minute,
    Hour,
    Day,
    /// Calendar months labelled by their first day (`MS`)
    MonthStart,
    /// Calendar months labelled by their last day (`M`, `ME`)
    MonthEnd,
    /// Calendar years labelled by January 1 (`AS`, `YS`)
    YearStart,
    /// Calendar years labelled by December 31 (`A`, `Y`, `YE`)
    YearEnd,
}

impl PeriodUnit {
    fn parse(alias: &str) -> Option<Self> {
        match alias {
            "S" | "s" => Some(Self::Second),
            "T" | "min" => Some(Self::Minute),
            "H" | "h" => Some(Self::Hour),
            "D" | "d" => Some(Self::Day),
            "MS" => Some(Self::MonthStart),
            "M" | "ME" => Some(Self::MonthEnd),
            "AS" | "YS" => Some(Self::YearStart),
            "A" | "Y" | "YE" => Some(Self::YearEnd),
            _ => None,
        }
    }

    fn fixed_seconds(self) -> Option<i64> {
        match self {
            Self::Second => Some(1),
            Self::Minute => Some(60),
            Self::Hour => Some(3600),
            Self::Day => Some(86_400),
            Self::MonthStart | Self::MonthEnd | Self::YearStart | Self::YearEnd => None,
        }
    }
}

/// A partition or resampling frequency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frequency {
    count: u32,
    unit: PeriodUnit,
    alias: String,
}

fn alias_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d*)([A-Za-z]+)$").expect("alias pattern is valid"))
}

impl Frequency {
    /// Build a frequency from its parts
    #[must_use]
    pub fn new(count: u32, unit: PeriodUnit) -> Self {
        let suffix = match unit {
            PeriodUnit::Second => "S",
            PeriodUnit::Minute => "T",
            PeriodUnit::Hour => "H",
            PeriodUnit::Day => "D",
            PeriodUnit::MonthStart => "MS",
            PeriodUnit::MonthEnd => "M",
            PeriodUnit::YearStart => "AS",
            PeriodUnit::YearEnd => "A",
        };
        Self {
            count: count.max(1),
            unit,
            alias: format!("{}{suffix}", count.max(1)),
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn unit(&self) -> PeriodUnit {
        self.unit
    }

    /// The alias the frequency was parsed from
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Length of the first period of this frequency starting in 1970.
    ///
    /// Month and year lengths are ambiguous, so they are measured from a fixed
    /// reference in a non-leap year: `1MS` is January (31 days), `1M` runs from
    /// January 31 to February 28 (28 days), and `1AS` and `1A` are 365 days.
    /// Multipliers too large for a calendar date are an `InvalidFrequency`.
    pub fn nominal_duration(&self) -> Result<Duration> {
        let invalid = || SplitVarError::InvalidFrequency(self.alias.clone());
        let count = i32::try_from(self.count).map_err(|_| invalid())?;
        let span = |start: NaiveDate, end: Option<NaiveDate>| {
            end.map(|end| end.signed_duration_since(start))
                .ok_or_else(invalid)
        };

        match self.unit {
            PeriodUnit::MonthStart => {
                let end = add_months(1970, 1, count).and_then(|(year, month)| NaiveDate::from_ymd_opt(year, month, 1));
                span(ymd(1970, 1, 1), end)
            }
            PeriodUnit::MonthEnd => {
                let end = add_months(1970, 1, count).and_then(|(year, month)| month_end(year, month));
                span(ymd(1970, 1, 31), end)
            }
            PeriodUnit::YearStart => span(
                ymd(1970, 1, 1),
                1970_i32.checked_add(count).and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
            ),
            PeriodUnit::YearEnd => span(
                ymd(1970, 12, 31),
                1970_i32.checked_add(count).and_then(|year| NaiveDate::from_ymd_opt(year, 12, 31)),
            ),
            fixed => i64::from(self.count)
                .checked_mul(fixed.fixed_seconds().unwrap_or(0))
                .and_then(Duration::try_seconds)
                .ok_or_else(invalid),
        }
    }

    /// Index of the period containing `t`, for periods anchored at `origin`.
    ///
    /// Sub-daily and daily periods start at midnight of the origin's day,
    /// monthly periods at the origin's month and yearly periods at the
    /// origin's year. Months and years are those of the values' own calendar.
    pub fn period_key(&self, origin: &CalendarDateTime, t: &CalendarDateTime) -> Result<i64> {
        let count = i64::from(self.count);
        let years = i64::from(t.year) - i64::from(origin.year);
        match self.unit {
            PeriodUnit::MonthStart | PeriodUnit::MonthEnd => {
                let months = years * 12 + i64::from(t.month) - i64::from(origin.month);
                Ok(months.div_euclid(count))
            }
            PeriodUnit::YearStart | PeriodUnit::YearEnd => Ok(years.div_euclid(count)),
            fixed => {
                let step = count * fixed.fixed_seconds().unwrap_or(1);
                let since = t.elapsed()? - origin.start_of_day().elapsed()?;
                Ok(since.num_seconds().div_euclid(step))
            }
        }
    }
}

impl FromStr for Frequency {
    type Err = SplitVarError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed == "time.year" {
            return Ok(Self {
                count: 1,
                unit: PeriodUnit::YearStart,
                alias: trimmed.to_string(),
            });
        }

        let invalid = || SplitVarError::InvalidFrequency(s.to_string());
        let caps = alias_pattern().captures(trimmed).ok_or_else(invalid)?;
        let count = match caps.get(1).map(|m| m.as_str()) {
            None | Some("") => 1,
            Some(digits) => digits.parse::<u32>().map_err(|_| invalid())?,
        };
        if count == 0 {
            return Err(invalid());
        }
        let unit = PeriodUnit::parse(&caps[2]).ok_or_else(invalid)?;

        let frequency = Self {
            count,
            unit,
            alias: trimmed.to_string(),
        };
        frequency.nominal_duration()?;
        Ok(frequency)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

fn add_months(year: i32, month: u32, months: i32) -> Option<(i32, u32)> {
    let zero_based = year
        .checked_mul(12)?
        .checked_add(month as i32 - 1)?
        .checked_add(months)?;
    Some((zero_based.div_euclid(12), zero_based.rem_euclid(12) as u32 + 1))
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = add_months(year, month, 1)?;
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}
