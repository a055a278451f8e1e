//! TIMEX date expressions and the definite/ambiguous policy.
//!
//! A TIMEX token is the micro-format recognizers emit for date mentions:
//! `2024-07-01`, `XXXX-07-01` (no year), `XXXX-WXX-5` (a Friday, no anchor),
//! `(2024-07-01,2024-07-05,P4D)` (a range). Only tokens that pin down a
//! calendar date, or a range whose both ends are calendar dates, are definite.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Format of every resolved `startDate` / `endDate`.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

static DATE_TIMEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}|XXXX)-(\d{2}|XX)-(\d{2}|XX)$").unwrap());
static WEEKDAY_TIMEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}|XXXX)-W(\d{2}|XX)-([1-7])$").unwrap());
static WEEK_TIMEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4}|XXXX)-W(\d{2})$").unwrap());
static MONTH_TIMEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4}|XXXX)-(\d{2})$").unwrap());
static YEAR_TIMEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").unwrap());
static RANGE_TIMEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(([^,()]+),([^,()]+),(P[0-9A-Z.]+)\)$").unwrap());

/// A date mention after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DateExpression {
    Date { value: String },
    #[serde(rename = "daterange")]
    DateRange { start: String, end: String },
    Ambiguous { raw: String },
}

impl DateExpression {
    pub fn date(value: impl Into<String>) -> Self {
        DateExpression::Date {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimexType {
    Present,
    Definite,
    Date,
    DateRange,
}

/// Parsed components of a TIMEX token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimexProperty {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day_of_month: Option<u32>,
    pub day_of_week: Option<u32>,
    pub week_of_year: Option<u32>,
    pub present: bool,
    range: Option<(Box<TimexProperty>, Box<TimexProperty>)>,
}

/// `XXXX`/`XX` placeholders parse to `None`.
fn component<T: std::str::FromStr>(raw: &str) -> Option<T> {
    if raw.starts_with('X') {
        None
    } else {
        raw.parse().ok()
    }
}

impl TimexProperty {
    /// Parse a TIMEX token. Time parts (`T...`) are dropped; unknown shapes
    /// return `None`.
    pub fn parse(timex: &str) -> Option<Self> {
        let timex = timex.trim();
        if timex == "PRESENT_REF" {
            return Some(TimexProperty {
                present: true,
                ..Default::default()
            });
        }

        if let Some(caps) = RANGE_TIMEX.captures(timex) {
            let start = TimexProperty::parse(&caps[1])?;
            let end = TimexProperty::parse(&caps[2])?;
            return Some(TimexProperty {
                range: Some((Box::new(start), Box::new(end))),
                ..Default::default()
            });
        }

        let date_part = timex.split('T').next().unwrap_or_default();

        if let Some(caps) = DATE_TIMEX.captures(date_part) {
            return Some(TimexProperty {
                year: component(&caps[1]),
                month: component(&caps[2]),
                day_of_month: component(&caps[3]),
                ..Default::default()
            });
        }
        if let Some(caps) = WEEKDAY_TIMEX.captures(date_part) {
            return Some(TimexProperty {
                year: component(&caps[1]),
                week_of_year: component(&caps[2]),
                day_of_week: component(&caps[3]),
                ..Default::default()
            });
        }
        if let Some(caps) = WEEK_TIMEX.captures(date_part) {
            return Some(TimexProperty {
                year: component(&caps[1]),
                week_of_year: component(&caps[2]),
                ..Default::default()
            });
        }
        if let Some(caps) = MONTH_TIMEX.captures(date_part) {
            return Some(TimexProperty {
                year: component(&caps[1]),
                month: component(&caps[2]),
                ..Default::default()
            });
        }
        if let Some(caps) = YEAR_TIMEX.captures(date_part) {
            return Some(TimexProperty {
                year: component(&caps[1]),
                ..Default::default()
            });
        }
        None
    }

    /// The calendar date this token names, if year, month and day are all
    /// present and form a real date.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month?, self.day_of_month?)
    }

    pub fn types(&self) -> BTreeSet<TimexType> {
        let mut types = BTreeSet::new();
        if self.present {
            types.insert(TimexType::Present);
            return types;
        }

        if let Some((start, end)) = &self.range {
            types.insert(TimexType::DateRange);
            if let (Some(start), Some(end)) = (start.calendar_date(), end.calendar_date()) {
                if start <= end {
                    types.insert(TimexType::Definite);
                }
            }
            return types;
        }

        if self.day_of_month.is_some() || self.day_of_week.is_some() {
            types.insert(TimexType::Date);
            if self.calendar_date().is_some() {
                types.insert(TimexType::Definite);
            }
        } else if self.month.is_some() || self.week_of_year.is_some() || self.year.is_some() {
            types.insert(TimexType::DateRange);
        }
        types
    }
}

/// `true` only when the token names a definite calendar date or date range.
pub fn is_definite(timex: &str) -> bool {
    TimexProperty::parse(timex)
        .map(|property| property.types().contains(&TimexType::Definite))
        .unwrap_or(false)
}

/// Classify a TIMEX token into a `DateExpression`, canonicalizing dates.
pub fn resolve(timex: &str) -> DateExpression {
    let ambiguous = || DateExpression::Ambiguous {
        raw: timex.to_string(),
    };

    let Some(property) = TimexProperty::parse(timex) else {
        return ambiguous();
    };
    if !property.types().contains(&TimexType::Definite) {
        return ambiguous();
    }

    match &property.range {
        Some((start, end)) => match (start.calendar_date(), end.calendar_date()) {
            (Some(start), Some(end)) => DateExpression::DateRange {
                start: start.format(CANONICAL_DATE_FORMAT).to_string(),
                end: end.format(CANONICAL_DATE_FORMAT).to_string(),
            },
            _ => ambiguous(),
        },
        None => match property.calendar_date() {
            Some(date) => DateExpression::date(date.format(CANONICAL_DATE_FORMAT).to_string()),
            None => ambiguous(),
        },
    }
}
