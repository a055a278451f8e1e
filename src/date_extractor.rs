//! Date-token extraction from free text.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Turns a raw reply into TIMEX tokens, in the order they appear.
pub trait DateTokenExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}))?\b").unwrap());
static MONTH_NAME_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b",
    )
    .unwrap()
});
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:next|this|on)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .unwrap()
});

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Regex-based extractor for numeric, month-name and weekday mentions.
///
/// Missing years become `XXXX` and weekdays become `XXXX-WXX-n`, so the
/// ambiguity policy in [`crate::timex`] decides whether to re-prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternDateExtractor;

impl PatternDateExtractor {
    fn format(year: Option<i32>, month: u32, day: u32) -> Option<String> {
        // Validate against a leap year when the year is unknown.
        NaiveDate::from_ymd_opt(year.unwrap_or(2000), month, day)?;
        Some(match year {
            Some(year) => format!("{year:04}-{month:02}-{day:02}"),
            None => format!("XXXX-{month:02}-{day:02}"),
        })
    }
}

impl DateTokenExtractor for PatternDateExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();

        for caps in ISO_DATE.captures_iter(text) {
            let (Ok(year), Ok(month), Ok(day)) =
                (caps[1].parse::<i32>(), caps[2].parse::<u32>(), caps[3].parse::<u32>())
            else {
                continue;
            };
            if let Some(token) = Self::format(Some(year), month, day) {
                found.push((caps.get(0).map_or(0, |m| m.start()), token));
            }
        }

        for caps in SLASH_DATE.captures_iter(text) {
            let start = caps.get(0).map_or(0, |m| m.start());
            let (Ok(month), Ok(day)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
                continue;
            };
            let year = caps.get(3).and_then(|m| m.as_str().parse().ok());
            if let Some(token) = Self::format(year, month, day) {
                found.push((start, token));
            }
        }

        for caps in MONTH_NAME_DATE.captures_iter(text) {
            let prefix = caps[1].to_lowercase();
            let Some(month) = MONTHS
                .iter()
                .position(|name| prefix.starts_with(name))
                .map(|index| index as u32 + 1)
            else {
                continue;
            };
            let Ok(day) = caps[2].parse::<u32>() else {
                continue;
            };
            let year = caps.get(3).and_then(|m| m.as_str().parse().ok());
            if let Some(token) = Self::format(year, month, day) {
                found.push((caps.get(0).map_or(0, |m| m.start()), token));
            }
        }

        for caps in WEEKDAY.captures_iter(text) {
            let name = caps[1].to_lowercase();
            if let Some(index) = WEEKDAYS.iter().position(|day| *day == name) {
                found.push((
                    caps.get(0).map_or(0, |m| m.start()),
                    format!("XXXX-WXX-{}", index + 1),
                ));
            }
        }

        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, token)| token).collect()
    }
}
