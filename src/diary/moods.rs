use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use time::{Date, Month};

use crate::timefmt::{format_day, parse_date_ymd};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mood {
    VeryGood,
    Good,
    Neutral,
    Bad,
    VeryBad,
}

/// One mood per calendar day, insertion-ordered.
///
/// This is a plain lookup relation keyed by date. Diary entries never own
/// mood records: deleting an entry leaves the day's mood in place, and a mood
/// may exist for a day with no entry at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoodBook {
    days: IndexMap<Date, Mood>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DayMoodRecord {
    date: String,
    mood: Mood,
}

impl MoodBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Upsert: a second mood recorded for the same day replaces the first.
    pub fn set(&mut self, date: Date, mood: Mood) {
        self.days.insert(date, mood);
    }

    pub fn get(&self, date: Date) -> Option<Mood> {
        self.days.get(&date).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Date, Mood)> + '_ {
        self.days.iter().map(|(date, mood)| (*date, *mood))
    }

    /// Records falling inside one calendar month, in date order.
    pub fn month(&self, year: i32, month: Month) -> Vec<(Date, Mood)> {
        let mut records: Vec<(Date, Mood)> = self
            .iter()
            .filter(|(date, _)| date.year() == year && date.month() == month)
            .collect();
        records.sort_by_key(|(date, _)| *date);
        records
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let records: Vec<DayMoodRecord> = self
            .iter()
            .map(|(date, mood)| DayMoodRecord {
                date: format_day(date),
                mood,
            })
            .collect();
        serde_json::to_string(&records)
    }

    /// Rebuild from an untrusted persisted value, skipping records that do
    /// not carry a parseable date and mood.
    pub fn sanitize(value: &Value) -> Self {
        let mut book = Self::new();
        let Some(items) = value.as_array() else {
            return book;
        };
        for item in items {
            let Some(date) = item
                .get("date")
                .and_then(Value::as_str)
                .and_then(parse_date_ymd)
            else {
                continue;
            };
            let Some(mood) = item
                .get("mood")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<Mood>().ok())
            else {
                continue;
            };
            book.set(date, mood);
        }
        book
    }
}
