// models/src/slots.rs
//
// The clinic day is a fixed grid of half-hour ranges from 09:00 to 18:00.
// Every scheduled time in the system is one of these ranges; free-form
// times never enter storage.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};

/// Length of one bookable slot.
pub const SLOT_MINUTES: u32 = 30;
/// First bookable minute of the day (09:00).
pub const DAY_OPEN_MINUTES: u32 = 9 * 60;
/// Closing time (18:00); no slot starts at or after it.
pub const DAY_CLOSE_MINUTES: u32 = 18 * 60;
/// Number of ranges in the grid.
pub const SLOTS_PER_DAY: usize = ((DAY_CLOSE_MINUTES - DAY_OPEN_MINUTES) / SLOT_MINUTES) as usize;

/// Slots starting before this hour are morning slots.
const AFTERNOON_HOUR: u32 = 13;

static SLOT_GRID: LazyLock<Vec<SlotRange>> = LazyLock::new(|| {
    let mut grid = Vec::with_capacity(SLOTS_PER_DAY);
    let mut minutes = DAY_OPEN_MINUTES;
    while minutes < DAY_CLOSE_MINUTES {
        let start = NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
            .expect("grid minutes stay below 24:00");
        let end_minutes = minutes + SLOT_MINUTES;
        let end = NaiveTime::from_hms_opt(end_minutes / 60, end_minutes % 60, 0)
            .expect("grid minutes stay below 24:00");
        grid.push(SlotRange { start, end });
        minutes = end_minutes;
    }
    grid
});

/// The full clinic day in order, `09:00-09:30` through `17:30-18:00`.
pub fn slot_grid() -> &'static [SlotRange] {
    &SLOT_GRID
}

/// The wall-clock start of a grid slot, e.g. `09:30`.
///
/// Only minutes that begin a grid range parse; `09:15` or `18:00` are
/// rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn parse(value: &str) -> ValidationResult<Self> {
        let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|_| ValidationError::InvalidSlotTime(value.to_string()))?;
        Self::from_time(time).ok_or_else(|| ValidationError::InvalidSlotTime(value.to_string()))
    }

    /// Wraps a wall-clock time if it starts a grid range.
    pub fn from_time(time: NaiveTime) -> Option<Self> {
        let minutes = time.hour() * 60 + time.minute();
        let on_grid = time.second() == 0
            && minutes >= DAY_OPEN_MINUTES
            && minutes < DAY_CLOSE_MINUTES
            && minutes % SLOT_MINUTES == 0;
        on_grid.then_some(SlotTime(time))
    }

    pub fn as_time(&self) -> NaiveTime {
        self.0
    }

    /// The grid range this minute begins.
    pub fn range(&self) -> SlotRange {
        let end = self.0 + chrono::Duration::minutes(SLOT_MINUTES as i64);
        SlotRange { start: self.0, end }
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = ValidationError;
    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SlotTime {
    type Error = ValidationError;
    fn try_from(value: String) -> ValidationResult<Self> {
        Self::parse(&value)
    }
}

impl From<SlotTime> for String {
    fn from(slot: SlotTime) -> Self {
        slot.to_string()
    }
}

/// One half-hour range of the grid, e.g. `09:00-09:30`.
///
/// Serializes as its label, the wire form the rest of the system speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl SlotRange {
    /// Parses the `HH:MM-HH:MM` label form, rejecting anything off-grid.
    pub fn parse(value: &str) -> ValidationResult<Self> {
        let (start_part, end_part) = value
            .split_once('-')
            .ok_or_else(|| ValidationError::InvalidSlotRange(value.to_string()))?;
        let start = SlotTime::parse(start_part)?;
        let range = start.range();
        let end = NaiveTime::parse_from_str(end_part.trim(), "%H:%M")
            .map_err(|_| ValidationError::InvalidSlotRange(value.to_string()))?;
        if range.end != end {
            return Err(ValidationError::InvalidSlotRange(value.to_string()));
        }
        Ok(range)
    }

    pub fn start(&self) -> SlotTime {
        SlotTime(self.start)
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// `HH:MM-HH:MM`, the stored and displayed form.
    pub fn label(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }

    pub fn overlaps(&self, other: &SlotRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }

    /// The UTC instant this range begins on a given day.
    pub fn start_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.start).and_utc()
    }

    fn starts_before_hour(&self, hour: u32) -> bool {
        self.start.hour() < hour
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for SlotRange {
    type Err = ValidationError;
    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SlotRange {
    type Error = ValidationError;
    fn try_from(value: String) -> ValidationResult<Self> {
        Self::parse(&value)
    }
}

impl From<SlotRange> for String {
    fn from(range: SlotRange) -> Self {
        range.label()
    }
}

impl From<SlotTime> for SlotRange {
    fn from(start: SlotTime) -> Self {
        start.range()
    }
}

/// Which part of the clinic day a bulk-publishing action targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    Morning,
    Afternoon,
    FullDay,
}

impl DayPeriod {
    pub fn matches(&self, slot: &SlotRange) -> bool {
        match self {
            DayPeriod::Morning => slot.starts_before_hour(AFTERNOON_HOUR),
            DayPeriod::Afternoon => !slot.starts_before_hour(AFTERNOON_HOUR),
            DayPeriod::FullDay => true,
        }
    }

    /// Grid ranges belonging to this period, in day order.
    pub fn slots(&self) -> Vec<SlotRange> {
        slot_grid().iter().filter(|s| self.matches(s)).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_lay_out_the_full_day() {
        let grid = slot_grid();
        assert_eq!(grid.len(), SLOTS_PER_DAY);
        assert_eq!(grid.len(), 18);
        assert_eq!(grid[0].label(), "09:00-09:30");
        assert_eq!(grid[17].label(), "17:30-18:00");
        for pair in grid.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start().as_time());
        }
    }

    #[test]
    fn should_parse_grid_start_times() {
        let slot = SlotTime::parse("09:30").unwrap();
        assert_eq!(slot.to_string(), "09:30");
        assert_eq!(slot.range().label(), "09:30-10:00");
    }

    #[test]
    fn should_reject_off_grid_times() {
        for bad in ["09:15", "08:30", "18:00", "22:00", "9am", ""] {
            assert!(SlotTime::parse(bad).is_err(), "{bad} parsed");
        }
    }

    #[test]
    fn should_parse_range_labels() {
        let range = SlotRange::parse("13:00-13:30").unwrap();
        assert_eq!(range.start().to_string(), "13:00");
        assert_eq!(range.label(), "13:00-13:30");
    }

    #[test]
    fn should_reject_malformed_ranges() {
        for bad in ["09:00-10:00", "09:15-09:45", "09:00", "17:30-18:30", "a-b"] {
            assert!(SlotRange::parse(bad).is_err(), "{bad} parsed");
        }
    }

    #[test]
    fn should_detect_overlap_and_containment() {
        let nine = SlotRange::parse("09:00-09:30").unwrap();
        let nine_thirty = SlotRange::parse("09:30-10:00").unwrap();
        assert!(!nine.overlaps(&nine_thirty));
        assert!(nine.overlaps(&nine));
        assert!(nine.contains(NaiveTime::from_hms_opt(9, 15, 0).unwrap()));
        assert!(!nine.contains(NaiveTime::from_hms_opt(9, 30, 0).unwrap()));
    }

    #[test]
    fn should_split_day_into_periods() {
        let morning = DayPeriod::Morning.slots();
        let afternoon = DayPeriod::Afternoon.slots();
        assert_eq!(morning.len(), 8);
        assert_eq!(afternoon.len(), 10);
        assert_eq!(morning.last().unwrap().label(), "12:30-13:00");
        assert_eq!(afternoon.first().unwrap().label(), "13:00-13:30");
        assert_eq!(DayPeriod::FullDay.slots().len(), 18);
    }

    #[test]
    fn should_round_trip_through_serde() {
        let range = SlotRange::parse("11:00-11:30").unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, "\"11:00-11:30\"");
        let back: SlotRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, range);
        assert!(serde_json::from_str::<SlotRange>("\"11:10-11:40\"").is_err());
    }

    #[test]
    fn should_derive_start_instant() {
        let range = SlotRange::parse("09:00-09:30").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let instant = range.start_instant(date);
        assert_eq!(instant.to_rfc3339(), "2025-06-02T09:00:00+00:00");
    }
}
