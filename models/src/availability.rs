// models/src/availability.rs

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::slots::{DayPeriod, SlotRange};

/// Longest recurring run a doctor can publish in one call.
pub const MAX_RECURRING_WEEKS: u8 = 8;

/// One published half-hour of a doctor's calendar.
///
/// Uniqueness is the (doctor, date, start) triple; the store refuses a
/// second row with the same triple.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot: SlotRange,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn new(doctor_id: Uuid, date: NaiveDate, slot: SlotRange) -> Self {
        AvailabilitySlot {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            slot,
            created_at: Utc::now(),
        }
    }

    pub fn unique_key(&self) -> String {
        slot_unique_key(self.doctor_id, self.date, self.slot)
    }
}

/// Key form of the uniqueness triple, shared with the storage layer.
pub fn slot_unique_key(doctor_id: Uuid, date: NaiveDate, slot: SlotRange) -> String {
    format!("{}:{}:{}", doctor_id, date, slot.start())
}

/// A (date, slot) pair inside a bulk publish.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DatedSlot {
    pub date: NaiveDate,
    pub slot: SlotRange,
}

/// What a bulk write actually did. Duplicates and refusals count as
/// skipped instead of failing the batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub applied: usize,
    pub skipped: usize,
}

impl BatchOutcome {
    pub fn applied(&mut self) {
        self.applied += 1;
    }

    pub fn skipped(&mut self) {
        self.skipped += 1;
    }
}

/// Quick-action shapes for filling a calendar without picking slots one
/// by one.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotPattern {
    /// The given period of today.
    Today { period: DayPeriod },
    /// The remaining weekdays of the current week.
    ThisWeek { period: DayPeriod },
    /// The next `days` calendar days.
    NextDays {
        days: u32,
        period: DayPeriod,
        #[serde(default)]
        skip_weekends: bool,
    },
}

impl SlotPattern {
    pub fn period(&self) -> DayPeriod {
        match self {
            SlotPattern::Today { period }
            | SlotPattern::ThisWeek { period }
            | SlotPattern::NextDays { period, .. } => *period,
        }
    }

    /// The calendar days this pattern covers, counted from `today`.
    pub fn dates_from(&self, today: NaiveDate) -> Vec<NaiveDate> {
        match self {
            SlotPattern::Today { .. } => vec![today],
            SlotPattern::ThisWeek { .. } => {
                let left_in_week = 6 - today.weekday().num_days_from_monday();
                (0..=left_in_week as u64)
                    .filter_map(|offset| today.checked_add_days(Days::new(offset)))
                    .filter(|date| !is_weekend(*date))
                    .collect()
            }
            SlotPattern::NextDays { days, skip_weekends, .. } => (0..*days as u64)
                .filter_map(|offset| today.checked_add_days(Days::new(offset)))
                .filter(|date| !skip_weekends || !is_weekend(*date))
                .collect(),
        }
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn validate_recurrence(weeks: u8) -> ValidationResult<()> {
    if weeks == 0 || weeks > MAX_RECURRING_WEEKS {
        return Err(ValidationError::InvalidRecurrence(weeks));
    }
    Ok(())
}

/// A named set of slot ranges a doctor reuses across days.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub slots: Vec<SlotRange>,
    pub created_at: DateTime<Utc>,
}

impl SlotTemplate {
    pub fn new(doctor_id: Uuid, name: &str, slots: Vec<SlotRange>) -> ValidationResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name".into()));
        }
        if slots.is_empty() {
            return Err(ValidationError::EmptyTemplate);
        }
        let mut slots = slots;
        slots.sort();
        slots.dedup();
        Ok(SlotTemplate {
            id: Uuid::new_v4(),
            doctor_id,
            name: name.to_string(),
            slots,
            created_at: Utc::now(),
        })
    }
}
