// models/src/appointments.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ClinicError, ClinicResult};
use crate::slots::SlotRange;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    /// Legal lifecycle moves. A pending request is confirmed or cancelled;
    /// a confirmed visit is completed or cancelled; the rest is history.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }

    /// Whether an appointment in this status keeps its slot out of the
    /// free list.
    pub fn holds_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A patient's visit with a doctor, pinned to one grid slot on one day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot: SlotRange,
    /// Derived from `date` and `slot`, never set directly.
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// A fresh booking request, always born pending.
    pub fn new(
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotRange,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            date,
            slot,
            scheduled_at: slot.start_instant(date),
            status: AppointmentStatus::Pending,
            notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a lifecycle move, refusing anything the state machine
    /// does not allow.
    pub fn transition(&mut self, next: AppointmentStatus) -> ClinicResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ClinicError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves the visit to another day or slot, keeping its status.
    pub fn move_to(&mut self, date: NaiveDate, slot: SlotRange) {
        self.date = date;
        self.slot = slot;
        self.scheduled_at = slot.start_instant(date);
        self.updated_at = Utc::now();
    }

    pub fn holds(&self, date: NaiveDate, slot: SlotRange) -> bool {
        self.status.holds_slot() && self.date == date && self.slot == slot
    }
}

/// Wire payload for booking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot: SlotRange,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Wire payload for moving an existing appointment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub slot: SlotRange,
}

/// Admin listing filter; `None` fields match everything.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct AppointmentFilter {
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.map_or(true, |s| appointment.status == s)
            && self.doctor_id.map_or(true, |d| appointment.doctor_id == d)
            && self.patient_id.map_or(true, |p| appointment.patient_id == p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::SlotRange;

    fn sample() -> Appointment {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let slot = SlotRange::parse("10:00-10:30").unwrap();
        Appointment::new(Uuid::new_v4(), Uuid::new_v4(), date, slot, None)
    }

    #[test]
    fn should_start_pending_with_derived_instant() {
        let appointment = sample();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(
            appointment.scheduled_at.to_rfc3339(),
            "2025-06-02T10:00:00+00:00"
        );
    }

    #[test]
    fn should_allow_the_documented_lifecycle() {
        let mut appointment = sample();
        appointment.transition(AppointmentStatus::Confirmed).unwrap();
        appointment.transition(AppointmentStatus::Completed).unwrap();
        assert!(appointment.status.is_terminal());
    }

    #[test]
    fn should_refuse_leaving_terminal_states() {
        let mut appointment = sample();
        appointment.transition(AppointmentStatus::Cancelled).unwrap();
        let err = appointment
            .transition(AppointmentStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidTransition { .. }));
    }

    #[test]
    fn should_refuse_completing_an_unconfirmed_request() {
        let mut appointment = sample();
        assert!(appointment.transition(AppointmentStatus::Completed).is_err());
    }

    #[test]
    fn should_release_slot_on_cancellation() {
        let mut appointment = sample();
        assert!(appointment.status.holds_slot());
        appointment.transition(AppointmentStatus::Cancelled).unwrap();
        assert!(!appointment.status.holds_slot());
    }

    #[test]
    fn should_filter_by_status_and_doctor() {
        let appointment = sample();
        let filter = AppointmentFilter {
            status: Some(AppointmentStatus::Pending),
            doctor_id: Some(appointment.doctor_id),
            patient_id: None,
        };
        assert!(filter.matches(&appointment));
        let other = AppointmentFilter {
            status: Some(AppointmentStatus::Confirmed),
            ..Default::default()
        };
        assert!(!other.matches(&appointment));
    }
}
