// scheduling/src/booking.rs
//
// The reservation core. Every decision about who owns a (doctor, date,
// slot) triple happens here under that doctor's lock, against fresh
// store reads. The cached free-slot view serves queries only and is
// invalidated by every write that changes slot ownership.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use log::{info, warn};
use uuid::Uuid;

use caching::Cache;
use models::errors::{ClinicError, ClinicResult, ValidationError};
use models::{
    Appointment, AppointmentFilter, AppointmentStatus, AuditEvent, BookingRequest,
    RescheduleRequest, SlotRange, UserRole,
};
use storage::DocumentStore;

use crate::audit;
use crate::directory::require_role;
use crate::locks::DoctorLocks;

/// Cache key of the free-slot view for one doctor's day.
pub(crate) fn free_slots_key(doctor_id: &Uuid, date: NaiveDate) -> String {
    format!("free:{}:{}", doctor_id, date)
}

/// Published slots minus the ones an active appointment holds, in day
/// order.
async fn derive_free_slots(
    store: &dyn DocumentStore,
    doctor_id: &Uuid,
    date: NaiveDate,
) -> ClinicResult<Vec<SlotRange>> {
    let published = store.slots_for_doctor_on(doctor_id, date).await?;
    let appointments = store.appointments_for_doctor(doctor_id).await?;
    let held: HashSet<SlotRange> = appointments
        .iter()
        .filter(|a| a.date == date && a.status.holds_slot())
        .map(|a| a.slot)
        .collect();
    let mut free: Vec<SlotRange> = published
        .into_iter()
        .map(|s| s.slot)
        .filter(|slot| !held.contains(slot))
        .collect();
    free.sort();
    free.dedup();
    Ok(free)
}

/// Books, moves, and walks appointments through their lifecycle.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn DocumentStore>,
    cache: Cache,
    locks: Arc<DoctorLocks>,
}

impl BookingService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Cache, locks: Arc<DoctorLocks>) -> Self {
        BookingService { store, cache, locks }
    }

    /// Reserves a slot for a patient. The check for an open slot and the
    /// insert run under the doctor's lock, so two requests racing for
    /// the last slot cannot both win.
    pub async fn book(&self, request: BookingRequest) -> ClinicResult<Appointment> {
        if request.date < crate::today() {
            return Err(ValidationError::PastDate(request.date).into());
        }
        require_role(self.store.as_ref(), &request.patient_id, UserRole::Patient).await?;
        require_role(self.store.as_ref(), &request.doctor_id, UserRole::Doctor).await?;

        let lock = self.locks.for_doctor(request.doctor_id).await;
        let _guard = lock.lock().await;

        self.ensure_published(&request.doctor_id, request.date, request.slot)
            .await?;
        if self
            .slot_holder(&request.doctor_id, request.date, request.slot, None)
            .await?
            .is_some()
        {
            warn!(
                "Refusing booking: slot {} on {} already taken for doctor {}",
                request.slot, request.date, request.doctor_id
            );
            return Err(ClinicError::SlotTaken {
                doctor_id: request.doctor_id,
                date: request.date,
                slot: request.slot.label(),
            });
        }
        if self
            .patient_busy(&request.patient_id, request.date, request.slot, None)
            .await?
        {
            return Err(ClinicError::BookingConflict {
                patient_id: request.patient_id,
                date: request.date,
                slot: request.slot.label(),
            });
        }

        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);
        let appointment = Appointment::new(
            request.patient_id,
            request.doctor_id,
            request.date,
            request.slot,
            notes,
        );
        self.store.insert_appointment(appointment.clone()).await?;
        self.cache
            .invalidate(&free_slots_key(&request.doctor_id, request.date))
            .await;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                "appointment.booked",
                appointment.id,
                Some(request.patient_id),
                format!("{} {} with doctor {}", request.date, request.slot, request.doctor_id),
            ),
        )
        .await;
        info!(
            "Booked appointment {} for patient {} with doctor {} at {} {}",
            appointment.id, request.patient_id, request.doctor_id, request.date, request.slot
        );
        Ok(appointment)
    }

    /// Moves an appointment to another day or slot with the same doctor,
    /// keeping its status. Moving onto its current slot is a quiet
    /// no-op.
    pub async fn reschedule(
        &self,
        id: Uuid,
        request: RescheduleRequest,
    ) -> ClinicResult<Appointment> {
        if request.date < crate::today() {
            return Err(ValidationError::PastDate(request.date).into());
        }
        let doctor_id = self.get_appointment(id).await?.doctor_id;
        let lock = self.locks.for_doctor(doctor_id).await;
        let _guard = lock.lock().await;

        // Re-read under the lock; the appointment may have moved or been
        // cancelled since the peek above.
        let mut appointment = self.get_appointment(id).await?;
        if !appointment.status.holds_slot() {
            return Err(ClinicError::InvalidRequest(format!(
                "appointment {} is {} and can no longer move",
                id, appointment.status
            )));
        }
        if appointment.date == request.date && appointment.slot == request.slot {
            return Ok(appointment);
        }

        self.ensure_published(&appointment.doctor_id, request.date, request.slot)
            .await?;
        if self
            .slot_holder(&appointment.doctor_id, request.date, request.slot, Some(id))
            .await?
            .is_some()
        {
            return Err(ClinicError::SlotTaken {
                doctor_id: appointment.doctor_id,
                date: request.date,
                slot: request.slot.label(),
            });
        }
        if self
            .patient_busy(&appointment.patient_id, request.date, request.slot, Some(id))
            .await?
        {
            return Err(ClinicError::BookingConflict {
                patient_id: appointment.patient_id,
                date: request.date,
                slot: request.slot.label(),
            });
        }

        let (old_date, old_slot) = (appointment.date, appointment.slot);
        appointment.move_to(request.date, request.slot);
        self.store.update_appointment(appointment.clone()).await?;
        self.cache
            .invalidate(&free_slots_key(&appointment.doctor_id, old_date))
            .await;
        self.cache
            .invalidate(&free_slots_key(&appointment.doctor_id, request.date))
            .await;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                "appointment.rescheduled",
                id,
                None,
                format!("{} {} to {} {}", old_date, old_slot, request.date, request.slot),
            ),
        )
        .await;
        info!(
            "Rescheduled appointment {} from {} {} to {} {}",
            id, old_date, old_slot, request.date, request.slot
        );
        Ok(appointment)
    }

    pub async fn confirm(&self, id: Uuid) -> ClinicResult<Appointment> {
        self.apply_transition(id, AppointmentStatus::Confirmed, "appointment.confirmed")
            .await
    }

    /// A doctor's refusal of a pending request. Unlike
    /// [`BookingService::cancel`], this never touches a confirmed visit.
    pub async fn decline(&self, id: Uuid) -> ClinicResult<Appointment> {
        let appointment = self.get_appointment(id).await?;
        if appointment.status != AppointmentStatus::Pending {
            return Err(ClinicError::InvalidTransition {
                from: appointment.status,
                to: AppointmentStatus::Cancelled,
            });
        }
        self.apply_transition(id, AppointmentStatus::Cancelled, "appointment.declined")
            .await
    }

    pub async fn cancel(&self, id: Uuid) -> ClinicResult<Appointment> {
        self.apply_transition(id, AppointmentStatus::Cancelled, "appointment.cancelled")
            .await
    }

    pub async fn complete(&self, id: Uuid) -> ClinicResult<Appointment> {
        self.apply_transition(id, AppointmentStatus::Completed, "appointment.completed")
            .await
    }

    /// The slots of one doctor's day a new booking could still take.
    /// Served from the cache; writes that change ownership invalidate
    /// the entry.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> ClinicResult<Vec<SlotRange>> {
        let store = Arc::clone(&self.store);
        let value = self
            .cache
            .try_get_with(free_slots_key(&doctor_id, date), async move {
                let free = derive_free_slots(store.as_ref(), &doctor_id, date).await?;
                serde_json::to_value(free).map_err(ClinicError::from)
            })
            .await
            .map_err(|e| (*e).clone())?;
        Ok(serde_json::from_value(value)?)
    }

    /// Whether one slot would be accepted by [`BookingService::book`]
    /// right now, ignoring the requesting patient's own calendar.
    pub async fn is_slot_open(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotRange,
    ) -> ClinicResult<bool> {
        Ok(self.available_slots(doctor_id, date).await?.contains(&slot))
    }

    pub async fn get_appointment(&self, id: Uuid) -> ClinicResult<Appointment> {
        self.store
            .get_appointment(&id)
            .await?
            .ok_or_else(|| ClinicError::NotFound { kind: "appointment", id: id.to_string() })
    }

    pub async fn appointments_for_patient(&self, patient_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        self.store.appointments_for_patient(&patient_id).await
    }

    pub async fn appointments_for_doctor(&self, doctor_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        self.store.appointments_for_doctor(&doctor_id).await
    }

    /// Requests still waiting for the doctor's confirm or decline.
    pub async fn pending_for_doctor(&self, doctor_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        let mut appointments = self.store.appointments_for_doctor(&doctor_id).await?;
        appointments.retain(|a| a.status == AppointmentStatus::Pending);
        Ok(appointments)
    }

    pub async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> ClinicResult<Vec<Appointment>> {
        let mut appointments = self.store.all_appointments().await?;
        appointments.retain(|a| filter.matches(a));
        Ok(appointments)
    }

    async fn ensure_published(
        &self,
        doctor_id: &Uuid,
        date: NaiveDate,
        slot: SlotRange,
    ) -> ClinicResult<()> {
        let published = self.store.slots_for_doctor_on(doctor_id, date).await?;
        if published.iter().any(|s| s.slot == slot) {
            Ok(())
        } else {
            Err(ClinicError::SlotNotPublished {
                doctor_id: *doctor_id,
                date,
                slot: slot.label(),
            })
        }
    }

    /// The appointment currently holding a slot, if any. `exclude` lets
    /// a reschedule ignore its own reservation.
    async fn slot_holder(
        &self,
        doctor_id: &Uuid,
        date: NaiveDate,
        slot: SlotRange,
        exclude: Option<Uuid>,
    ) -> ClinicResult<Option<Uuid>> {
        let appointments = self.store.appointments_for_doctor(doctor_id).await?;
        Ok(appointments
            .iter()
            .find(|a| a.holds(date, slot) && exclude != Some(a.id))
            .map(|a| a.id))
    }

    async fn patient_busy(
        &self,
        patient_id: &Uuid,
        date: NaiveDate,
        slot: SlotRange,
        exclude: Option<Uuid>,
    ) -> ClinicResult<bool> {
        let appointments = self.store.appointments_for_patient(patient_id).await?;
        Ok(appointments
            .iter()
            .any(|a| a.holds(date, slot) && exclude != Some(a.id)))
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        next: AppointmentStatus,
        event: &str,
    ) -> ClinicResult<Appointment> {
        let mut appointment = self.get_appointment(id).await?;
        let from = appointment.status;
        appointment.transition(next)?;
        self.store.update_appointment(appointment.clone()).await?;
        if from.holds_slot() && !appointment.status.holds_slot() {
            self.cache
                .invalidate(&free_slots_key(&appointment.doctor_id, appointment.date))
                .await;
        }
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(event, id, None, format!("{} to {}", from, next)),
        )
        .await;
        info!("Appointment {} moved from {} to {}", id, from, next);
        Ok(appointment)
    }
}
