// scheduling/src/availability.rs
//
// Management of the slots doctors put up for booking: one-off publishes,
// bulk and recurring runs, quick-action patterns, and reusable named
// templates. Duplicate rows are skipped inside batches and refused on
// single publishes; removal is refused while an appointment holds the
// slot.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use log::{info, warn};
use uuid::Uuid;

use caching::Cache;
use models::availability::validate_recurrence;
use models::errors::{ClinicError, ClinicResult, ValidationError};
use models::{
    AuditEvent, AvailabilitySlot, BatchOutcome, DatedSlot, SlotPattern, SlotRange, SlotTemplate,
    UserRole,
};
use storage::DocumentStore;

use crate::audit;
use crate::booking::free_slots_key;
use crate::directory::require_role;
use crate::locks::DoctorLocks;

/// Publishes and withdraws a doctor's bookable slots.
#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn DocumentStore>,
    cache: Cache,
    locks: Arc<DoctorLocks>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Cache, locks: Arc<DoctorLocks>) -> Self {
        AvailabilityService { store, cache, locks }
    }

    /// Puts one slot up for booking. Past days and duplicates are
    /// refused.
    pub async fn publish(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotRange,
    ) -> ClinicResult<AvailabilitySlot> {
        require_role(self.store.as_ref(), &doctor_id, UserRole::Doctor).await?;
        if date < crate::today() {
            return Err(ValidationError::PastDate(date).into());
        }
        let published = AvailabilitySlot::new(doctor_id, date, slot);
        self.store.insert_slot(published.clone()).await?;
        self.cache.invalidate(&free_slots_key(&doctor_id, date)).await;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                "availability.published",
                published.id,
                Some(doctor_id),
                format!("{} {}", date, slot),
            ),
        )
        .await;
        info!("Doctor {} published {} on {}", doctor_id, slot, date);
        Ok(published)
    }

    /// Publishes a hand-picked set of (date, slot) pairs. Rows already
    /// on the calendar, like rows for past days, count as skipped
    /// instead of failing the batch.
    pub async fn publish_many(
        &self,
        doctor_id: Uuid,
        entries: Vec<DatedSlot>,
    ) -> ClinicResult<BatchOutcome> {
        require_role(self.store.as_ref(), &doctor_id, UserRole::Doctor).await?;
        let mut outcome = BatchOutcome::default();
        for entry in entries {
            self.try_publish(doctor_id, entry.date, entry.slot, &mut outcome)
                .await?;
        }
        self.record_batch(doctor_id, "availability.batch_published", outcome)
            .await;
        Ok(outcome)
    }

    /// Repeats a day's set of slots on the same weekday for `weeks`
    /// consecutive weeks, starting at `start` itself.
    pub async fn publish_recurring(
        &self,
        doctor_id: Uuid,
        start: NaiveDate,
        slots: Vec<SlotRange>,
        weeks: u8,
    ) -> ClinicResult<BatchOutcome> {
        require_role(self.store.as_ref(), &doctor_id, UserRole::Doctor).await?;
        validate_recurrence(weeks)?;
        let mut outcome = BatchOutcome::default();
        for week in 0..weeks as u64 {
            let Some(date) = start.checked_add_days(Days::new(week * 7)) else {
                break;
            };
            for slot in &slots {
                self.try_publish(doctor_id, date, *slot, &mut outcome).await?;
            }
        }
        self.record_batch(doctor_id, "availability.recurring_published", outcome)
            .await;
        Ok(outcome)
    }

    /// Expands a quick-action pattern from today and publishes every
    /// (date, slot) pair it covers.
    pub async fn publish_pattern(
        &self,
        doctor_id: Uuid,
        pattern: SlotPattern,
    ) -> ClinicResult<BatchOutcome> {
        require_role(self.store.as_ref(), &doctor_id, UserRole::Doctor).await?;
        let slots = pattern.period().slots();
        let mut outcome = BatchOutcome::default();
        for date in pattern.dates_from(crate::today()) {
            for slot in &slots {
                self.try_publish(doctor_id, date, *slot, &mut outcome).await?;
            }
        }
        self.record_batch(doctor_id, "availability.pattern_published", outcome)
            .await;
        Ok(outcome)
    }

    /// Withdraws a published slot. Refused while an active appointment
    /// holds it; cancel or move the appointment first.
    pub async fn remove(&self, slot_id: Uuid) -> ClinicResult<()> {
        let slot = self
            .store
            .get_slot(&slot_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound {
                kind: "availability slot",
                id: slot_id.to_string(),
            })?;

        let lock = self.locks.for_doctor(slot.doctor_id).await;
        let _guard = lock.lock().await;

        let appointments = self.store.appointments_for_doctor(&slot.doctor_id).await?;
        if appointments.iter().any(|a| a.holds(slot.date, slot.slot)) {
            warn!(
                "Refusing to remove {} on {}: an appointment holds it",
                slot.slot, slot.date
            );
            return Err(ClinicError::SlotTaken {
                doctor_id: slot.doctor_id,
                date: slot.date,
                slot: slot.slot.label(),
            });
        }
        self.store.delete_slot(&slot_id).await?;
        self.cache
            .invalidate(&free_slots_key(&slot.doctor_id, slot.date))
            .await;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                "availability.removed",
                slot_id,
                Some(slot.doctor_id),
                format!("{} {}", slot.date, slot.slot),
            ),
        )
        .await;
        info!("Doctor {} withdrew {} on {}", slot.doctor_id, slot.slot, slot.date);
        Ok(())
    }

    /// Withdraws a set of slots, counting held or already-gone ones as
    /// skipped.
    pub async fn remove_many(&self, slot_ids: Vec<Uuid>) -> ClinicResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for slot_id in slot_ids {
            match self.remove(slot_id).await {
                Ok(()) => outcome.applied(),
                Err(ClinicError::NotFound { .. } | ClinicError::SlotTaken { .. }) => {
                    outcome.skipped()
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcome)
    }

    /// The doctor's whole published calendar, in (date, slot) order.
    pub async fn slots_for_doctor(&self, doctor_id: Uuid) -> ClinicResult<Vec<AvailabilitySlot>> {
        self.store.slots_for_doctor(&doctor_id).await
    }

    pub async fn slots_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> ClinicResult<Vec<AvailabilitySlot>> {
        self.store.slots_for_doctor_on(&doctor_id, date).await
    }

    /// Saves a named set of slots for reuse. Names are unique per
    /// doctor, compared case-insensitively.
    pub async fn save_template(
        &self,
        doctor_id: Uuid,
        name: &str,
        slots: Vec<SlotRange>,
    ) -> ClinicResult<SlotTemplate> {
        require_role(self.store.as_ref(), &doctor_id, UserRole::Doctor).await?;
        let template = SlotTemplate::new(doctor_id, name, slots)?;
        self.store.insert_template(template.clone()).await?;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                "template.saved",
                template.id,
                Some(doctor_id),
                format!("'{}' with {} slots", template.name, template.slots.len()),
            ),
        )
        .await;
        info!("Doctor {} saved template '{}'", doctor_id, template.name);
        Ok(template)
    }

    pub async fn list_templates(&self, doctor_id: Uuid) -> ClinicResult<Vec<SlotTemplate>> {
        self.store.templates_for_doctor(&doctor_id).await
    }

    pub async fn delete_template(&self, template_id: Uuid) -> ClinicResult<()> {
        let template = self
            .store
            .get_template(&template_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound {
                kind: "slot template",
                id: template_id.to_string(),
            })?;
        self.store.delete_template(&template_id).await?;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                "template.deleted",
                template_id,
                Some(template.doctor_id),
                format!("'{}'", template.name),
            ),
        )
        .await;
        Ok(())
    }

    /// Stamps a template's slots onto each of the given days, skipping
    /// pairs that are already published.
    pub async fn apply_template(
        &self,
        template_id: Uuid,
        dates: Vec<NaiveDate>,
    ) -> ClinicResult<BatchOutcome> {
        let template = self
            .store
            .get_template(&template_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound {
                kind: "slot template",
                id: template_id.to_string(),
            })?;
        let mut outcome = BatchOutcome::default();
        for date in dates {
            for slot in &template.slots {
                self.try_publish(template.doctor_id, date, *slot, &mut outcome)
                    .await?;
            }
        }
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                "template.applied",
                template_id,
                Some(template.doctor_id),
                format!("'{}': applied {}, skipped {}", template.name, outcome.applied, outcome.skipped),
            ),
        )
        .await;
        info!(
            "Applied template '{}' for doctor {}: {} new, {} skipped",
            template.name, template.doctor_id, outcome.applied, outcome.skipped
        );
        Ok(outcome)
    }

    /// One batch row: inserts unless the day is gone or the triple is
    /// already on the calendar. Storage trouble still fails the batch.
    async fn try_publish(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotRange,
        outcome: &mut BatchOutcome,
    ) -> ClinicResult<()> {
        if date < crate::today() {
            outcome.skipped();
            return Ok(());
        }
        match self
            .store
            .insert_slot(AvailabilitySlot::new(doctor_id, date, slot))
            .await
        {
            Ok(()) => {
                self.cache.invalidate(&free_slots_key(&doctor_id, date)).await;
                outcome.applied();
                Ok(())
            }
            Err(ClinicError::AlreadyExists(_)) => {
                outcome.skipped();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn record_batch(&self, doctor_id: Uuid, event: &str, outcome: BatchOutcome) {
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                event,
                doctor_id,
                Some(doctor_id),
                format!("applied {}, skipped {}", outcome.applied, outcome.skipped),
            ),
        )
        .await;
        info!(
            "Doctor {}: {} applied {}, skipped {}",
            doctor_id, event, outcome.applied, outcome.skipped
        );
    }
}
