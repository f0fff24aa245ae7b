use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::info;
use tokio::sync::RwLock;
use uuid::Uuid;

use models::errors::{ClinicError, ClinicResult};
use models::users::normalize_email;
use models::{Appointment, AuditEvent, AvailabilitySlot, SlotTemplate, User};

use crate::document_store::DocumentStore;
use crate::storage_utils::{sort_appointments, sort_slots, template_unique_key};

/// Primary map plus the email index, guarded together so a uniqueness
/// check and the insert it protects cannot interleave.
#[derive(Debug, Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

#[derive(Debug, Default)]
struct SlotTable {
    by_id: HashMap<Uuid, AvailabilitySlot>,
    /// (doctor, date, start) triple -> slot id.
    by_key: HashMap<String, Uuid>,
}

#[derive(Debug, Default)]
struct TemplateTable {
    by_id: HashMap<Uuid, SlotTemplate>,
    /// (doctor, name) pair -> template id.
    by_name: HashMap<String, Uuid>,
}

/// Hash-map engine. Holds everything in process memory; the default for
/// tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<UserTable>,
    slots: RwLock<SlotTable>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    templates: RwLock<TemplateTable>,
    audit: RwLock<Vec<AuditEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn connect(&self) -> ClinicResult<()> {
        Ok(())
    }

    fn engine(&self) -> &'static str {
        "in-memory"
    }

    async fn flush(&self) -> ClinicResult<()> {
        Ok(())
    }

    async fn close(&self) -> ClinicResult<()> {
        info!("MemoryStore closed");
        Ok(())
    }

    async fn insert_user(&self, user: User) -> ClinicResult<()> {
        let mut table = self.users.write().await;
        let key = normalize_email(&user.email);
        if table.by_email.contains_key(&key) {
            return Err(ClinicError::AlreadyExists(format!("email {}", key)));
        }
        table.by_email.insert(key, user.id);
        table.by_id.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: &Uuid) -> ClinicResult<Option<User>> {
        let table = self.users.read().await;
        Ok(table.by_id.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> ClinicResult<Option<User>> {
        let table = self.users.read().await;
        let id = table.by_email.get(&normalize_email(email));
        Ok(id.and_then(|id| table.by_id.get(id)).cloned())
    }

    async fn update_user(&self, user: User) -> ClinicResult<()> {
        let mut table = self.users.write().await;
        let previous = table
            .by_id
            .get(&user.id)
            .ok_or_else(|| ClinicError::NotFound { kind: "user", id: user.id.to_string() })?;
        let old_key = normalize_email(&previous.email);
        let new_key = normalize_email(&user.email);
        if old_key != new_key {
            if table.by_email.contains_key(&new_key) {
                return Err(ClinicError::AlreadyExists(format!("email {}", new_key)));
            }
            table.by_email.remove(&old_key);
            table.by_email.insert(new_key, user.id);
        }
        table.by_id.insert(user.id, user);
        Ok(())
    }

    async fn delete_user(&self, id: &Uuid) -> ClinicResult<()> {
        let mut table = self.users.write().await;
        let user = table
            .by_id
            .remove(id)
            .ok_or_else(|| ClinicError::NotFound { kind: "user", id: id.to_string() })?;
        table.by_email.remove(&normalize_email(&user.email));
        Ok(())
    }

    async fn all_users(&self) -> ClinicResult<Vec<User>> {
        let table = self.users.read().await;
        let mut users: Vec<User> = table.by_id.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn insert_slot(&self, slot: AvailabilitySlot) -> ClinicResult<()> {
        let mut table = self.slots.write().await;
        let key = slot.unique_key();
        if table.by_key.contains_key(&key) {
            return Err(ClinicError::AlreadyExists(format!("slot {}", key)));
        }
        table.by_key.insert(key, slot.id);
        table.by_id.insert(slot.id, slot);
        Ok(())
    }

    async fn get_slot(&self, id: &Uuid) -> ClinicResult<Option<AvailabilitySlot>> {
        let table = self.slots.read().await;
        Ok(table.by_id.get(id).cloned())
    }

    async fn delete_slot(&self, id: &Uuid) -> ClinicResult<()> {
        let mut table = self.slots.write().await;
        let slot = table
            .by_id
            .remove(id)
            .ok_or_else(|| ClinicError::NotFound { kind: "availability slot", id: id.to_string() })?;
        table.by_key.remove(&slot.unique_key());
        Ok(())
    }

    async fn slots_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<AvailabilitySlot>> {
        let table = self.slots.read().await;
        let mut slots: Vec<AvailabilitySlot> = table
            .by_id
            .values()
            .filter(|s| s.doctor_id == *doctor_id)
            .cloned()
            .collect();
        sort_slots(&mut slots);
        Ok(slots)
    }

    async fn slots_for_doctor_on(
        &self,
        doctor_id: &Uuid,
        date: NaiveDate,
    ) -> ClinicResult<Vec<AvailabilitySlot>> {
        let table = self.slots.read().await;
        let mut slots: Vec<AvailabilitySlot> = table
            .by_id
            .values()
            .filter(|s| s.doctor_id == *doctor_id && s.date == date)
            .cloned()
            .collect();
        sort_slots(&mut slots);
        Ok(slots)
    }

    async fn insert_appointment(&self, appointment: Appointment) -> ClinicResult<()> {
        let mut appointments = self.appointments.write().await;
        appointments.insert(appointment.id, appointment);
        Ok(())
    }

    async fn get_appointment(&self, id: &Uuid) -> ClinicResult<Option<Appointment>> {
        let appointments = self.appointments.read().await;
        Ok(appointments.get(id).cloned())
    }

    async fn update_appointment(&self, appointment: Appointment) -> ClinicResult<()> {
        let mut appointments = self.appointments.write().await;
        if !appointments.contains_key(&appointment.id) {
            return Err(ClinicError::NotFound {
                kind: "appointment",
                id: appointment.id.to_string(),
            });
        }
        appointments.insert(appointment.id, appointment);
        Ok(())
    }

    async fn appointments_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.doctor_id == *doctor_id)
            .cloned()
            .collect();
        sort_appointments(&mut found);
        Ok(found)
    }

    async fn appointments_for_patient(&self, patient_id: &Uuid) -> ClinicResult<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.patient_id == *patient_id)
            .cloned()
            .collect();
        sort_appointments(&mut found);
        Ok(found)
    }

    async fn all_appointments(&self) -> ClinicResult<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments.values().cloned().collect();
        sort_appointments(&mut found);
        Ok(found)
    }

    async fn insert_template(&self, template: SlotTemplate) -> ClinicResult<()> {
        let mut table = self.templates.write().await;
        let key = template_unique_key(&template.doctor_id, &template.name);
        if table.by_name.contains_key(&key) {
            return Err(ClinicError::AlreadyExists(format!("template {}", template.name)));
        }
        table.by_name.insert(key, template.id);
        table.by_id.insert(template.id, template);
        Ok(())
    }

    async fn get_template(&self, id: &Uuid) -> ClinicResult<Option<SlotTemplate>> {
        let table = self.templates.read().await;
        Ok(table.by_id.get(id).cloned())
    }

    async fn delete_template(&self, id: &Uuid) -> ClinicResult<()> {
        let mut table = self.templates.write().await;
        let template = table
            .by_id
            .remove(id)
            .ok_or_else(|| ClinicError::NotFound { kind: "slot template", id: id.to_string() })?;
        table
            .by_name
            .remove(&template_unique_key(&template.doctor_id, &template.name));
        Ok(())
    }

    async fn templates_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<SlotTemplate>> {
        let table = self.templates.read().await;
        let mut templates: Vec<SlotTemplate> = table
            .by_id
            .values()
            .filter(|t| t.doctor_id == *doctor_id)
            .cloned()
            .collect();
        templates.sort_by_key(|t| t.name.to_lowercase());
        Ok(templates)
    }

    async fn append_audit(&self, event: AuditEvent) -> ClinicResult<()> {
        let mut audit = self.audit.write().await;
        audit.push(event);
        Ok(())
    }

    async fn recent_audit(&self, limit: usize) -> ClinicResult<Vec<AuditEvent>> {
        let audit = self.audit.read().await;
        Ok(audit.iter().rev().take(limit).cloned().collect())
    }
}
