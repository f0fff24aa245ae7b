use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use sled::{Db, Tree};
use uuid::Uuid;

use models::errors::{ClinicError, ClinicResult};
use models::users::normalize_email;
use models::{Appointment, AuditEvent, AvailabilitySlot, SlotTemplate, User};

use crate::document_store::{DocumentStore, StoreConfig};
use crate::storage_utils::{
    deserialize_doc, serialize_doc, sort_appointments, template_unique_key,
};

/// Sled engine. One tree per collection, records keyed by UUID bytes,
/// plus secondary trees that enforce the uniqueness constraints: the
/// normalized email of a user, the (doctor, date, start) triple of a
/// slot, and the (doctor, name) pair of a template.
///
/// Secondary-tree keys start with the doctor's UUID in text form, so a
/// `scan_prefix` on the doctor walks that doctor's rows in calendar
/// order without touching the rest of the tree.
pub struct SledStore {
    db: Db,
    path: PathBuf,
    users: Tree,
    users_by_email: Tree,
    slots: Tree,
    slots_by_key: Tree,
    appointments: Tree,
    templates: Tree,
    templates_by_name: Tree,
    audit: Tree,
}

// sled's own Debug impl walks tree contents; keep ours to the path.
impl fmt::Debug for SledStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledStore").field("path", &self.path).finish()
    }
}

/// Chronological key for the audit log: millisecond timestamp then the
/// event id, so tree order is append order.
fn audit_key(event: &AuditEvent) -> [u8; 24] {
    let mut key = [0u8; 24];
    let millis = event.timestamp.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&millis.to_be_bytes());
    key[8..].copy_from_slice(event.id.as_bytes());
    key
}

impl SledStore {
    pub fn open(config: &StoreConfig) -> ClinicResult<Self> {
        let mut builder = sled::Config::new().cache_capacity(config.cache_capacity);
        builder = if config.temporary {
            builder.temporary(true)
        } else {
            builder.path(&config.data_dir)
        };
        let db = builder.open()?;
        debug!("Opened sled database at {:?}", config.data_dir);

        Ok(SledStore {
            users: db.open_tree("users")?,
            users_by_email: db.open_tree("users_by_email")?,
            slots: db.open_tree("slots")?,
            slots_by_key: db.open_tree("slots_by_key")?,
            appointments: db.open_tree("appointments")?,
            templates: db.open_tree("templates")?,
            templates_by_name: db.open_tree("templates_by_name")?,
            audit: db.open_tree("audit")?,
            path: config.data_dir.clone(),
            db,
        })
    }

    /// Claims a secondary-index key for `id`, failing when another row
    /// already owns it.
    fn claim_key(tree: &Tree, key: &[u8], id: &Uuid, what: String) -> ClinicResult<()> {
        let claimed = tree.compare_and_swap(
            key,
            None as Option<&[u8]>,
            Some(id.as_bytes().as_slice()),
        )?;
        if claimed.is_err() {
            return Err(ClinicError::AlreadyExists(what));
        }
        Ok(())
    }

    fn fetch_slot(&self, id_bytes: &[u8]) -> ClinicResult<Option<AvailabilitySlot>> {
        self.slots
            .get(id_bytes)?
            .map(|bytes| deserialize_doc(&bytes))
            .transpose()
    }
}

#[async_trait]
impl DocumentStore for SledStore {
    async fn connect(&self) -> ClinicResult<()> {
        // Opening the trees already touched the files; nothing to do.
        Ok(())
    }

    fn engine(&self) -> &'static str {
        "sled"
    }

    async fn flush(&self) -> ClinicResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    async fn close(&self) -> ClinicResult<()> {
        let bytes = self.db.flush_async().await?;
        info!("SledStore at {:?} closed, {} bytes flushed", self.path, bytes);
        Ok(())
    }

    async fn insert_user(&self, user: User) -> ClinicResult<()> {
        let email_key = normalize_email(&user.email);
        Self::claim_key(
            &self.users_by_email,
            email_key.as_bytes(),
            &user.id,
            format!("email {}", email_key),
        )?;
        self.users.insert(user.id.as_bytes(), serialize_doc(&user)?)?;
        Ok(())
    }

    async fn get_user(&self, id: &Uuid) -> ClinicResult<Option<User>> {
        self.users
            .get(id.as_bytes())?
            .map(|bytes| deserialize_doc(&bytes))
            .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> ClinicResult<Option<User>> {
        let Some(id_bytes) = self.users_by_email.get(normalize_email(email).as_bytes())? else {
            return Ok(None);
        };
        self.users
            .get(&id_bytes)?
            .map(|bytes| deserialize_doc(&bytes))
            .transpose()
    }

    async fn update_user(&self, user: User) -> ClinicResult<()> {
        let previous: User = self
            .users
            .get(user.id.as_bytes())?
            .map(|bytes| deserialize_doc(&bytes))
            .transpose()?
            .ok_or_else(|| ClinicError::NotFound { kind: "user", id: user.id.to_string() })?;

        let old_key = normalize_email(&previous.email);
        let new_key = normalize_email(&user.email);
        if old_key != new_key {
            Self::claim_key(
                &self.users_by_email,
                new_key.as_bytes(),
                &user.id,
                format!("email {}", new_key),
            )?;
            self.users_by_email.remove(old_key.as_bytes())?;
        }
        self.users.insert(user.id.as_bytes(), serialize_doc(&user)?)?;
        Ok(())
    }

    async fn delete_user(&self, id: &Uuid) -> ClinicResult<()> {
        let removed = self.users.remove(id.as_bytes())?;
        let Some(bytes) = removed else {
            return Err(ClinicError::NotFound { kind: "user", id: id.to_string() });
        };
        let user: User = deserialize_doc(&bytes)?;
        self.users_by_email.remove(normalize_email(&user.email).as_bytes())?;
        Ok(())
    }

    async fn all_users(&self) -> ClinicResult<Vec<User>> {
        let mut users = Vec::new();
        for row in self.users.iter() {
            let (_, bytes) = row?;
            users.push(deserialize_doc::<User>(&bytes)?);
        }
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn insert_slot(&self, slot: AvailabilitySlot) -> ClinicResult<()> {
        let key = slot.unique_key();
        Self::claim_key(
            &self.slots_by_key,
            key.as_bytes(),
            &slot.id,
            format!("slot {}", key),
        )?;
        self.slots.insert(slot.id.as_bytes(), serialize_doc(&slot)?)?;
        Ok(())
    }

    async fn get_slot(&self, id: &Uuid) -> ClinicResult<Option<AvailabilitySlot>> {
        self.fetch_slot(id.as_bytes())
    }

    async fn delete_slot(&self, id: &Uuid) -> ClinicResult<()> {
        let removed = self.slots.remove(id.as_bytes())?;
        let Some(bytes) = removed else {
            return Err(ClinicError::NotFound { kind: "availability slot", id: id.to_string() });
        };
        let slot: AvailabilitySlot = deserialize_doc(&bytes)?;
        self.slots_by_key.remove(slot.unique_key().as_bytes())?;
        Ok(())
    }

    async fn slots_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<AvailabilitySlot>> {
        // Triple keys are "{doctor}:{date}:{start}", so the prefix scan
        // is already in calendar order.
        let mut slots = Vec::new();
        for row in self.slots_by_key.scan_prefix(format!("{}:", doctor_id).as_bytes()) {
            let (_, id_bytes) = row?;
            if let Some(slot) = self.fetch_slot(&id_bytes)? {
                slots.push(slot);
            }
        }
        Ok(slots)
    }

    async fn slots_for_doctor_on(
        &self,
        doctor_id: &Uuid,
        date: NaiveDate,
    ) -> ClinicResult<Vec<AvailabilitySlot>> {
        let mut slots = Vec::new();
        let prefix = format!("{}:{}:", doctor_id, date);
        for row in self.slots_by_key.scan_prefix(prefix.as_bytes()) {
            let (_, id_bytes) = row?;
            if let Some(slot) = self.fetch_slot(&id_bytes)? {
                slots.push(slot);
            }
        }
        Ok(slots)
    }

    async fn insert_appointment(&self, appointment: Appointment) -> ClinicResult<()> {
        self.appointments
            .insert(appointment.id.as_bytes(), serialize_doc(&appointment)?)?;
        Ok(())
    }

    async fn get_appointment(&self, id: &Uuid) -> ClinicResult<Option<Appointment>> {
        self.appointments
            .get(id.as_bytes())?
            .map(|bytes| deserialize_doc(&bytes))
            .transpose()
    }

    async fn update_appointment(&self, appointment: Appointment) -> ClinicResult<()> {
        if self.appointments.get(appointment.id.as_bytes())?.is_none() {
            return Err(ClinicError::NotFound {
                kind: "appointment",
                id: appointment.id.to_string(),
            });
        }
        self.appointments
            .insert(appointment.id.as_bytes(), serialize_doc(&appointment)?)?;
        Ok(())
    }

    async fn appointments_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<Appointment>> {
        let mut found = Vec::new();
        for row in self.appointments.iter() {
            let (_, bytes) = row?;
            let appointment: Appointment = deserialize_doc(&bytes)?;
            if appointment.doctor_id == *doctor_id {
                found.push(appointment);
            }
        }
        sort_appointments(&mut found);
        Ok(found)
    }

    async fn appointments_for_patient(&self, patient_id: &Uuid) -> ClinicResult<Vec<Appointment>> {
        let mut found = Vec::new();
        for row in self.appointments.iter() {
            let (_, bytes) = row?;
            let appointment: Appointment = deserialize_doc(&bytes)?;
            if appointment.patient_id == *patient_id {
                found.push(appointment);
            }
        }
        sort_appointments(&mut found);
        Ok(found)
    }

    async fn all_appointments(&self) -> ClinicResult<Vec<Appointment>> {
        let mut found = Vec::new();
        for row in self.appointments.iter() {
            let (_, bytes) = row?;
            found.push(deserialize_doc::<Appointment>(&bytes)?);
        }
        sort_appointments(&mut found);
        Ok(found)
    }

    async fn insert_template(&self, template: SlotTemplate) -> ClinicResult<()> {
        let key = template_unique_key(&template.doctor_id, &template.name);
        Self::claim_key(
            &self.templates_by_name,
            key.as_bytes(),
            &template.id,
            format!("template {}", template.name),
        )?;
        self.templates
            .insert(template.id.as_bytes(), serialize_doc(&template)?)?;
        Ok(())
    }

    async fn get_template(&self, id: &Uuid) -> ClinicResult<Option<SlotTemplate>> {
        self.templates
            .get(id.as_bytes())?
            .map(|bytes| deserialize_doc(&bytes))
            .transpose()
    }

    async fn delete_template(&self, id: &Uuid) -> ClinicResult<()> {
        let removed = self.templates.remove(id.as_bytes())?;
        let Some(bytes) = removed else {
            return Err(ClinicError::NotFound { kind: "slot template", id: id.to_string() });
        };
        let template: SlotTemplate = deserialize_doc(&bytes)?;
        self.templates_by_name
            .remove(template_unique_key(&template.doctor_id, &template.name).as_bytes())?;
        Ok(())
    }

    async fn templates_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<SlotTemplate>> {
        let mut templates = Vec::new();
        for row in self.templates_by_name.scan_prefix(format!("{}:", doctor_id).as_bytes()) {
            let (_, id_bytes) = row?;
            if let Some(bytes) = self.templates.get(&id_bytes)? {
                templates.push(deserialize_doc::<SlotTemplate>(&bytes)?);
            }
        }
        Ok(templates)
    }

    async fn append_audit(&self, event: AuditEvent) -> ClinicResult<()> {
        self.audit.insert(audit_key(&event), serialize_doc(&event)?)?;
        Ok(())
    }

    async fn recent_audit(&self, limit: usize) -> ClinicResult<Vec<AuditEvent>> {
        let mut events = Vec::with_capacity(limit);
        for row in self.audit.iter().rev().take(limit) {
            let (_, bytes) = row?;
            events.push(deserialize_doc::<AuditEvent>(&bytes)?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use models::slots::slot_grid;
    use models::users::UserRole;

    fn temporary_store() -> ClinicResult<SledStore> {
        SledStore::open(&StoreConfig { temporary: true, ..StoreConfig::default() })
    }

    fn doctor_user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Dr. Test".into(),
            email: email.into(),
            password_hash: "$2b$12$hash".into(),
            role: UserRole::Doctor,
            phone: None,
            address: None,
            gender: None,
            age: None,
            specialization: Some("Cardiology".into()),
            created_at: now,
            updated_at: now,
        }
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[tokio::test]
    async fn test_user_round_trip_and_email_index() -> ClinicResult<()> {
        let store = temporary_store()?;
        let user = doctor_user("lee@clinic.example");
        store.insert_user(user.clone()).await?;

        let by_id = store.get_user(&user.id).await?.unwrap();
        assert_eq!(by_id.email, "lee@clinic.example");
        let by_email = store.get_user_by_email("LEE@clinic.example").await?.unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(store.insert_user(doctor_user("Lee@Clinic.Example")).await.is_err());
        store.delete_user(&user.id).await?;
        assert!(store.get_user_by_email("lee@clinic.example").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_slot_triple_uniqueness_survives_encoding() -> ClinicResult<()> {
        let store = temporary_store()?;
        let doctor = Uuid::new_v4();
        let slot = AvailabilitySlot::new(doctor, june(2), slot_grid()[0]);
        store.insert_slot(slot.clone()).await?;

        let duplicate = AvailabilitySlot::new(doctor, june(2), slot_grid()[0]);
        assert!(matches!(
            store.insert_slot(duplicate).await.unwrap_err(),
            ClinicError::AlreadyExists(_)
        ));

        let fetched = store.get_slot(&slot.id).await?.unwrap();
        assert_eq!(fetched.slot.label(), "09:00-09:30");
        Ok(())
    }

    #[tokio::test]
    async fn test_prefix_scan_orders_a_doctors_calendar() -> ClinicResult<()> {
        let store = temporary_store()?;
        let doctor = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.insert_slot(AvailabilitySlot::new(doctor, june(3), slot_grid()[0])).await?;
        store.insert_slot(AvailabilitySlot::new(doctor, june(2), slot_grid()[9])).await?;
        store.insert_slot(AvailabilitySlot::new(doctor, june(2), slot_grid()[1])).await?;
        store.insert_slot(AvailabilitySlot::new(other, june(2), slot_grid()[0])).await?;

        let slots = store.slots_for_doctor(&doctor).await?;
        let order: Vec<_> = slots.iter().map(|s| (s.date, s.slot.label())).collect();
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], (june(2), "09:30-10:00".into()));
        assert_eq!(order[1], (june(2), "13:30-14:00".into()));
        assert_eq!(order[2].0, june(3));

        let one_day = store.slots_for_doctor_on(&doctor, june(2)).await?;
        assert_eq!(one_day.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_appointment_update_requires_existing_row() -> ClinicResult<()> {
        let store = temporary_store()?;
        let appointment = Appointment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            june(2),
            slot_grid()[0],
            Some("first visit".into()),
        );
        assert!(store.update_appointment(appointment.clone()).await.is_err());

        store.insert_appointment(appointment.clone()).await?;
        let mut updated = appointment.clone();
        updated.transition(models::AppointmentStatus::Confirmed)?;
        store.update_appointment(updated).await?;

        let fetched = store.get_appointment(&appointment.id).await?.unwrap();
        assert_eq!(fetched.status, models::AppointmentStatus::Confirmed);
        assert_eq!(fetched.notes.as_deref(), Some("first visit"));
        Ok(())
    }

    #[tokio::test]
    async fn test_audit_log_reads_back_newest_first() -> ClinicResult<()> {
        let store = temporary_store()?;
        let subject = Uuid::new_v4();
        for i in 0..5 {
            let mut event = AuditEvent::new("test.event", subject, None, format!("event {}", i));
            // Spread the timestamps so key order is deterministic.
            event.timestamp = event.timestamp + chrono::Duration::milliseconds(i);
            store.append_audit(event).await?;
        }
        let events = store.recent_audit(3).await?;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].detail, "event 4");
        assert_eq!(events[2].detail, "event 2");
        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_sees_previous_writes() -> ClinicResult<()> {
        let dir = std::env::temp_dir().join(format!("medbook_sled_test_{}", std::process::id()));
        let config = StoreConfig {
            data_dir: dir.clone(),
            ..StoreConfig::default()
        };
        let user = doctor_user("persist@clinic.example");
        {
            let store = SledStore::open(&config)?;
            store.insert_user(user.clone()).await?;
            store.flush().await?;
            store.close().await?;
        }
        {
            let store = SledStore::open(&config)?;
            let fetched = store.get_user(&user.id).await?.unwrap();
            assert_eq!(fetched.email, "persist@clinic.example");
        }
        let _ = std::fs::remove_dir_all(&dir);
        Ok(())
    }
}
