use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use models::errors::ClinicResult;
use models::{Appointment, AuditEvent, AvailabilitySlot, SlotTemplate, User};

use crate::memory_store::MemoryStore;
use crate::sled_store::SledStore;

/// The persistence seam of the service.
///
/// One typed collection per record kind. The store is the single source
/// of truth; everything above it holds only locks and caches.
///
/// Two calls double as uniqueness gates and fail with `AlreadyExists`:
/// `insert_user` / `update_user` on a duplicate normalized email,
/// `insert_slot` on a duplicate (doctor, date, start) triple, and
/// `insert_template` on a duplicate (doctor, name) pair.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    async fn connect(&self) -> ClinicResult<()>;
    fn engine(&self) -> &'static str;
    async fn flush(&self) -> ClinicResult<()>;
    async fn close(&self) -> ClinicResult<()>;

    async fn insert_user(&self, user: User) -> ClinicResult<()>;
    async fn get_user(&self, id: &Uuid) -> ClinicResult<Option<User>>;
    /// Lookup by normalized email.
    async fn get_user_by_email(&self, email: &str) -> ClinicResult<Option<User>>;
    async fn update_user(&self, user: User) -> ClinicResult<()>;
    async fn delete_user(&self, id: &Uuid) -> ClinicResult<()>;
    /// All accounts, newest registration first.
    async fn all_users(&self) -> ClinicResult<Vec<User>>;

    async fn insert_slot(&self, slot: AvailabilitySlot) -> ClinicResult<()>;
    async fn get_slot(&self, id: &Uuid) -> ClinicResult<Option<AvailabilitySlot>>;
    async fn delete_slot(&self, id: &Uuid) -> ClinicResult<()>;
    /// A doctor's published calendar in (date, slot) order.
    async fn slots_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<AvailabilitySlot>>;
    async fn slots_for_doctor_on(
        &self,
        doctor_id: &Uuid,
        date: NaiveDate,
    ) -> ClinicResult<Vec<AvailabilitySlot>>;

    async fn insert_appointment(&self, appointment: Appointment) -> ClinicResult<()>;
    async fn get_appointment(&self, id: &Uuid) -> ClinicResult<Option<Appointment>>;
    async fn update_appointment(&self, appointment: Appointment) -> ClinicResult<()>;
    /// Scheduled-time order, like every appointment listing below.
    async fn appointments_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<Appointment>>;
    async fn appointments_for_patient(&self, patient_id: &Uuid) -> ClinicResult<Vec<Appointment>>;
    async fn all_appointments(&self) -> ClinicResult<Vec<Appointment>>;

    async fn insert_template(&self, template: SlotTemplate) -> ClinicResult<()>;
    async fn get_template(&self, id: &Uuid) -> ClinicResult<Option<SlotTemplate>>;
    async fn delete_template(&self, id: &Uuid) -> ClinicResult<()>;
    async fn templates_for_doctor(&self, doctor_id: &Uuid) -> ClinicResult<Vec<SlotTemplate>>;

    async fn append_audit(&self, event: AuditEvent) -> ClinicResult<()>;
    /// Newest events first.
    async fn recent_audit(&self, limit: usize) -> ClinicResult<Vec<AuditEvent>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Sled,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StorageKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Page-cache budget handed to sled, in bytes.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Open sled on a throwaway directory. Test runs only.
    #[serde(default)]
    pub temporary: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/medbook")
}

fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            kind: StorageKind::default(),
            data_dir: default_data_dir(),
            cache_capacity: default_cache_capacity(),
            temporary: false,
        }
    }
}

/// Builds the engine the config names and connects it.
pub async fn open_store(config: &StoreConfig) -> ClinicResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.kind {
        StorageKind::Memory => Arc::new(MemoryStore::new()),
        StorageKind::Sled => Arc::new(SledStore::open(config)?),
    };
    store.connect().await?;
    info!("Opened {} document store", store.engine());
    Ok(store)
}
