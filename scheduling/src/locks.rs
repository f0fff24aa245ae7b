use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

/// Registry of per-doctor reservation locks.
///
/// Every operation that decides slot ownership for a doctor — booking,
/// rescheduling, removing a published slot — must run its check and its
/// write under that doctor's lock. Holding the lock serializes those
/// operations for one doctor while leaving every other doctor's calendar
/// free to proceed in parallel.
#[derive(Debug, Default)]
pub struct DoctorLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl DoctorLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The lock guarding one doctor's calendar, created on first use.
    pub async fn for_doctor(&self, doctor_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(doctor_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
