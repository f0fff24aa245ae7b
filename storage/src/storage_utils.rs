use bincode::config;
use serde::de::DeserializeOwned;
use serde::Serialize;

use models::errors::ClinicResult;
use models::{Appointment, AvailabilitySlot};

/// Encodes a document for storage.
pub fn serialize_doc<T: Serialize>(value: &T) -> ClinicResult<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(value, config::standard())?)
}

/// Decodes a stored document.
pub fn deserialize_doc<T: DeserializeOwned>(bytes: &[u8]) -> ClinicResult<T> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, config::standard())?;
    Ok(value)
}

/// Calendar order for published slots.
pub fn sort_slots(slots: &mut [AvailabilitySlot]) {
    slots.sort_by_key(|s| (s.date, s.slot));
}

/// Key form of the (doctor, name) template uniqueness pair. Names are
/// compared case-insensitively.
pub fn template_unique_key(doctor_id: &uuid::Uuid, name: &str) -> String {
    format!("{}:{}", doctor_id, name.trim().to_lowercase())
}

/// Scheduled-time order, ties broken by creation time.
pub fn sort_appointments(appointments: &mut [Appointment]) {
    appointments.sort_by_key(|a| (a.scheduled_at, a.created_at));
}
