// models/src/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded state change. Written best-effort after scheduling and
/// directory mutations; never consulted on the hot path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    /// Dotted event name, e.g. `appointment.booked`.
    pub event_type: String,
    /// The entity the event is about.
    pub subject_id: Uuid,
    /// Who triggered it, when known.
    pub actor_id: Option<Uuid>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        event_type: &str,
        subject_id: Uuid,
        actor_id: Option<Uuid>,
        detail: impl Into<String>,
    ) -> Self {
        AuditEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            subject_id,
            actor_id,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}
