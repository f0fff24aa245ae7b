use log::warn;

use models::AuditEvent;
use storage::DocumentStore;

/// Appends an event to the audit trail, logging instead of failing when
/// the write goes wrong. Scheduling outcomes never depend on the trail.
pub(crate) async fn record(store: &dyn DocumentStore, event: AuditEvent) {
    let event_type = event.event_type.clone();
    if let Err(e) = store.append_audit(event).await {
        warn!("Failed to record audit event '{}': {}", event_type, e);
    }
}
