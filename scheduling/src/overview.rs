// scheduling/src/overview.rs

use std::sync::Arc;

use models::errors::ClinicResult;
use models::{AppointmentStatus, AuditEvent, OverviewStats, UserRole};
use storage::DocumentStore;

/// Number of newest accounts shown on the admin landing page.
const RECENT_USERS: usize = 5;

/// Computes the admin landing-page numbers straight from the store.
#[derive(Clone)]
pub struct OverviewService {
    store: Arc<dyn DocumentStore>,
}

impl OverviewService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        OverviewService { store }
    }

    pub async fn overview(&self) -> ClinicResult<OverviewStats> {
        let users = self.store.all_users().await?;
        let appointments = self.store.all_appointments().await?;
        let today = crate::today();

        let count_role =
            |role: UserRole| users.iter().filter(|u| u.role == role).count();
        let count_status = |status: AppointmentStatus| {
            appointments.iter().filter(|a| a.status == status).count()
        };

        Ok(OverviewStats {
            total_users: users.len(),
            admins: count_role(UserRole::Admin),
            doctors: count_role(UserRole::Doctor),
            patients: count_role(UserRole::Patient),
            total_appointments: appointments.len(),
            pending: count_status(AppointmentStatus::Pending),
            confirmed: count_status(AppointmentStatus::Confirmed),
            cancelled: count_status(AppointmentStatus::Cancelled),
            completed: count_status(AppointmentStatus::Completed),
            today: appointments.iter().filter(|a| a.date == today).count(),
            recent_users: users
                .iter()
                .take(RECENT_USERS)
                .map(|u| u.profile())
                .collect(),
        })
    }

    /// The latest recorded state changes, newest first.
    pub async fn recent_activity(&self, limit: usize) -> ClinicResult<Vec<AuditEvent>> {
        self.store.recent_audit(limit).await
    }
}
