// models/src/overview.rs

use serde::{Deserialize, Serialize};

use crate::users::UserProfile;

/// Counts behind the admin landing page, computed from the store on
/// demand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverviewStats {
    pub total_users: usize,
    pub admins: usize,
    pub doctors: usize,
    pub patients: usize,
    pub total_appointments: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub completed: usize,
    /// Appointments scheduled for the current day, any status.
    pub today: usize,
    /// Most recently registered accounts, newest first.
    pub recent_users: Vec<UserProfile>,
}
