// models/src/lib.rs

// Declare all top-level modules within the 'models' crate
pub mod appointments;
pub mod audit;
pub mod availability;
pub mod errors;
pub mod overview;
pub mod slots;
pub mod users;

// Re-export the core types for crates that use 'models::*'
pub use appointments::{
    Appointment, AppointmentFilter, AppointmentStatus, BookingRequest, RescheduleRequest,
};
pub use audit::AuditEvent;
pub use availability::{
    AvailabilitySlot, BatchOutcome, DatedSlot, SlotPattern, SlotTemplate,
};
pub use errors::{ClinicError, ClinicResult, ValidationError, ValidationResult};
pub use overview::OverviewStats;
pub use slots::{slot_grid, DayPeriod, SlotRange, SlotTime};
pub use users::{Gender, NewUser, User, UserProfile, UserRole, UserUpdate};
