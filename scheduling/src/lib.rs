// scheduling/src/lib.rs

pub mod availability;
pub mod booking;
pub mod directory;
pub mod locks;
pub mod overview;

mod audit;

pub use availability::AvailabilityService;
pub use booking::BookingService;
pub use directory::DirectoryService;
pub use locks::DoctorLocks;
pub use overview::OverviewService;

/// The clinic's current day. The service keeps all calendar arithmetic
/// in UTC.
pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
