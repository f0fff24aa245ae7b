use std::io;
pub use thiserror::Error;
use uuid::Error as UuidError;
use uuid::Uuid;
use anyhow::Error as AnyhowError;
use serde_json::Error as SerdeJsonError;
use serde::{Serialize, Deserialize};
use tokio::task::JoinError;
use chrono::NaiveDate;
#[cfg(feature = "bincode-errors")]
use bincode::error::{DecodeError, EncodeError};

use crate::appointments::AppointmentStatus;

#[derive(Debug, Serialize, Deserialize, Error, Clone)]
pub enum ClinicError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    StorageError(String), // General storage operation error
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Timeout error: {0}")]
    TimeoutError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Failed to acquire lock: {0}")]
    LockError(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),
    #[error("Entity already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid data provided: {0}")]
    InvalidData(String),
    #[error("{kind} {id} was not found")]
    NotFound { kind: &'static str, id: String },
    #[error("doctor {doctor_id} has not published {slot} on {date}")]
    SlotNotPublished { doctor_id: Uuid, date: NaiveDate, slot: String },
    #[error("slot {slot} on {date} is already taken for doctor {doctor_id}")]
    SlotTaken { doctor_id: Uuid, date: NaiveDate, slot: String },
    #[error("patient {patient_id} already has an appointment at {slot} on {date}")]
    BookingConflict { patient_id: Uuid, date: NaiveDate, slot: String },
    #[error("cannot move appointment from {from} to {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("Validation error: {0}")]
    Validation(ValidationError),
    #[cfg(feature = "sled-errors")]
    #[error("Sled error: {0}")]
    Sled(String),
    #[cfg(feature = "bincode-errors")]
    #[error("Bincode decode error: {0}")]
    BincodeDecode(String),
    #[cfg(feature = "bincode-errors")]
    #[error("Bincode encode error: {0}")]
    BincodeEncode(String),
    #[error("UUID parsing or generation error: {0}")]
    Uuid(String),
    #[error("An unknown error occurred.")]
    Unknown,
}

impl From<&str> for ClinicError {
    fn from(error: &str) -> Self {
        ClinicError::InvalidRequest(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ClinicError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ClinicError::TimeoutError("operation timed out".into())
    }
}

impl From<SerdeJsonError> for ClinicError {
    fn from(err: SerdeJsonError) -> Self {
        ClinicError::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<AnyhowError> for ClinicError {
    fn from(err: AnyhowError) -> Self {
        ClinicError::StorageError(format!("Underlying storage operation failed: {}", err))
    }
}

impl From<JoinError> for ClinicError {
    fn from(err: JoinError) -> Self {
        ClinicError::InternalError(format!("Task failed to join: {}", err))
    }
}

impl From<io::Error> for ClinicError {
    fn from(err: io::Error) -> Self {
        ClinicError::Io(format!("IO error: {}", err))
    }
}

impl From<UuidError> for ClinicError {
    fn from(err: UuidError) -> Self {
        ClinicError::Uuid(format!("UUID error: {}", err))
    }
}

impl From<ValidationError> for ClinicError {
    fn from(err: ValidationError) -> Self {
        ClinicError::Validation(err)
    }
}

#[cfg(feature = "sled-errors")]
impl From<sled::Error> for ClinicError {
    fn from(err: sled::Error) -> Self {
        ClinicError::Sled(format!("Sled error: {}", err))
    }
}

#[cfg(feature = "bincode-errors")]
impl From<DecodeError> for ClinicError {
    fn from(err: DecodeError) -> Self {
        ClinicError::BincodeDecode(format!("Bincode decode error: {}", err))
    }
}

#[cfg(feature = "bincode-errors")]
impl From<EncodeError> for ClinicError {
    fn from(err: EncodeError) -> Self {
        ClinicError::BincodeEncode(format!("Bincode encode error: {}", err))
    }
}

#[derive(Debug, Serialize, Deserialize, Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("invalid value provided")]
    InvalidValue,
    #[error("email address '{0}' is invalid")]
    InvalidEmail(String),
    #[error("'{0}' is not a slot start time")]
    InvalidSlotTime(String),
    #[error("'{0}' is not a slot range")]
    InvalidSlotRange(String),
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
    #[error("{0} is in the past")]
    PastDate(NaiveDate),
    #[error("required field '{0}' is missing")]
    MissingField(String),
    #[error("a specialization is required for doctors")]
    MissingSpecialization,
    #[error("only doctors carry a specialization")]
    UnexpectedSpecialization,
    #[error("age {0} is out of range")]
    InvalidAge(i64),
    #[error("recurrence of {0} weeks is out of range (1 to 8)")]
    InvalidRecurrence(u8),
    #[error("user has role {found}, expected {expected}")]
    WrongRole { expected: String, found: String },
    #[error("template has no slots")]
    EmptyTemplate,
    #[error("password hashing failed")]
    PasswordHashingFailed,
    #[error("password verification failed")]
    PasswordVerificationFailed,
}

/// A type alias for a `Result` that returns a `ClinicError` on failure.
pub type ClinicResult<T> = Result<T, ClinicError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;
