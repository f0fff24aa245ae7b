// models/src/users.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

pub const MAX_AGE: i64 = 130;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Doctor,
    Patient,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Doctor => "doctor",
            UserRole::Patient => "patient",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// A stored account.
///
/// The password hash stays inside the service boundary; every read path
/// hands out [`UserProfile`] instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Unique, compared case-insensitively.
    pub email: String,
    /// Bcrypt hash of the user's password.
    pub password_hash: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<i64>,
    /// Doctors only.
    pub specialization: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            phone: self.phone.clone(),
            address: self.address.clone(),
            gender: self.gender,
            age: self.age,
            specialization: self.specialization.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A [`User`] with the credential material stripped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<i64>,
    pub specialization: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        user.profile()
    }
}

/// Registration payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub specialization: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".into()));
        }
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password".into()));
        }
        validate_role_fields(self.role, self.specialization.as_deref())?;
        if let Some(age) = self.age {
            validate_age(age)?;
        }
        Ok(())
    }
}

/// Partial update; `None` leaves a field untouched. The role of an
/// account never changes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub specialization: Option<String>,
}

/// Lowercased, trimmed form used for uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    let trimmed = email.trim();
    let well_formed = trimmed.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    });
    if !well_formed || trimmed.contains(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

pub fn validate_age(age: i64) -> ValidationResult<()> {
    if age <= 0 || age > MAX_AGE {
        return Err(ValidationError::InvalidAge(age));
    }
    Ok(())
}

pub fn validate_role_fields(role: UserRole, specialization: Option<&str>) -> ValidationResult<()> {
    match (role, specialization) {
        (UserRole::Doctor, None) => Err(ValidationError::MissingSpecialization),
        (UserRole::Doctor, Some(s)) if s.trim().is_empty() => {
            Err(ValidationError::MissingSpecialization)
        }
        (UserRole::Admin | UserRole::Patient, Some(_)) => {
            Err(ValidationError::UnexpectedSpecialization)
        }
        _ => Ok(()),
    }
}
