// scheduling/src/directory.rs
//
// Account registration, credential checks, and upkeep. Password hashes
// never leave this module; every read path hands out profiles.

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use tokio::task;
use uuid::Uuid;

use models::errors::{ClinicError, ClinicResult, ValidationError};
use models::users::{normalize_email, validate_age, validate_email, validate_role_fields};
use models::{AuditEvent, NewUser, User, UserProfile, UserRole, UserUpdate};
use storage::DocumentStore;

use crate::audit;

/// Loads a user and checks the role a scheduling call expects of them.
pub(crate) async fn require_role(
    store: &dyn DocumentStore,
    id: &Uuid,
    expected: UserRole,
) -> ClinicResult<User> {
    let user = store
        .get_user(id)
        .await?
        .ok_or_else(|| ClinicError::NotFound { kind: "user", id: id.to_string() })?;
    if user.role != expected {
        return Err(ValidationError::WrongRole {
            expected: expected.to_string(),
            found: user.role.to_string(),
        }
        .into());
    }
    Ok(user)
}

/// Bcrypt runs on the blocking pool; a hash takes long enough to stall
/// the reactor otherwise.
async fn hash_password(password: String) -> ClinicResult<String> {
    task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await?
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ClinicError::Validation(ValidationError::PasswordHashingFailed)
        })
}

async fn verify_password(password: String, hash: String) -> ClinicResult<bool> {
    task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await?
        .map_err(|e| {
            error!("Password verification failed: {}", e);
            ClinicError::Validation(ValidationError::PasswordVerificationFailed)
        })
}

/// The user directory behind registration, login, and the admin pages.
#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn DocumentStore>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        DirectoryService { store }
    }

    /// Creates an account. Emails are stored in their normalized form
    /// and must be unique; doctors must carry a specialization.
    pub async fn register(&self, payload: NewUser) -> ClinicResult<UserProfile> {
        payload.validate()?;
        let password_hash = hash_password(payload.password).await?;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            email: normalize_email(&payload.email),
            password_hash,
            role: payload.role,
            phone: payload.phone,
            address: payload.address,
            gender: payload.gender,
            age: payload.age,
            specialization: payload.specialization.map(|s| s.trim().to_string()),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(user.clone()).await?;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(
                "user.registered",
                user.id,
                None,
                format!("{} {}", user.role, user.email),
            ),
        )
        .await;
        info!("Registered {} account {}", user.role, user.id);
        Ok(user.profile())
    }

    /// Checks a login pair. Unknown email and wrong password fail the
    /// same way, so callers cannot probe for registered addresses.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> ClinicResult<UserProfile> {
        let Some(user) = self.store.get_user_by_email(email).await? else {
            warn!("Login attempt for an unknown email");
            return Err(ClinicError::InvalidCredentials);
        };
        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            warn!("Login attempt with a wrong password for user {}", user.id);
            return Err(ClinicError::InvalidCredentials);
        }
        Ok(user.profile())
    }

    pub async fn get_user(&self, id: Uuid) -> ClinicResult<UserProfile> {
        let user = self
            .store
            .get_user(&id)
            .await?
            .ok_or_else(|| ClinicError::NotFound { kind: "user", id: id.to_string() })?;
        Ok(user.profile())
    }

    pub async fn find_by_email(&self, email: &str) -> ClinicResult<UserProfile> {
        let user = self
            .store
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| ClinicError::NotFound { kind: "user", id: email.to_string() })?;
        Ok(user.profile())
    }

    /// Every account, newest first.
    pub async fn list_users(&self) -> ClinicResult<Vec<UserProfile>> {
        Ok(self
            .store
            .all_users()
            .await?
            .iter()
            .map(User::profile)
            .collect())
    }

    pub async fn list_doctors(&self) -> ClinicResult<Vec<UserProfile>> {
        self.list_by_role(UserRole::Doctor).await
    }

    pub async fn list_patients(&self) -> ClinicResult<Vec<UserProfile>> {
        self.list_by_role(UserRole::Patient).await
    }

    /// Applies a partial update. The role of an account never changes;
    /// a new email must still be unique; a new password is re-hashed
    /// before it is stored.
    pub async fn update_user(&self, id: Uuid, update: UserUpdate) -> ClinicResult<UserProfile> {
        let mut user = self
            .store
            .get_user(&id)
            .await?
            .ok_or_else(|| ClinicError::NotFound { kind: "user", id: id.to_string() })?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(ValidationError::MissingField("name".into()).into());
            }
            user.name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            validate_email(&email)?;
            user.email = normalize_email(&email);
        }
        if let Some(password) = update.password {
            if password.is_empty() {
                return Err(ValidationError::MissingField("password".into()).into());
            }
            user.password_hash = hash_password(password).await?;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(address) = update.address {
            user.address = Some(address);
        }
        if let Some(gender) = update.gender {
            user.gender = Some(gender);
        }
        if let Some(age) = update.age {
            validate_age(age)?;
            user.age = Some(age);
        }
        if let Some(specialization) = update.specialization {
            validate_role_fields(user.role, Some(&specialization))?;
            user.specialization = Some(specialization.trim().to_string());
        }
        user.updated_at = Utc::now();
        self.store.update_user(user.clone()).await?;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new("user.updated", id, None, user.email.clone()),
        )
        .await;
        info!("Updated account {}", id);
        Ok(user.profile())
    }

    /// Removes an account. Refused while the user still has pending or
    /// confirmed appointments on either side of the calendar.
    pub async fn delete_user(&self, id: Uuid) -> ClinicResult<()> {
        let user = self
            .store
            .get_user(&id)
            .await?
            .ok_or_else(|| ClinicError::NotFound { kind: "user", id: id.to_string() })?;
        let appointments = match user.role {
            UserRole::Doctor => self.store.appointments_for_doctor(&id).await?,
            UserRole::Patient => self.store.appointments_for_patient(&id).await?,
            UserRole::Admin => Vec::new(),
        };
        let active = appointments.iter().filter(|a| a.status.holds_slot()).count();
        if active > 0 {
            warn!("Refusing to delete user {}: {} active appointments", id, active);
            return Err(ClinicError::InvalidRequest(format!(
                "user {} still has {} active appointments",
                id, active
            )));
        }
        self.store.delete_user(&id).await?;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new("user.deleted", id, None, format!("{} {}", user.role, user.email)),
        )
        .await;
        info!("Deleted {} account {}", user.role, id);
        Ok(())
    }

    async fn list_by_role(&self, role: UserRole) -> ClinicResult<Vec<UserProfile>> {
        Ok(self
            .store
            .all_users()
            .await?
            .into_iter()
            .filter(|u| u.role == role)
            .map(|u| u.profile())
            .collect())
    }
}
