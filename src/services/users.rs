use crate::{
    entities::{user, User, UserModel, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input for registering an account. All fields are required by the store;
/// the HTTP layer reports which one is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub region: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// User accounts with argon2-hashed credentials.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Registers a new account. Duplicate usernames and emails are
    /// distinct conflicts so the front end can point at the right field.
    #[instrument(skip(self, input))]
    pub async fn create_user(&self, input: CreateUserInput) -> Result<UserModel, ServiceError> {
        let required = [
            ("username", &input.username),
            ("email", &input.email),
            ("password", &input.password),
            ("phone", &input.phone),
            ("address", &input.address),
            ("city", &input.city),
            ("region", &input.region),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "Field '{}' is required",
                    field
                )));
            }
        }

        let username_taken = User::find()
            .filter(user::Column::Username.eq(&input.username))
            .one(&*self.db)
            .await?
            .is_some();
        if username_taken {
            return Err(ServiceError::Conflict("USERNAME_EXISTS".to_string()));
        }

        let email_taken = User::find()
            .filter(user::Column::Email.eq(&input.email))
            .one(&*self.db)
            .await?
            .is_some();
        if email_taken {
            return Err(ServiceError::Conflict("EMAIL_EXISTS".to_string()));
        }

        let user_id = Uuid::new_v4();
        let password_hash = hash_password(&input.password)?;

        let account = user::ActiveModel {
            id: Set(user_id),
            username: Set(input.username),
            email: Set(input.email),
            password_hash: Set(password_hash),
            phone: Set(input.phone),
            address: Set(input.address),
            city: Set(input.city),
            region: Set(input.region),
            role: Set(input.role.unwrap_or(UserRole::Customer)),
            created_at: Set(Utc::now()),
        };
        let account = account.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user_id))
            .await;

        info!("User registered: {}", user_id);
        Ok(account)
    }

    /// Verifies credentials; `None` means unknown user or wrong password.
    #[instrument(skip(self, password))]
    pub async fn validate_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserModel>, ServiceError> {
        let account = User::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?;

        match account {
            Some(account) if verify_password(password, &account.password_hash) => {
                Ok(Some(account))
            }
            _ => Ok(None),
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserModel>, ServiceError> {
        Ok(User::find_by_id(id).one(&*self.db).await?)
    }

    pub async fn list_users(&self) -> Result<Vec<UserModel>, ServiceError> {
        Ok(User::find()
            .order_by_asc(user::Column::Username)
            .all(&*self.db)
            .await?)
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("secreto123").expect("hash");
        assert!(verify_password("secreto123", &hash));
        assert!(!verify_password("otra-clave", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("secreto123").expect("hash");
        let second = hash_password("secreto123").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }
}
