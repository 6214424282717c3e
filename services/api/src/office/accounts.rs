//! services/api/src/office/accounts.rs
//!
//! Representative registration and login by cédula and password.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use oficina_core::domain::{UserAccount, DEFAULT_ROLE};
use oficina_core::ports::PortError;
use tracing::{error, info};

use super::OfficeService;
use crate::error::OfficeError;

/// What a representative signs up with.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub cedula: String,
    pub name: String,
    pub password: String,
}

/// The public fields of an account, as returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    pub cedula: String,
    pub name: String,
    pub role: String,
}

fn require<'a>(value: &'a str, field: &str) -> Result<&'a str, OfficeError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(OfficeError::Validation(format!(
            "Faltan datos requeridos: {}",
            field
        )));
    }
    Ok(value)
}

fn hash_password(password: &str) -> Result<String, OfficeError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            OfficeError::Internal("No se pudo procesar la contraseña".to_string())
        })
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("Stored password hash could not be parsed: {:?}", e);
            false
        }
    }
}

impl OfficeService {
    pub(crate) async fn register_user(
        &self,
        request: NewAccount,
    ) -> Result<AccountSummary, OfficeError> {
        let cedula = require(&request.cedula, "cedula")?;
        let name = require(&request.name, "name")?;
        if request.password.is_empty() {
            return Err(OfficeError::Validation(
                "Faltan datos requeridos: password".to_string(),
            ));
        }

        if self.store.find_user(cedula).await?.is_some() {
            info!("Registration rejected: cédula {} already exists", cedula);
            return Err(OfficeError::DuplicateAccount);
        }

        let account = UserAccount {
            cedula: cedula.to_string(),
            password_hash: hash_password(&request.password)?,
            name: name.to_string(),
            role: DEFAULT_ROLE.to_string(),
            created_at: Utc::now(),
        };
        let summary = AccountSummary {
            cedula: account.cedula.clone(),
            name: account.name.clone(),
            role: account.role.clone(),
        };

        self.store.append_user(account).await.map_err(|e| match e {
            PortError::Conflict(_) => OfficeError::DuplicateAccount,
            other => OfficeError::Port(other),
        })?;

        info!("Registered representative {}", summary.cedula);
        Ok(summary)
    }

    pub(crate) async fn login_user(
        &self,
        cedula: &str,
        password: &str,
    ) -> Result<AccountSummary, OfficeError> {
        let cedula = cedula.trim();
        let account = self
            .store
            .find_user(cedula)
            .await?
            .ok_or(OfficeError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash) {
            return Err(OfficeError::InvalidCredentials);
        }

        Ok(AccountSummary {
            cedula: account.cedula,
            name: account.name,
            role: account.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::MemoryLedger;
    use std::sync::Arc;

    fn registration(cedula: &str, name: &str, password: &str) -> NewAccount {
        NewAccount {
            cedula: cedula.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let office = office(Arc::new(MemoryLedger::new()), Arc::default());
        let created = office
            .register_user(registration("12345678", "Luis Pérez", "secreto"))
            .await
            .unwrap();
        assert_eq!(created.cedula, "12345678");
        assert_eq!(created.role, DEFAULT_ROLE);

        let user = office.login_user("12345678", "secreto").await.unwrap();
        assert_eq!(user.name, "Luis Pérez");
        assert_eq!(user.role, "Representative");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_id_are_invalid_credentials() {
        let office = office(Arc::new(MemoryLedger::new()), Arc::default());
        office
            .register_user(registration("12345678", "Luis", "secreto"))
            .await
            .unwrap();

        assert!(matches!(
            office.login_user("12345678", "otra").await,
            Err(OfficeError::InvalidCredentials)
        ));
        assert!(matches!(
            office.login_user("999", "secreto").await,
            Err(OfficeError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn login_trims_the_cedula() {
        let office = office(Arc::new(MemoryLedger::new()), Arc::default());
        office
            .register_user(registration(" 12345678 ", "Luis", "secreto"))
            .await
            .unwrap();
        let user = office.login_user("12345678 ", "secreto").await.unwrap();
        assert_eq!(user.cedula, "12345678");
    }

    #[tokio::test]
    async fn second_registration_is_duplicate() {
        let office = office(Arc::new(MemoryLedger::new()), Arc::default());
        office
            .register_user(registration("12345678", "Luis", "a"))
            .await
            .unwrap();
        let err = office
            .register_user(registration("12345678", "Otro", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, OfficeError::DuplicateAccount));
        assert_eq!(err.to_string(), "La cédula ya está registrada.");
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let office = office(Arc::new(MemoryLedger::new()), Arc::default());
        assert!(matches!(
            office.register_user(registration(" ", "Luis", "a")).await,
            Err(OfficeError::Validation(_))
        ));
        assert!(matches!(
            office.register_user(registration("1", "Luis", "")).await,
            Err(OfficeError::Validation(_))
        ));
    }

    #[test]
    fn stored_hash_is_not_the_password() {
        let hash = hash_password("secreto").unwrap();
        assert_ne!(hash, "secreto");
        assert!(verify_password("secreto", &hash));
        assert!(!verify_password("secreto", "not-a-phc-string"));
    }
}
