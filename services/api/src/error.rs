//! services/api/src/error.rs
//!
//! Defines the error types for the API service: `OfficeError` for failures
//! of a single office operation (rendered into the response envelope) and
//! `ApiError` for process-level failures returned from the binaries.

use crate::config::ConfigError;
use oficina_core::ports::PortError;

/// Why an office operation failed. The `Display` text is what the caller sees.
#[derive(Debug, thiserror::Error)]
pub enum OfficeError {
    #[error("La cédula ya está registrada.")]
    DuplicateAccount,

    #[error("Cédula o contraseña incorrectos.")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Acción desconocida")]
    UnknownAction(String),

    /// The global request lock could not be taken within the configured wait.
    #[error("El sistema está ocupado. Intente de nuevo en unos segundos.")]
    Busy,

    #[error("Error interno: {0}")]
    Internal(String),

    /// An error that propagated up from one of the core service ports.
    #[error("Error del almacenamiento: {0}")]
    Port(#[from] PortError),
}

/// The primary error type for the `api` service binaries.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Office Error: {0}")]
    Office(#[from] OfficeError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
