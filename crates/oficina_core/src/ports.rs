//! crates/oficina_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the virtual office's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store (Postgres, in-memory) and mail transport.

use async_trait::async_trait;

use crate::domain::{DebtLine, ExchangeRateSample, PaymentRecord, StudentLink, UserAccount};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, SMTP).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The five tables behind the office: Users, Payments, Debts, Students and Config.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // --- Users ---
    async fn find_user(&self, cedula: &str) -> PortResult<Option<UserAccount>>;

    /// Appends an account. Fails with `Conflict` when the cédula is taken.
    async fn append_user(&self, account: UserAccount) -> PortResult<()>;

    // --- Payments ---
    async fn append_payment(&self, payment: PaymentRecord) -> PortResult<()>;

    /// Every payment, in insertion order.
    async fn list_payments(&self) -> PortResult<Vec<PaymentRecord>>;

    // --- Debts ---
    async fn debts_for_matricula(&self, matricula: &str) -> PortResult<Vec<DebtLine>>;

    async fn list_debts(&self) -> PortResult<Vec<DebtLine>>;

    /// Sets a line to `Vencido` only while it is still `Pendiente`.
    /// Returns `false` when the line had already moved on.
    async fn mark_overdue_if_pending(&self, debt_id: i64) -> PortResult<bool>;

    /// Claims the overdue sweep for every process sharing this store.
    /// `None` while another holder has it.
    async fn try_claim_sweep(&self) -> PortResult<Option<Box<dyn SweepLease>>>;

    // --- Students ---
    async fn student_by_matricula(&self, matricula: &str) -> PortResult<Option<StudentLink>>;

    async fn students_for_representative(&self, cedula: &str) -> PortResult<Vec<StudentLink>>;

    // --- Exchange rates ---
    /// Rate samples in table order.
    async fn rate_samples(&self) -> PortResult<Vec<ExchangeRateSample>>;
}

/// Proof that this process owns the sweep. Dropping it without `release`
/// still frees the claim, though possibly later.
#[async_trait]
pub trait SweepLease: Send {
    async fn release(self: Box<Self>) -> PortResult<()>;
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends a plain-text email.
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> PortResult<()>;
}
