//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `LedgerStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oficina_core::domain::{
    DebtLine, DebtStatus, ExchangeRateSample, PaymentForm, PaymentMethod, PaymentRecord,
    StudentLink, UserAccount,
};
use oficina_core::ports::{LedgerStore, PortError, PortResult, SweepLease};
use sqlx::pool::PoolConnection;
use sqlx::{FromRow, PgPool, Postgres};
use tracing::{error, warn};

/// Advisory lock key shared by every process that runs the overdue sweep.
const SWEEP_LOCK_ID: i64 = 0x4f56_5357_4545_5000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `LedgerStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    cedula: String,
    password_hash: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> UserAccount {
        UserAccount {
            cedula: self.cedula,
            password_hash: self.password_hash,
            name: self.name,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PaymentRow {
    payment_id: String,
    recorded_at: DateTime<Utc>,
    registration_date: String,
    payment_date: String,
    representative_cedula: String,
    student_name: String,
    paid_months: String,
    school_year: String,
    payment_method: String,
    reference_number: String,
    amount_usd: f64,
    amount_bs: f64,
    status: String,
    observations: String,
    representative_name: String,
    matricula: String,
    payment_form: String,
}
impl PaymentRow {
    fn to_domain(self) -> PaymentRecord {
        let payment_form = PaymentForm::from_label(&self.payment_form).unwrap_or_else(|| {
            warn!(
                "Payment {} has unknown payment form '{}'; reading it as Total",
                self.payment_id, self.payment_form
            );
            PaymentForm::Total
        });
        PaymentRecord {
            id: self.payment_id,
            recorded_at: self.recorded_at,
            registration_date: self.registration_date,
            payment_date: self.payment_date,
            representative_cedula: self.representative_cedula,
            student_name: self.student_name,
            paid_months: self.paid_months,
            school_year: self.school_year,
            payment_method: PaymentMethod::from_label(&self.payment_method),
            reference_number: self.reference_number,
            amount_usd: self.amount_usd,
            amount_bs: self.amount_bs,
            status: self.status,
            observations: self.observations,
            representative_name: self.representative_name,
            matricula: self.matricula,
            payment_form,
        }
    }
}

#[derive(FromRow)]
struct DebtRecord {
    id: i64,
    matricula: String,
    concept: String,
    amount: f64,
    status: String,
    due_date: String,
}
impl DebtRecord {
    /// `None` for a row whose status is not one of the three known labels.
    fn to_domain(self) -> Option<DebtLine> {
        let Some(status) = DebtStatus::from_label(&self.status) else {
            warn!(
                "Skipping debt {} ({}) with unknown status '{}'",
                self.id, self.matricula, self.status
            );
            return None;
        };
        Some(DebtLine {
            id: self.id,
            matricula: self.matricula,
            concept: self.concept,
            amount: self.amount,
            status,
            due_date: self.due_date,
        })
    }
}

/// Decodes a debt scan, leaving out unreadable rows instead of failing the scan.
fn decode_debts(records: Vec<DebtRecord>) -> Vec<DebtLine> {
    records.into_iter().filter_map(DebtRecord::to_domain).collect()
}

#[derive(FromRow)]
struct StudentRecord {
    matricula: String,
    student_name: String,
    representative_name: String,
    representative_email: Option<String>,
    representative_cedula: String,
}
impl StudentRecord {
    fn to_domain(self) -> StudentLink {
        StudentLink {
            matricula: self.matricula,
            student_name: self.student_name,
            representative_name: self.representative_name,
            representative_email: self.representative_email.filter(|e| !e.trim().is_empty()),
            representative_cedula: self.representative_cedula,
        }
    }
}

#[derive(FromRow)]
struct RateRecord {
    rate: f64,
    recorded_on: String,
}
impl RateRecord {
    fn to_domain(self) -> ExchangeRateSample {
        ExchangeRateSample {
            rate: self.rate,
            recorded_on: self.recorded_on,
        }
    }
}

const PAYMENT_COLUMNS: &str = "payment_id, recorded_at, registration_date, payment_date, \
    representative_cedula, student_name, paid_months, school_year, payment_method, \
    reference_number, amount_usd, amount_bs, status, observations, representative_name, \
    matricula, payment_form";

const STUDENT_COLUMNS: &str =
    "matricula, student_name, representative_name, representative_email, representative_cedula";

//=========================================================================================
// Sweep Lease
//=========================================================================================

struct PgSweepLease {
    conn: Option<PoolConnection<Postgres>>,
}

#[async_trait]
impl SweepLease for PgSweepLease {
    async fn release(self: Box<Self>) -> PortResult<()> {
        let mut lease = self;
        let Some(mut conn) = lease.conn.take() else {
            return Ok(());
        };
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(SWEEP_LOCK_ID)
            .execute(&mut *conn)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

impl Drop for PgSweepLease {
    fn drop(&mut self) {
        // Not released: close the session instead of pooling it, which frees the lock.
        if let Some(conn) = self.conn.take() {
            error!("Sweep lease dropped without release; closing its connection");
            drop(conn.detach());
        }
    }
}

//=========================================================================================
// `LedgerStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LedgerStore for DbAdapter {
    async fn find_user(&self, cedula: &str) -> PortResult<Option<UserAccount>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT cedula, password_hash, name, role, created_at FROM users WHERE cedula = $1",
        )
        .bind(cedula)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn append_user(&self, account: UserAccount) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO users (cedula, password_hash, name, role, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&account.cedula)
        .bind(&account.password_hash)
        .bind(&account.name)
        .bind(&account.role)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("User {} already exists", account.cedula))
            }
            other => unexpected(other),
        })?;
        Ok(())
    }

    async fn append_payment(&self, payment: PaymentRecord) -> PortResult<()> {
        let sql = format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        );
        sqlx::query(&sql)
            .bind(&payment.id)
            .bind(payment.recorded_at)
            .bind(&payment.registration_date)
            .bind(&payment.payment_date)
            .bind(&payment.representative_cedula)
            .bind(&payment.student_name)
            .bind(&payment.paid_months)
            .bind(&payment.school_year)
            .bind(payment.payment_method.label())
            .bind(&payment.reference_number)
            .bind(payment.amount_usd)
            .bind(payment.amount_bs)
            .bind(&payment.status)
            .bind(&payment.observations)
            .bind(&payment.representative_name)
            .bind(&payment.matricula)
            .bind(payment.payment_form.as_str())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_payments(&self) -> PortResult<Vec<PaymentRecord>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY row_id ASC");
        let records = sqlx::query_as::<_, PaymentRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(PaymentRow::to_domain).collect())
    }

    async fn debts_for_matricula(&self, matricula: &str) -> PortResult<Vec<DebtLine>> {
        let records = sqlx::query_as::<_, DebtRecord>(
            "SELECT id, matricula, concept, amount, status, due_date FROM debts WHERE matricula = $1 ORDER BY id ASC",
        )
        .bind(matricula)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(decode_debts(records))
    }

    async fn list_debts(&self) -> PortResult<Vec<DebtLine>> {
        let records = sqlx::query_as::<_, DebtRecord>(
            "SELECT id, matricula, concept, amount, status, due_date FROM debts ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(decode_debts(records))
    }

    async fn mark_overdue_if_pending(&self, debt_id: i64) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE debts SET status = $1 WHERE id = $2 AND lower(trim(status)) = 'pendiente'",
        )
        .bind(DebtStatus::Overdue.as_str())
        .bind(debt_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn try_claim_sweep(&self) -> PortResult<Option<Box<dyn SweepLease>>> {
        // Advisory locks belong to the session, so the connection is held with the lease.
        let mut conn = self.pool.acquire().await.map_err(unexpected)?;
        let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(SWEEP_LOCK_ID)
            .fetch_one(&mut *conn)
            .await
            .map_err(unexpected)?;
        if !acquired {
            return Ok(None);
        }
        Ok(Some(Box::new(PgSweepLease { conn: Some(conn) })))
    }

    async fn student_by_matricula(&self, matricula: &str) -> PortResult<Option<StudentLink>> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE matricula = $1 ORDER BY id ASC LIMIT 1"
        );
        let record = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(matricula)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(StudentRecord::to_domain))
    }

    async fn students_for_representative(&self, cedula: &str) -> PortResult<Vec<StudentLink>> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE representative_cedula = $1 ORDER BY id ASC"
        );
        let records = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(cedula)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(StudentRecord::to_domain).collect())
    }

    async fn rate_samples(&self) -> PortResult<Vec<ExchangeRateSample>> {
        let records = sqlx::query_as::<_, RateRecord>(
            "SELECT rate, recorded_on FROM exchange_rates ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(RateRecord::to_domain).collect())
    }
}
