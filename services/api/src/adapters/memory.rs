//! services/api/src/adapters/memory.rs
//!
//! An in-memory implementation of the `LedgerStore` port. Rows live in
//! insertion-ordered vectors with hash indexes on the lookup keys, so the
//! per-request work is an index lookup rather than a table scan.

use async_trait::async_trait;
use chrono::Utc;
use oficina_core::domain::{
    DebtLine, DebtStatus, ExchangeRateSample, PaymentRecord, StudentLink, UserAccount,
};
use oficina_core::ports::{LedgerStore, PortError, PortResult, SweepLease};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserAccount>,
    payments: Vec<PaymentRecord>,
    debts: Vec<DebtLine>,
    debts_by_id: HashMap<i64, usize>,
    debts_by_matricula: HashMap<String, Vec<usize>>,
    students: Vec<StudentLink>,
    students_by_matricula: HashMap<String, usize>,
    students_by_representative: HashMap<String, Vec<usize>>,
    rates: Vec<ExchangeRateSample>,
    next_debt_id: i64,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A `LedgerStore` held entirely in process memory.
#[derive(Default)]
pub struct MemoryLedger {
    tables: RwLock<Tables>,
    sweep_claim: Arc<Mutex<()>>,
}

/// Holds the ledger's sweep claim until dropped.
struct MemorySweepLease {
    _claim: OwnedMutexGuard<()>,
}

#[async_trait]
impl SweepLease for MemorySweepLease {
    async fn release(self: Box<Self>) -> PortResult<()> {
        Ok(())
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the same starter rows the Postgres seed migration creates.
    pub async fn seeded() -> Self {
        let ledger = Self::new();
        ledger
            .insert_debt("2024-001", "Septiembre", 150.0, DebtStatus::Paid, "2024-09-05")
            .await;
        ledger
            .insert_debt("2024-001", "Octubre", 150.0, DebtStatus::Pending, "2024-10-05")
            .await;
        ledger
            .insert_rate(303.0, &Utc::now().format("%Y-%m-%d").to_string())
            .await;
        ledger
    }

    /// Appends a debt line and returns its row id.
    pub async fn insert_debt(
        &self,
        matricula: &str,
        concept: &str,
        amount: f64,
        status: DebtStatus,
        due_date: &str,
    ) -> i64 {
        let mut tables = self.tables.write().await;
        tables.next_debt_id += 1;
        let id = tables.next_debt_id;
        let idx = tables.debts.len();
        tables.debts.push(DebtLine {
            id,
            matricula: matricula.to_string(),
            concept: concept.to_string(),
            amount,
            status,
            due_date: due_date.to_string(),
        });
        tables.debts_by_id.insert(id, idx);
        tables
            .debts_by_matricula
            .entry(matricula.to_string())
            .or_default()
            .push(idx);
        id
    }

    pub async fn insert_student(&self, student: StudentLink) {
        let mut tables = self.tables.write().await;
        let idx = tables.students.len();
        // First row wins for a repeated matrícula, as a top-down scan would.
        tables
            .students_by_matricula
            .entry(student.matricula.clone())
            .or_insert(idx);
        tables
            .students_by_representative
            .entry(student.representative_cedula.clone())
            .or_default()
            .push(idx);
        tables.students.push(student);
    }

    pub async fn insert_rate(&self, rate: f64, recorded_on: &str) {
        self.tables.write().await.rates.push(ExchangeRateSample {
            rate,
            recorded_on: recorded_on.to_string(),
        });
    }
}

//=========================================================================================
// `LedgerStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn find_user(&self, cedula: &str) -> PortResult<Option<UserAccount>> {
        Ok(self.tables.read().await.users.get(cedula).cloned())
    }

    async fn append_user(&self, account: UserAccount) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&account.cedula) {
            return Err(PortError::Conflict(format!(
                "User {} already exists",
                account.cedula
            )));
        }
        tables.users.insert(account.cedula.clone(), account);
        Ok(())
    }

    async fn append_payment(&self, payment: PaymentRecord) -> PortResult<()> {
        self.tables.write().await.payments.push(payment);
        Ok(())
    }

    async fn list_payments(&self) -> PortResult<Vec<PaymentRecord>> {
        Ok(self.tables.read().await.payments.clone())
    }

    async fn debts_for_matricula(&self, matricula: &str) -> PortResult<Vec<DebtLine>> {
        let tables = self.tables.read().await;
        let debts = tables
            .debts_by_matricula
            .get(matricula)
            .map(|rows| rows.iter().map(|&idx| tables.debts[idx].clone()).collect())
            .unwrap_or_default();
        Ok(debts)
    }

    async fn list_debts(&self) -> PortResult<Vec<DebtLine>> {
        Ok(self.tables.read().await.debts.clone())
    }

    async fn mark_overdue_if_pending(&self, debt_id: i64) -> PortResult<bool> {
        let mut tables = self.tables.write().await;
        let idx = *tables
            .debts_by_id
            .get(&debt_id)
            .ok_or_else(|| PortError::NotFound(format!("Debt {} not found", debt_id)))?;
        let debt = &mut tables.debts[idx];
        if debt.status != DebtStatus::Pending {
            return Ok(false);
        }
        debt.status = DebtStatus::Overdue;
        Ok(true)
    }

    async fn try_claim_sweep(&self) -> PortResult<Option<Box<dyn SweepLease>>> {
        Ok(self.sweep_claim.clone().try_lock_owned().ok().map(|claim| {
            Box::new(MemorySweepLease { _claim: claim }) as Box<dyn SweepLease>
        }))
    }

    async fn student_by_matricula(&self, matricula: &str) -> PortResult<Option<StudentLink>> {
        let tables = self.tables.read().await;
        Ok(tables
            .students_by_matricula
            .get(matricula)
            .map(|&idx| tables.students[idx].clone()))
    }

    async fn students_for_representative(&self, cedula: &str) -> PortResult<Vec<StudentLink>> {
        let tables = self.tables.read().await;
        let students = tables
            .students_by_representative
            .get(cedula)
            .map(|rows| rows.iter().map(|&idx| tables.students[idx].clone()).collect())
            .unwrap_or_default();
        Ok(students)
    }

    async fn rate_samples(&self) -> PortResult<Vec<ExchangeRateSample>> {
        Ok(self.tables.read().await.rates.clone())
    }
}
