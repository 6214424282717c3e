//! services/api/src/office/sweep.rs
//!
//! The overdue sweep: pending debt lines whose due date has passed are marked
//! `Vencido` and the representative is told. Runs under the request lock and
//! a store-wide claim, either on an in-process interval or from the one-shot
//! binary.

use chrono::{DateTime, Utc};
use oficina_core::domain::{DebtStatus, NotificationOutcome};
use oficina_core::sheet_date::parse_sheet_date;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::OfficeService;
use crate::error::OfficeError;

/// How soon the scheduler tries again after finding the sweep taken.
pub const BUSY_RETRY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct MarkedDebt {
    pub debt_id: i64,
    pub matricula: String,
    pub concept: String,
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub examined: usize,
    pub marked: Vec<MarkedDebt>,
    pub notifications: Vec<NotificationOutcome>,
}

impl OfficeService {
    /// Marks every pending line due strictly before `now`. `Busy` when another
    /// sweep holds the store claim. Only lines this sweep actually moved from
    /// `Pendiente` are notified; a line whose write fails is not.
    pub async fn run_overdue_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, OfficeError> {
        let _guard = self.exclusive().await?;
        let Some(lease) = self.store.try_claim_sweep().await? else {
            info!("Another process holds the overdue sweep");
            return Err(OfficeError::Busy);
        };

        let report = self.mark_overdue(now).await;

        if let Err(e) = lease.release().await {
            warn!("Failed to release the overdue sweep claim: {:?}", e);
        }
        report
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> Result<SweepReport, OfficeError> {
        let debts = self.store.list_debts().await?;
        let mut report = SweepReport {
            examined: debts.len(),
            ..Default::default()
        };

        for debt in debts {
            if debt.status != DebtStatus::Pending {
                continue;
            }
            let Some(due) = parse_sheet_date(&debt.due_date) else {
                warn!(
                    "Debt {} ({}) has an unreadable due date '{}'",
                    debt.id, debt.matricula, debt.due_date
                );
                continue;
            };
            if due >= now {
                continue;
            }

            match self.store.mark_overdue_if_pending(debt.id).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Debt {} is no longer pending; left as is", debt.id);
                    continue;
                }
                Err(e) => {
                    error!("Failed to mark debt {} as overdue: {:?}", debt.id, e);
                    continue;
                }
            }
            info!("Debt {} ({} / {}) is now overdue", debt.id, debt.matricula, debt.concept);

            let subject = format!("Pago Vencido - {}", debt.concept);
            let body = format!("El pago de {} está vencido.", debt.concept);
            let outcome = self
                .notify_representative(&debt.matricula, &subject, &body)
                .await;
            report.notifications.push(outcome);
            report.marked.push(MarkedDebt {
                debt_id: debt.id,
                matricula: debt.matricula,
                concept: debt.concept,
            });
        }

        Ok(report)
    }
}

/// Runs the sweep now and then every `every` until `shutdown` is cancelled.
/// A `Busy` sweep is retried after [`BUSY_RETRY`] instead of a full period.
pub fn spawn_overdue_scheduler(
    office: Arc<OfficeService>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let retry = BUSY_RETRY.min(every);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Overdue sweep scheduler stopped.");
                    break;
                }
                _ = ticker.tick() => {
                    match office.run_overdue_sweep(Utc::now()).await {
                        Ok(report) => info!(
                            "Overdue sweep examined {} debts, marked {}",
                            report.examined,
                            report.marked.len()
                        ),
                        Err(OfficeError::Busy) => {
                            info!("Overdue sweep busy; trying again in {:?}", retry);
                            ticker.reset_after(retry);
                        }
                        Err(e) => error!("Overdue sweep failed: {}", e),
                    }
                }
            }
        }
    })
}
