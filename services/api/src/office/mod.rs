//! services/api/src/office/mod.rs
//!
//! The virtual office operations. `OfficeService` owns the store, the mail
//! port and the single lock that serializes every request and every sweep.

pub mod accounts;
pub mod payments;
pub mod rates;
pub mod reports;
pub mod students;
pub mod sweep;

use oficina_core::domain::NotificationOutcome;
use oficina_core::ports::{LedgerStore, NotificationService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::error::OfficeError;

pub use sweep::{spawn_overdue_scheduler, SweepReport};

pub struct OfficeService {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationService>,
    gate: Mutex<()>,
    lock_wait: Duration,
    school_name: String,
}

impl OfficeService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        notifier: Arc<dyn NotificationService>,
        lock_wait: Duration,
        school_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            gate: Mutex::new(()),
            lock_wait,
            school_name: school_name.into(),
        }
    }

    /// Takes the global lock, giving up with `Busy` after the configured wait.
    pub(crate) async fn exclusive(&self) -> Result<MutexGuard<'_, ()>, OfficeError> {
        tokio::time::timeout(self.lock_wait, self.gate.lock())
            .await
            .map_err(|_| {
                warn!("Timed out after {:?} waiting for the office lock", self.lock_wait);
                OfficeError::Busy
            })
    }

    /// Emails the representative linked to `matricula`. Never fails: the
    /// outcome is returned for the caller to report.
    pub(crate) async fn notify_representative(
        &self,
        matricula: &str,
        subject: &str,
        body: &str,
    ) -> NotificationOutcome {
        let email = match self.store.student_by_matricula(matricula).await {
            Ok(student) => student.and_then(|s| s.representative_email),
            Err(e) => {
                error!("Failed to look up the representative of {}: {:?}", matricula, e);
                return NotificationOutcome::Skipped {
                    reason: format!("student lookup failed: {}", e),
                };
            }
        };

        let Some(recipient) = email.filter(|e| !e.trim().is_empty()) else {
            return NotificationOutcome::Skipped {
                reason: format!("no email on file for {}", matricula),
            };
        };

        match self.notifier.send_email(&recipient, subject, body).await {
            Ok(()) => {
                info!("Notification '{}' sent to {}", subject, recipient);
                NotificationOutcome::Sent { recipient }
            }
            Err(e) => {
                warn!("Error sending email to {}: {}", recipient, e);
                NotificationOutcome::Failed {
                    recipient,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::adapters::MemoryLedger;
    use async_trait::async_trait;
    use oficina_core::domain::StudentLink;
    use oficina_core::ports::{PortError, PortResult};
    use std::sync::Mutex as StdMutex;

    /// Records every email instead of sending it; can be told to fail.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: StdMutex<Vec<(String, String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl NotificationService for RecordingNotifier {
        async fn send_email(&self, to: &str, subject: &str, body: &str) -> PortResult<()> {
            if self.fail {
                return Err(PortError::Unexpected("smtp down".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    pub fn student(matricula: &str, name: &str, cedula: &str, email: Option<&str>) -> StudentLink {
        StudentLink {
            matricula: matricula.to_string(),
            student_name: name.to_string(),
            representative_name: "Luis Pérez".to_string(),
            representative_email: email.map(str::to_string),
            representative_cedula: cedula.to_string(),
        }
    }

    pub fn office(
        ledger: Arc<MemoryLedger>,
        notifier: Arc<RecordingNotifier>,
    ) -> OfficeService {
        OfficeService::new(ledger, notifier, Duration::from_millis(200), "Colegio LB")
    }
}
