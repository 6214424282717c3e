//! services/api/src/bin/overdue_sweep.rs
//!
//! Runs the overdue sweep once against the configured store and exits.
//! Meant for cron when the in-process scheduler is disabled.

use api_lib::{
    adapters::{open_store, EmailNotifier},
    config::Config,
    error::{ApiError, OfficeError},
    office::OfficeService,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = open_store(&config.store, 1).await?;
    let notifier = Arc::new(EmailNotifier::new(&config.email)?);
    let office = OfficeService::new(store, notifier, config.lock_wait, config.school_name.clone());

    let report = match office.run_overdue_sweep(Utc::now()).await {
        Ok(report) => report,
        Err(OfficeError::Busy) => {
            info!("Another overdue sweep is running; nothing to do.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        "Examined {} debts, marked {} overdue",
        report.examined,
        report.marked.len()
    );
    for (marked, outcome) in report.marked.iter().zip(&report.notifications) {
        info!(
            "  {} / {} (debt {}): {:?}",
            marked.matricula, marked.concept, marked.debt_id, outcome
        );
    }
    Ok(())
}
