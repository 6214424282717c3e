pub mod db;
pub mod email;
pub mod memory;

pub use db::DbAdapter;
pub use email::EmailNotifier;
pub use memory::MemoryLedger;

use oficina_core::ports::LedgerStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::StoreBackend;
use crate::error::ApiError;

/// Opens the configured store. Postgres is migrated before it is handed out.
pub async fn open_store(
    backend: &StoreBackend,
    max_connections: u32,
) -> Result<Arc<dyn LedgerStore>, ApiError> {
    match backend {
        StoreBackend::Postgres { database_url } => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Ok(Arc::new(db_adapter))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart.");
            Ok(Arc::new(MemoryLedger::seeded().await))
        }
    }
}
