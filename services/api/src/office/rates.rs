//! services/api/src/office/rates.rs
//!
//! Current exchange rate (tasa) lookup.

use oficina_core::rates::{RateHistory, ResolvedRate};

use super::OfficeService;
use crate::error::OfficeError;

impl OfficeService {
    pub(crate) async fn current_rate(&self) -> Result<ResolvedRate, OfficeError> {
        RateHistory::new(self.store.rate_samples().await?)
            .latest()
            .ok_or_else(|| OfficeError::NotFound("No hay tasa de cambio registrada.".to_string()))
    }
}
