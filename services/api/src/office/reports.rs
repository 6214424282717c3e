//! services/api/src/office/reports.rs
//!
//! Administrative payment reports.

use oficina_core::report::{aggregate, ReportFilter, ReportSummary};
use tracing::debug;

use super::OfficeService;
use crate::error::OfficeError;

/// Raw report criteria. Any date bound takes precedence over `month`.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub month: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub payment_method: Option<String>,
}

impl OfficeService {
    pub(crate) async fn generate_report(
        &self,
        request: ReportRequest,
    ) -> Result<ReportSummary, OfficeError> {
        let filter = ReportFilter::from_parts(
            request.month.as_deref(),
            request.start_date.as_deref(),
            request.end_date.as_deref(),
            request.payment_method.as_deref(),
        )
        .map_err(|e| OfficeError::Validation(e.to_string()))?;

        let payments = self.store.list_payments().await?;
        let summary = aggregate(&payments, &filter);
        debug!(
            "Report over {} payments matched {} (filter: {:?})",
            payments.len(),
            summary.count,
            filter
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::MemoryLedger;
    use crate::office::payments::PaymentInput;
    use std::sync::Arc;

    fn payment(date: &str, method: &str, months: &str, amount: f64) -> PaymentInput {
        PaymentInput {
            id: None,
            registration_date: date.to_string(),
            payment_date: date.to_string(),
            representative_cedula: "12345678".to_string(),
            student_name: "Ana".to_string(),
            paid_months: vec![months.to_string()],
            school_year: "2024-2025".to_string(),
            payment_method: method.to_string(),
            reference_number: String::new(),
            amount_usd: amount,
            amount_bs: Some(0.0),
            observations: String::new(),
            representative_name: String::new(),
            matricula: "2024-001".to_string(),
            payment_form: String::new(),
        }
    }

    #[tokio::test]
    async fn report_reads_registered_payments() {
        let office = office(Arc::new(MemoryLedger::new()), Arc::default());
        office.register_payment(payment("2024-10-03", "Zelle", "Octubre", 150.0)).await.unwrap();
        office.register_payment(payment("2024-11-03", "Zelle", "Noviembre", 150.0)).await.unwrap();

        let summary = office
            .generate_report(ReportRequest {
                month: Some("10".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.total_amount, 150.0);
    }

    #[tokio::test]
    async fn bad_date_is_a_validation_failure() {
        let office = office(Arc::new(MemoryLedger::new()), Arc::default());
        let err = office
            .generate_report(ReportRequest {
                start_date: Some("mañana".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OfficeError::Validation(_)));
    }
}
