//! services/api/src/office/payments.rs
//!
//! Payment registration and debt lookup.

use chrono::Utc;
use oficina_core::domain::{
    generate_transaction_id, join_paid_months, DebtLine, NotificationOutcome, PaymentForm,
    PaymentMethod, PaymentRecord, PAYMENT_INITIAL_STATUS,
};
use oficina_core::rates::{convert_to_local, RateHistory};
use tracing::{info, warn};

use super::OfficeService;
use crate::error::OfficeError;

/// A payment as submitted. `id` and `amount_bs` are filled in when absent.
#[derive(Debug, Clone, Default)]
pub struct PaymentInput {
    pub id: Option<String>,
    pub registration_date: String,
    pub payment_date: String,
    pub representative_cedula: String,
    pub student_name: String,
    pub paid_months: Vec<String>,
    pub school_year: String,
    pub payment_method: String,
    pub reference_number: String,
    pub amount_usd: f64,
    pub amount_bs: Option<f64>,
    pub observations: String,
    pub representative_name: String,
    pub matricula: String,
    /// `Total` or `Abono`; blank means `Total`.
    pub payment_form: String,
}

/// What `registerPayment` hands back: the transaction id and what became of the email.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub id: String,
    pub notification: NotificationOutcome,
}

impl OfficeService {
    pub(crate) async fn register_payment(
        &self,
        input: PaymentInput,
    ) -> Result<PaymentReceipt, OfficeError> {
        let id = input
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_transaction_id);

        let payment_form = PaymentForm::from_label(&input.payment_form).ok_or_else(|| {
            OfficeError::Validation(format!("Forma de pago inválida: {}", input.payment_form))
        })?;

        let amount_bs = match input.amount_bs {
            Some(amount) => amount,
            None => self.amount_in_local_currency(input.amount_usd).await?,
        };

        let now = Utc::now();
        let registration_date = if input.registration_date.trim().is_empty() {
            now.format("%Y-%m-%d").to_string()
        } else {
            input.registration_date
        };

        let record = PaymentRecord {
            id: id.clone(),
            recorded_at: now,
            registration_date,
            payment_date: input.payment_date,
            representative_cedula: input.representative_cedula,
            student_name: input.student_name,
            paid_months: join_paid_months(&input.paid_months),
            school_year: input.school_year,
            payment_method: PaymentMethod::from_label(&input.payment_method),
            reference_number: input.reference_number,
            amount_usd: input.amount_usd,
            amount_bs,
            status: PAYMENT_INITIAL_STATUS.to_string(),
            observations: input.observations,
            representative_name: input.representative_name,
            matricula: input.matricula.trim().to_string(),
            payment_form,
        };
        let matricula = record.matricula.clone();

        self.store.append_payment(record).await?;
        info!("Payment {} registered for matrícula {}", id, matricula);

        let subject = format!("Confirmación de Pago - {} - {}", self.school_name, id);
        let body = format!(
            "Estimado Representante, hemos recibido su registro de pago exitosamente (ID: {}).",
            id
        );
        let notification = self.notify_representative(&matricula, &subject, &body).await;

        Ok(PaymentReceipt { id, notification })
    }

    /// Converts with the current rate; zero when no rate has been recorded.
    async fn amount_in_local_currency(&self, amount_usd: f64) -> Result<f64, OfficeError> {
        let history = RateHistory::new(self.store.rate_samples().await?);
        match history.latest() {
            Some(current) => Ok(convert_to_local(amount_usd, current.rate)),
            None => {
                warn!("No exchange rate recorded; storing the Bs amount as 0");
                Ok(0.0)
            }
        }
    }

    pub(crate) async fn debts_for(&self, matricula: &str) -> Result<Vec<DebtLine>, OfficeError> {
        let matricula = matricula.trim();
        if matricula.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.debts_for_matricula(matricula).await?)
    }
}
