//! crates/oficina_core/src/domain.rs
//!
//! Defines the pure, core data structures for the virtual office.
//! These structs are independent of any database or serialization format;
//! the positional sheet layout only exists at the storage adapters.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Status every payment row is created with. No operation transitions it.
pub const PAYMENT_INITIAL_STATUS: &str = "Pendiente";

/// Role assigned to every self-registered account.
pub const DEFAULT_ROLE: &str = "Representative";

//=========================================================================================
// Enumerations
//=========================================================================================

/// Lifecycle of a single debt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebtStatus {
    Paid,
    Pending,
    Overdue,
}

impl DebtStatus {
    /// The label stored in the Debts table.
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Paid => "Pagado",
            DebtStatus::Pending => "Pendiente",
            DebtStatus::Overdue => "Vencido",
        }
    }

    /// Case-insensitive, since imported sheets are not consistent.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "pagado" => Some(DebtStatus::Paid),
            "pendiente" => Some(DebtStatus::Pending),
            "vencido" => Some(DebtStatus::Overdue),
            _ => None,
        }
    }
}

/// How the money was sent. Labels match what the payment form offers;
/// anything else is kept verbatim so old rows still group correctly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    Transfer,
    MobilePayment,
    CashUsd,
    CashBs,
    Zelle,
    Binance,
    PointOfSale,
    Other(String),
}

impl PaymentMethod {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Transferencia" => PaymentMethod::Transfer,
            "Pago Móvil" => PaymentMethod::MobilePayment,
            "Efectivo $" => PaymentMethod::CashUsd,
            "Efectivo Bs" => PaymentMethod::CashBs,
            "Zelle" => PaymentMethod::Zelle,
            "Binance" => PaymentMethod::Binance,
            "Punto de Venta" => PaymentMethod::PointOfSale,
            other => PaymentMethod::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PaymentMethod::Transfer => "Transferencia",
            PaymentMethod::MobilePayment => "Pago Móvil",
            PaymentMethod::CashUsd => "Efectivo $",
            PaymentMethod::CashBs => "Efectivo Bs",
            PaymentMethod::Zelle => "Zelle",
            PaymentMethod::Binance => "Binance",
            PaymentMethod::PointOfSale => "Punto de Venta",
            PaymentMethod::Other(label) => label,
        }
    }
}

/// Whether a payment settles a concept in full or is a partial payment (abono).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentForm {
    #[default]
    Total,
    Partial,
}

impl PaymentForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentForm::Total => "Total",
            PaymentForm::Partial => "Abono",
        }
    }

    /// Blank input means `Total`; unknown labels are rejected.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "" | "total" => Some(PaymentForm::Total),
            "abono" | "parcial" => Some(PaymentForm::Partial),
            _ => None,
        }
    }
}

//=========================================================================================
// Table Records
//=========================================================================================

/// One row of the Payments table.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub registration_date: String,
    pub payment_date: String,
    pub representative_cedula: String,
    pub student_name: String,
    /// Paid months/concepts, joined for display. Use [`split_paid_months`] to recover them.
    pub paid_months: String,
    pub school_year: String,
    pub payment_method: PaymentMethod,
    pub reference_number: String,
    pub amount_usd: f64,
    pub amount_bs: f64,
    pub status: String,
    pub observations: String,
    pub representative_name: String,
    pub matricula: String,
    pub payment_form: PaymentForm,
}

/// One row of the Debts table.
#[derive(Debug, Clone)]
pub struct DebtLine {
    /// Store-assigned row key, used for the in-place status update.
    pub id: i64,
    pub matricula: String,
    pub concept: String,
    pub amount: f64,
    pub status: DebtStatus,
    pub due_date: String,
}

/// Links a student to their representative.
#[derive(Debug, Clone)]
pub struct StudentLink {
    pub matricula: String,
    pub student_name: String,
    pub representative_name: String,
    pub representative_email: Option<String>,
    pub representative_cedula: String,
}

// Only used internally for register/login - contains the password hash
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub cedula: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the Config table: a rate and the raw date cell it was recorded with.
#[derive(Debug, Clone)]
pub struct ExchangeRateSample {
    pub rate: f64,
    pub recorded_on: String,
}

//=========================================================================================
// Notification Side Channel
//=========================================================================================

/// What happened to the email that accompanies a payment or an overdue mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent { recipient: String },
    Skipped { reason: String },
    Failed { recipient: String, reason: String },
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationOutcome::Sent { .. })
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Generates a transaction id of the form `OV-XXXXXXX` (seven digits, no leading zero).
pub fn generate_transaction_id() -> String {
    let n = (Uuid::new_v4().as_u128() % 9_000_000) as u64 + 1_000_000;
    format!("OV-{}", n)
}

pub fn join_paid_months(months: &[String]) -> String {
    months
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn split_paid_months(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_have_seven_digits() {
        for _ in 0..200 {
            let id = generate_transaction_id();
            let digits = id.strip_prefix("OV-").expect("prefix");
            assert_eq!(digits.len(), 7, "{id}");
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
            assert!(!digits.starts_with('0'));
        }
    }

    #[test]
    fn paid_months_survive_join_and_split() {
        let months = vec!["Septiembre".to_string(), " Octubre ".to_string(), "".to_string()];
        let joined = join_paid_months(&months);
        assert_eq!(joined, "Septiembre, Octubre");
        assert_eq!(split_paid_months(&joined), vec!["Septiembre", "Octubre"]);
    }

    #[test]
    fn unknown_payment_methods_keep_their_label() {
        let method = PaymentMethod::from_label("Cripto");
        assert_eq!(method, PaymentMethod::Other("Cripto".to_string()));
        assert_eq!(method.label(), "Cripto");
        assert_eq!(PaymentMethod::from_label("Zelle"), PaymentMethod::Zelle);
    }

    #[test]
    fn payment_form_accepts_blank_and_abono() {
        assert_eq!(PaymentForm::from_label(""), Some(PaymentForm::Total));
        assert_eq!(PaymentForm::from_label("Abono"), Some(PaymentForm::Partial));
        assert_eq!(PaymentForm::from_label("mitad"), None);
    }

    #[test]
    fn debt_status_ignores_case_and_padding() {
        assert_eq!(DebtStatus::from_label("pendiente"), Some(DebtStatus::Pending));
        assert_eq!(DebtStatus::from_label(" VENCIDO "), Some(DebtStatus::Overdue));
        assert_eq!(DebtStatus::from_label("Pagado"), Some(DebtStatus::Paid));
        assert_eq!(DebtStatus::from_label(""), None);
    }
}
