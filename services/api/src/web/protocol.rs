//! services/api/src/web/protocol.rs
//!
//! Defines the wire protocol between the virtual office front end and the API
//! server: the action catalog, the payload of each action, and the envelope
//! every response is wrapped in.

use oficina_core::domain::{DebtLine, NotificationOutcome, StudentLink};
use oficina_core::report::ReportSummary;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::office::accounts::{AccountSummary, NewAccount};
use crate::office::payments::PaymentInput;
use crate::office::reports::ReportRequest;

//=========================================================================================
// Actions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RegisterPayment,
    GetDebts,
    GetReport,
    Register,
    Login,
    GetExchangeRate,
    GetStudentByCedula,
}

impl Action {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "registerPayment" => Some(Action::RegisterPayment),
            "getDebts" => Some(Action::GetDebts),
            "getReport" => Some(Action::GetReport),
            "register" => Some(Action::Register),
            "login" => Some(Action::Login),
            "getExchangeRate" => Some(Action::GetExchangeRate),
            "getStudentByCedula" => Some(Action::GetStudentByCedula),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::RegisterPayment => "registerPayment",
            Action::GetDebts => "getDebts",
            Action::GetReport => "getReport",
            Action::Register => "register",
            Action::Login => "login",
            Action::GetExchangeRate => "getExchangeRate",
            Action::GetStudentByCedula => "getStudentByCedula",
        }
    }
}

/// The request as it arrives, from a form post or a JSON body.
/// `data` is either a JSON object or a string holding one.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct ActionRequest {
    pub action: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ActionQuery {
    pub action: Option<String>,
}

//=========================================================================================
// Lenient Field Decoding
//=========================================================================================
// Sheet-era clients send ids and amounts as either strings or numbers.
//=========================================================================================

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = lenient_string(deserializer)?;
    Ok((!s.trim().is_empty()).then_some(s))
}

fn number_from(value: Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("'{}' no es un monto válido", s)),
        other => Err(format!("'{}' no es un monto válido", other)),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_opt_f64(deserializer).map(|v| v.unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => number_from(value).map_err(serde::de::Error::custom),
    }
}

//=========================================================================================
// Action Payloads
//=========================================================================================

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct RegisterPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub cedula: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct LoginPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub cedula: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct DebtsPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub matricula: String,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct StudentLookupPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub cedula: String,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    /// Spanish month name or number 1-12.
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub month: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub payment_method: Option<String>,
}

/// The months/concepts a payment covers: a list from the form, or an already
/// joined string from older clients.
#[derive(Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum PaidMonths {
    List(Vec<String>),
    Joined(String),
}

impl Default for PaidMonths {
    fn default() -> Self {
        PaidMonths::List(Vec::new())
    }
}

impl PaidMonths {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            PaidMonths::List(months) => months,
            PaidMonths::Joined(joined) => oficina_core::domain::split_paid_months(&joined),
        }
    }
}

#[derive(Deserialize, Debug, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub registration_date: String,
    #[serde(default)]
    pub payment_date: String,
    #[serde(default, alias = "representativeId", deserialize_with = "lenient_string")]
    pub representative_cedula: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub paid_months: PaidMonths,
    #[serde(default)]
    pub school_year: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference_number: String,
    #[serde(default, rename = "amountUSD", alias = "amount", deserialize_with = "lenient_f64")]
    pub amount_usd: f64,
    /// When absent the server converts `amountUSD` at the current rate.
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub amount_bs: Option<f64>,
    #[serde(default, alias = "observations")]
    pub description: String,
    #[serde(default)]
    pub representative_name: String,
    #[serde(default, alias = "matricula", deserialize_with = "lenient_string")]
    pub student_matricula: String,
    #[serde(default)]
    pub payment_form: String,
}

impl From<RegisterPayload> for NewAccount {
    fn from(payload: RegisterPayload) -> Self {
        NewAccount {
            cedula: payload.cedula,
            name: payload.name,
            password: payload.password,
        }
    }
}

impl From<ReportPayload> for ReportRequest {
    fn from(payload: ReportPayload) -> Self {
        ReportRequest {
            month: payload.month,
            start_date: payload.start_date,
            end_date: payload.end_date,
            payment_method: payload.payment_method,
        }
    }
}

impl From<PaymentPayload> for PaymentInput {
    fn from(payload: PaymentPayload) -> Self {
        PaymentInput {
            id: payload.id,
            registration_date: payload.registration_date,
            payment_date: payload.payment_date,
            representative_cedula: payload.representative_cedula,
            student_name: payload.student_name,
            paid_months: payload.paid_months.into_vec(),
            school_year: payload.school_year,
            payment_method: payload.payment_method,
            reference_number: payload.reference_number,
            amount_usd: payload.amount_usd,
            amount_bs: payload.amount_bs,
            observations: payload.description,
            representative_name: payload.representative_name,
            matricula: payload.student_matricula,
            payment_form: payload.payment_form,
        }
    }
}

//=========================================================================================
// Response Bodies
//=========================================================================================
// Each body is flattened into the `{ "success": true, ... }` envelope.
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct UserView {
    pub cedula: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct UserResponse {
    pub user: UserView,
}

impl UserResponse {
    /// `register` echoes id and name; `login` adds the role.
    pub fn from_account(account: AccountSummary, with_role: bool) -> Self {
        Self {
            user: UserView {
                cedula: account.cedula,
                name: account.name,
                role: with_role.then_some(account.role),
            },
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NotificationView {
    Sent { recipient: String },
    Skipped { reason: String },
    Failed { recipient: String, reason: String },
}

impl From<NotificationOutcome> for NotificationView {
    fn from(outcome: NotificationOutcome) -> Self {
        match outcome {
            NotificationOutcome::Sent { recipient } => NotificationView::Sent { recipient },
            NotificationOutcome::Skipped { reason } => NotificationView::Skipped { reason },
            NotificationOutcome::Failed { recipient, reason } => {
                NotificationView::Failed { recipient, reason }
            }
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct PaymentResponse {
    pub message: String,
    pub id: String,
    pub notification: NotificationView,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebtView {
    pub month: String,
    pub amount: f64,
    pub status: String,
    pub due_date: String,
}

impl From<DebtLine> for DebtView {
    fn from(debt: DebtLine) -> Self {
        Self {
            month: debt.concept,
            amount: debt.amount,
            status: debt.status.as_str().to_string(),
            due_date: debt.due_date,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct DebtsResponse {
    pub data: Vec<DebtView>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BreakdownView {
    pub category: String,
    pub amount: f64,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub total_amount: f64,
    pub count: usize,
    pub breakdown: Vec<BreakdownView>,
}

impl From<ReportSummary> for ReportView {
    fn from(summary: ReportSummary) -> Self {
        Self {
            total_amount: summary.total_amount,
            count: summary.count,
            breakdown: summary
                .breakdown
                .into_iter()
                .map(|entry| BreakdownView {
                    category: entry.category,
                    amount: entry.amount,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ReportResponse {
    pub data: ReportView,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct RateResponse {
    pub rate: f64,
    /// ISO-8601, or null when the selected row had no readable date.
    pub date: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    pub matricula: String,
    pub student_name: String,
}

impl From<StudentLink> for StudentView {
    fn from(student: StudentLink) -> Self {
        Self {
            matricula: student.matricula,
            student_name: student.student_name,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentsResponse {
    pub students: Vec<StudentView>,
    /// First match, for clients that expect a single student.
    pub matricula: String,
    pub student_name: String,
}

//=========================================================================================
// Envelope
//=========================================================================================

/// `{ "success": true, ...body }`.
pub fn success<T: Serialize>(body: T) -> Value {
    let mut value = serde_json::to_value(body).unwrap_or_else(|_| json!({}));
    match value.as_object_mut() {
        Some(fields) => {
            fields.insert("success".to_string(), Value::Bool(true));
            value
        }
        None => json!({ "success": true, "data": value }),
    }
}

/// `{ "success": false, "message": ... }`.
pub fn failure(message: impl Into<String>) -> Value {
    json!({ "success": false, "message": message.into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_payload_accepts_form_field_names() {
        let payload: PaymentPayload = serde_json::from_value(json!({
            "id": "OV-1234567",
            "paymentDate": "2024-10-01",
            "representativeId": 12345678,
            "studentMatricula": "2024-001",
            "paidMonths": ["Septiembre", "Octubre"],
            "paymentMethod": "Zelle",
            "amount": "150.50",
            "description": "pago doble",
            "paymentForm": "Total"
        }))
        .unwrap();
        assert_eq!(payload.representative_cedula, "12345678");
        assert_eq!(payload.amount_usd, 150.5);
        assert_eq!(payload.amount_bs, None);
        assert_eq!(
            payload.paid_months,
            PaidMonths::List(vec!["Septiembre".to_string(), "Octubre".to_string()])
        );
    }

    #[test]
    fn joined_months_and_numeric_month_filter() {
        let payload: PaymentPayload =
            serde_json::from_value(json!({ "paidMonths": "Enero, Febrero", "amountUSD": 10 }))
                .unwrap();
        assert_eq!(payload.amount_usd, 10.0);
        assert_eq!(payload.paid_months.into_vec(), vec!["Enero", "Febrero"]);

        let report: ReportPayload =
            serde_json::from_value(json!({ "month": 10, "startDate": "", "paymentMethod": "" }))
                .unwrap();
        assert_eq!(report.month.as_deref(), Some("10"));
        assert_eq!(report.start_date, None);
        assert_eq!(report.payment_method, None);
    }

    #[test]
    fn payment_payload_becomes_office_input() {
        let payload: PaymentPayload = serde_json::from_value(json!({
            "paidMonths": "Enero, Febrero",
            "observations": "adelanto",
            "matricula": "2024-001",
            "amountBs": 3030
        }))
        .unwrap();
        let input = PaymentInput::from(payload);
        assert_eq!(input.paid_months, vec!["Enero", "Febrero"]);
        assert_eq!(input.observations, "adelanto");
        assert_eq!(input.matricula, "2024-001");
        assert_eq!(input.amount_bs, Some(3030.0));
        assert_eq!(input.id, None);
    }

    #[test]
    fn bad_amount_is_a_decode_error() {
        let result: Result<PaymentPayload, _> =
            serde_json::from_value(json!({ "amountUSD": "mucho" }));
        assert!(result.is_err());
    }

    #[test]
    fn envelope_flattens_body() {
        let value = success(RateResponse { rate: 310.0, date: None });
        assert_eq!(value, json!({ "success": true, "rate": 310.0, "date": null }));
        assert_eq!(
            failure("Acción desconocida"),
            json!({ "success": false, "message": "Acción desconocida" })
        );
    }

    #[test]
    fn action_names_round_trip() {
        for name in [
            "registerPayment",
            "getDebts",
            "getReport",
            "register",
            "login",
            "getExchangeRate",
            "getStudentByCedula",
        ] {
            assert_eq!(Action::from_name(name).map(|a| a.name()), Some(name));
        }
        assert_eq!(Action::from_name("deleteEverything"), None);
    }
}
