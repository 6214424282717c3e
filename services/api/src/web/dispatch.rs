//! services/api/src/web/dispatch.rs
//!
//! The single entry point of the office: resolve the action, decode its
//! payload, run the operation under the global lock, and wrap the result in
//! the `{ success, ... }` envelope. Nothing escapes as an error.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::OfficeError;
use crate::office::OfficeService;
use crate::web::protocol::{
    failure, success, Action, DebtView, DebtsPayload, DebtsResponse, LoginPayload,
    PaymentPayload, PaymentResponse, RateResponse, RegisterPayload, ReportPayload,
    ReportResponse, StudentLookupPayload, StudentView, StudentsResponse, UserResponse,
};

/// Normalizes the raw `data` field: a JSON string is parsed, absence is `{}`.
pub fn payload_value(data: Option<Value>) -> Result<Value, OfficeError> {
    match data {
        None | Some(Value::Null) => Ok(json!({})),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(json!({})),
        Some(Value::String(raw)) => serde_json::from_str(&raw)
            .map_err(|e| OfficeError::Validation(format!("Datos inválidos: {}", e))),
        Some(other) => Ok(other),
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, OfficeError> {
    serde_json::from_value(payload)
        .map_err(|e| OfficeError::Validation(format!("Datos inválidos: {}", e)))
}

/// Runs one action and always returns an envelope.
pub async fn dispatch(office: &OfficeService, action: Option<&str>, data: Option<Value>) -> Value {
    let name = action.unwrap_or_default();
    let Some(action) = Action::from_name(name) else {
        warn!("Unknown action requested: '{}'", name);
        return failure(OfficeError::UnknownAction(name.to_string()).to_string());
    };

    let result = match payload_value(data) {
        Ok(payload) => run(office, action, payload).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(body) => {
            info!("Action {} succeeded", action.name());
            body
        }
        Err(e) => {
            warn!("Action {} failed: {}", action.name(), e);
            let mut envelope = failure(e.to_string());
            if action == Action::GetExchangeRate {
                envelope["rate"] = json!(0);
                envelope["date"] = Value::Null;
            }
            envelope
        }
    }
}

async fn run(office: &OfficeService, action: Action, payload: Value) -> Result<Value, OfficeError> {
    let _guard = office.exclusive().await?;

    let body = match action {
        Action::RegisterPayment => {
            let request: PaymentPayload = decode(payload)?;
            let receipt = office.register_payment(request.into()).await?;
            success(PaymentResponse {
                message: "Pago registrado correctamente".to_string(),
                id: receipt.id,
                notification: receipt.notification.into(),
            })
        }
        Action::GetDebts => {
            let request: DebtsPayload = decode(payload)?;
            let debts = office.debts_for(&request.matricula).await?;
            success(DebtsResponse {
                data: debts.into_iter().map(DebtView::from).collect(),
            })
        }
        Action::GetReport => {
            let request: ReportPayload = decode(payload)?;
            let summary = office.generate_report(request.into()).await?;
            success(ReportResponse { data: summary.into() })
        }
        Action::Register => {
            let request: RegisterPayload = decode(payload)?;
            let account = office.register_user(request.into()).await?;
            success(UserResponse::from_account(account, false))
        }
        Action::Login => {
            let request: LoginPayload = decode(payload)?;
            let account = office.login_user(&request.cedula, &request.password).await?;
            success(UserResponse::from_account(account, true))
        }
        Action::GetExchangeRate => {
            let current = office.current_rate().await?;
            success(RateResponse {
                rate: current.rate,
                date: current.date.map(|d| d.to_rfc3339()),
            })
        }
        Action::GetStudentByCedula => {
            let request: StudentLookupPayload = decode(payload)?;
            let students: Vec<StudentView> = office
                .students_for(&request.cedula)
                .await?
                .into_iter()
                .map(StudentView::from)
                .collect();
            let (matricula, student_name) = students
                .first()
                .map(|s| (s.matricula.clone(), s.student_name.clone()))
                .unwrap_or_default();
            success(StudentsResponse {
                students,
                matricula,
                student_name,
            })
        }
    };
    Ok(body)
}
