//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the two endpoints of the office and the
//! master definition of the OpenAPI document.

use crate::web::dispatch::dispatch;
use crate::web::protocol::{failure, ActionQuery, ActionRequest};
use crate::web::state::AppState;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::header::CONTENT_TYPE,
    response::Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use utoipa::{OpenApi, ToSchema};

/// Text served on `GET /`.
pub const STATUS_MESSAGE: &str =
    "La API de la Oficina Virtual está activa. Por favor utilice peticiones POST desde la aplicación.";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(status_handler, action_handler),
    components(schemas(ActionRequest, EnvelopeDoc)),
    tags(
        (name = "Oficina Virtual API", description = "Single-endpoint action API for school payments and accounts.")
    )
)]
pub struct ApiDoc;

/// Shape shared by every response. Action-specific fields sit next to `success`.
#[derive(Serialize, ToSchema)]
pub struct EnvelopeDoc {
    success: bool,
    /// Present on failures and on `registerPayment`.
    message: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Liveness text for browsers that open the endpoint directly.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "The service is up", body = String))
)]
pub async fn status_handler() -> &'static str {
    STATUS_MESSAGE
}

/// Run one action.
///
/// The body is a form (`action`, `data` as a JSON string) or a JSON object
/// `{ "action": ..., "data": ... }`. `action` may also be given in the query.
/// Failures are reported in the envelope; the status is always 200.
#[utoipa::path(
    post,
    path = "/",
    request_body(
        content = ActionRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "The action name and its payload."
    ),
    params(("action" = Option<String>, Query, description = "Action name, when not sent in the body.")),
    responses((status = 200, description = "Result envelope", body = EnvelopeDoc))
)]
pub async fn action_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActionQuery>,
    request: Request,
) -> Json<Value> {
    let parsed = match read_action_request(&state, request).await {
        Ok(parsed) => parsed,
        Err(message) => {
            warn!("Unreadable request body: {}", message);
            return Json(failure(message));
        }
    };

    let action = parsed.action.filter(|a| !a.trim().is_empty()).or(query.action);
    Json(dispatch(&state.office, action.as_deref(), parsed.data).await)
}

/// Decodes the body according to its content type. Anything that is not a
/// form is read as JSON, so `text/plain` posts from fetch work too.
async fn read_action_request(
    state: &Arc<AppState>,
    request: Request,
) -> Result<ActionRequest, String> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let axum::Form(parsed) = axum::Form::<ActionRequest>::from_request(request, state)
            .await
            .map_err(|e| e.body_text())?;
        return Ok(parsed);
    }

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| e.body_text())?;
        let mut parsed = ActionRequest::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
            let name = field.name().unwrap_or_default().to_string();
            let text = field.text().await.map_err(|e| e.body_text())?;
            match name.as_str() {
                "action" => parsed.action = Some(text),
                "data" => parsed.data = Some(Value::String(text)),
                _ => {}
            }
        }
        return Ok(parsed);
    }

    let body = Bytes::from_request(request, state)
        .await
        .map_err(|e| e.body_text())?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ActionRequest::default());
    }
    serde_json::from_slice(&body).map_err(|e| format!("Cuerpo de la petición inválido: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedger;
    use crate::config::Config;
    use crate::office::test_support::{office, student, RecordingNotifier};
    use crate::web::router;
    use axum_test::TestServer;
    use serde_json::json;

    fn memory_config() -> Config {
        Config::from_lookup(|key| (key == "STORE_BACKEND").then(|| "memory".to_string())).unwrap()
    }

    fn server_for(ledger: Arc<MemoryLedger>, notifier: Arc<RecordingNotifier>) -> (TestServer, Arc<AppState>) {
        let state = Arc::new(AppState {
            office: Arc::new(office(ledger, notifier)),
            config: Arc::new(memory_config()),
        });
        let server = TestServer::new(router(state.clone()).unwrap()).unwrap();
        (server, state)
    }

    fn server() -> TestServer {
        server_for(Arc::new(MemoryLedger::new()), Arc::default()).0
    }

    async fn post_form(server: &TestServer, action: &str, data: Value) -> Value {
        let data = data.to_string();
        server
            .post("/")
            .form(&[("action", action), ("data", data.as_str())])
            .await
            .json::<Value>()
    }

    async fn post_json(server: &TestServer, action: &str, data: Value) -> Value {
        server
            .post("/")
            .json(&json!({ "action": action, "data": data }))
            .await
            .json::<Value>()
    }

    #[tokio::test]
    async fn get_reports_that_the_service_is_up() {
        let response = server().get("/").await;
        response.assert_status_ok();
        assert_eq!(response.text(), STATUS_MESSAGE);
        assert!(response.headers().contains_key(crate::web::middleware::REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn login_after_form_registration() {
        let server = server();
        let registered = post_form(
            &server,
            "register",
            json!({ "cedula": "12345678", "name": "Luis Pérez", "password": "secreto" }),
        )
        .await;
        assert_eq!(registered["success"], json!(true));

        let ok = post_form(&server, "login", json!({ "cedula": "12345678", "password": "secreto" })).await;
        assert_eq!(ok["success"], json!(true));
        assert_eq!(ok["user"]["name"], json!("Luis Pérez"));
        assert_eq!(ok["user"]["role"], json!("Representative"));

        let wrong = post_form(&server, "login", json!({ "cedula": "12345678", "password": "otra" })).await;
        assert_eq!(wrong["success"], json!(false));
        assert_eq!(wrong["message"], json!("Cédula o contraseña incorrectos."));
    }

    #[tokio::test]
    async fn second_registration_of_a_cedula_fails() {
        let server = server();
        let account = json!({ "cedula": "12345678", "name": "Luis", "password": "a" });
        assert_eq!(post_json(&server, "register", account.clone()).await["success"], json!(true));

        let again = post_json(&server, "register", account).await;
        assert_eq!(again["success"], json!(false));
        assert_eq!(again["message"], json!("La cédula ya está registrada."));
    }

    #[tokio::test]
    async fn debts_are_listed_per_matricula() {
        let ledger = Arc::new(MemoryLedger::seeded().await);
        ledger
            .insert_debt("2024-002", "Octubre", 120.0, oficina_core::domain::DebtStatus::Pending, "2024-10-05")
            .await;
        let (server, _) = server_for(ledger, Arc::default());

        let debts = server
            .post("/")
            .add_query_param("action", "getDebts")
            .json(&json!({ "data": { "matricula": "2024-001" } }))
            .await
            .json::<Value>();
        assert_eq!(debts["success"], json!(true));
        assert_eq!(
            debts["data"],
            json!([
                { "month": "Septiembre", "amount": 150.0, "status": "Pagado", "dueDate": "2024-09-05" },
                { "month": "Octubre", "amount": 150.0, "status": "Pendiente", "dueDate": "2024-10-05" }
            ])
        );

        let none = post_form(&server, "getDebts", json!({ "matricula": "2024-999" })).await;
        assert_eq!(none, json!({ "success": true, "data": [] }));
    }

    async fn pay(server: &TestServer, date: &str, method: &str, months: Value, usd: f64) {
        let response = post_json(
            server,
            "registerPayment",
            json!({
                "paymentDate": date,
                "representativeId": "12345678",
                "studentName": "Ana Pérez",
                "studentMatricula": "2024-001",
                "paidMonths": months,
                "schoolYear": "2024-2025",
                "paymentMethod": method,
                "referenceNumber": "0001",
                "amountUSD": usd,
                "amountBs": usd * 300.0,
                "paymentForm": "Total"
            }),
        )
        .await;
        assert_eq!(response["success"], json!(true));
        assert_eq!(response["message"], json!("Pago registrado correctamente"));
        assert!(response["id"].as_str().unwrap().starts_with("OV-"));
    }

    #[tokio::test]
    async fn report_totals_follow_the_filter() {
        let server = server();
        pay(&server, "2024-10-10", "Zelle", json!(["Octubre"]), 100.0).await;
        pay(&server, "2024-10-20", "Transferencia", json!(["Octubre"]), 50.0).await;
        pay(&server, "2024-09-15", "Zelle", json!(["Septiembre", "Octubre"]), 70.0).await;

        let october = post_form(&server, "getReport", json!({ "month": "Octubre" })).await;
        assert_eq!(october["data"]["totalAmount"], json!(150.0));
        assert_eq!(october["data"]["count"], json!(2));

        let range_wins = post_form(
            &server,
            "getReport",
            json!({ "month": "Octubre", "startDate": "2024-09-01", "endDate": "2024-09-30" }),
        )
        .await;
        assert_eq!(range_wins["data"]["totalAmount"], json!(70.0));
        assert_eq!(range_wins["data"]["count"], json!(1));

        let zelle = post_form(&server, "getReport", json!({ "paymentMethod": "Zelle" })).await;
        assert_eq!(
            zelle["data"]["breakdown"],
            json!([
                { "category": "Octubre", "amount": 100.0 },
                { "category": "Septiembre, Octubre", "amount": 70.0 }
            ])
        );

        let all = post_form(&server, "getReport", json!({})).await;
        assert_eq!(
            all["data"]["breakdown"],
            json!([
                { "category": "Zelle", "amount": 170.0 },
                { "category": "Transferencia", "amount": 50.0 }
            ])
        );
    }

    #[tokio::test]
    async fn exchange_rate_ignores_undated_rows() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.insert_rate(303.0, "2024-09-01").await;
        ledger.insert_rate(310.0, "2024-10-01").await;
        ledger.insert_rate(999.0, "not-a-date").await;
        let (server, _) = server_for(ledger, Arc::default());

        let response = post_form(&server, "getExchangeRate", json!({})).await;
        assert_eq!(response["success"], json!(true));
        assert_eq!(response["rate"], json!(310.0));
        assert_eq!(response["date"], json!("2024-10-01T00:00:00+00:00"));
    }

    #[tokio::test]
    async fn siblings_are_all_returned() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger
            .insert_student(student("2024-001", "Ana Pérez", "12345678", Some("rep@example.com")))
            .await;
        ledger
            .insert_student(student("2024-007", "José Pérez", "12345678", Some("rep@example.com")))
            .await;
        let (server, _) = server_for(ledger, Arc::default());

        let response = post_form(&server, "getStudentByCedula", json!({ "cedula": "12345678" })).await;
        assert_eq!(response["success"], json!(true));
        let matriculas: Vec<&str> = response["students"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["matricula"].as_str().unwrap())
            .collect();
        assert_eq!(matriculas, vec!["2024-001", "2024-007"]);
        assert_eq!(response["matricula"], json!("2024-001"));
    }

    #[tokio::test]
    async fn payment_confirmation_is_reported_in_the_envelope() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger
            .insert_student(student("2024-001", "Ana Pérez", "12345678", Some("rep@example.com")))
            .await;
        let notifier = Arc::new(RecordingNotifier::default());
        let (server, _) = server_for(ledger, notifier.clone());

        pay(&server, "2024-10-10", "Zelle", json!("Octubre"), 100.0).await;
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn plain_text_json_bodies_are_accepted() {
        let response = server()
            .post("/")
            .text(r#"{"action":"getDebts","data":"{\"matricula\":\"2024-001\"}"}"#)
            .await
            .json::<Value>();
        assert_eq!(response, json!({ "success": true, "data": [] }));
    }

    #[tokio::test]
    async fn bad_input_is_reported_not_raised() {
        let server = server();

        let unknown = post_form(&server, "borrarTodo", json!({})).await;
        assert_eq!(unknown, json!({ "success": false, "message": "Acción desconocida" }));

        let broken = server
            .post("/")
            .form(&[("action", "getDebts"), ("data", "{not json")])
            .await;
        broken.assert_status_ok();
        assert_eq!(broken.json::<Value>()["success"], json!(false));

        let bad_month = post_form(&server, "getReport", json!({ "month": "Brumario" })).await;
        assert_eq!(bad_month["success"], json!(false));
    }

    #[tokio::test]
    async fn held_lock_answers_busy() {
        let (server, state) = server_for(Arc::new(MemoryLedger::new()), Arc::default());
        let _held = state.office.exclusive().await.unwrap();

        let response = post_form(&server, "getExchangeRate", json!({})).await;
        assert_eq!(response["success"], json!(false));
        assert_eq!(
            response["message"],
            json!("El sistema está ocupado. Intente de nuevo en unos segundos.")
        );
    }
}
