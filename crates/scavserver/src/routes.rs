use crate::auth::{verify_api_key, Operator};
use crate::dashboard::summarize;
use crate::error::ApiError;
use crate::ws::{client_source, ClientSink};
use crate::AppState;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use scavcore::{generate_token, normalize_workflow_name, parse_create_form, ApiKey, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    #[serde(rename = "workflowName", default)]
    workflow_name: String,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: String,
}

#[derive(Debug, Serialize)]
struct ApiKeyResponse {
    api_key: String,
}

/// Health check endpoint
#[get("/healthz")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// Create a workflow from the operator form and start its worker
#[post("/workflows/create")]
async fn create_workflow(
    _operator: Operator,
    data: web::Data<AppState>,
    form: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError> {
    let workflow = parse_create_form(&form)?;
    tracing::info!(
        workflow = %workflow.name,
        fields = workflow.schema.len(),
        provider = %data.provider.kind(),
        "Creating workflow"
    );

    let created = data.provider.create_workflow(workflow).await?;
    tracing::info!(workflow = %created.name, worker = %created.worker_address, "Workflow created");

    Ok(HttpResponse::Created().json(created))
}

#[post("/workflows/delete")]
async fn delete_workflow(
    _operator: Operator,
    data: web::Data<AppState>,
    form: web::Form<DeleteForm>,
) -> Result<HttpResponse, ApiError> {
    let name = normalize_workflow_name(form.workflow_name.trim());
    if name.is_empty() {
        return Err(ValidationError::MissingField("workflowName".to_string()).into());
    }

    tracing::info!(workflow = %name, "Deleting workflow");
    data.provider.delete_workflow(&name).await?;

    Ok(HttpResponse::Ok().json(DeleteResponse { deleted: name }))
}

#[get("/api/workflows")]
async fn list_workflows(_operator: Operator, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let workflows = data.workflows.list_workflows().await?;
    Ok(HttpResponse::Ok().json(workflows))
}

#[get("/api/dashboard")]
async fn dashboard(_operator: Operator, data: web::Data<AppState>) -> impl Responder {
    let summary = summarize(data.provider.as_ref(), &data.counters).await;
    HttpResponse::Ok().json(summary)
}

/// Mint a client API key. The plaintext is returned once and only its
/// hash is kept.
#[post("/auth/api")]
async fn mint_api_key(_operator: Operator, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let token = generate_token();
    data.keys.insert_api_key(ApiKey::from_token(&token)).await?;
    tracing::info!("Minted api key");

    Ok(HttpResponse::Created().json(ApiKeyResponse { api_key: token }))
}

/// Upgrade to a WebSocket tunnel to the named workflow's worker.
///
/// The worker is dialed before the upgrade is accepted, so a client whose
/// worker is unreachable gets an error response instead of a socket.
#[get("/connect/{workflow_name}")]
async fn connect(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    verify_api_key(&req, data.keys.as_ref()).await?;

    let name = normalize_workflow_name(path.trim());
    let tunnel = data.relay.connect(&name).await.map_err(ApiError::from)?;

    let (res, session, msg_stream) = actix_ws::handle(&req, stream)?;
    tracing::info!(workflow = %name, session_id = %tunnel.session_id(), "Client connected");

    actix_web::rt::spawn(async move {
        tunnel.pair(client_source(msg_stream), ClientSink::new(session)).await;
    });

    Ok(res)
}

/// Register every route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(create_workflow)
        .service(delete_workflow)
        .service(list_workflows)
        .service(dashboard)
        .service(mint_api_key)
        .service(connect);
}
