// src/routes/invoice_routes.rs

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{
    error::ApiError,
    middleware::{
        auth_context::AuthContext,
        extract::{AppJson, AppPath},
    },
    models::{ApiOk, AppState, Invoice, InvoiceChanges, InvoiceStatus, NewInvoice, OkResponse},
    validation::{ValidationError, is_present, optional_id, parse_amount_cents, require_id},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInput {
    pub patient_id: Option<JsonValue>,
    pub doctor_id: Option<JsonValue>,
    pub amount: Option<JsonValue>,
    pub status: Option<String>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<InvoiceStatus>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => InvoiceStatus::parse(s)
            .map(Some)
            .ok_or_else(|| ValidationError::new("status", format!("unknown invoice status: {s}"))),
    }
}

fn validate_new_invoice(input: &InvoiceInput) -> Result<NewInvoice, ValidationError> {
    let patient_id = require_id("patientId", input.patient_id.as_ref())?;
    let doctor_id = require_id("doctorId", input.doctor_id.as_ref())?;
    let amount_cents = match input.amount.as_ref() {
        Some(v) if is_present(Some(v)) => parse_amount_cents("amount", v)?,
        _ => return Err(ValidationError::required("amount")),
    };

    Ok(NewInvoice {
        amount_cents,
        status: parse_status(input.status.as_deref())?.unwrap_or_default(),
        patient_id,
        doctor_id,
    })
}

fn validate_invoice_changes(input: &InvoiceInput) -> Result<InvoiceChanges, ValidationError> {
    let amount_cents = match input.amount.as_ref() {
        None | Some(JsonValue::Null) => None,
        Some(v) => Some(parse_amount_cents("amount", v)?),
    };

    Ok(InvoiceChanges {
        amount_cents,
        status: parse_status(input.status.as_deref())?,
        patient_id: optional_id("patientId", input.patient_id.as_ref())?,
        doctor_id: optional_id("doctorId", input.doctor_id.as_ref())?,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/invoices/{invoice_id}",
            get(get_invoice)
                .put(update_invoice)
                .patch(update_invoice)
                .delete(delete_invoice),
        )
}

/// Newest first.
pub async fn list_invoices(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Invoice>>>, ApiError> {
    Ok(Json(ApiOk { data: state.store.list_invoices().await? }))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    _auth: AuthContext,
    AppPath(invoice_id): AppPath<i64>,
) -> Result<Json<ApiOk<Invoice>>, ApiError> {
    Ok(Json(ApiOk { data: state.store.get_invoice(invoice_id).await? }))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    AppJson(req): AppJson<InvoiceInput>,
) -> Result<Json<ApiOk<Invoice>>, ApiError> {
    let new = validate_new_invoice(&req)?;
    let created = state.store.create_invoice(new).await?;
    tracing::info!(
        invoice_id = created.id,
        amount_cents = created.amount_cents,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "invoice created"
    );
    Ok(Json(ApiOk { data: created }))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    AppPath(invoice_id): AppPath<i64>,
    AppJson(req): AppJson<InvoiceInput>,
) -> Result<Json<ApiOk<Invoice>>, ApiError> {
    let changes = validate_invoice_changes(&req)?;
    let updated = state.store.update_invoice(invoice_id, changes).await?;
    tracing::info!(
        invoice_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        status = updated.status.as_str(),
        "invoice updated"
    );
    Ok(Json(ApiOk { data: updated }))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    AppPath(invoice_id): AppPath<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_invoice(invoice_id).await?;
    tracing::info!(
        invoice_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "invoice deleted"
    );
    Ok(Json(OkResponse::ok()))
}
