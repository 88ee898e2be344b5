// src/routes/patient_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::{
        auth_context::AuthContext,
        extract::{AppJson, AppPath},
    },
    models::{ApiOk, AppState, NewPatient, OkResponse, Patient},
    validation::{ValidationError, non_blank, parse_date, required_text},
};

/// Body of POST /patients and PUT /patients/{id}. PUT replaces the whole
/// record, so omitted optional fields are cleared.
#[derive(Debug, Default, Deserialize)]
pub struct PatientInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
}

impl PatientInput {
    fn validate(&self) -> Result<NewPatient, ValidationError> {
        let name = required_text("name", self.name.as_deref())?;
        let dob = non_blank(self.dob.as_deref())
            .map(|raw| parse_date("dob", &raw))
            .transpose()?;

        Ok(NewPatient {
            name,
            phone: non_blank(self.phone.as_deref()),
            dob,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/{patient_id}",
            get(get_patient).put(replace_patient).delete(delete_patient),
        )
}

/// Optional `?query=` matches name or phone, case-insensitively.
pub async fn list_patients(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<Patient>>>, ApiError> {
    let mut patients = state.store.list_patients().await?;

    if let Some(needle) = non_blank(q.query.as_deref()).map(|s| s.to_lowercase()) {
        patients.retain(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.phone.as_deref().is_some_and(|ph| ph.contains(&needle))
        });
    }

    Ok(Json(ApiOk { data: patients }))
}

pub async fn create_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    AppJson(req): AppJson<PatientInput>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let new = req.validate()?;
    let created = state.store.create_patient(new).await?;
    tracing::info!(
        patient_id = created.id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "patient created"
    );
    Ok(Json(ApiOk { data: created }))
}

pub async fn get_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    AppPath(patient_id): AppPath<i64>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    Ok(Json(ApiOk { data: state.store.get_patient(patient_id).await? }))
}

pub async fn replace_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    AppPath(patient_id): AppPath<i64>,
    AppJson(req): AppJson<PatientInput>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let new = req.validate()?;
    let updated = state.store.replace_patient(patient_id, new).await?;
    tracing::info!(
        patient_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "patient replaced"
    );
    Ok(Json(ApiOk { data: updated }))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    AppPath(patient_id): AppPath<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_patient(patient_id).await?;
    tracing::info!(
        patient_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "patient deleted"
    );
    Ok(Json(OkResponse::ok()))
}
