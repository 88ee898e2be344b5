// src/routes/doctor_routes.rs

use axum::{
    extract::State,
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
    models::{ApiOk, AppState, Doctor, NewDoctor, OkResponse},
    validation::{ValidationError, non_blank, required_text},
};

#[derive(Debug, Default, Deserialize)]
pub struct DoctorInput {
    pub name: Option<String>,
    pub specialty: Option<String>,
}

impl DoctorInput {
    fn validate(&self) -> Result<NewDoctor, ValidationError> {
        Ok(NewDoctor {
            name: required_text("name", self.name.as_deref())?,
            specialty: non_blank(self.specialty.as_deref()),
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route(
            "/doctors/{doctor_id}",
            get(get_doctor).put(replace_doctor).delete(delete_doctor),
        )
}

pub async fn list_doctors(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Doctor>>>, ApiError> {
    Ok(Json(ApiOk { data: state.store.list_doctors().await? }))
}

pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    AppJson(req): AppJson<DoctorInput>,
) -> Result<Json<ApiOk<Doctor>>, ApiError> {
    let created = state.store.create_doctor(req.validate()?).await?;
    tracing::info!(
        doctor_id = created.id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "doctor created"
    );
    Ok(Json(ApiOk { data: created }))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    _auth: AuthContext,
    AppPath(doctor_id): AppPath<i64>,
) -> Result<Json<ApiOk<Doctor>>, ApiError> {
    Ok(Json(ApiOk { data: state.store.get_doctor(doctor_id).await? }))
}

pub async fn replace_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    AppPath(doctor_id): AppPath<i64>,
    AppJson(req): AppJson<DoctorInput>,
) -> Result<Json<ApiOk<Doctor>>, ApiError> {
    let updated = state.store.replace_doctor(doctor_id, req.validate()?).await?;
    tracing::info!(
        doctor_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "doctor replaced"
    );
    Ok(Json(ApiOk { data: updated }))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    AppPath(doctor_id): AppPath<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_doctor(doctor_id).await?;
    tracing::info!(
        doctor_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "doctor deleted"
    );
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewInvoice;
    use crate::routes::test_support::{receptionist, seed, state};

    #[tokio::test]
    async fn create_then_replace_drops_specialty() {
        let state = state();
        let Json(ApiOk { data: d }) = create_doctor(
            State(state.clone()),
            receptionist(),
            AppJson(DoctorInput {
                name: Some("Dr House".into()),
                specialty: Some("Diagnostics".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(d.specialty.as_deref(), Some("Diagnostics"));

        let Json(ApiOk { data: replaced }) = replace_doctor(
            State(state.clone()),
            receptionist(),
            AppPath(d.id),
            AppJson(DoctorInput {
                name: Some("Dr House".into()),
                specialty: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(replaced.specialty, None);

        let Json(ApiOk { data: all }) = list_doctors(State(state), receptionist()).await.unwrap();
        assert_eq!(all, vec![replaced]);
    }

    #[tokio::test]
    async fn missing_name_is_rejected() {
        let state = state();
        let err = create_doctor(State(state), receptionist(), AppJson(DoctorInput::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", ref m) if m == "name is required"));
    }

    #[tokio::test]
    async fn delete_blocked_by_invoice_then_allowed() {
        let state = state();
        let (p, d) = seed(&state).await;
        let invoice = state
            .store
            .create_invoice(NewInvoice {
                amount_cents: 5_000,
                status: Default::default(),
                patient_id: p.id,
                doctor_id: d.id,
            })
            .await
            .unwrap();

        let err = delete_doctor(State(state.clone()), receptionist(), AppPath(d.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict("HAS_DEPENDENTS", _)));

        state.store.delete_invoice(invoice.id).await.unwrap();
        delete_doctor(State(state.clone()), receptionist(), AppPath(d.id))
            .await
            .unwrap();

        let err = get_doctor(State(state), receptionist(), AppPath(d.id)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }
}
