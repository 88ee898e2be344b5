// src/routes/appointment_routes.rs

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};

use crate::{
    error::ApiError,
    middleware::{
        auth_context::AuthContext,
        extract::{AppJson, AppPath},
    },
    models::{ApiOk, AppState, Appointment, AppointmentStatus, OkResponse},
    scheduling::{
        AppointmentInput, Slot, TransitionPolicy, find_double_booking, validate_appointment_changes,
        validate_new_appointment,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .put(update_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
}

/* ============================================================
   Double-booking guard
   ============================================================ */

async fn ensure_slot_free(state: &AppState, slot: Slot, exclude: Option<i64>) -> Result<(), ApiError> {
    let Some(window) = state.scheduling.double_booking_window else {
        return Ok(());
    };
    if slot.status == AppointmentStatus::Cancelled {
        return Ok(());
    }

    let nearby = state
        .store
        .appointments_for_doctor_between(slot.doctor_id, slot.date - window, slot.date + window)
        .await?;

    if let Some(clash) = find_double_booking(&nearby, slot, window, exclude) {
        tracing::warn!(
            doctor_id = slot.doctor_id,
            requested = %slot.date,
            existing_id = clash.id,
            "double booking rejected"
        );
        return Err(ApiError::Conflict(
            "DOUBLE_BOOKED",
            format!(
                "doctor {} already has appointment {} at {}",
                clash.doctor_id,
                clash.id,
                clash.date.to_rfc3339()
            ),
        ));
    }
    Ok(())
}

/* ============================================================
   GET /appointments
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    Ok(Json(ApiOk { data: state.store.list_appointments().await? }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    AppPath(appointment_id): AppPath<i64>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    Ok(Json(ApiOk { data: state.store.get_appointment(appointment_id).await? }))
}

/* ============================================================
   POST /appointments (create)
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    AppJson(req): AppJson<AppointmentInput>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let new = validate_new_appointment(&req)?;
    ensure_slot_free(&state, Slot::of_new(&new), None).await?;

    let created = state.store.create_appointment(new).await?;
    tracing::info!(
        appointment_id = created.id,
        doctor_id = created.doctor_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "appointment created"
    );
    Ok(Json(ApiOk { data: created }))
}

/* ============================================================
   PUT|PATCH /appointments/{id}  (partial update)
   ============================================================ */

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    AppPath(appointment_id): AppPath<i64>,
    AppJson(req): AppJson<AppointmentInput>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let changes = validate_appointment_changes(&req)?;
    if changes.is_empty() {
        return get_appointment(State(state), auth, AppPath(appointment_id)).await;
    }

    let rules = state.scheduling;
    let guards_status = changes.status.is_some() && rules.transitions != TransitionPolicy::Permissive;
    let moves_slot = rules.double_booking_window.is_some()
        && (changes.date.is_some() || changes.doctor_id.is_some() || changes.status.is_some());

    if guards_status || moves_slot {
        let current = state.store.get_appointment(appointment_id).await?;
        if let Some(to) = changes.status {
            rules.transitions.check(current.status, to)?;
        }
        if moves_slot {
            ensure_slot_free(&state, Slot::after_changes(&current, &changes), Some(appointment_id)).await?;
        }
    }

    let updated = state.store.update_appointment(appointment_id, changes).await?;
    tracing::info!(
        appointment_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        status = updated.status.as_str(),
        "appointment updated"
    );
    Ok(Json(ApiOk { data: updated }))
}

/* ============================================================
   DELETE /appointments/{id}
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    AppPath(appointment_id): AppPath<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_appointment(appointment_id).await?;
    tracing::info!(
        appointment_id,
        user_id = auth.user_id,
        role = %auth.role,
        tenant_id = ?auth.tenant_id,
        "appointment deleted"
    );
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{receptionist, seed, state, state_with};
    use crate::scheduling::SchedulingRules;
    use chrono::Duration;
    use serde_json::{Value as JsonValue, json};

    fn body(v: JsonValue) -> AppJson<AppointmentInput> {
        AppJson(serde_json::from_value(v).unwrap())
    }

    async fn create(state: &AppState, v: JsonValue) -> Result<Appointment, ApiError> {
        create_appointment(State(state.clone()), receptionist(), body(v))
            .await
            .map(|Json(ApiOk { data })| data)
    }

    async fn update(state: &AppState, id: i64, v: JsonValue) -> Result<Appointment, ApiError> {
        update_appointment(State(state.clone()), receptionist(), AppPath(id), body(v))
            .await
            .map(|Json(ApiOk { data })| data)
    }

    async fn list(state: &AppState) -> Vec<Appointment> {
        let Json(ApiOk { data: all }) = list_appointments(State(state.clone()), receptionist()).await.unwrap();
        all
    }

    #[tokio::test]
    async fn create_defaults_to_pending_with_null_reason() {
        let state = state();
        let (p, d) = seed(&state).await;

        let created = create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": p.id, "doctorId": d.id}),
        )
        .await
        .unwrap();

        assert_eq!(created.status, AppointmentStatus::Pending);
        assert_eq!(created.reason, None);

        let wire = serde_json::to_value(&created).unwrap();
        assert_eq!(wire["status"], "Pending");
        assert_eq!(wire["reason"], JsonValue::Null);
        assert_eq!(wire["patientId"], p.id);
        assert_eq!(wire["doctor"]["name"], "Dr Grey");
        assert_eq!(wire["date"], "2030-01-01T10:00:00Z");

        assert_eq!(list(&state).await, vec![created]);
    }

    #[tokio::test]
    async fn non_numeric_ids_fail_validation_and_persist_nothing() {
        let state = state();
        let (p, d) = seed(&state).await;

        let err = create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": "abc", "doctorId": d.id}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        let err = create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": p.id, "doctorId": "two"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        assert!(list(&state).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found() {
        let state = state();
        let (_, d) = seed(&state).await;

        let err = create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": 999, "doctorId": d.id}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound("NOT_FOUND", ref m) if m == "patient 999 not found"));
    }

    #[tokio::test]
    async fn status_only_update_keeps_reason() {
        let state = state();
        let (p, d) = seed(&state).await;
        let created = create(
            &state,
            json!({
                "date": "2030-01-01T10:00:00Z",
                "patientId": p.id,
                "doctorId": d.id,
                "reason": "checkup"
            }),
        )
        .await
        .unwrap();

        let updated = update(&state, created.id, json!({"id": created.id, "status": "Cancelled"}))
            .await
            .unwrap();

        assert_eq!(updated.status, AppointmentStatus::Cancelled);
        assert_eq!(updated.reason.as_deref(), Some("checkup"));
        assert_eq!(updated.date, created.date);
        assert_eq!(updated.patient, created.patient);
        assert_eq!(updated.doctor, created.doctor);
    }

    #[tokio::test]
    async fn update_of_missing_appointment_is_not_found() {
        let state = state();
        seed(&state).await;

        let err = update(&state, 5, json!({"status": "Confirmed"})).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));

        let err = update(&state, 5, json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }

    #[tokio::test]
    async fn permissive_lifecycle_allows_reopening_cancelled() {
        let state = state();
        let (p, d) = seed(&state).await;
        let a = create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": p.id, "doctorId": d.id, "status": "Cancelled"}),
        )
        .await
        .unwrap();

        let reopened = update(&state, a.id, json!({"status": "Confirmed"})).await.unwrap();
        assert_eq!(reopened.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn guarded_lifecycle_rejects_leaving_cancelled() {
        let state = state_with(SchedulingRules {
            transitions: TransitionPolicy::Guarded,
            double_booking_window: None,
        });
        let (p, d) = seed(&state).await;
        let a = create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": p.id, "doctorId": d.id}),
        )
        .await
        .unwrap();

        update(&state, a.id, json!({"status": "Cancelled"})).await.unwrap();
        let err = update(&state, a.id, json!({"status": "Confirmed"})).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict("INVALID_TRANSITION", _)));

        let stored = state.store.get_appointment(a.id).await.unwrap();
        assert_eq!(stored.status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn double_booking_window_is_enforced_when_enabled() {
        let state = state_with(SchedulingRules {
            transitions: TransitionPolicy::Permissive,
            double_booking_window: Some(Duration::minutes(30)),
        });
        let (p, d) = seed(&state).await;
        let first = create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": p.id, "doctorId": d.id}),
        )
        .await
        .unwrap();

        let err = create(
            &state,
            json!({"date": "2030-01-01T10:20:00Z", "patientId": p.id, "doctorId": d.id}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict("DOUBLE_BOOKED", _)));

        // outside the window
        let later = create(
            &state,
            json!({"date": "2030-01-01T11:00:00Z", "patientId": p.id, "doctorId": d.id}),
        )
        .await
        .unwrap();

        // moving the later one onto the first is rejected, re-saving itself is not
        let err = update(&state, later.id, json!({"date": "2030-01-01T10:05:00Z"})).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict("DOUBLE_BOOKED", _)));
        update(&state, later.id, json!({"date": "2030-01-01T11:10:00Z"})).await.unwrap();

        // a cancelled appointment frees the slot
        update(&state, first.id, json!({"status": "Cancelled"})).await.unwrap();
        create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": p.id, "doctorId": d.id}),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn double_booking_is_off_by_default() {
        let state = state();
        let (p, d) = seed(&state).await;
        for _ in 0..2 {
            create(
                &state,
                json!({"date": "2030-01-01T10:00:00Z", "patientId": p.id, "doctorId": d.id}),
            )
            .await
            .unwrap();
        }
        assert_eq!(list(&state).await.len(), 2);
    }

    #[tokio::test]
    async fn delete_then_list_never_contains_id() {
        let state = state();
        let (p, d) = seed(&state).await;
        let a = create(
            &state,
            json!({"date": "2030-01-01T10:00:00Z", "patientId": p.id, "doctorId": d.id}),
        )
        .await
        .unwrap();

        let Json(ok) = delete_appointment(State(state.clone()), receptionist(), AppPath(a.id))
            .await
            .unwrap();
        assert!(ok.data.ok);
        assert!(list(&state).await.iter().all(|x| x.id != a.id));

        let err = delete_appointment(State(state.clone()), receptionist(), AppPath(a.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }
}
