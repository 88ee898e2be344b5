// src/scheduling.rs
//
// Appointment domain rules: input validation, the status lifecycle and the
// optional double-booking check. Nothing here touches the store.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, NewAppointment, deserialize_double_option,
};
use crate::validation::{
    ValidationError, non_blank, optional_id, parse_datetime, require_id,
};

/* ============================================================
   Input record
   ============================================================ */

/// Create/update body. Identifiers are kept as raw JSON so that a
/// non-numeric id is reported as a validation failure instead of a
/// deserialization rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentInput {
    pub date: Option<String>,
    pub patient_id: Option<JsonValue>,
    pub doctor_id: Option<JsonValue>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub reason: Option<Option<String>>,
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> Result<AppointmentStatus, ValidationError> {
    AppointmentStatus::parse(raw).ok_or_else(|| {
        ValidationError::new(
            "status",
            format!("status must be one of Pending, Confirmed, Cancelled (got {raw:?})"),
        )
    })
}

/// Validates a create request. Does not check that the date lies in the
/// future or that the patient/doctor exist.
pub fn validate_new_appointment(input: &AppointmentInput) -> Result<NewAppointment, ValidationError> {
    let date_raw = non_blank(input.date.as_deref()).ok_or_else(|| ValidationError::required("date"))?;
    let patient_id = require_id("patientId", input.patient_id.as_ref())?;
    let doctor_id = require_id("doctorId", input.doctor_id.as_ref())?;
    let date = parse_datetime("date", &date_raw)?;

    let status = match input.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_status(raw)?,
        None => AppointmentStatus::default(),
    };

    Ok(NewAppointment {
        date,
        patient_id,
        doctor_id,
        reason: input.reason.as_ref().and_then(|r| non_blank(r.as_deref())),
        status,
    })
}

/// Validates a partial update. Absent fields stay `None`; an explicit null
/// or blank reason clears it.
pub fn validate_appointment_changes(
    input: &AppointmentInput,
) -> Result<AppointmentChanges, ValidationError> {
    let date = match non_blank(input.date.as_deref()) {
        Some(raw) => Some(parse_datetime("date", &raw)?),
        None => None,
    };

    let status = match input.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };

    Ok(AppointmentChanges {
        date,
        patient_id: optional_id("patientId", input.patient_id.as_ref())?,
        doctor_id: optional_id("doctorId", input.doctor_id.as_ref())?,
        reason: input.reason.as_ref().map(|r| non_blank(r.as_deref())),
        status,
    })
}

/* ============================================================
   Status lifecycle
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move appointment from {} to {}", .from.as_str(), .to.as_str())]
pub struct TransitionError {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
}

/// Permissive allows any-to-any, including leaving Cancelled.
/// Guarded only allows the pairs in `GUARDED_TRANSITIONS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Guarded,
}

const GUARDED_TRANSITIONS: &[(AppointmentStatus, AppointmentStatus)] = &[
    (AppointmentStatus::Pending, AppointmentStatus::Confirmed),
    (AppointmentStatus::Pending, AppointmentStatus::Cancelled),
    (AppointmentStatus::Confirmed, AppointmentStatus::Pending),
    (AppointmentStatus::Confirmed, AppointmentStatus::Cancelled),
];

impl TransitionPolicy {
    pub fn allows(&self, from: AppointmentStatus, to: AppointmentStatus) -> bool {
        if from == to {
            return true;
        }
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Guarded => GUARDED_TRANSITIONS.contains(&(from, to)),
        }
    }

    pub fn check(&self, from: AppointmentStatus, to: AppointmentStatus) -> Result<(), TransitionError> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(TransitionError { from, to })
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "guarded" => Ok(TransitionPolicy::Guarded),
            other => Err(format!(
                "unknown transition policy {other:?} (expected permissive or guarded)"
            )),
        }
    }
}

/* ============================================================
   Double booking
   ============================================================ */

#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulingRules {
    pub transitions: TransitionPolicy,
    /// `None` disables the double-booking check.
    pub double_booking_window: Option<Duration>,
}

/// The slot an appointment will occupy once a create/update is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub doctor_id: i64,
    pub date: DateTime<Utc>,
    pub status: AppointmentStatus,
}

impl Slot {
    pub fn of_new(new: &NewAppointment) -> Self {
        Slot {
            doctor_id: new.doctor_id,
            date: new.date,
            status: new.status,
        }
    }

    pub fn after_changes(current: &Appointment, changes: &AppointmentChanges) -> Self {
        Slot {
            doctor_id: changes.doctor_id.unwrap_or(current.doctor_id),
            date: changes.date.unwrap_or(current.date),
            status: changes.status.unwrap_or(current.status),
        }
    }
}

/// Returns the first live appointment of the same doctor starting strictly
/// inside `window` of `slot.date`. `exclude` is the appointment being
/// updated. A cancelled slot never clashes.
pub fn find_double_booking<'a>(
    existing: &'a [Appointment],
    slot: Slot,
    window: Duration,
    exclude: Option<i64>,
) -> Option<&'a Appointment> {
    if slot.status == AppointmentStatus::Cancelled {
        return None;
    }
    existing.iter().find(|a| {
        Some(a.id) != exclude
            && a.doctor_id == slot.doctor_id
            && a.status != AppointmentStatus::Cancelled
            && (a.date - slot.date).abs() < window
    })
}
