use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;

use crate::auth::JwtKeys;
use crate::scheduling::SchedulingRules;
use crate::store::ClinicStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClinicStore>,
    pub jwt: JwtKeys,
    pub token_ttl_hours: i64,
    pub scheduling: SchedulingRules,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        OkResponse {
            data: OkData { ok: true },
        }
    }
}

/* -------------------------
   Status enums
--------------------------*/

/// Appointment status, stored as smallint:
/// 0 Pending, 1 Confirmed, 2 Cancelled
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
pub enum AppointmentStatus {
    #[default]
    Pending = 0,
    Confirmed = 1,
    Cancelled = 2,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    /// Case-insensitive; accepts the US spelling of cancelled too.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "cancelled" | "canceled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

/// Invoice status, stored as smallint: 0 Unpaid, 1 Paid
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
pub enum InvoiceStatus {
    #[default]
    Unpaid = 0,
    Paid = 1,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "Unpaid",
            InvoiceStatus::Paid => "Paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Some(InvoiceStatus::Unpaid),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

/* -------------------------
   Entities
--------------------------*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialty: Option<String>,
}

/// Appointment with its patient and doctor expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub patient: Patient,
    pub doctor: Doctor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    #[serde(rename = "amount", serialize_with = "cents_as_decimal")]
    pub amount_cents: i64,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub patient: Patient,
    pub doctor: Doctor,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub tenant_id: Option<i64>,
}

/* -------------------------
   Store inputs
--------------------------*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub name: String,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDoctor {
    pub name: String,
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub date: DateTime<Utc>,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
}

/// Partial appointment update. `None` leaves the column untouched;
/// `reason: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentChanges {
    pub date: Option<DateTime<Utc>>,
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub reason: Option<Option<String>>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentChanges {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.patient_id.is_none()
            && self.doctor_id.is_none()
            && self.reason.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub amount_cents: i64,
    pub status: InvoiceStatus,
    pub patient_id: i64,
    pub doctor_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceChanges {
    pub amount_cents: Option<i64>,
    pub status: Option<InvoiceStatus>,
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub tenant_id: Option<i64>,
}

/* -------------------------
   Helpers
--------------------------*/

/// Distinguishes a field sent as `null` from a field not sent at all.
/// Use with `#[serde(default, deserialize_with = "deserialize_double_option")]`.
pub fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Only called when the field is present:
    // null => Some(None), value => Some(Some(value))
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

fn cents_as_decimal<S>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(*cents as f64 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_status_parse_is_lenient_on_case() {
        assert_eq!(AppointmentStatus::parse(" confirmed "), Some(AppointmentStatus::Confirmed));
        assert_eq!(AppointmentStatus::parse("CANCELED"), Some(AppointmentStatus::Cancelled));
        assert_eq!(AppointmentStatus::parse("En attente"), None);
        assert_eq!(AppointmentStatus::default(), AppointmentStatus::Pending);
    }

    #[test]
    fn invoice_serializes_amount_as_decimal() {
        let invoice = Invoice {
            id: 3,
            amount_cents: 12_550,
            status: InvoiceStatus::Paid,
            created_at: DateTime::parse_from_rfc3339("2030-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            patient_id: 1,
            doctor_id: 2,
            patient: Patient {
                id: 1,
                name: "Ada".into(),
                phone: None,
                dob: None,
            },
            doctor: Doctor {
                id: 2,
                name: "Dr Who".into(),
                specialty: None,
            },
        };

        let json = serde_json::to_value(&invoice).unwrap();
        assert_eq!(json["amount"], serde_json::json!(125.5));
        assert_eq!(json["status"], "Paid");
        assert_eq!(json["patientId"], 1);
        assert!(json.get("amountCents").is_none());
    }
}
