// src/routes/dashboard_routes.rs

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Appointment, Invoice, InvoiceStatus},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(get_dashboard))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCount {
    pub day: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: usize,
    pub total_appointments: usize,
    pub upcoming_appointments: usize,
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub unpaid_invoices: usize,
    /// Sum of paid invoices, as a decimal amount.
    pub paid_revenue: f64,
    pub appointments_per_day: Vec<DayCount>,
}

impl DashboardStats {
    pub fn compute(
        total_patients: usize,
        appointments: &[Appointment],
        invoices: &[Invoice],
        now: DateTime<Utc>,
    ) -> Self {
        let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for a in appointments {
            *per_day.entry(a.date.date_naive()).or_default() += 1;
        }

        let paid: Vec<&Invoice> = invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .collect();
        let paid_cents: i64 = paid.iter().map(|i| i.amount_cents).sum();

        DashboardStats {
            total_patients,
            total_appointments: appointments.len(),
            upcoming_appointments: appointments.iter().filter(|a| a.date > now).count(),
            total_invoices: invoices.len(),
            paid_invoices: paid.len(),
            unpaid_invoices: invoices.len() - paid.len(),
            paid_revenue: paid_cents as f64 / 100.0,
            appointments_per_day: per_day
                .into_iter()
                .map(|(day, count)| DayCount { day, count })
                .collect(),
        }
    }
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<DashboardStats>>, ApiError> {
    let patients = state.store.list_patients().await?;
    let appointments = state.store.list_appointments().await?;
    let invoices = state.store.list_invoices().await?;

    Ok(Json(ApiOk {
        data: DashboardStats::compute(patients.len(), &appointments, &invoices, Utc::now()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, Doctor, NewAppointment, NewInvoice, Patient};
    use crate::routes::test_support::{receptionist, seed, state};
    use crate::validation::parse_datetime;

    fn at(s: &str) -> DateTime<Utc> {
        parse_datetime("date", s).unwrap()
    }

    fn appointment(id: i64, date: &str) -> Appointment {
        Appointment {
            id,
            date: at(date),
            reason: None,
            status: AppointmentStatus::Pending,
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
                name: "Dr Grey".into(),
                specialty: None,
            },
        }
    }

    fn invoice(id: i64, cents: i64, status: InvoiceStatus) -> Invoice {
        let a = appointment(0, "2030-01-01T00:00:00Z");
        Invoice {
            id,
            amount_cents: cents,
            status,
            created_at: a.date,
            patient_id: 1,
            doctor_id: 2,
            patient: a.patient,
            doctor: a.doctor,
        }
    }

    #[test]
    fn compute_counts_and_groups_by_utc_day() {
        let appts = vec![
            appointment(1, "2030-01-02T23:30:00Z"),
            appointment(2, "2030-01-01T09:00:00Z"),
            appointment(3, "2030-01-02T08:00:00Z"),
            appointment(4, "2029-12-31T10:00:00Z"),
        ];
        let invoices = vec![
            invoice(1, 12_000, InvoiceStatus::Paid),
            invoice(2, 3_550, InvoiceStatus::Paid),
            invoice(3, 999, InvoiceStatus::Unpaid),
        ];

        let stats = DashboardStats::compute(5, &appts, &invoices, at("2030-01-01T00:00:00Z"));

        assert_eq!(stats.total_patients, 5);
        assert_eq!(stats.total_appointments, 4);
        assert_eq!(stats.upcoming_appointments, 3);
        assert_eq!(stats.paid_invoices, 2);
        assert_eq!(stats.unpaid_invoices, 1);
        assert_eq!(stats.paid_revenue, 155.5);

        let days: Vec<(String, usize)> = stats
            .appointments_per_day
            .iter()
            .map(|d| (d.day.to_string(), d.count))
            .collect();
        assert_eq!(
            days,
            vec![
                ("2029-12-31".to_string(), 1),
                ("2030-01-01".to_string(), 1),
                ("2030-01-02".to_string(), 2),
            ]
        );
    }

    #[test]
    fn empty_store_gives_zeroes() {
        let stats = DashboardStats::compute(0, &[], &[], Utc::now());
        assert_eq!(stats.total_invoices, 0);
        assert_eq!(stats.paid_revenue, 0.0);
        assert!(stats.appointments_per_day.is_empty());
    }

    #[tokio::test]
    async fn handler_reads_from_store() {
        let state = state();
        let (p, d) = seed(&state).await;
        state
            .store
            .create_appointment(NewAppointment {
                date: at("2099-06-01T10:00:00Z"),
                patient_id: p.id,
                doctor_id: d.id,
                reason: Some("checkup".into()),
                status: AppointmentStatus::Confirmed,
            })
            .await
            .unwrap();
        state
            .store
            .create_invoice(NewInvoice {
                amount_cents: 4_000,
                status: InvoiceStatus::Paid,
                patient_id: p.id,
                doctor_id: d.id,
            })
            .await
            .unwrap();

        let Json(ApiOk { data: stats }) = get_dashboard(State(state), receptionist()).await.unwrap();
        assert_eq!(stats.total_patients, 1);
        assert_eq!(stats.upcoming_appointments, 1);
        assert_eq!(stats.paid_revenue, 40.0);

        let wire = serde_json::to_value(&stats).unwrap();
        assert_eq!(wire["appointmentsPerDay"][0]["day"], "2099-06-01");
    }
}
