//! Persistence boundary.
//!
//! Handlers only see `Arc<dyn ClinicStore>` through the axum state; the
//! concrete backend is chosen once in `main`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Appointment, AppointmentChanges, Doctor, Invoice, InvoiceChanges, NewAppointment, NewDoctor,
    NewInvoice, NewPatient, NewUser, Patient, User,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Delete refused because other records still reference the row.
    #[error("{0}")]
    InUse(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        StoreError::NotFound(format!("{entity} {id}"))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ClinicStore: Send + Sync {
    // patients
    async fn list_patients(&self) -> StoreResult<Vec<Patient>>;
    async fn get_patient(&self, id: i64) -> StoreResult<Patient>;
    async fn create_patient(&self, new: NewPatient) -> StoreResult<Patient>;
    async fn replace_patient(&self, id: i64, new: NewPatient) -> StoreResult<Patient>;
    /// Fails with `InUse` while appointments or invoices reference it.
    async fn delete_patient(&self, id: i64) -> StoreResult<()>;

    // doctors
    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>>;
    async fn get_doctor(&self, id: i64) -> StoreResult<Doctor>;
    async fn create_doctor(&self, new: NewDoctor) -> StoreResult<Doctor>;
    async fn replace_doctor(&self, id: i64, new: NewDoctor) -> StoreResult<Doctor>;
    /// Fails with `InUse` while appointments or invoices reference it.
    async fn delete_doctor(&self, id: i64) -> StoreResult<()>;

    // appointments
    /// Ascending by date, ties by id.
    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>>;
    async fn get_appointment(&self, id: i64) -> StoreResult<Appointment>;
    /// `NotFound` when the patient or doctor does not exist.
    async fn create_appointment(&self, new: NewAppointment) -> StoreResult<Appointment>;
    /// Only the supplied fields change.
    async fn update_appointment(&self, id: i64, changes: AppointmentChanges) -> StoreResult<Appointment>;
    async fn delete_appointment(&self, id: i64) -> StoreResult<()>;
    /// Appointments of one doctor with `from <= date <= to`, ascending.
    async fn appointments_for_doctor_between(
        &self,
        doctor_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>>;

    // invoices
    /// Newest first.
    async fn list_invoices(&self) -> StoreResult<Vec<Invoice>>;
    async fn get_invoice(&self, id: i64) -> StoreResult<Invoice>;
    async fn create_invoice(&self, new: NewInvoice) -> StoreResult<Invoice>;
    async fn update_invoice(&self, id: i64, changes: InvoiceChanges) -> StoreResult<Invoice>;
    async fn delete_invoice(&self, id: i64) -> StoreResult<()>;

    // users
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn get_user(&self, id: i64) -> StoreResult<User>;
    /// `Conflict` when the email is taken.
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
}
