// src/store/memory.rs
//
// In-process tables behind a tokio RwLock. Mirrors the Postgres schema:
// per-table id sequences, RESTRICT on delete of referenced rows.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ClinicStore, StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, Doctor, Invoice, InvoiceChanges,
    InvoiceStatus, NewAppointment, NewDoctor, NewInvoice, NewPatient, NewUser, Patient, User,
};

#[derive(Debug, Clone)]
struct AppointmentRow {
    id: i64,
    date: DateTime<Utc>,
    reason: Option<String>,
    status: AppointmentStatus,
    patient_id: i64,
    doctor_id: i64,
}

#[derive(Debug, Clone)]
struct InvoiceRow {
    id: i64,
    amount_cents: i64,
    status: InvoiceStatus,
    created_at: DateTime<Utc>,
    patient_id: i64,
    doctor_id: i64,
}

#[derive(Debug, Default)]
struct Sequences {
    patient: i64,
    doctor: i64,
    appointment: i64,
    invoice: i64,
    user: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct Tables {
    seq: Sequences,
    patients: BTreeMap<i64, Patient>,
    doctors: BTreeMap<i64, Doctor>,
    appointments: BTreeMap<i64, AppointmentRow>,
    invoices: BTreeMap<i64, InvoiceRow>,
    users: BTreeMap<i64, User>,
}

impl Tables {
    fn patient(&self, id: i64) -> StoreResult<&Patient> {
        self.patients
            .get(&id)
            .ok_or_else(|| StoreError::not_found("patient", id))
    }

    fn doctor(&self, id: i64) -> StoreResult<&Doctor> {
        self.doctors
            .get(&id)
            .ok_or_else(|| StoreError::not_found("doctor", id))
    }

    fn expand_appointment(&self, row: &AppointmentRow) -> StoreResult<Appointment> {
        let dangling = |what: &str| {
            StoreError::Backend(format!("appointment {} references a missing {what}", row.id))
        };
        let patient = self.patients.get(&row.patient_id).ok_or_else(|| dangling("patient"))?;
        let doctor = self.doctors.get(&row.doctor_id).ok_or_else(|| dangling("doctor"))?;

        Ok(Appointment {
            id: row.id,
            date: row.date,
            reason: row.reason.clone(),
            status: row.status,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            patient: patient.clone(),
            doctor: doctor.clone(),
        })
    }

    fn expand_invoice(&self, row: &InvoiceRow) -> StoreResult<Invoice> {
        let dangling = |what: &str| {
            StoreError::Backend(format!("invoice {} references a missing {what}", row.id))
        };
        let patient = self.patients.get(&row.patient_id).ok_or_else(|| dangling("patient"))?;
        let doctor = self.doctors.get(&row.doctor_id).ok_or_else(|| dangling("doctor"))?;

        Ok(Invoice {
            id: row.id,
            amount_cents: row.amount_cents,
            status: row.status,
            created_at: row.created_at,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            patient: patient.clone(),
            doctor: doctor.clone(),
        })
    }

    fn sorted_appointments<'a>(
        &self,
        rows: impl Iterator<Item = &'a AppointmentRow>,
    ) -> StoreResult<Vec<Appointment>> {
        let mut rows: Vec<&AppointmentRow> = rows.collect();
        rows.sort_by_key(|r| (r.date, r.id));
        rows.into_iter().map(|r| self.expand_appointment(r)).collect()
    }

    fn dependents_of(&self, patient_id: Option<i64>, doctor_id: Option<i64>) -> usize {
        let hit = |p: i64, d: i64| Some(p) == patient_id || Some(d) == doctor_id;
        self.appointments
            .values()
            .filter(|a| hit(a.patient_id, a.doctor_id))
            .count()
            + self
                .invoices
                .values()
                .filter(|i| hit(i.patient_id, i.doctor_id))
                .count()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    /* ---------------- patients ---------------- */

    async fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        Ok(self.tables.read().await.patients.values().cloned().collect())
    }

    async fn get_patient(&self, id: i64) -> StoreResult<Patient> {
        self.tables.read().await.patient(id).cloned()
    }

    async fn create_patient(&self, new: NewPatient) -> StoreResult<Patient> {
        let mut t = self.tables.write().await;
        let id = next(&mut t.seq.patient);
        let patient = Patient {
            id,
            name: new.name,
            phone: new.phone,
            dob: new.dob,
        };
        t.patients.insert(id, patient.clone());
        Ok(patient)
    }

    async fn replace_patient(&self, id: i64, new: NewPatient) -> StoreResult<Patient> {
        let mut t = self.tables.write().await;
        let row = t
            .patients
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("patient", id))?;
        row.name = new.name;
        row.phone = new.phone;
        row.dob = new.dob;
        Ok(row.clone())
    }

    async fn delete_patient(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.patient(id)?;
        let n = t.dependents_of(Some(id), None);
        if n > 0 {
            return Err(StoreError::InUse(format!(
                "patient {id} is referenced by {n} appointment(s)/invoice(s)"
            )));
        }
        t.patients.remove(&id);
        Ok(())
    }

    /* ---------------- doctors ---------------- */

    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        Ok(self.tables.read().await.doctors.values().cloned().collect())
    }

    async fn get_doctor(&self, id: i64) -> StoreResult<Doctor> {
        self.tables.read().await.doctor(id).cloned()
    }

    async fn create_doctor(&self, new: NewDoctor) -> StoreResult<Doctor> {
        let mut t = self.tables.write().await;
        let id = next(&mut t.seq.doctor);
        let doctor = Doctor {
            id,
            name: new.name,
            specialty: new.specialty,
        };
        t.doctors.insert(id, doctor.clone());
        Ok(doctor)
    }

    async fn replace_doctor(&self, id: i64, new: NewDoctor) -> StoreResult<Doctor> {
        let mut t = self.tables.write().await;
        let row = t
            .doctors
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("doctor", id))?;
        row.name = new.name;
        row.specialty = new.specialty;
        Ok(row.clone())
    }

    async fn delete_doctor(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.doctor(id)?;
        let n = t.dependents_of(None, Some(id));
        if n > 0 {
            return Err(StoreError::InUse(format!(
                "doctor {id} is referenced by {n} appointment(s)/invoice(s)"
            )));
        }
        t.doctors.remove(&id);
        Ok(())
    }

    /* ---------------- appointments ---------------- */

    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        let t = self.tables.read().await;
        t.sorted_appointments(t.appointments.values())
    }

    async fn get_appointment(&self, id: i64) -> StoreResult<Appointment> {
        let t = self.tables.read().await;
        let row = t
            .appointments
            .get(&id)
            .ok_or_else(|| StoreError::not_found("appointment", id))?;
        t.expand_appointment(row)
    }

    async fn create_appointment(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let mut t = self.tables.write().await;
        t.patient(new.patient_id)?;
        t.doctor(new.doctor_id)?;

        let id = next(&mut t.seq.appointment);
        let row = AppointmentRow {
            id,
            date: new.date,
            reason: new.reason,
            status: new.status,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
        };
        let out = t.expand_appointment(&row)?;
        t.appointments.insert(id, row);
        Ok(out)
    }

    async fn update_appointment(&self, id: i64, changes: AppointmentChanges) -> StoreResult<Appointment> {
        let mut t = self.tables.write().await;
        if !t.appointments.contains_key(&id) {
            return Err(StoreError::not_found("appointment", id));
        }
        if let Some(pid) = changes.patient_id {
            t.patient(pid)?;
        }
        if let Some(did) = changes.doctor_id {
            t.doctor(did)?;
        }

        let row = t
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("appointment", id))?;
        if let Some(date) = changes.date {
            row.date = date;
        }
        if let Some(pid) = changes.patient_id {
            row.patient_id = pid;
        }
        if let Some(did) = changes.doctor_id {
            row.doctor_id = did;
        }
        if let Some(reason) = changes.reason {
            row.reason = reason;
        }
        if let Some(status) = changes.status {
            row.status = status;
        }

        let row = row.clone();
        t.expand_appointment(&row)
    }

    async fn delete_appointment(&self, id: i64) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .appointments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("appointment", id))
    }

    async fn appointments_for_doctor_between(
        &self,
        doctor_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>> {
        let t = self.tables.read().await;
        t.sorted_appointments(
            t.appointments
                .values()
                .filter(|a| a.doctor_id == doctor_id && a.date >= from && a.date <= to),
        )
    }

    /* ---------------- invoices ---------------- */

    async fn list_invoices(&self) -> StoreResult<Vec<Invoice>> {
        let t = self.tables.read().await;
        let mut rows: Vec<&InvoiceRow> = t.invoices.values().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.into_iter().map(|r| t.expand_invoice(r)).collect()
    }

    async fn get_invoice(&self, id: i64) -> StoreResult<Invoice> {
        let t = self.tables.read().await;
        let row = t
            .invoices
            .get(&id)
            .ok_or_else(|| StoreError::not_found("invoice", id))?;
        t.expand_invoice(row)
    }

    async fn create_invoice(&self, new: NewInvoice) -> StoreResult<Invoice> {
        let mut t = self.tables.write().await;
        t.patient(new.patient_id)?;
        t.doctor(new.doctor_id)?;

        let id = next(&mut t.seq.invoice);
        let row = InvoiceRow {
            id,
            amount_cents: new.amount_cents,
            status: new.status,
            created_at: Utc::now(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
        };
        let out = t.expand_invoice(&row)?;
        t.invoices.insert(id, row);
        Ok(out)
    }

    async fn update_invoice(&self, id: i64, changes: InvoiceChanges) -> StoreResult<Invoice> {
        let mut t = self.tables.write().await;
        if !t.invoices.contains_key(&id) {
            return Err(StoreError::not_found("invoice", id));
        }
        if let Some(pid) = changes.patient_id {
            t.patient(pid)?;
        }
        if let Some(did) = changes.doctor_id {
            t.doctor(did)?;
        }

        let row = t
            .invoices
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("invoice", id))?;
        if let Some(amount) = changes.amount_cents {
            row.amount_cents = amount;
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(pid) = changes.patient_id {
            row.patient_id = pid;
        }
        if let Some(did) = changes.doctor_id {
            row.doctor_id = did;
        }

        let row = row.clone();
        t.expand_invoice(&row)
    }

    async fn delete_invoice(&self, id: i64) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .invoices
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("invoice", id))
    }

    /* ---------------- users ---------------- */

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        self.tables
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email.eq_ignore_ascii_case(&new.email)) {
            return Err(StoreError::Conflict(format!("email {} is already registered", new.email)));
        }
        let id = next(&mut t.seq.user);
        let user = User {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            tenant_id: new.tenant_id,
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }
}
