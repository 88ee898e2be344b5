// src/store/pg.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgPool};

use super::{ClinicStore, StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, Doctor, Invoice, InvoiceChanges,
    InvoiceStatus, NewAppointment, NewDoctor, NewInvoice, NewPatient, NewUser, Patient, User,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/* ============================================================
   Joined rows
   ============================================================ */

#[derive(Debug, FromRow)]
struct AppointmentRow {
    id: i64,
    date: DateTime<Utc>,
    reason: Option<String>,
    status: AppointmentStatus,
    patient_id: i64,
    doctor_id: i64,
    p_name: String,
    p_phone: Option<String>,
    p_dob: Option<NaiveDate>,
    d_name: String,
    d_specialty: Option<String>,
}

impl From<AppointmentRow> for Appointment {
    fn from(r: AppointmentRow) -> Self {
        Appointment {
            id: r.id,
            date: r.date,
            reason: r.reason,
            status: r.status,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            patient: Patient {
                id: r.patient_id,
                name: r.p_name,
                phone: r.p_phone,
                dob: r.p_dob,
            },
            doctor: Doctor {
                id: r.doctor_id,
                name: r.d_name,
                specialty: r.d_specialty,
            },
        }
    }
}

const APPOINTMENT_SELECT: &str = r#"
    SELECT
      a.id, a.date, a.reason, a.status, a.patient_id, a.doctor_id,
      p.name AS p_name, p.phone AS p_phone, p.dob AS p_dob,
      d.name AS d_name, d.specialty AS d_specialty
    FROM appointment a
    JOIN patient p ON p.id = a.patient_id
    JOIN doctor d  ON d.id = a.doctor_id
"#;

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: i64,
    amount_cents: i64,
    status: InvoiceStatus,
    created_at: DateTime<Utc>,
    patient_id: i64,
    doctor_id: i64,
    p_name: String,
    p_phone: Option<String>,
    p_dob: Option<NaiveDate>,
    d_name: String,
    d_specialty: Option<String>,
}

impl From<InvoiceRow> for Invoice {
    fn from(r: InvoiceRow) -> Self {
        Invoice {
            id: r.id,
            amount_cents: r.amount_cents,
            status: r.status,
            created_at: r.created_at,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            patient: Patient {
                id: r.patient_id,
                name: r.p_name,
                phone: r.p_phone,
                dob: r.p_dob,
            },
            doctor: Doctor {
                id: r.doctor_id,
                name: r.d_name,
                specialty: r.d_specialty,
            },
        }
    }
}

const INVOICE_SELECT: &str = r#"
    SELECT
      i.id, i.amount_cents, i.status, i.created_at, i.patient_id, i.doctor_id,
      p.name AS p_name, p.phone AS p_phone, p.dob AS p_dob,
      d.name AS d_name, d.specialty AS d_specialty
    FROM invoice i
    JOIN patient p ON p.id = i.patient_id
    JOIN doctor d  ON d.id = i.doctor_id
"#;

/* ============================================================
   Helpers
   ============================================================ */

async fn ensure_patient(conn: &mut PgConnection, id: i64) -> StoreResult<()> {
    let exists: bool = sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM patient WHERE id = $1)"#)
        .bind(id)
        .fetch_one(conn)
        .await?;
    if exists { Ok(()) } else { Err(StoreError::not_found("patient", id)) }
}

async fn ensure_doctor(conn: &mut PgConnection, id: i64) -> StoreResult<()> {
    let exists: bool = sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM doctor WHERE id = $1)"#)
        .bind(id)
        .fetch_one(conn)
        .await?;
    if exists { Ok(()) } else { Err(StoreError::not_found("doctor", id)) }
}

/// FK and unique violations that slip past the explicit checks (concurrent
/// writers) become conflicts instead of opaque backend errors.
fn map_write_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() {
            return StoreError::Conflict("referenced record is missing or still in use".into());
        }
        if db.is_unique_violation() {
            return StoreError::Conflict("record already exists".into());
        }
    }
    e.into()
}

/* ============================================================
   ClinicStore
   ============================================================ */

#[async_trait]
impl ClinicStore for PgStore {
    /* ---------------- patients ---------------- */

    async fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        let rows = sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, name, phone, dob
            FROM patient
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_patient(&self, id: i64) -> StoreResult<Patient> {
        sqlx::query_as::<_, Patient>(r#"SELECT id, name, phone, dob FROM patient WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("patient", id))
    }

    async fn create_patient(&self, new: NewPatient) -> StoreResult<Patient> {
        let row = sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patient (name, phone, dob)
            VALUES ($1, $2, $3)
            RETURNING id, name, phone, dob
            "#,
        )
        .bind(new.name)
        .bind(new.phone)
        .bind(new.dob)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        Ok(row)
    }

    async fn replace_patient(&self, id: i64, new: NewPatient) -> StoreResult<Patient> {
        sqlx::query_as::<_, Patient>(
            r#"
            UPDATE patient
            SET name = $2, phone = $3, dob = $4
            WHERE id = $1
            RETURNING id, name, phone, dob
            "#,
        )
        .bind(id)
        .bind(new.name)
        .bind(new.phone)
        .bind(new.dob)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?
        .ok_or_else(|| StoreError::not_found("patient", id))
    }

    async fn delete_patient(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        ensure_patient(&mut tx, id).await?;

        let dependents: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM appointment WHERE patient_id = $1)
                 + (SELECT COUNT(*) FROM invoice     WHERE patient_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if dependents > 0 {
            return Err(StoreError::InUse(format!(
                "patient {id} is referenced by {dependents} appointment(s)/invoice(s)"
            )));
        }

        sqlx::query(r#"DELETE FROM patient WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;
        tx.commit().await?;
        Ok(())
    }

    /* ---------------- doctors ---------------- */

    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        let rows = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, name, specialty
            FROM doctor
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_doctor(&self, id: i64) -> StoreResult<Doctor> {
        sqlx::query_as::<_, Doctor>(r#"SELECT id, name, specialty FROM doctor WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("doctor", id))
    }

    async fn create_doctor(&self, new: NewDoctor) -> StoreResult<Doctor> {
        let row = sqlx::query_as::<_, Doctor>(
            r#"
            INSERT INTO doctor (name, specialty)
            VALUES ($1, $2)
            RETURNING id, name, specialty
            "#,
        )
        .bind(new.name)
        .bind(new.specialty)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        Ok(row)
    }

    async fn replace_doctor(&self, id: i64, new: NewDoctor) -> StoreResult<Doctor> {
        sqlx::query_as::<_, Doctor>(
            r#"
            UPDATE doctor
            SET name = $2, specialty = $3
            WHERE id = $1
            RETURNING id, name, specialty
            "#,
        )
        .bind(id)
        .bind(new.name)
        .bind(new.specialty)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?
        .ok_or_else(|| StoreError::not_found("doctor", id))
    }

    async fn delete_doctor(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        ensure_doctor(&mut tx, id).await?;

        let dependents: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM appointment WHERE doctor_id = $1)
                 + (SELECT COUNT(*) FROM invoice     WHERE doctor_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if dependents > 0 {
            return Err(StoreError::InUse(format!(
                "doctor {id} is referenced by {dependents} appointment(s)/invoice(s)"
            )));
        }

        sqlx::query(r#"DELETE FROM doctor WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;
        tx.commit().await?;
        Ok(())
    }

    /* ---------------- appointments ---------------- */

    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        let sql = format!("{APPOINTMENT_SELECT} ORDER BY a.date ASC, a.id ASC");
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn get_appointment(&self, id: i64) -> StoreResult<Appointment> {
        let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = $1");
        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Appointment::from)
            .ok_or_else(|| StoreError::not_found("appointment", id))
    }

    async fn create_appointment(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await?;
        ensure_patient(&mut tx, new.patient_id).await?;
        ensure_doctor(&mut tx, new.doctor_id).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO appointment (date, reason, status, patient_id, doctor_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(new.date)
        .bind(new.reason)
        .bind(new.status)
        .bind(new.patient_id)
        .bind(new.doctor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_err)?;

        tx.commit().await?;
        self.get_appointment(id).await
    }

    async fn update_appointment(&self, id: i64, changes: AppointmentChanges) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await?;
        if let Some(pid) = changes.patient_id {
            ensure_patient(&mut tx, pid).await?;
        }
        if let Some(did) = changes.doctor_id {
            ensure_doctor(&mut tx, did).await?;
        }

        // COALESCE keeps omitted columns; reason is nullable so it gets an
        // explicit "was supplied" flag.
        let (set_reason, reason) = match changes.reason {
            Some(r) => (true, r),
            None => (false, None),
        };
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE appointment
            SET
              date       = COALESCE($2, date),
              patient_id = COALESCE($3, patient_id),
              doctor_id  = COALESCE($4, doctor_id),
              reason     = CASE WHEN $5 THEN $6 ELSE reason END,
              status     = COALESCE($7, status),
              updated_at = now()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.date)
        .bind(changes.patient_id)
        .bind(changes.doctor_id)
        .bind(set_reason)
        .bind(reason)
        .bind(changes.status)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_err)?;

        if updated.is_none() {
            return Err(StoreError::not_found("appointment", id));
        }
        tx.commit().await?;
        self.get_appointment(id).await
    }

    async fn delete_appointment(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query(r#"DELETE FROM appointment WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("appointment", id));
        }
        Ok(())
    }

    async fn appointments_for_doctor_between(
        &self,
        doctor_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>> {
        let sql = format!(
            "{APPOINTMENT_SELECT} WHERE a.doctor_id = $1 AND a.date >= $2 AND a.date <= $3 \
             ORDER BY a.date ASC, a.id ASC"
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(doctor_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    /* ---------------- invoices ---------------- */

    async fn list_invoices(&self) -> StoreResult<Vec<Invoice>> {
        let sql = format!("{INVOICE_SELECT} ORDER BY i.created_at DESC, i.id DESC");
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    async fn get_invoice(&self, id: i64) -> StoreResult<Invoice> {
        let sql = format!("{INVOICE_SELECT} WHERE i.id = $1");
        sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Invoice::from)
            .ok_or_else(|| StoreError::not_found("invoice", id))
    }

    async fn create_invoice(&self, new: NewInvoice) -> StoreResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        ensure_patient(&mut tx, new.patient_id).await?;
        ensure_doctor(&mut tx, new.doctor_id).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice (amount_cents, status, patient_id, doctor_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(new.amount_cents)
        .bind(new.status)
        .bind(new.patient_id)
        .bind(new.doctor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_err)?;

        tx.commit().await?;
        self.get_invoice(id).await
    }

    async fn update_invoice(&self, id: i64, changes: InvoiceChanges) -> StoreResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        if let Some(pid) = changes.patient_id {
            ensure_patient(&mut tx, pid).await?;
        }
        if let Some(did) = changes.doctor_id {
            ensure_doctor(&mut tx, did).await?;
        }

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE invoice
            SET
              amount_cents = COALESCE($2, amount_cents),
              status       = COALESCE($3, status),
              patient_id   = COALESCE($4, patient_id),
              doctor_id    = COALESCE($5, doctor_id),
              updated_at   = now()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.amount_cents)
        .bind(changes.status)
        .bind(changes.patient_id)
        .bind(changes.doctor_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_err)?;

        if updated.is_none() {
            return Err(StoreError::not_found("invoice", id));
        }
        tx.commit().await?;
        self.get_invoice(id).await
    }

    async fn delete_invoice(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query(r#"DELETE FROM invoice WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("invoice", id));
        }
        Ok(())
    }

    /* ---------------- users ---------------- */

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, tenant_id
            FROM app_user
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, tenant_id
            FROM app_user
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO app_user (name, email, password_hash, role, tenant_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, password_hash, role, tenant_id
            "#,
        )
        .bind(new.name)
        .bind(&new.email)
        .bind(new.password_hash)
        .bind(new.role)
        .bind(new.tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match map_write_err(e) {
            StoreError::Conflict(_) => {
                StoreError::Conflict(format!("email {} is already registered", new.email))
            }
            other => other,
        })?;
        Ok(row)
    }
}
