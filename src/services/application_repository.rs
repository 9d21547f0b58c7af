use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::guest_application::{
    ApplicationStatus, GuestApplication, GuestApplicationRow, NewGuestApplication,
};
use crate::utils::validation::normalize_email;

const UNIQUE_VIOLATION: &str = "23505";

const SELECT_COLUMNS: &str = "id, job_id, job_title, company_name, name, email, phone, message, \
     status, resume_ref, summary_ref, tracking_token, created_at, updated_at";

/// Source of truth for guest applications. `create` must enforce the
/// `(job_id, email)` uniqueness atomically; the lookup in
/// `find_by_job_and_email` is only a fast path.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_job_and_email(
        &self,
        job_id: &str,
        email: &str,
    ) -> Result<Option<GuestApplication>>;

    /// Fails with `DuplicateApplication` when the key is already taken.
    async fn create(&self, new: NewGuestApplication) -> Result<GuestApplication>;

    /// Both halves must match. A miss on either is the same `NotFound`.
    async fn find_by_tracking_token(&self, token: &str, email: &str) -> Result<GuestApplication>;

    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<GuestApplication>;
}

pub fn tracking_miss() -> Error {
    Error::NotFound("No application matches this tracking token and email".into())
}

#[derive(Clone)]
pub struct PgApplicationRepository {
    pool: PgPool,
}

impl PgApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn find_by_job_and_email(
        &self,
        job_id: &str,
        email: &str,
    ) -> Result<Option<GuestApplication>> {
        let row = sqlx::query_as::<_, GuestApplicationRow>(&format!(
            "SELECT {} FROM guest_applications WHERE job_id = $1 AND email = $2",
            SELECT_COLUMNS
        ))
        .bind(job_id)
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        row.map(GuestApplication::try_from).transpose()
    }

    async fn create(&self, new: NewGuestApplication) -> Result<GuestApplication> {
        let result = sqlx::query_as::<_, GuestApplicationRow>(&format!(
            r#"
            INSERT INTO guest_applications
                (id, job_id, job_title, company_name, name, email, phone, message, status,
                 resume_ref, summary_ref, tracking_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.job_id)
        .bind(&new.job_title)
        .bind(&new.company_name)
        .bind(&new.name)
        .bind(normalize_email(&new.email))
        .bind(&new.phone)
        .bind(&new.message)
        .bind(ApplicationStatus::Pending.as_str())
        .bind(&new.resume_ref)
        .bind(&new.summary_ref)
        .bind(&new.tracking_token)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => GuestApplication::try_from(row),
            Err(sqlx::Error::Database(db))
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                Err(Error::DuplicateApplication)
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn find_by_tracking_token(&self, token: &str, email: &str) -> Result<GuestApplication> {
        let row = sqlx::query_as::<_, GuestApplicationRow>(&format!(
            "SELECT {} FROM guest_applications WHERE tracking_token = $1 AND email = $2",
            SELECT_COLUMNS
        ))
        .bind(token)
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        row.map(GuestApplication::try_from)
            .transpose()?
            .ok_or_else(tracking_miss)
    }

    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<GuestApplication> {
        let row = sqlx::query_as::<_, GuestApplicationRow>(&format!(
            r#"
            UPDATE guest_applications
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(GuestApplication::try_from)
            .transpose()?
            .ok_or_else(|| Error::NotFound("Application not found".into()))
    }
}

/// Process-local store keyed by `(job_id, email)`. The key check and the
/// insert happen under one lock.
#[derive(Default)]
pub struct InMemoryApplicationRepository {
    records: Mutex<HashMap<(String, String), GuestApplication>>,
}

impl InMemoryApplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), GuestApplication>>> {
        self.records
            .lock()
            .map_err(|_| Error::Internal("application store lock poisoned".into()))
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn find_by_job_and_email(
        &self,
        job_id: &str,
        email: &str,
    ) -> Result<Option<GuestApplication>> {
        let records = self.lock()?;
        Ok(records
            .get(&(job_id.to_string(), normalize_email(email)))
            .cloned())
    }

    async fn create(&self, new: NewGuestApplication) -> Result<GuestApplication> {
        let email = normalize_email(&new.email);
        let mut records = self.lock()?;

        let key = (new.job_id.clone(), email.clone());
        if records.contains_key(&key) {
            return Err(Error::DuplicateApplication);
        }
        if records
            .values()
            .any(|existing| existing.tracking_token == new.tracking_token)
        {
            return Err(Error::Internal("tracking token collision".into()));
        }

        let record = GuestApplication {
            id: Uuid::new_v4(),
            job_id: new.job_id,
            job_title: new.job_title,
            company_name: new.company_name,
            name: new.name,
            email,
            phone: new.phone,
            message: new.message,
            status: ApplicationStatus::Pending,
            resume_ref: new.resume_ref,
            summary_ref: new.summary_ref,
            tracking_token: new.tracking_token,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn find_by_tracking_token(&self, token: &str, email: &str) -> Result<GuestApplication> {
        let email = normalize_email(email);
        let records = self.lock()?;
        records
            .values()
            .find(|record| {
                let token_matches: bool = record
                    .tracking_token
                    .as_bytes()
                    .ct_eq(token.as_bytes())
                    .into();
                token_matches && record.email == email
            })
            .cloned()
            .ok_or_else(tracking_miss)
    }

    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<GuestApplication> {
        let mut records = self.lock()?;
        let record = records
            .values_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| Error::NotFound("Application not found".into()))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}
