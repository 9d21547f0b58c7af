use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::models::job::JobSnapshot;

/// Read-only view of the job listings owned by the catalogue side of the
/// product. Intake only needs enough to snapshot title and company.
#[async_trait]
pub trait JobDirectory: Send + Sync {
    async fn find_job(&self, job_id: &str) -> Result<Option<JobSnapshot>>;
}

#[derive(Clone)]
pub struct PgJobDirectory {
    pool: PgPool,
}

impl PgJobDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobDirectory for PgJobDirectory {
    async fn find_job(&self, job_id: &str) -> Result<Option<JobSnapshot>> {
        let job = sqlx::query_as::<_, JobSnapshot>(
            r#"SELECT id, title, company_name, recruiter_email FROM jobs WHERE id = $1"#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }
}

#[derive(Default)]
pub struct InMemoryJobDirectory {
    jobs: RwLock<HashMap<String, JobSnapshot>>,
}

impl InMemoryJobDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: impl IntoIterator<Item = JobSnapshot>) -> Self {
        let directory = Self::new();
        for job in jobs {
            directory.upsert(job);
        }
        directory
    }

    /// Replaces the listing, as an employer edit would.
    pub fn upsert(&self, job: JobSnapshot) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.insert(job.id.clone(), job);
        }
    }
}

#[async_trait]
impl JobDirectory for InMemoryJobDirectory {
    async fn find_job(&self, job_id: &str) -> Result<Option<JobSnapshot>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| Error::Internal("job directory lock poisoned".into()))?;
        Ok(jobs.get(job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str) -> JobSnapshot {
        JobSnapshot {
            id: "J1".into(),
            title: title.into(),
            company_name: "Acme".into(),
            recruiter_email: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_listing() {
        let directory = InMemoryJobDirectory::with_jobs([job("Engineer")]);
        assert_eq!(
            directory.find_job("J1").await.unwrap().unwrap().title,
            "Engineer"
        );

        directory.upsert(job("Senior Engineer"));
        assert_eq!(
            directory.find_job("J1").await.unwrap().unwrap().title,
            "Senior Engineer"
        );
        assert!(directory.find_job("J2").await.unwrap().is_none());
    }
}
