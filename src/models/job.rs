use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The slice of a job listing that guest intake snapshots at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct JobSnapshot {
    pub id: String,
    pub title: String,
    pub company_name: String,
    pub recruiter_email: Option<String>,
}
