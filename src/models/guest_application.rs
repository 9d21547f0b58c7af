use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Submitted,
    UnderReview,
    Interview,
    Rejected,
    Accepted,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::UnderReview => "UnderReview",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Accepted => "Accepted",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ApplicationStatus::Pending),
            "Submitted" => Ok(ApplicationStatus::Submitted),
            "UnderReview" | "Under Review" => Ok(ApplicationStatus::UnderReview),
            "Interview" => Ok(ApplicationStatus::Interview),
            "Rejected" => Ok(ApplicationStatus::Rejected),
            "Accepted" | "Approved" => Ok(ApplicationStatus::Accepted),
            other => Err(format!("unknown application status '{}'", other)),
        }
    }
}

/// A guest's submission to one job. `(job_id, email)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestApplication {
    pub id: Uuid,
    pub job_id: String,
    pub job_title: String,
    pub company_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: Option<String>,
    pub status: ApplicationStatus,
    pub resume_ref: String,
    pub summary_ref: String,
    #[serde(skip_serializing)]
    pub tracking_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column-level shape of the `guest_applications` table.
#[derive(Debug, Clone, FromRow)]
pub struct GuestApplicationRow {
    pub id: Uuid,
    pub job_id: String,
    pub job_title: String,
    pub company_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: Option<String>,
    pub status: String,
    pub resume_ref: String,
    pub summary_ref: String,
    pub tracking_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<GuestApplicationRow> for GuestApplication {
    type Error = crate::error::Error;

    fn try_from(row: GuestApplicationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ApplicationStatus>()
            .map_err(crate::error::Error::Internal)?;
        Ok(Self {
            id: row.id,
            job_id: row.job_id,
            job_title: row.job_title,
            company_name: row.company_name,
            name: row.name,
            email: row.email,
            phone: row.phone,
            message: row.message,
            status,
            resume_ref: row.resume_ref,
            summary_ref: row.summary_ref,
            tracking_token: row.tracking_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Everything needed to insert a record; the repository assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewGuestApplication {
    pub job_id: String,
    pub job_title: String,
    pub company_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: Option<String>,
    pub resume_ref: String,
    pub summary_ref: String,
    pub tracking_token: String,
    pub created_at: DateTime<Utc>,
}
