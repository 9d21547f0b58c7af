use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::guest_application::ApplicationStatus;

#[derive(Debug, Clone, Default, Validate)]
pub struct QuickApplyForm {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, max = 40, message = "Phone number is required"))]
    pub phone: String,
    #[validate(length(max = 5000, message = "Message is too long"))]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// A parsed quick-apply request, before any validation.
#[derive(Debug, Clone, Default)]
pub struct QuickApplySubmission {
    pub form: QuickApplyForm,
    pub resume: Option<ResumeUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationReceipt {
    pub id: Uuid,
    pub job_id: String,
    pub status: ApplicationStatus,
    pub resume_url: String,
    pub tracking_token: String,
    pub document_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickApplyResponse {
    pub success: bool,
    pub application: ApplicationReceipt,
    pub track_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackQuery {
    pub token: Option<String>,
    pub email: Option<String>,
}

/// What a guest sees about their own application. No token, no contact details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedApplicationView {
    pub id: Uuid,
    pub job_id: String,
    pub job_title: String,
    pub company_name: String,
    pub applicant_name: String,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub resume_url: String,
    pub document_url: String,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    pub application: TrackedApplicationView,
}
