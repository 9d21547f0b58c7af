use std::sync::Arc;

use crate::dto::quick_apply_dto::TrackedApplicationView;
use crate::error::{Error, Result};
use crate::models::guest_application::GuestApplication;
use crate::services::application_repository::{tracking_miss, ApplicationRepository};
use crate::services::storage_service::StorageService;
use crate::utils::token::looks_like_tracking_token;
use crate::utils::validation::{is_valid_email, normalize_email};

#[derive(Clone)]
pub struct TrackingService {
    repository: Arc<dyn ApplicationRepository>,
    storage: StorageService,
}

impl TrackingService {
    pub fn new(repository: Arc<dyn ApplicationRepository>, storage: StorageService) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Resolves a `(token, email)` pair to the guest's view of their
    /// application. The token must match exactly; only the email is
    /// case-insensitive. Every kind of miss produces the same `NotFound`.
    pub async fn lookup(&self, token: &str, email: &str) -> Result<TrackedApplicationView> {
        let token = token.trim();
        let email = normalize_email(email);
        if token.is_empty() || email.is_empty() {
            return Err(Error::Validation("token and email are required".into()));
        }
        if !looks_like_tracking_token(token) || !is_valid_email(&email) {
            return Err(tracking_miss());
        }

        let application = self
            .repository
            .find_by_tracking_token(token, &email)
            .await?;
        Ok(self.view(application))
    }

    fn view(&self, application: GuestApplication) -> TrackedApplicationView {
        TrackedApplicationView {
            id: application.id,
            resume_url: self.storage.public_url(&application.resume_ref),
            document_url: self.storage.public_url(&application.summary_ref),
            job_id: application.job_id,
            job_title: application.job_title,
            company_name: application.company_name,
            applicant_name: application.name,
            status: application.status,
            message: application.message,
            submitted_at: application.created_at,
            updated_at: application.updated_at,
        }
    }
}
