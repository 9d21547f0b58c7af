use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use url::Url;

use crate::dto::quick_apply_dto::{QuickApplyForm, QuickApplySubmission, ResumeUpload};
use crate::error::{Error, Result};
use crate::models::guest_application::{GuestApplication, NewGuestApplication};
use crate::models::job::JobSnapshot;
use crate::services::application_repository::ApplicationRepository;
use crate::services::document_service::{DocumentService, SummaryFacts};
use crate::services::job_directory::JobDirectory;
use crate::services::mail_service::{
    guest_confirmation, ConfirmationDetails, DispatchReceipt, MailAttachment, MailMessage,
    MailService,
};
use crate::services::storage_service::StorageService;
use crate::utils::token::issue_tracking_token;
use crate::utils::validation::{non_blank, normalize_email, validate};

pub const SUMMARY_ATTACHMENT_NAME: &str = "application-summary.pdf";

/// Result of a successful intake. `notification` carries the dispatch
/// outcome: an `Err` there never undoes the submission.
#[derive(Debug)]
pub struct IntakeOutcome {
    pub application: GuestApplication,
    pub track_url: String,
    pub notification: Result<DispatchReceipt>,
}

impl IntakeOutcome {
    pub fn preview_url(&self) -> Option<&str> {
        self.notification
            .as_ref()
            .ok()
            .and_then(|receipt| receipt.preview_url.as_deref())
    }
}

#[derive(Clone)]
pub struct IntakeService {
    repository: Arc<dyn ApplicationRepository>,
    jobs: Arc<dyn JobDirectory>,
    storage: StorageService,
    documents: DocumentService,
    mail: MailService,
    frontend_url: String,
}

impl IntakeService {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        jobs: Arc<dyn JobDirectory>,
        storage: StorageService,
        mail: MailService,
        frontend_url: &str,
    ) -> Self {
        Self {
            repository,
            jobs,
            documents: DocumentService::new(storage.clone()),
            storage,
            mail,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Runs a guest submission front to back. The resume and the summary
    /// document are written before the record, so a stored record always has
    /// both. Anything up to and including the insert aborts the request;
    /// the confirmation mail is best effort.
    pub async fn submit(
        &self,
        job_id: &str,
        submission: QuickApplySubmission,
    ) -> Result<IntakeOutcome> {
        let (form, resume) = normalize(submission)?;

        let job = self
            .jobs
            .find_job(job_id)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".into()))?;

        if self
            .repository
            .find_by_job_and_email(&job.id, &form.email)
            .await?
            .is_some()
        {
            info!(job_id = %job.id, "duplicate guest application rejected");
            return Err(Error::DuplicateApplication);
        }

        let resume = self
            .storage
            .store_resume(&resume.filename, &resume.bytes)
            .await?;

        let tracking_token = issue_tracking_token();
        let track_url = tracking_url(&self.frontend_url, &tracking_token);
        let submitted_at = Utc::now();

        let summary = self
            .documents
            .render_and_store(SummaryFacts {
                job_title: job.title.clone(),
                company_name: job.company_name.clone(),
                applicant_name: form.name.clone(),
                email: form.email.clone(),
                phone: form.phone.clone(),
                message: form.message.clone(),
                submitted_at,
                tracking_token: tracking_token.clone(),
                tracking_url: track_url.clone(),
                resume_reference: resume.reference.clone(),
            })
            .await
            .map_err(|e| {
                error!(job_id = %job.id, error = %e, "summary document could not be produced");
                e
            })?;

        let application = self
            .repository
            .create(NewGuestApplication {
                job_id: job.id.clone(),
                job_title: job.title.clone(),
                company_name: job.company_name.clone(),
                name: form.name,
                email: form.email,
                phone: form.phone,
                message: form.message,
                resume_ref: resume.reference,
                summary_ref: summary.reference,
                tracking_token,
                created_at: submitted_at,
            })
            .await?;
        info!(job_id = %job.id, application_id = %application.id, "guest application recorded");

        let notification = self.notify(&job, &application, &track_url).await;
        match &notification {
            Ok(receipt) => info!(
                application_id = %application.id,
                transport = ?receipt.transport,
                "confirmation dispatched"
            ),
            Err(e) => warn!(
                application_id = %application.id,
                error = %e,
                "confirmation could not be dispatched; submission stands"
            ),
        }

        Ok(IntakeOutcome {
            application,
            track_url,
            notification,
        })
    }

    async fn notify(
        &self,
        job: &JobSnapshot,
        application: &GuestApplication,
        track_url: &str,
    ) -> Result<DispatchReceipt> {
        let mail = guest_confirmation(&ConfirmationDetails {
            applicant_name: &application.name,
            job_title: &application.job_title,
            company_name: &application.company_name,
            submitted_at: application.created_at,
            tracking_url: track_url,
        });
        let cc = job
            .recruiter_email
            .clone()
            .or_else(|| self.mail.recruiter_cc().map(str::to_string));

        self.mail
            .send(&MailMessage {
                from: self.mail.sender().to_string(),
                to: application.email.clone(),
                cc,
                subject: mail.subject,
                text: mail.text,
                html: mail.html,
                attachments: vec![MailAttachment {
                    filename: SUMMARY_ATTACHMENT_NAME.to_string(),
                    reference: application.summary_ref.clone(),
                    content_type: "application/pdf".to_string(),
                }],
            })
            .await
    }
}

fn normalize(submission: QuickApplySubmission) -> Result<(QuickApplyForm, ResumeUpload)> {
    let QuickApplySubmission { form, resume } = submission;
    let form = QuickApplyForm {
        name: form.name.trim().to_string(),
        email: normalize_email(&form.email),
        phone: form.phone.trim().to_string(),
        message: non_blank(form.message),
    };
    validate(&form)?;

    let resume = resume
        .filter(|upload| !upload.filename.trim().is_empty())
        .ok_or_else(|| Error::Validation("Resume file is required".into()))?;
    Ok((form, resume))
}

/// Public page a guest visits to check their application.
pub fn tracking_url(frontend_url: &str, token: &str) -> String {
    let base = format!("{}/applications/track", frontend_url.trim_end_matches('/'));
    match Url::parse(&base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("token", token);
            url.to_string()
        }
        Err(_) => format!("{}?token={}", base, token),
    }
}
