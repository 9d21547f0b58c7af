pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::{
    application_repository::{
        ApplicationRepository, InMemoryApplicationRepository, PgApplicationRepository,
    },
    intake_service::IntakeService,
    job_directory::{InMemoryJobDirectory, JobDirectory, PgJobDirectory},
    mail_service::MailService,
    storage_service::{StorageService, UploadPolicy},
    tracking_service::TrackingService,
};

#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub mail_service: MailService,
    pub intake_service: IntakeService,
    pub tracking_service: TrackingService,
}

impl AppState {
    pub fn new(
        config: &Config,
        repository: Arc<dyn ApplicationRepository>,
        jobs: Arc<dyn JobDirectory>,
    ) -> Self {
        let storage = StorageService::new(
            config.uploads_dir.clone(),
            &config.public_base_url,
            UploadPolicy::new(config.max_resume_bytes),
        );
        let mail_service = MailService::new(config.mail.clone(), storage.clone());
        let intake_service = IntakeService::new(
            repository.clone(),
            jobs,
            storage.clone(),
            mail_service.clone(),
            &config.frontend_url,
        );
        let tracking_service = TrackingService::new(repository, storage.clone());

        Self {
            storage,
            mail_service,
            intake_service,
            tracking_service,
        }
    }

    pub fn with_postgres(config: &Config, pool: PgPool) -> Self {
        Self::new(
            config,
            Arc::new(PgApplicationRepository::new(pool.clone())),
            Arc::new(PgJobDirectory::new(pool)),
        )
    }

    /// Process-local stores; nothing survives a restart.
    pub fn in_memory(config: &Config, jobs: InMemoryJobDirectory) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryApplicationRepository::new()),
            Arc::new(jobs),
        )
    }
}
