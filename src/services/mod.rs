pub mod application_repository;
pub mod document_service;
pub mod intake_service;
pub mod job_directory;
pub mod mail_service;
pub mod storage_service;
pub mod tracking_service;
