pub mod guest_application;
pub mod job;
