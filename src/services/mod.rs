pub mod admin;
pub mod auth;
pub mod preview;
pub mod submission;
pub mod upload_queue;
pub mod verification;
