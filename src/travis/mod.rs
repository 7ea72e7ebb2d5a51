mod client;
mod jobs;
pub mod links;
pub mod types;

pub use client::TravisClient;
pub use jobs::fetch_job_logs;
