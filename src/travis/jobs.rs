use log::{info, warn};

use crate::analysis::JobLog;
use crate::error::Result;

use super::client::TravisClient;
use super::types::Job;

/// Prefix of the text substituted for a log that could not be fetched.
pub const LOG_FETCH_ERROR: &str = "Error fetching log";

/// Outcome of fetching one job's log and details. Both halves are kept as
/// results so a failure never affects sibling jobs.
struct JobFetch {
    job: Job,
    log: Result<String>,
    detail: Result<Job>,
}

impl JobFetch {
    fn into_job_log(self) -> JobLog {
        let Self { job, log, detail } = self;

        let duration = match detail {
            Ok(detail) => detail.positive_duration(),
            Err(e) => {
                warn!("Could not fetch details for job {}: {e}", job.id);
                None
            }
        }
        .or_else(|| job.positive_duration());

        let (log, log_available) = match log {
            Ok(text) => (text, true),
            Err(e) => {
                warn!("Could not fetch log for job {}: {e}", job.id);
                (format!("{LOG_FETCH_ERROR}: {e}"), false)
            }
        };

        JobLog {
            job,
            log,
            log_available,
            duration,
        }
    }
}

/// Fetches the log and details of every job concurrently.
///
/// Per-job failures are folded into the returned [`JobLog`]s: a missing log
/// becomes the error sentinel, a missing detail becomes an unknown duration.
/// Output order matches the input order.
pub async fn fetch_job_logs(client: &TravisClient, jobs: Vec<Job>) -> Vec<JobLog> {
    info!("Fetching logs for {} jobs in parallel...", jobs.len());

    let fetches = jobs.into_iter().map(|job| async move {
        let (log, detail) = futures::join!(client.job_log(job.id), client.job(job.id));
        JobFetch { job, log, detail }
    });

    futures::future::join_all(fetches)
        .await
        .into_iter()
        .map(JobFetch::into_job_log)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: u64, number: &str) -> Job {
        Job {
            id,
            number: number.to_string(),
            state: "passed".to_string(),
            ..Job::default()
        }
    }

    #[tokio::test]
    async fn test_failed_log_fetch_substitutes_sentinel() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/job/1/log.txt")
            .with_body("$ npm install\n")
            .create_async()
            .await;
        server
            .mock("GET", "/job/1")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"id":1,"number":"9.1","state":"passed","started_at":"2024-01-01T00:00:00Z","finished_at":"2024-01-01T00:06:40Z"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/job/2/log.txt")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        server
            .mock("GET", "/job/2")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = TravisClient::new(&server.url(), "https://app.travis-ci.com", None).unwrap();
        let logs = fetch_job_logs(&client, vec![job(1, "9.1"), job(2, "9.2")]).await;

        assert_eq!(logs.len(), 2);
        assert!(logs[0].log_available);
        assert_eq!(logs[0].duration, Some(400));
        assert!(logs[0].log.contains("npm install"));

        assert!(!logs[1].log_available);
        assert!(logs[1].log.starts_with(LOG_FETCH_ERROR));
        assert!(logs[1].log.contains("boom"));
        assert_eq!(logs[1].duration, None);
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let client = TravisClient::new("http://127.0.0.1:9", "https://app.travis-ci.com", None).unwrap();
        assert!(fetch_job_logs(&client, Vec::new()).await.is_empty());
    }
}
