use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Travis CI build.
///
/// Mirrors the v3 "standard" build representation. Every field other than
/// `id` may be absent from minimal representations, so they default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Build {
    /// Numeric build id
    pub id: u64,
    /// Display number (e.g., "1234")
    #[serde(default)]
    pub number: String,
    /// Lifecycle state (e.g., "passed", "failed")
    #[serde(default)]
    pub state: String,
    /// Wall-clock duration in seconds
    #[serde(default)]
    pub duration: Option<i64>,
    /// Event that triggered the build (push, pull_request, api, cron)
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub branch: Option<BranchRef>,
    #[serde(default)]
    pub commit: Option<Commit>,
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
    #[serde(default)]
    pub jobs: Option<Vec<Job>>,
}

impl Build {
    /// Branch name, or `unknown` when the API did not report one.
    pub fn branch_name(&self) -> &str {
        self.branch
            .as_ref()
            .map(|b| b.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("unknown")
    }

    /// Duration in seconds if it is known and positive.
    pub fn positive_duration(&self) -> Option<u64> {
        self.duration.filter(|d| *d > 0).and_then(|d| u64::try_from(d).ok())
    }

    /// First line of the commit message, if any.
    pub fn commit_subject(&self) -> Option<&str> {
        self.commit
            .as_ref()
            .and_then(|c| c.message.as_deref())
            .and_then(|m| m.lines().next())
    }
}

/// A job within a build (one matrix entry).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    /// Dotted display number: `<build number>.<index>`
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub allow_failure: Option<bool>,
    /// Free-form job configuration (language, versions, env, ...)
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Duration in seconds; Travis does not report it for jobs, so it is
    /// normally derived from the timestamps.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
}

impl Job {
    /// Duration in seconds if known and positive, falling back to the
    /// started/finished timestamps.
    pub fn positive_duration(&self) -> Option<u64> {
        let seconds = self.duration.or_else(|| match (self.started_at, self.finished_at) {
            (Some(start), Some(finish)) => Some((finish - start).num_seconds()),
            _ => None,
        })?;
        u64::try_from(seconds).ok().filter(|s| *s > 0)
    }

    /// Language tag and version from the job config, e.g. `node_js 18`.
    pub fn language_label(&self) -> Option<String> {
        let config = self.config.as_ref()?;
        let language = config.get("language")?.as_str()?;
        let version = config.get(language).map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|i| i.as_str().map_or_else(|| i.to_string(), str::to_string))
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        });

        Some(match version {
            Some(version) => format!("{language} {version}"),
            None => language.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<Person>,
    #[serde(default)]
    pub committed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
}

/// A repository as returned by `/repo/{slug}` and `/repos`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub private: Option<bool>,
    #[serde(default)]
    pub default_branch: Option<BranchRef>,
}

/// A branch with its most recent build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default_branch: Option<bool>,
    #[serde(default)]
    pub last_build: Option<Build>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A build request created through `POST /repo/{slug}/requests`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildRequest {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerResponse {
    /// `pending` while Travis is still processing the request.
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub remaining_requests: Option<u64>,
    #[serde(default)]
    pub request: Option<BuildRequest>,
}

/// Response of the restart/cancel endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateChange {
    #[serde(default)]
    pub state_change: Option<String>,
    #[serde(default)]
    pub build: Option<Build>,
    #[serde(default)]
    pub job: Option<Job>,
}

#[derive(Deserialize)]
pub(super) struct BuildsResponse {
    pub builds: Vec<Build>,
}

#[derive(Deserialize)]
pub(super) struct JobsResponse {
    pub jobs: Vec<Job>,
}

#[derive(Deserialize)]
pub(super) struct RepositoriesResponse {
    pub repositories: Vec<Repository>,
}

#[derive(Deserialize)]
pub(super) struct BranchesResponse {
    pub branches: Vec<Branch>,
}
