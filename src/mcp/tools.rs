//! Tool catalog and dispatch.
//!
//! Every tool takes a JSON object of arguments, deserialized into a typed
//! struct, and produces a single block of text.

use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};

use crate::analysis::{build_insights_report, optimization_report, MAX_INSIGHTS_LIMIT};
use crate::config::AnalysisConfig;
use crate::error::{Result, TravisLensError};
use crate::travis::{fetch_job_logs, TravisClient};

use super::protocol::Tool;
use super::render;

/// Upper bound for the plain listing tools.
pub const MAX_LIST_LIMIT: usize = 100;

const DEFAULT_TRIGGER_BRANCH: &str = "master";

/// Name, description and input schema of every tool, in catalog order.
pub fn tool_catalog() -> Vec<Tool> {
    let repo = json!({"type": "string", "description": "Repository slug, e.g. owner/name"});
    let build_id = json!({"type": "integer", "description": "Numeric Travis build id"});
    let job_id = json!({"type": "integer", "description": "Numeric Travis job id"});

    let object = |properties: Value, required: &[&str]| {
        json!({"type": "object", "properties": properties, "required": required})
    };
    let tool = |name: &str, description: &str, input_schema: Value| Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    };

    vec![
        tool(
            "list_builds",
            "List recent builds of a repository, newest first",
            object(
                json!({
                    "repo": repo,
                    "branch": {"type": "string", "description": "Only builds of this branch"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": MAX_LIST_LIMIT},
                }),
                &["repo"],
            ),
        ),
        tool(
            "get_build",
            "Show a build with its commit and jobs",
            object(json!({"build_id": build_id}), &["build_id"]),
        ),
        tool(
            "trigger_build",
            "Request a new build of a branch",
            object(
                json!({
                    "repo": repo,
                    "branch": {"type": "string", "description": "Branch to build (default: master)"},
                    "message": {"type": "string", "description": "Build message"},
                    "config": {"type": "object", "description": "Config merged into .travis.yml"},
                }),
                &["repo"],
            ),
        ),
        tool(
            "restart_build",
            "Restart every job of a build",
            object(json!({"build_id": build_id}), &["build_id"]),
        ),
        tool(
            "cancel_build",
            "Cancel a running build",
            object(json!({"build_id": build_id}), &["build_id"]),
        ),
        tool(
            "get_job",
            "Show a job with its configuration",
            object(json!({"job_id": job_id}), &["job_id"]),
        ),
        tool(
            "get_job_log",
            "Fetch the log of a job",
            object(
                json!({
                    "job_id": job_id,
                    "tail": {"type": "integer", "minimum": 1, "description": "Only the last N lines"},
                }),
                &["job_id"],
            ),
        ),
        tool(
            "restart_job",
            "Restart a single job",
            object(json!({"job_id": job_id}), &["job_id"]),
        ),
        tool(
            "cancel_job",
            "Cancel a single job",
            object(json!({"job_id": job_id}), &["job_id"]),
        ),
        tool(
            "get_repository",
            "Show repository settings and default branch",
            object(json!({"repo": repo}), &["repo"]),
        ),
        tool(
            "list_branches",
            "List branches with the state of their last build",
            object(
                json!({
                    "repo": repo,
                    "limit": {"type": "integer", "minimum": 1, "maximum": MAX_LIST_LIMIT},
                }),
                &["repo"],
            ),
        ),
        tool(
            "analyze_build_insights",
            "Pass rate, trend, durations, branch breakdown and recent failures over recent builds",
            object(
                json!({
                    "repo": repo,
                    "branch": {"type": "string", "description": "Only builds of this branch"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": MAX_INSIGHTS_LIMIT},
                }),
                &["repo"],
            ),
        ),
        tool(
            "get_optimization_recommendations",
            "Scan the job logs of a build for slow steps and suggest fixes",
            object(json!({"build_id": build_id}), &["build_id"]),
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct RepoArgs {
    repo: String,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    repo: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct BuildArgs {
    #[serde(deserialize_with = "numeric_id")]
    build_id: u64,
}

#[derive(Debug, Deserialize)]
struct JobArgs {
    #[serde(deserialize_with = "numeric_id")]
    job_id: u64,
}

#[derive(Debug, Deserialize)]
struct JobLogArgs {
    #[serde(deserialize_with = "numeric_id")]
    job_id: u64,
    #[serde(default)]
    tail: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TriggerArgs {
    repo: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    config: Option<Map<String, Value>>,
}

/// Ids are accepted as JSON numbers or as numeric strings ("123", "#123").
fn numeric_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .trim_start_matches('#')
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid id '{text}'"))),
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        Value::Object(Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| TravisLensError::InvalidArguments(format!("{tool}: {e}")))
}

fn require_slug(repo: &str) -> Result<&str> {
    let repo = repo.trim();
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(repo),
        _ => Err(TravisLensError::InvalidArguments(format!(
            "repo must be an owner/name slug, got '{repo}'"
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Runs tools against one Travis client.
pub struct Toolbox {
    client: TravisClient,
    analysis: AnalysisConfig,
}

impl Toolbox {
    pub fn new(client: TravisClient, analysis: AnalysisConfig) -> Self {
        Self { client, analysis }
    }

    pub fn client(&self) -> &TravisClient {
        &self.client
    }

    /// Invokes a tool by name.
    ///
    /// # Errors
    ///
    /// [`TravisLensError::UnknownTool`] for names outside the catalog,
    /// [`TravisLensError::InvalidArguments`] for arguments that do not fit
    /// the tool, and any client error from the Travis API.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<String> {
        info!("Calling tool {name}");

        match name {
            "list_builds" => {
                let args: ListArgs = parse_args(name, arguments)?;
                let repo = require_slug(&args.repo)?;
                let branch = non_empty(args.branch);
                let limit = self.list_limit(args.limit);
                let builds = self.client.builds(repo, branch.as_deref(), limit).await?;
                Ok(render::build_list(repo, branch.as_deref(), &builds))
            }
            "get_build" => {
                let args: BuildArgs = parse_args(name, arguments)?;
                let build = self.client.build(args.build_id).await?;
                Ok(render::build_detail(&build, self.client.web_url()))
            }
            "trigger_build" => {
                let args: TriggerArgs = parse_args(name, arguments)?;
                let repo = require_slug(&args.repo)?;
                let branch =
                    non_empty(args.branch).unwrap_or_else(|| DEFAULT_TRIGGER_BRANCH.to_string());
                let message = non_empty(args.message);
                let response = self
                    .client
                    .trigger_build(repo, &branch, message.as_deref(), args.config)
                    .await?;
                Ok(render::trigger(repo, &branch, &response))
            }
            "restart_build" => {
                let args: BuildArgs = parse_args(name, arguments)?;
                let change = self.client.restart_build(args.build_id).await?;
                Ok(render::state_change("restart", &format!("build {}", args.build_id), &change))
            }
            "cancel_build" => {
                let args: BuildArgs = parse_args(name, arguments)?;
                let change = self.client.cancel_build(args.build_id).await?;
                Ok(render::state_change("cancel", &format!("build {}", args.build_id), &change))
            }
            "get_job" => {
                let args: JobArgs = parse_args(name, arguments)?;
                let job = self.client.job(args.job_id).await?;
                Ok(render::job_detail(&job, self.client.web_url()))
            }
            "get_job_log" => {
                let args: JobLogArgs = parse_args(name, arguments)?;
                if args.tail == Some(0) {
                    return Err(TravisLensError::InvalidArguments(format!(
                        "{name}: tail must be at least 1"
                    )));
                }
                let log = self.client.job_log(args.job_id).await?;
                Ok(render::job_log(args.job_id, &log, args.tail))
            }
            "restart_job" => {
                let args: JobArgs = parse_args(name, arguments)?;
                let change = self.client.restart_job(args.job_id).await?;
                Ok(render::state_change("restart", &format!("job {}", args.job_id), &change))
            }
            "cancel_job" => {
                let args: JobArgs = parse_args(name, arguments)?;
                let change = self.client.cancel_job(args.job_id).await?;
                Ok(render::state_change("cancel", &format!("job {}", args.job_id), &change))
            }
            "get_repository" => {
                let args: RepoArgs = parse_args(name, arguments)?;
                let repo = self.client.repository(require_slug(&args.repo)?).await?;
                Ok(render::repository(&repo))
            }
            "list_branches" => {
                let args: ListArgs = parse_args(name, arguments)?;
                let repo = require_slug(&args.repo)?;
                let branches = self.client.branches(repo, self.list_limit(args.limit)).await?;
                Ok(render::branch_list(repo, &branches))
            }
            "analyze_build_insights" => {
                let args: ListArgs = parse_args(name, arguments)?;
                self.build_insights(&args.repo, non_empty(args.branch).as_deref(), args.limit)
                    .await
            }
            "get_optimization_recommendations" => {
                let args: BuildArgs = parse_args(name, arguments)?;
                self.optimization_recommendations(args.build_id).await
            }
            _ => Err(TravisLensError::UnknownTool(name.to_string())),
        }
    }

    /// Fetches recent builds and renders the insights report.
    ///
    /// `limit` defaults to the configured insights limit and never exceeds
    /// [`MAX_INSIGHTS_LIMIT`].
    pub async fn build_insights(
        &self,
        repo: &str,
        branch: Option<&str>,
        limit: Option<usize>,
    ) -> Result<String> {
        let repo = require_slug(repo)?;
        let limit = limit
            .unwrap_or(self.analysis.insights_limit)
            .clamp(1, MAX_INSIGHTS_LIMIT);

        info!("Analyzing up to {limit} builds of {repo}");
        let builds = self.client.builds(repo, branch, limit).await?;
        Ok(build_insights_report(repo, branch, &builds))
    }

    /// Fetches a build, its jobs and their logs and renders the
    /// optimization report.
    pub async fn optimization_recommendations(&self, build_id: u64) -> Result<String> {
        let build = self.client.build(build_id).await?;
        let jobs = match build.jobs.clone() {
            Some(jobs) if !jobs.is_empty() => jobs,
            _ => self.client.build_jobs(build_id).await?,
        };

        let job_logs = fetch_job_logs(&self.client, jobs).await;
        Ok(optimization_report(&build, &job_logs))
    }

    fn list_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.analysis.list_limit)
            .clamp(1, MAX_LIST_LIMIT)
    }
}
