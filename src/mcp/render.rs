//! Plain-text rendering of Travis records for tool results.

use std::fmt::Write;

use crate::analysis::{format_duration, heavy_rule, state_glyph};
use crate::travis::links::{build_url, job_url};
use crate::travis::types::{Branch, Build, Job, Repository, StateChange, TriggerResponse};

const SUBJECT_WIDTH: usize = 72;

fn duration_text(seconds: Option<u64>) -> String {
    seconds.map_or_else(|| "-".to_string(), format_duration)
}

fn date_text<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn subject(build: &Build) -> String {
    let subject = build.commit_subject().unwrap_or("");
    if subject.chars().count() > SUBJECT_WIDTH {
        let cut: String = subject.chars().take(SUBJECT_WIDTH).collect();
        format!("{cut}...")
    } else {
        subject.to_string()
    }
}

pub fn build_list(repo: &str, branch: Option<&str>, builds: &[Build]) -> String {
    let scope = branch.map(|b| format!(" on branch {b}")).unwrap_or_default();
    if builds.is_empty() {
        return format!("No builds found for {repo}{scope}.");
    }

    let mut output = format!("Builds for {repo}{scope} ({} shown)\n", builds.len());
    for build in builds {
        let _ = writeln!(
            output,
            "{} #{} [{}] {} ({}) {}",
            state_glyph(&build.state),
            build.number,
            build.branch_name(),
            build.state,
            duration_text(build.positive_duration()),
            subject(build)
        );
    }
    output
}

pub fn build_detail(build: &Build, web_url: &str) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Build #{} (id {})", build.number, build.id);
    let _ = writeln!(output, "{}", heavy_rule());
    if let Some(repo) = &build.repository {
        let _ = writeln!(output, "Repository: {}", repo.slug);
        let _ = writeln!(output, "URL: {}", build_url(web_url, &repo.slug, build.id));
    }
    let _ = writeln!(output, "State: {} {}", state_glyph(&build.state), build.state);
    let _ = writeln!(output, "Branch: {}", build.branch_name());
    if let Some(event) = &build.event_type {
        let _ = writeln!(output, "Event: {event}");
    }
    let _ = writeln!(output, "Duration: {}", duration_text(build.positive_duration()));
    let _ = writeln!(output, "Started: {}", date_text(build.started_at));
    let _ = writeln!(output, "Finished: {}", date_text(build.finished_at));

    if let Some(commit) = &build.commit {
        let _ = writeln!(output);
        if let Some(sha) = &commit.sha {
            let _ = writeln!(output, "Commit: {sha}");
        }
        if let Some(author) = commit.author.as_ref().and_then(|a| a.name.as_deref()) {
            let _ = writeln!(output, "Author: {author}");
        }
        if let Some(message) = build.commit_subject() {
            let _ = writeln!(output, "Message: {message}");
        }
    }

    let jobs = build.jobs.as_deref().unwrap_or_default();
    let _ = writeln!(output);
    let _ = writeln!(output, "Jobs ({}):", jobs.len());
    for job in jobs {
        let _ = writeln!(output, "  {}", job_line(job));
    }
    output
}

fn job_line(job: &Job) -> String {
    let language = job
        .language_label()
        .map(|l| format!(" ({l})"))
        .unwrap_or_default();
    let allowed = if job.allow_failure == Some(true) {
        " [allowed to fail]"
    } else {
        ""
    };
    format!(
        "{} Job {} (id {}){language}{allowed}: {} - {}",
        state_glyph(&job.state),
        job.number,
        job.id,
        job.state,
        duration_text(job.positive_duration())
    )
}

pub fn job_detail(job: &Job, web_url: &str) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", job_line(job));
    if let Some(repo) = &job.repository {
        let _ = writeln!(output, "Repository: {}", repo.slug);
        let _ = writeln!(output, "URL: {}", job_url(web_url, &repo.slug, job.id));
    }
    let _ = writeln!(output, "Started: {}", date_text(job.started_at));
    let _ = writeln!(output, "Finished: {}", date_text(job.finished_at));

    if let Some(config) = job.config.as_ref().filter(|c| !c.is_empty()) {
        let _ = writeln!(output);
        let _ = writeln!(output, "Config:");
        let pretty = serde_json::to_string_pretty(config).unwrap_or_default();
        for line in pretty.lines() {
            let _ = writeln!(output, "  {line}");
        }
    }
    output
}

/// Whole log, or only its last `tail` lines.
pub fn job_log(job_id: u64, log: &str, tail: Option<usize>) -> String {
    let lines: Vec<&str> = log.lines().collect();
    match tail {
        Some(n) if n < lines.len() => format!(
            "Last {n} of {} lines of job {job_id}:\n{}",
            lines.len(),
            lines[lines.len() - n..].join("\n")
        ),
        _ if log.trim().is_empty() => format!("Log for job {job_id} is empty."),
        _ => log.to_string(),
    }
}

pub fn repository(repo: &Repository) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Repository: {} (id {})", repo.slug, repo.id);
    if let Some(description) = repo.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(output, "Description: {description}");
    }
    if let Some(branch) = &repo.default_branch {
        let _ = writeln!(output, "Default branch: {}", branch.name);
    }
    if let Some(active) = repo.active {
        let _ = writeln!(output, "Active: {}", if active { "yes" } else { "no" });
    }
    if let Some(private) = repo.private {
        let _ = writeln!(output, "Private: {}", if private { "yes" } else { "no" });
    }
    output
}

pub fn branch_list(repo: &str, branches: &[Branch]) -> String {
    if branches.is_empty() {
        return format!("No branches found for {repo}.");
    }

    let mut output = format!("Branches for {repo}\n");
    for branch in branches {
        let marker = if branch.default_branch == Some(true) {
            " (default)"
        } else {
            ""
        };
        let last = branch.last_build.as_ref().map_or_else(
            || "no builds".to_string(),
            |b| format!("{} #{} {}", state_glyph(&b.state), b.number, b.state),
        );
        let _ = writeln!(output, "  {}{marker}: {last}", branch.name);
    }
    output
}

pub fn trigger(repo: &str, branch: &str, response: &TriggerResponse) -> String {
    let request = response.request.as_ref();
    let id = request
        .and_then(|r| r.id)
        .map_or_else(|| "unknown".to_string(), |id| id.to_string());
    let state = response.kind.as_deref().unwrap_or("pending");

    let mut output = format!("Build request {id} for {repo} on branch {branch}: {state}\n");
    if let Some(message) = request.and_then(|r| r.message.as_deref()) {
        let _ = writeln!(output, "Message: {message}");
    }
    if let Some(remaining) = response.remaining_requests {
        let _ = writeln!(output, "Remaining requests: {remaining}");
    }
    output
}

/// Confirmation for restart/cancel; `target` is e.g. "build 42".
pub fn state_change(action: &str, target: &str, change: &StateChange) -> String {
    let accepted = change.state_change.as_deref().unwrap_or(action);
    let state = change
        .build
        .as_ref()
        .map(|b| b.state.as_str())
        .or_else(|| change.job.as_ref().map(|j| j.state.as_str()))
        .filter(|s| !s.is_empty());

    match state {
        Some(state) => format!("Requested {accepted} of {target} (current state: {state})."),
        None => format!("Requested {accepted} of {target}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::travis::types::{BranchRef, BuildRequest, Commit};

    fn build(number: &str, state: &str) -> Build {
        Build {
            id: 10,
            number: number.to_string(),
            state: state.to_string(),
            duration: Some(125),
            branch: Some(BranchRef {
                name: "main".to_string(),
            }),
            commit: Some(Commit {
                message: Some("Add caching\n\nbody".to_string()),
                ..Commit::default()
            }),
            ..Build::default()
        }
    }

    #[test]
    fn test_build_list_line() {
        let text = build_list("o/r", None, &[build("7", "passed")]);
        assert!(text.contains("✅ #7 [main] passed (2:05) Add caching"));
    }

    #[test]
    fn test_build_list_empty_mentions_branch() {
        assert_eq!(
            build_list("o/r", Some("dev"), &[]),
            "No builds found for o/r on branch dev."
        );
    }

    #[test]
    fn test_job_log_tail() {
        let log = "a\nb\nc\nd";
        assert_eq!(job_log(1, log, Some(2)), "Last 2 of 4 lines of job 1:\nc\nd");
        assert_eq!(job_log(1, log, Some(10)), log);
        assert_eq!(job_log(1, log, None), log);
        assert_eq!(job_log(1, "", None), "Log for job 1 is empty.");
    }

    #[test]
    fn test_trigger_summary() {
        let response = TriggerResponse {
            kind: Some("pending".to_string()),
            remaining_requests: Some(9),
            request: Some(BuildRequest {
                id: Some(55),
                message: Some("hi".to_string()),
                branch: Some("main".to_string()),
            }),
        };
        let text = trigger("o/r", "main", &response);
        assert!(text.starts_with("Build request 55 for o/r on branch main: pending"));
        assert!(text.contains("Remaining requests: 9"));
    }

    #[test]
    fn test_state_change_confirmation() {
        let change = StateChange {
            state_change: Some("cancel".to_string()),
            build: Some(build("7", "canceled")),
            job: None,
        };
        assert_eq!(
            state_change("cancel", "build 10", &change),
            "Requested cancel of build 10 (current state: canceled)."
        );
        assert_eq!(
            state_change("restart", "job 3", &StateChange::default()),
            "Requested restart of job 3."
        );
    }
}
