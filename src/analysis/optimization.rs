use std::fmt::Write;

use indexmap::IndexMap;

use super::format::{add_section_header, format_duration, heavy_rule, state_glyph};
use super::patterns::{Category, DETECTORS};
use crate::travis::types::{Build, Job};

const SLOWEST_JOB_LIMIT: usize = 3;
const SLOW_JOB_SECONDS: u64 = 300;

/// One job's log, already fetched.
///
/// When the log could not be fetched, `log` holds the error sentinel and
/// `log_available` is false; detectors still run over it and find nothing.
#[derive(Debug, Clone)]
pub struct JobLog {
    pub job: Job,
    pub log: String,
    pub log_available: bool,
    pub duration: Option<u64>,
}

/// A detected optimization opportunity in one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub category: Category,
    pub job_number: String,
    pub detail: String,
}

/// Runs every detector over a job log, in table order.
pub fn detect_findings(job_number: &str, log: &str) -> Vec<Finding> {
    DETECTORS
        .iter()
        .filter_map(|detector| {
            (detector.detect)(log).map(|detail| Finding {
                category: detector.category,
                job_number: job_number.to_string(),
                detail,
            })
        })
        .collect()
}

/// Groups findings by category, preserving first-seen category order.
pub fn group_findings(findings: &[Finding]) -> IndexMap<Category, Vec<&Finding>> {
    findings.iter().fold(IndexMap::new(), |mut grouped, finding| {
        grouped.entry(finding.category).or_default().push(finding);
        grouped
    })
}

/// Jobs with a known positive duration, slowest first, at most three.
pub fn slowest_jobs(jobs: &[JobLog]) -> Vec<(&str, u64)> {
    let mut timed: Vec<(&str, u64)> = jobs
        .iter()
        .filter_map(|j| j.duration.filter(|d| *d > 0).map(|d| (j.job.number.as_str(), d)))
        .collect();
    timed.sort_by(|a, b| b.1.cmp(&a.1));
    timed.truncate(SLOWEST_JOB_LIMIT);
    timed
}

/// Renders the optimization report for one build.
pub fn optimization_report(build: &Build, jobs: &[JobLog]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Optimization Recommendations: Build #{}", build.number);
    let _ = writeln!(output, "{}", heavy_rule());
    if let Some(repo) = &build.repository {
        let _ = writeln!(output, "Repository: {}", repo.slug);
    }
    let _ = writeln!(output, "Branch: {}", build.branch_name());
    let _ = writeln!(output, "State: {} {}", state_glyph(&build.state), build.state);
    if let Some(duration) = build.positive_duration() {
        let _ = writeln!(output, "Duration: {}", format_duration(duration));
    }

    if jobs.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No jobs found for build #{}.", build.number);
        return output;
    }
    let _ = writeln!(output, "Jobs analyzed: {}", jobs.len());

    add_section_header(&mut output, "🔎", "Jobs");
    for job in jobs {
        write_job_entry(&mut output, job);
    }

    let findings: Vec<Finding> = jobs
        .iter()
        .flat_map(|job| detect_findings(&job.job.number, &job.log))
        .collect();
    let grouped = group_findings(&findings);

    add_section_header(&mut output, "📋", "Summary of Findings");
    if grouped.is_empty() {
        let _ = writeln!(output, "  No optimization opportunities detected in the job logs.");
    }
    for (category, items) in &grouped {
        let _ = writeln!(output, "  {} {}: {}", category.glyph(), category.label(), items.len());
    }

    if !grouped.is_empty() {
        add_section_header(&mut output, "🔍", "Detailed Analysis");
        for (category, items) in &grouped {
            let _ = writeln!(output, "{} {}", category.glyph(), category.label());
            for finding in items {
                let _ = writeln!(output, "  - Job {}: {}", finding.job_number, finding.detail);
            }
        }

        add_section_header(&mut output, "💡", "Recommendations");
        for category in grouped.keys() {
            let _ = writeln!(output, "{} {}", category.glyph(), category.label());
            for bullet in category.remediation() {
                let _ = writeln!(output, "  • {bullet}");
            }
        }
    }

    add_section_header(&mut output, "🐌", "Slowest Jobs");
    let slowest = slowest_jobs(jobs);
    if slowest.is_empty() {
        let _ = writeln!(output, "  No job duration data available.");
    }
    for (rank, (number, duration)) in slowest.iter().enumerate() {
        let _ = writeln!(output, "  {}. Job {number}: {}", rank + 1, format_duration(*duration));
    }
    if slowest.first().is_some_and(|(_, d)| *d > SLOW_JOB_SECONDS) {
        let _ = writeln!(
            output,
            "  ⚠️ The slowest job takes longer than 5 minutes. Consider splitting it across \
             parallel jobs or caching more of its work."
        );
    }

    output
}

fn write_job_entry(output: &mut String, job: &JobLog) {
    let language = job
        .job
        .language_label()
        .map(|l| format!(" ({l})"))
        .unwrap_or_default();
    let duration = job
        .duration
        .map_or_else(|| "duration unknown".to_string(), format_duration);
    let allowed = if job.job.allow_failure == Some(true) {
        " [allowed to fail]"
    } else {
        ""
    };

    let _ = writeln!(
        output,
        "  {} Job {}{language}{allowed}: {} - {duration}",
        state_glyph(&job.job.state),
        job.job.number,
        job.job.state
    );

    if job.log_available {
        let _ = writeln!(output, "      {} log lines scanned", job.log.lines().count());
    } else {
        let _ = writeln!(output, "      {}", job.log);
    }
}
