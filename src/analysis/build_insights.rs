use std::cmp::Ordering;
use std::fmt::Write;

use indexmap::IndexMap;

use super::format::{
    add_section_header, calculate_rate, format_duration, format_rate, heavy_rule, state_glyph,
    truncate_chars,
};
use crate::travis::types::Build;

/// Default number of builds analyzed when the caller does not ask for more.
pub const DEFAULT_INSIGHTS_LIMIT: usize = 50;
/// Hard upper bound on the number of builds analyzed.
pub const MAX_INSIGHTS_LIMIT: usize = 100;

const RECENT_WINDOW: usize = 10;
const TREND_THRESHOLD: i64 = 5;
const RECENT_DECLINE_WARNING: i64 = 10;
const SLOW_BUILD_FACTOR: f64 = 1.5;
const BRANCH_LIMIT: usize = 5;
const RECENT_FAILURE_LIMIT: usize = 5;
const COMMIT_SUBJECT_WIDTH: usize = 60;

const STATE_ORDER: [&str; 8] = [
    "passed", "failed", "errored", "canceled", "started", "queued", "received", "created",
];

/// Pass/fail tallies over a slice of builds.
///
/// Only `passed`, `failed` and `errored` make up the completed denominator;
/// everything else counts toward the total only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcomes {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Outcomes {
    pub fn from_builds<'a>(builds: impl IntoIterator<Item = &'a Build>) -> Self {
        builds.into_iter().fold(Self::default(), |mut acc, build| {
            acc.total += 1;
            match build.state.as_str() {
                "passed" => acc.passed += 1,
                "failed" => acc.failed += 1,
                "errored" => acc.errored += 1,
                _ => {}
            }
            acc
        })
    }

    pub fn completed(&self) -> usize {
        self.passed + self.failed + self.errored
    }

    pub fn pass_rate(&self) -> f64 {
        calculate_rate(self.passed, self.completed())
    }

    /// Pass rate as an exact fraction; `0/1` without completed builds.
    fn rate_fraction(&self) -> (i128, i128) {
        match self.completed() {
            0 => (0, 1),
            completed => (self.passed as i128, completed as i128),
        }
    }

    /// Compares the pass rate with a whole percentage, without rounding.
    pub fn rate_cmp(&self, percent: i64) -> Ordering {
        let (passed, completed) = self.rate_fraction();
        (100 * passed).cmp(&(i128::from(percent) * completed))
    }

    /// Compares `self.rate - other.rate` with `points`, without rounding.
    ///
    /// Rates that differ by exactly `points` compare `Equal` even when their
    /// `f64` renderings do not subtract to exactly `points`.
    pub fn rate_gap_cmp(&self, other: &Self, points: i64) -> Ordering {
        let (p1, c1) = self.rate_fraction();
        let (p2, c2) = other.rate_fraction();
        (100 * (p1 * c2 - p2 * c1)).cmp(&(i128::from(points) * c1 * c2))
    }
}

/// Direction of the recent pass rate relative to the overall one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    /// More than five points above the overall rate is improving, more than
    /// five below is declining.
    pub fn classify(recent: &Outcomes, overall: &Outcomes) -> Self {
        if recent.rate_gap_cmp(overall, TREND_THRESHOLD) == Ordering::Greater {
            Self::Improving
        } else if recent.rate_gap_cmp(overall, -TREND_THRESHOLD) == Ordering::Less {
            Self::Declining
        } else {
            Self::Stable
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Improving => "Improving",
            Self::Declining => "Declining",
            Self::Stable => "Stable",
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            Self::Improving => "📈",
            Self::Declining => "📉",
            Self::Stable => "➡️",
        }
    }
}

/// Duration statistics over builds with a positive duration.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationStats {
    pub count: usize,
    pub average: f64,
    pub median: u64,
    pub min: u64,
    pub max: u64,
}

impl DurationStats {
    /// Returns `None` for an empty list. The median is `sorted[n / 2]`,
    /// not interpolated for even lengths.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_durations(mut durations: Vec<u64>) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }
        durations.sort_unstable();

        let count = durations.len();
        let average = durations.iter().sum::<u64>() as f64 / count as f64;

        Some(Self {
            count,
            average,
            median: durations[count / 2],
            min: durations[0],
            max: durations[count - 1],
        })
    }

    /// Average rounded to whole seconds for display.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn average_seconds(&self) -> u64 {
        self.average.round() as u64
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn has_slow_outliers(&self) -> bool {
        self.max as f64 > self.average * SLOW_BUILD_FACTOR
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchSummary {
    pub name: String,
    pub total: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedBuild {
    pub number: String,
    pub state: String,
    pub branch: String,
    pub finished: String,
    pub subject: String,
}

/// Aggregated statistics for a list of builds (newest first).
#[derive(Debug, Clone)]
pub struct BuildInsights {
    pub repo: String,
    pub branch_filter: Option<String>,
    pub overall: Outcomes,
    pub state_counts: Vec<(String, usize)>,
    pub recent: Outcomes,
    pub trend: Trend,
    pub durations: Option<DurationStats>,
    /// Empty when a branch filter is active or only one branch appears.
    pub branches: Vec<BranchSummary>,
    pub recent_failures: Vec<FailedBuild>,
}

impl BuildInsights {
    /// Computes insights; `None` when there are no builds.
    ///
    /// `builds` must already be ordered newest first and filtered by
    /// `branch_filter` upstream; nothing here re-sorts or re-filters.
    pub fn from_builds(repo: &str, branch_filter: Option<&str>, builds: &[Build]) -> Option<Self> {
        if builds.is_empty() {
            return None;
        }

        let overall = Outcomes::from_builds(builds);
        let recent = Outcomes::from_builds(builds.iter().take(RECENT_WINDOW));
        let trend = Trend::classify(&recent, &overall);

        let durations =
            DurationStats::from_durations(builds.iter().filter_map(Build::positive_duration).collect());

        let branches = if branch_filter.is_none() {
            summarize_branches(builds)
        } else {
            Vec::new()
        };

        Some(Self {
            repo: repo.to_string(),
            branch_filter: branch_filter.map(str::to_string),
            overall,
            state_counts: count_states(builds),
            recent,
            trend,
            durations,
            branches,
            recent_failures: collect_recent_failures(builds),
        })
    }

    /// Qualitative observations driven by fixed thresholds.
    pub fn recommendations(&self) -> Vec<String> {
        let rate = self.overall.pass_rate();
        let shown = format_rate(rate);
        let at_least = |percent| self.overall.rate_cmp(percent) != Ordering::Less;
        let mut recommendations = vec![if at_least(90) {
            format!("✅ Excellent pass rate ({shown}). The build pipeline is healthy.")
        } else if at_least(75) {
            format!("👍 Good pass rate ({shown}), but there is room for improvement.")
        } else if at_least(50) {
            format!("⚠️ Moderate pass rate ({shown}). Investigate recurring failure patterns.")
        } else {
            format!("🚨 Low pass rate ({shown}). Build stability needs urgent attention.")
        }];

        let recent_rate = self.recent.pass_rate();
        if self.recent.rate_gap_cmp(&self.overall, -RECENT_DECLINE_WARNING) == Ordering::Less {
            recommendations.push(format!(
                "📉 Recent builds are failing more often than usual (recent {} vs overall {shown}).",
                format_rate(recent_rate)
            ));
        }

        if let Some(stats) = self.durations.as_ref().filter(|s| s.has_slow_outliers()) {
            recommendations.push(format!(
                "🐌 Some builds are significantly slower than average (slowest {} vs average {}). \
                 Look for slow tests, missing caches or oversized build matrices.",
                format_duration(stats.max),
                format_duration(stats.average_seconds())
            ));
        }

        if self.overall.failed > self.overall.passed {
            recommendations.push(format!(
                "❌ There are more failures than passes ({} failed vs {} passed).",
                self.overall.failed, self.overall.passed
            ));
        }

        recommendations
    }

    pub fn render(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "Build Insights: {}", self.repo);
        let _ = writeln!(
            output,
            "Branch: {}",
            self.branch_filter.as_deref().unwrap_or("All branches")
        );
        let _ = writeln!(output, "{}", heavy_rule());

        add_section_header(&mut output, "📊", "Build Statistics");
        let _ = writeln!(output, "Total builds: {}", self.overall.total);
        for (state, count) in &self.state_counts {
            let _ = writeln!(output, "  {} {state}: {count}", state_glyph(state));
        }
        let _ = writeln!(
            output,
            "Pass rate: {} ({}/{} completed builds)",
            format_rate(self.overall.pass_rate()),
            self.overall.passed,
            self.overall.completed()
        );

        add_section_header(
            &mut output,
            "📈",
            &format!("Recent Trend (last {} builds)", self.recent.total),
        );
        let _ = writeln!(output, "Recent pass rate: {}", format_rate(self.recent.pass_rate()));
        let _ = writeln!(output, "Overall pass rate: {}", format_rate(self.overall.pass_rate()));
        let _ = writeln!(output, "Trend: {} {}", self.trend.glyph(), self.trend.label());

        add_section_header(&mut output, "⏱️", "Build Duration");
        match &self.durations {
            Some(stats) => {
                let _ = writeln!(output, "Builds with duration data: {}", stats.count);
                let _ = writeln!(output, "Average: {}", format_duration(stats.average_seconds()));
                let _ = writeln!(output, "Median: {}", format_duration(stats.median));
                let _ = writeln!(output, "Fastest: {}", format_duration(stats.min));
                let _ = writeln!(output, "Slowest: {}", format_duration(stats.max));
            }
            None => {
                let _ = writeln!(output, "No duration data available.");
            }
        }

        if !self.branches.is_empty() {
            add_section_header(&mut output, "🌿", &format!("Branch Breakdown (top {BRANCH_LIMIT})"));
            for branch in &self.branches {
                let _ = writeln!(
                    output,
                    "  {}: {} builds, {} pass rate",
                    branch.name,
                    branch.total,
                    format_rate(branch.pass_rate)
                );
            }
        }

        add_section_header(&mut output, "❌", "Recent Failures");
        if self.recent_failures.is_empty() {
            let _ = writeln!(output, "  No failed builds in this window.");
        }
        for failure in &self.recent_failures {
            let _ = writeln!(
                output,
                "  {} #{} on {} ({}): {}",
                state_glyph(&failure.state),
                failure.number,
                failure.branch,
                failure.finished,
                failure.subject
            );
        }

        add_section_header(&mut output, "💡", "Recommendations");
        for recommendation in self.recommendations() {
            let _ = writeln!(output, "  {recommendation}");
        }

        output
    }
}

/// Renders the insight report, or a short notice when there are no builds.
pub fn build_insights_report(repo: &str, branch_filter: Option<&str>, builds: &[Build]) -> String {
    match BuildInsights::from_builds(repo, branch_filter, builds) {
        Some(insights) => insights.render(),
        None => match branch_filter {
            Some(branch) => format!("No builds found for {repo} on branch {branch}.\n"),
            None => format!("No builds found for {repo}.\n"),
        },
    }
}

fn count_states(builds: &[Build]) -> Vec<(String, usize)> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for build in builds {
        *counts.entry(build.state.as_str()).or_insert(0) += 1;
    }

    let rank = |state: &str| {
        STATE_ORDER
            .iter()
            .position(|known| *known == state)
            .unwrap_or(STATE_ORDER.len())
    };

    let mut ordered: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(state, count)| (state.to_string(), count))
        .collect();
    ordered.sort_by(|a, b| rank(&a.0).cmp(&rank(&b.0)).then_with(|| a.0.cmp(&b.0)));
    ordered
}

fn summarize_branches(builds: &[Build]) -> Vec<BranchSummary> {
    let mut by_branch: IndexMap<&str, Vec<&Build>> = IndexMap::new();
    for build in builds {
        by_branch.entry(build.branch_name()).or_default().push(build);
    }

    if by_branch.len() <= 1 {
        return Vec::new();
    }

    let mut summaries: Vec<BranchSummary> = by_branch
        .into_iter()
        .map(|(name, builds)| {
            let outcomes = Outcomes::from_builds(builds);
            BranchSummary {
                name: name.to_string(),
                total: outcomes.total,
                pass_rate: outcomes.pass_rate(),
            }
        })
        .collect();

    // stable: ties keep first-seen (most recent) order
    summaries.sort_by(|a, b| b.total.cmp(&a.total));
    summaries.truncate(BRANCH_LIMIT);
    summaries
}

fn collect_recent_failures(builds: &[Build]) -> Vec<FailedBuild> {
    builds
        .iter()
        .filter(|b| matches!(b.state.as_str(), "failed" | "errored"))
        .take(RECENT_FAILURE_LIMIT)
        .map(|build| FailedBuild {
            number: build.number.clone(),
            state: build.state.clone(),
            branch: build.branch_name().to_string(),
            finished: build
                .finished_at
                .map_or_else(|| "N/A".to_string(), |t| t.format("%Y-%m-%d").to_string()),
            subject: build
                .commit_subject()
                .map_or_else(|| "(no commit message)".to_string(), |s| {
                    truncate_chars(s, COMMIT_SUBJECT_WIDTH)
                }),
        })
        .collect()
}
