//! Log detectors for the optimization analyzer.
//!
//! Each [`Detector`] pairs a [`Category`] with a predicate over the full log
//! text. The table is evaluated in order for every job and each detector
//! fires at most once per job.

use std::sync::LazyLock;

use regex::Regex;

/// Closed set of finding categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    DependencyInstallation,
    Caching,
    BuildProcess,
    Testing,
    Docker,
    SetupOverhead,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::DependencyInstallation => "Dependency Installation",
            Self::Caching => "Caching",
            Self::BuildProcess => "Build Process",
            Self::Testing => "Testing",
            Self::Docker => "Docker",
            Self::SetupOverhead => "Setup Overhead",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Self::DependencyInstallation => "📦",
            Self::Caching => "💾",
            Self::BuildProcess => "🔨",
            Self::Testing => "🧪",
            Self::Docker => "🐳",
            Self::SetupOverhead => "⚙️",
        }
    }

    /// Canned remediation bullets, emitted once per category present.
    pub fn remediation(self) -> &'static [&'static str] {
        match self {
            Self::DependencyInstallation => &[
                "Cache dependency directories (node_modules, ~/.cache/pip, vendor/bundle) with the `cache:` key in .travis.yml",
                "Prefer lockfile installs (`npm ci`, `yarn install --frozen-lockfile`, `bundle install --deployment`)",
                "Skip installing development-only dependencies in jobs that do not need them",
            ],
            Self::Caching => &[
                "Verify the `cache:` directories in .travis.yml exist at the end of the build",
                "Warm the cache on the default branch so pull request builds can restore it",
                "Check that cache keys do not change on every build (e.g. timestamps in cached paths)",
            ],
            Self::BuildProcess => &[
                "Enable incremental compilation and cache build output between runs",
                "Build once in an earlier stage and share artifacts instead of rebuilding per job",
                "Use production-mode bundling only where the output is actually deployed",
            ],
            Self::Testing => &[
                "Split the test suite across parallel jobs in the build matrix",
                "Run fast unit tests before slow integration tests and fail fast",
                "Profile the slowest tests and mark long-running suites to run less often",
            ],
            Self::Docker => &[
                "Cache Docker layers or pull a prebuilt base image instead of building from scratch",
                "Order Dockerfile instructions so rarely changing layers come first",
                "Use smaller base images to reduce pull time",
            ],
            Self::SetupOverhead => &[
                "Move tool installation into a custom image or a cached directory",
                "Remove setup steps that are not needed by every job",
                "Pin tool versions so installers can use cached downloads",
            ],
        }
    }
}

/// A category paired with its detection predicate.
pub struct Detector {
    pub category: Category,
    pub detect: fn(&str) -> Option<String>,
}

/// Detection table, evaluated in order for every job log.
pub static DETECTORS: [Detector; 6] = [
    Detector {
        category: Category::DependencyInstallation,
        detect: detect_dependency_install,
    },
    Detector {
        category: Category::Caching,
        detect: detect_cache_miss,
    },
    Detector {
        category: Category::BuildProcess,
        detect: detect_build_step,
    },
    Detector {
        category: Category::Testing,
        detect: detect_test_run,
    },
    Detector {
        category: Category::Docker,
        detect: detect_docker,
    },
    Detector {
        category: Category::SetupOverhead,
        detect: detect_setup_overhead,
    },
];

const DEPENDENCY_COMMANDS: [&str; 5] = [
    "npm install",
    "npm ci",
    "yarn install",
    "pip install",
    "bundle install",
];

const DOCKER_COMMANDS: [&str; 2] = ["docker pull", "docker build"];

const SETUP_MARKERS: [&str; 3] = ["Setting up", "Installing", "Downloading"];

/// More setup lines than this produce a finding.
pub const SETUP_LINE_THRESHOLD: usize = 10;

static CACHE_MISS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(cache miss|cache not found|no cache found|could not download cache|failed to (fetch|download|restore) cache|cache (archive )?was not found)",
    )
    .expect("cache miss pattern is valid")
});

static CACHE_HIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(cache hit|found cache|restored cache|cache restored|using cached)")
        .expect("cache hit pattern is valid")
});

/// Build tool invocations in priority order.
static BUILD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("npm run build", r"(?i)\bnpm run build\b"),
        ("yarn build", r"(?i)\byarn (run )?build\b"),
        ("webpack", r"(?i)\bwebpack\b"),
        ("tsc", r"(?i)\btsc\b"),
        ("mvn", r"(?i)\bmvn\b.*\b(compile|package)\b"),
        ("gradle", r"(?i)\bgradlew?\b.*\b(build|assemble)\b"),
        ("cargo build", r"(?i)\bcargo build\b"),
        ("go build", r"(?i)\bgo build\b"),
        ("make", r"(?i)^\$ make\b"),
        ("gcc/clang", r"(?i)\b(gcc|clang)\b"),
        ("javac", r"(?i)\bjavac\b"),
        ("setup.py build", r"(?i)\bsetup\.py build\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("build pattern is valid")))
    .collect()
});

/// Test-summary phrasing from common runners (unittest, pytest, jest/junit, rspec/minitest).
static TEST_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        r"(?i)\bran \d+ tests? in \d+(\.\d+)?s",
        r"(?i)\b\d+ passed(, \d+ \w+)* in \d+(\.\d+)?s",
        r"(?i)\btests( run)?:\s+\d+",
        r"(?i)\b\d+ (examples?|tests?|runs?), \d+ (failures?|assertions?)",
    ]
    .map(|pattern| Regex::new(pattern).expect("test pattern is valid"))
});

fn detect_dependency_install(log: &str) -> Option<String> {
    log.lines().find_map(|line| {
        DEPENDENCY_COMMANDS
            .iter()
            .find(|command| line.contains(*command))
            .map(|command| format!("Dependencies installed with `{command}`"))
    })
}

fn detect_cache_miss(log: &str) -> Option<String> {
    (CACHE_MISS.is_match(log) && !CACHE_HIT.is_match(log))
        .then(|| "Cache miss detected and no cache was restored".to_string())
}

fn detect_build_step(log: &str) -> Option<String> {
    BUILD_PATTERNS.iter().find_map(|(name, pattern)| {
        log.lines()
            .any(|line| pattern.is_match(line))
            .then(|| format!("Build step detected ({name})"))
    })
}

fn detect_test_run(log: &str) -> Option<String> {
    TEST_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(log))
        .map(|m| format!("Test run detected: \"{}\"", m.as_str().trim()))
}

fn detect_docker(log: &str) -> Option<String> {
    let used: Vec<&str> = DOCKER_COMMANDS
        .iter()
        .copied()
        .filter(|command| log.contains(command))
        .collect();

    (!used.is_empty()).then(|| format!("Docker operations detected ({})", used.join(", ")))
}

fn detect_setup_overhead(log: &str) -> Option<String> {
    let count = log
        .lines()
        .filter(|line| SETUP_MARKERS.iter().any(|marker| line.contains(marker)))
        .count();

    (count > SETUP_LINE_THRESHOLD)
        .then(|| format!("{count} setup/installation/download lines in the log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Category; 6] = [
        Category::DependencyInstallation,
        Category::Caching,
        Category::BuildProcess,
        Category::Testing,
        Category::Docker,
        Category::SetupOverhead,
    ];

    fn fired(log: &str) -> Vec<Category> {
        DETECTORS
            .iter()
            .filter(|d| (d.detect)(log).is_some())
            .map(|d| d.category)
            .collect()
    }

    #[test]
    fn test_detector_table_covers_every_category_once() {
        let categories: Vec<_> = DETECTORS.iter().map(|d| d.category).collect();
        assert_eq!(categories, ALL);
    }

    #[test]
    fn test_every_category_has_remediation() {
        for category in ALL {
            assert!(!category.remediation().is_empty(), "{}", category.label());
        }
    }

    #[test]
    fn test_npm_install_only_fires_dependency() {
        assert_eq!(
            fired("$ npm install\nadded 120 packages in 4s\n"),
            [Category::DependencyInstallation]
        );
    }

    #[test]
    fn test_each_dependency_command() {
        for command in DEPENDENCY_COMMANDS {
            let detail = detect_dependency_install(&format!("$ {command} --quiet")).unwrap();
            assert!(detail.contains(command));
        }
    }

    #[test]
    fn test_cache_miss_without_hit() {
        let log = "attempting to download cache archive\ncould not download cache\n";
        assert!(detect_cache_miss(log).is_some());
    }

    #[test]
    fn test_cache_hit_suppresses_miss() {
        let log = "could not download cache\nfound cache\n";
        assert!(detect_cache_miss(log).is_none());
    }

    #[test]
    fn test_cache_patterns_are_case_insensitive() {
        assert!(detect_cache_miss("Cache Miss for key deps-v1").is_some());
        assert!(detect_cache_miss("Cache Miss for key deps-v1\nCache Restored").is_none());
    }

    #[test]
    fn test_build_step_reports_first_pattern_in_priority_order() {
        let log = "$ cargo build --release\n$ npm run build\n";
        assert_eq!(
            detect_build_step(log).as_deref(),
            Some("Build step detected (npm run build)")
        );
    }

    #[test]
    fn test_make_requires_command_prompt() {
        assert!(detect_build_step("please make sure the tests pass").is_none());
        assert!(detect_build_step("$ make test").is_some());
    }

    #[test]
    fn test_test_summaries() {
        for log in [
            "Ran 42 tests in 3.210s\n\nOK",
            "==== 17 passed, 2 skipped in 1.05s ====",
            "Tests:       12 passed, 12 total",
            "Tests run: 30, Failures: 0, Errors: 0",
            "120 examples, 0 failures",
        ] {
            assert!(detect_test_run(log).is_some(), "no match for {log:?}");
        }
    }

    #[test]
    fn test_docker_is_literal() {
        assert!(detect_docker("$ docker pull postgres:15").is_some());
        assert!(detect_docker("$ docker build -t app .").is_some());
        assert!(detect_docker("$ Docker Pull app").is_none());
    }

    #[test]
    fn test_setup_overhead_threshold() {
        let ten = "Installing foo\n".repeat(10);
        assert!(detect_setup_overhead(&ten).is_none());

        let eleven = format!("{ten}Downloading bar\n");
        let detail = detect_setup_overhead(&eleven).unwrap();
        assert!(detail.starts_with("11 "));
    }

    #[test]
    fn test_sentinel_matches_nothing() {
        assert!(fired("Error fetching log: Network error: connection refused").is_empty());
    }
}
