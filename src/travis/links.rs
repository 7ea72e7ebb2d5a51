/// Converts a build id into a clickable Travis web URL.
///
/// # Arguments
///
/// * `web_url` - Travis web UI base URL (e.g., <https://app.travis-ci.com>)
/// * `slug` - Repository slug (e.g., "owner/repo")
/// * `build_id` - Numeric build id
///
/// # Returns
///
/// Clickable URL to the build (e.g., <https://app.travis-ci.com/github/owner/repo/builds/123>)
pub fn build_url(web_url: &str, slug: &str, build_id: u64) -> String {
    format!("{}/github/{slug}/builds/{build_id}", trim_base(web_url))
}

/// Converts a job id into a clickable Travis web URL.
pub fn job_url(web_url: &str, slug: &str, job_id: u64) -> String {
    format!("{}/github/{slug}/jobs/{job_id}", trim_base(web_url))
}

fn trim_base(web_url: &str) -> &str {
    web_url.trim_end_matches('/')
}

/// Percent-encodes a repository slug for use as a v3 path segment
/// (`owner/repo` becomes `owner%2Frepo`).
pub fn encode_slug(slug: &str) -> String {
    urlencoding::encode(slug).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let url = build_url("https://app.travis-ci.com", "owner/repo", 123_456);
        assert_eq!(url, "https://app.travis-ci.com/github/owner/repo/builds/123456");
    }

    #[test]
    fn test_job_url_trims_trailing_slash() {
        let url = job_url("https://app.travis-ci.com/", "owner/repo", 789);
        assert_eq!(url, "https://app.travis-ci.com/github/owner/repo/jobs/789");
    }

    #[test]
    fn test_encode_slug() {
        assert_eq!(encode_slug("travis-ci/travis-web"), "travis-ci%2Ftravis-web");
    }
}
