use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use url::Url;

use crate::auth::Token;
use crate::error::{Result, TravisLensError};

use super::links::encode_slug;
use super::types::{
    Branch, BranchesResponse, Build, BuildsResponse, Job, JobsResponse, RepositoriesResponse,
    Repository, StateChange, TriggerResponse, User,
};

const API_VERSION: &str = "3";

/// Travis CI v3 REST client.
///
/// Every call is a single request: no retries, no caching. Errors from the
/// API are surfaced as [`TravisLensError::Api`] with the Travis error
/// message when one is present.
pub struct TravisClient {
    client: Client,
    api_url: Url,
    web_url: String,
}

impl TravisClient {
    /// Creates a client for the given API base URL.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Travis API base URL (e.g., <https://api.travis-ci.com>)
    /// * `web_url` - Travis web UI base URL, used for links in reports
    /// * `token` - Optional API token forwarded on every request
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or token cannot be used in a request.
    pub fn new(api_url: &str, web_url: &str, token: Option<Token>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Travis-API-Version", HeaderValue::from_static(API_VERSION));

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&token.header_value())
                .map_err(|e| TravisLensError::Config(format!("Invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(concat!("travis-lens/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| TravisLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Url::join replaces the last segment unless the base ends with '/'
        let normalized = if api_url.ends_with('/') {
            api_url.to_string()
        } else {
            format!("{api_url}/")
        };
        let api_url = Url::parse(&normalized)
            .map_err(|e| TravisLensError::Config(format!("Invalid API URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            web_url: web_url.trim_end_matches('/').to_string(),
        })
    }

    /// Web UI base URL, for building links.
    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| TravisLensError::Config(format!("Invalid endpoint '{path}': {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");
        self.send_json(self.client.get(url).query(query)).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");
        let request = self.client.post(url);
        let request = match body {
            Some(body) => request.json(&body),
            None => request,
        };
        self.send_json(request).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(TravisLensError::Api {
            status: status.as_u16(),
            message: extract_error_message(&body),
        })
    }

    /// `GET /user`
    pub async fn current_user(&self) -> Result<User> {
        self.get_json("user", &[]).await
    }

    /// `GET /repos`, most recently built first.
    pub async fn list_repositories(&self, limit: usize) -> Result<Vec<Repository>> {
        let response: RepositoriesResponse = self
            .get_json(
                "repos",
                &[
                    ("limit", limit.to_string()),
                    ("sort_by", "last_build_finished_at:desc".to_string()),
                ],
            )
            .await?;
        Ok(response.repositories)
    }

    /// `GET /repo/{slug}`
    pub async fn repository(&self, slug: &str) -> Result<Repository> {
        self.get_json(&format!("repo/{}", encode_slug(slug)), &[]).await
    }

    /// `GET /repo/{slug}/branches`
    pub async fn branches(&self, slug: &str, limit: usize) -> Result<Vec<Branch>> {
        let response: BranchesResponse = self
            .get_json(
                &format!("repo/{}/branches", encode_slug(slug)),
                &[
                    ("limit", limit.to_string()),
                    ("exists_on_github", "true".to_string()),
                    ("sort_by", "last_build:desc".to_string()),
                ],
            )
            .await?;
        Ok(response.branches)
    }

    /// Fetches builds for a repository, newest first.
    ///
    /// # Arguments
    ///
    /// * `slug` - Repository slug (e.g., "owner/repo")
    /// * `branch` - Optional branch filter applied by the API
    /// * `limit` - Maximum number of builds to return
    pub async fn builds(&self, slug: &str, branch: Option<&str>, limit: usize) -> Result<Vec<Build>> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("sort_by", "id:desc".to_string()),
        ];
        if let Some(branch) = branch {
            query.push(("branch.name", branch.to_string()));
        }

        let response: BuildsResponse = self
            .get_json(&format!("repo/{}/builds", encode_slug(slug)), &query)
            .await?;
        Ok(response.builds)
    }

    /// `GET /build/{id}` with jobs and their configs embedded.
    pub async fn build(&self, build_id: u64) -> Result<Build> {
        self.get_json(
            &format!("build/{build_id}"),
            &[("include", "build.jobs,build.commit,job.config".to_string())],
        )
        .await
    }

    /// `GET /build/{id}/jobs`
    pub async fn build_jobs(&self, build_id: u64) -> Result<Vec<Job>> {
        let response: JobsResponse = self
            .get_json(
                &format!("build/{build_id}/jobs"),
                &[("include", "job.config".to_string())],
            )
            .await?;
        Ok(response.jobs)
    }

    /// `GET /job/{id}`
    pub async fn job(&self, job_id: u64) -> Result<Job> {
        self.get_json(
            &format!("job/{job_id}"),
            &[("include", "job.config".to_string())],
        )
        .await
    }

    /// Fetches the complete raw log of a job as plain text.
    pub async fn job_log(&self, job_id: u64) -> Result<String> {
        let url = self.endpoint(&format!("job/{job_id}/log.txt"))?;
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/plain")
            .send()
            .await?;
        Ok(Self::check_status(response).await?.text().await?)
    }

    /// Creates a build request for a branch.
    ///
    /// `config` is merged by Travis on top of the repository's `.travis.yml`.
    pub async fn trigger_build(
        &self,
        slug: &str,
        branch: &str,
        message: Option<&str>,
        config: Option<Map<String, Value>>,
    ) -> Result<TriggerResponse> {
        let mut request = json!({ "branch": branch });
        if let Some(message) = message {
            request["message"] = Value::String(message.to_string());
        }
        if let Some(config) = config {
            request["config"] = Value::Object(config);
        }

        self.post_json(
            &format!("repo/{}/requests", encode_slug(slug)),
            Some(json!({ "request": request })),
        )
        .await
    }

    /// `POST /build/{id}/restart`
    pub async fn restart_build(&self, build_id: u64) -> Result<StateChange> {
        self.post_json(&format!("build/{build_id}/restart"), None).await
    }

    /// `POST /build/{id}/cancel`
    pub async fn cancel_build(&self, build_id: u64) -> Result<StateChange> {
        self.post_json(&format!("build/{build_id}/cancel"), None).await
    }

    /// `POST /job/{id}/restart`
    pub async fn restart_job(&self, job_id: u64) -> Result<StateChange> {
        self.post_json(&format!("job/{job_id}/restart"), None).await
    }

    /// `POST /job/{id}/cancel`
    pub async fn cancel_job(&self, job_id: u64) -> Result<StateChange> {
        self.post_json(&format!("job/{job_id}/cancel"), None).await
    }
}

/// Pulls `error_message` out of a Travis error document, falling back to
/// the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error_message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard, token: Option<&str>) -> TravisClient {
        TravisClient::new(&server.url(), "https://app.travis-ci.com", token.map(Token::from)).unwrap()
    }

    #[test]
    fn test_extract_error_message_from_travis_error() {
        let body = r#"{"@type":"error","error_type":"not_found","error_message":"repository not found (or insufficient access)"}"#;
        assert_eq!(
            extract_error_message(body),
            "repository not found (or insufficient access)"
        );
    }

    #[test]
    fn test_extract_error_message_falls_back_to_body() {
        assert_eq!(extract_error_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn test_invalid_api_url_is_config_error() {
        let result = TravisClient::new("not a url", "https://app.travis-ci.com", None);
        assert!(matches!(result, Err(TravisLensError::Config(_))));
    }

    #[tokio::test]
    async fn test_builds_sends_headers_and_filters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repo/owner%2Frepo/builds")
            .match_header("travis-api-version", "3")
            .match_header("authorization", "token secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("branch.name".into(), "main".into()),
                Matcher::UrlEncoded("sort_by".into(), "id:desc".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"builds":[{"id":2,"number":"2","state":"passed"},{"id":1,"number":"1","state":"failed"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server, Some("secret"));
        let builds = client.builds("owner/repo", Some("main"), 10).await.unwrap();

        mock.assert_async().await;
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].number, "2");
        assert_eq!(builds[1].state, "failed");
    }

    #[tokio::test]
    async fn test_api_error_carries_status_and_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repo/owner%2Fmissing")
            .with_status(404)
            .with_body(r#"{"@type":"error","error_type":"not_found","error_message":"repository not found (or insufficient access)"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.repository("owner/missing").await.unwrap_err();

        match err {
            TravisLensError::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("repository not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_job_log_returns_plain_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/job/55/log.txt")
            .match_header("accept", "text/plain")
            .with_body("$ npm install\nadded 12 packages\n")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let log = client.job_log(55).await.unwrap();
        assert!(log.contains("npm install"));
    }

    #[tokio::test]
    async fn test_trigger_build_posts_request_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repo/owner%2Frepo/requests")
            .match_body(Matcher::Json(serde_json::json!({
                "request": {"branch": "main", "message": "Nightly"}
            })))
            .with_status(202)
            .with_body(r#"{"@type":"pending","remaining_requests":9,"request":{"id":77,"message":"Nightly","branch":"main"}}"#)
            .create_async()
            .await;

        let client = client_for(&server, Some("secret"));
        let response = client
            .trigger_build("owner/repo", "main", Some("Nightly"), None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.remaining_requests, Some(9));
        assert_eq!(response.request.and_then(|r| r.id), Some(77));
    }

    #[tokio::test]
    async fn test_base_url_with_path_prefix_is_preserved() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/user")
            .with_body(r#"{"id":1,"login":"octocat"}"#)
            .create_async()
            .await;

        let client =
            TravisClient::new(&format!("{}/api", server.url()), "https://app.travis-ci.com", None)
                .unwrap();
        let user = client.current_user().await.unwrap();
        assert_eq!(user.login, "octocat");
    }
}
