//! `travis://` resources.

use serde::Serialize;

use crate::error::{Result, TravisLensError};
use crate::travis::TravisClient;

use super::protocol::{Resource, ResourceContent, ResourceTemplate};

const SCHEME: &str = "travis://";
const JSON_MIME: &str = "application/json";
const TEXT_MIME: &str = "text/plain";

/// Repositories returned by `travis://repositories`.
const REPOSITORY_LIMIT: usize = 100;

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    User,
    Repositories,
    Repository { slug: String },
    Build { id: u64 },
    JobLog { id: u64 },
}

impl ResourceUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let unknown = || TravisLensError::UnknownResource(uri.to_string());
        let path = uri.strip_prefix(SCHEME).ok_or_else(unknown)?;
        let segments: Vec<&str> = path.split('/').collect();

        let parsed = match segments.as_slice() {
            ["user"] => Self::User,
            ["repositories"] => Self::Repositories,
            ["repo", owner, name] if !owner.is_empty() && !name.is_empty() => Self::Repository {
                slug: format!("{owner}/{name}"),
            },
            ["build", id] => Self::Build {
                id: id.parse().map_err(|_| unknown())?,
            },
            ["job", id, "log"] => Self::JobLog {
                id: id.parse().map_err(|_| unknown())?,
            },
            _ => return Err(unknown()),
        };
        Ok(parsed)
    }
}

pub fn resource_list() -> Vec<Resource> {
    vec![
        Resource {
            uri: format!("{SCHEME}user"),
            name: "Current user".to_string(),
            description: Some("The user the API token belongs to".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
        },
        Resource {
            uri: format!("{SCHEME}repositories"),
            name: "Repositories".to_string(),
            description: Some("Repositories visible to the token, most recently built first".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
        },
    ]
}

pub fn resource_templates() -> Vec<ResourceTemplate> {
    let template = |uri_template: &str, name: &str, description: &str, mime: &str| ResourceTemplate {
        uri_template: uri_template.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        mime_type: Some(mime.to_string()),
    };

    vec![
        template(
            "travis://repo/{owner}/{name}",
            "Repository",
            "Repository details",
            JSON_MIME,
        ),
        template(
            "travis://build/{id}",
            "Build",
            "Build with commit and jobs",
            JSON_MIME,
        ),
        template(
            "travis://job/{id}/log",
            "Job log",
            "Raw log of a job",
            TEXT_MIME,
        ),
    ]
}

fn json_content<T: Serialize>(uri: &str, value: &T) -> Result<ResourceContent> {
    Ok(ResourceContent {
        uri: uri.to_string(),
        mime_type: Some(JSON_MIME.to_string()),
        text: Some(serde_json::to_string_pretty(value)?),
    })
}

/// Fetches the contents behind a resource URI.
pub async fn read_resource(client: &TravisClient, uri: &str) -> Result<ResourceContent> {
    match ResourceUri::parse(uri)? {
        ResourceUri::User => json_content(uri, &client.current_user().await?),
        ResourceUri::Repositories => {
            json_content(uri, &client.list_repositories(REPOSITORY_LIMIT).await?)
        }
        ResourceUri::Repository { slug } => json_content(uri, &client.repository(&slug).await?),
        ResourceUri::Build { id } => json_content(uri, &client.build(id).await?),
        ResourceUri::JobLog { id } => Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: Some(TEXT_MIME.to_string()),
            text: Some(client.job_log(id).await?),
        }),
    }
}
