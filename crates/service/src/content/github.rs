use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::encoding;
use configs::GithubConfig;

use crate::content::{ContentStore, RemoteFile, VersionTag, WriteOutcome};
use crate::credentials::Credential;
use crate::errors::{ConflictKind, ServiceError};
use crate::observability;

/// Contents API client: `GET`/`PUT /repos/{owner}/{repo}/contents/{path}`.
#[derive(Clone)]
pub struct GithubContents {
    http: Client,
    api_base: String,
    owner: String,
    repo: String,
    branch: String,
    credential: Credential,
}

#[derive(Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutResponse {
    content: PutContent,
    #[serde(default)]
    commit: Option<PutCommit>,
}

#[derive(Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Deserialize)]
struct PutCommit {
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

impl GithubContents {
    pub fn new(cfg: &GithubConfig, credential: Credential) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Transport { status: None, message: e.to_string() })?;
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            owner: cfg.owner.clone(),
            repo: cfg.repo.clone(),
            branch: cfg.branch.clone(),
            credential,
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repo,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, ServiceError> {
        let token = self
            .credential
            .get()
            .ok_or_else(|| ServiceError::Auth("no access token configured".into()))?;
        Ok(req
            .bearer_auth(token.as_str())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28"))
    }

    async fn send(&self, method: &'static str, req: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let resp = req.send().await.map_err(|e| {
            observability::record_content_request(method, None);
            ServiceError::Transport { status: None, message: e.to_string() }
        })?;
        observability::record_content_request(method, Some(resp.status().as_u16()));
        Ok(resp)
    }
}

/// Map a non-success response to the error taxonomy.
async fn error_for(path: &str, resp: reqwest::Response) -> ServiceError {
    let status = resp.status();
    let message = resp
        .json::<ApiMessage>()
        .await
        .map(|m| m.message)
        .unwrap_or_default();
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        message
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Auth(message),
        StatusCode::CONFLICT => ServiceError::Conflict { path: path.to_string(), kind: ConflictKind::ChangedRemotely },
        StatusCode::UNPROCESSABLE_ENTITY => ServiceError::Conflict { path: path.to_string(), kind: ConflictKind::Stale },
        StatusCode::NOT_FOUND => ServiceError::NotFound(format!("{path}: {message}")),
        other => ServiceError::Transport { status: Some(other.as_u16()), message },
    }
}

#[async_trait]
impl ContentStore for GithubContents {
    async fn read(&self, path: &str) -> Result<Option<RemoteFile>, ServiceError> {
        let req = self
            .http
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())]);
        let resp = self.send("GET", self.authorized(req)?).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(path, "remote file absent");
            return Ok(None);
        }
        if !resp.status().is_success() {
            let err = error_for(path, resp).await;
            warn!(path, error = %err, "remote read failed");
            return Err(err);
        }

        let body: ContentResponse = resp.json().await.map_err(|e| ServiceError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        if let Some(enc) = body.encoding.as_deref() {
            if enc != "base64" {
                return Err(ServiceError::Decode {
                    path: path.to_string(),
                    message: format!("unsupported content encoding '{enc}'"),
                });
            }
        }
        let content = encoding::decode(body.content.as_deref().unwrap_or_default()).map_err(|e| {
            ServiceError::Decode { path: path.to_string(), message: e.to_string() }
        })?;
        debug!(path, sha = %body.sha, bytes = content.len(), "remote file read");
        Ok(Some(RemoteFile { content, tag: VersionTag::new(body.sha) }))
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected: Option<&VersionTag>,
    ) -> Result<WriteOutcome, ServiceError> {
        let body = PutRequest {
            message,
            content: encoding::encode(content),
            branch: &self.branch,
            sha: expected.map(VersionTag::as_str),
        };
        let req = self.http.put(self.contents_url(path)).json(&body);
        let resp = self.send("PUT", self.authorized(req)?).await?;

        if !resp.status().is_success() {
            let err = error_for(path, resp).await;
            warn!(path, error = %err, "remote write failed");
            return Err(err);
        }

        let body: PutResponse = resp.json().await.map_err(|e| ServiceError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        debug!(path, sha = %body.content.sha, "remote file written");
        Ok(WriteOutcome {
            tag: VersionTag::new(body.content.sha),
            commit_url: body.commit.and_then(|c| c.html_url),
        })
    }
}
