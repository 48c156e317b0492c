use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::GitHubConfig;

/// Failure reported by the hosting API seam
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The API answered with a non-success status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Transport, decoding or credential failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HostError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        HostError::Api {
            status,
            message: message.into(),
        }
    }

    /// The named resource already exists (422 Unprocessable Entity)
    pub fn is_conflict(&self) -> bool {
        matches!(self, HostError::Api { status: 422, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::Api { status: 404, .. })
    }
}

impl From<octocrab::Error> for HostError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => HostError::Api {
                status: source.status_code.as_u16(),
                message: source.message.clone(),
            },
            other => HostError::Other(anyhow::Error::new(other)),
        }
    }
}

/// The authenticated account, kept verbatim apart from the login handle
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteAccount {
    pub login: String,

    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// A remote repository, kept verbatim apart from the fields we act on
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteRepository {
    pub name: String,

    /// Canonical browser URL
    pub html_url: String,

    #[serde(default)]
    pub private: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a repository creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRepository {
    pub name: String,
    pub description: String,
    pub private: bool,
    pub auto_init: bool,
}

impl NewRepository {
    /// A public repository with no initial commit
    pub fn public_empty(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            private: false,
            auto_init: false,
        }
    }
}

/// What currently lives at a path in a remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentProbe {
    /// A single file with its blob hash
    File { sha: String },
    /// Something other than a versioned file (e.g. a directory listing)
    NotAFile,
    /// Nothing at that path
    Absent,
}

impl ContentProbe {
    pub fn sha(&self) -> Option<&str> {
        match self {
            ContentProbe::File { sha } => Some(sha),
            _ => None,
        }
    }
}

/// A create-or-update request for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentWrite {
    #[serde(skip)]
    pub path: String,
    pub message: String,
    /// Base64 encoded file content
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Operations the project push needs from a hosting provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteHost: Send + Sync {
    async fn authenticated_user(&self) -> Result<RemoteAccount, HostError>;

    /// Repositories of the authenticated account, most recently updated first
    async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, HostError>;

    async fn create_repository(&self, repo: &NewRepository)
        -> Result<RemoteRepository, HostError>;

    async fn get_repository(&self, owner: &str, name: &str)
        -> Result<RemoteRepository, HostError>;

    /// Look up a path; a 404 is `Absent`, never an error
    async fn probe_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<ContentProbe, HostError>;

    async fn write_content(
        &self,
        owner: &str,
        repo: &str,
        write: &ContentWrite,
    ) -> Result<(), HostError>;
}

/// Hands out a freshly authenticated client for every request
#[async_trait]
pub trait HostConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RemoteHost>, HostError>;
}

/// Number of repositories returned by the listing endpoint
pub const REPOS_PAGE_SIZE: u8 = 100;

#[derive(Serialize)]
struct ListReposParams {
    sort: &'static str,
    per_page: u8,
}

/// GitHub authentication strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
}

/// GitHub REST client wrapper
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    /// Resolve a token with the configured strategy and build a client
    pub async fn new(config: &GitHubConfig) -> Result<Self> {
        let (auth_strategy, token) = detect_authentication(&config.auth_method).await?;

        debug!("Using authentication strategy: {:?}", auth_strategy);

        Self::with_token(token, config.api_url.as_deref())
    }

    /// Build a client from an explicit token, optionally against another API root
    pub fn with_token(token: String, api_url: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder();

        if let Some(api_url) = api_url {
            builder = builder
                .base_uri(api_url)
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }

        let client = builder
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self { client })
    }
}

/// Bytes left as-is inside a route segment; everything else is escaped,
/// including `/`, `?`, `#` and `%`
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_segment(segment: &str) -> String {
    percent_encode(segment.as_bytes(), SEGMENT).to_string()
}

fn repo_route(owner: &str, name: &str) -> String {
    format!("/repos/{}/{}", encode_segment(owner), encode_segment(name))
}

fn contents_route(owner: &str, repo: &str, path: &str) -> String {
    let path = path
        .trim_start_matches('/')
        .split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/contents/{}", repo_route(owner, repo), path)
}

#[async_trait]
impl RemoteHost for GitHubClient {
    async fn authenticated_user(&self) -> Result<RemoteAccount, HostError> {
        let user: RemoteAccount = self.client.get("/user", None::<&()>).await?;
        debug!(login = %user.login, "Fetched authenticated user");
        Ok(user)
    }

    async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, HostError> {
        let params = ListReposParams {
            sort: "updated",
            per_page: REPOS_PAGE_SIZE,
        };

        let repos: Vec<RemoteRepository> = self.client.get("/user/repos", Some(&params)).await?;

        info!("Found {} user repositories", repos.len());
        Ok(repos)
    }

    async fn create_repository(
        &self,
        repo: &NewRepository,
    ) -> Result<RemoteRepository, HostError> {
        let created: RemoteRepository = self.client.post("/user/repos", Some(repo)).await?;
        info!(name = %created.name, url = %created.html_url, "Created repository");
        Ok(created)
    }

    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RemoteRepository, HostError> {
        let repo: RemoteRepository = self
            .client
            .get(repo_route(owner, name), None::<&()>)
            .await?;
        Ok(repo)
    }

    async fn probe_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<ContentProbe, HostError> {
        let route = contents_route(owner, repo, path);

        let response: octocrab::Result<Value> = self.client.get(route, None::<&()>).await;
        let body = match response {
            Ok(body) => body,
            Err(err) => {
                let err = HostError::from(err);
                if err.is_not_found() {
                    return Ok(ContentProbe::Absent);
                }
                return Err(err);
            }
        };

        let probe = match body.get("sha").and_then(Value::as_str) {
            Some(sha) if body.is_object() => ContentProbe::File {
                sha: sha.to_string(),
            },
            _ => ContentProbe::NotAFile,
        };

        Ok(probe)
    }

    async fn write_content(
        &self,
        owner: &str,
        repo: &str,
        write: &ContentWrite,
    ) -> Result<(), HostError> {
        let route = contents_route(owner, repo, &write.path);
        let _: Value = self.client.put(route, Some(write)).await?;
        Ok(())
    }
}

/// Connector that authenticates against GitHub on every call
pub struct GitHubConnector {
    config: GitHubConfig,
}

impl GitHubConnector {
    pub fn new(config: GitHubConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl HostConnector for GitHubConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteHost>, HostError> {
        let client = GitHubClient::new(&self.config).await?;
        Ok(Arc::new(client))
    }
}

/// Detect and obtain GitHub authentication
pub async fn detect_authentication(auth_method: &str) -> Result<(AuthStrategy, String)> {
    match auth_method {
        "auto" => {
            // Try GitHub CLI first, then environment token
            if let Ok(token) = try_github_cli().await {
                Ok((AuthStrategy::GitHubCLI, token))
            } else if let Ok(token) = try_environment_token() {
                Ok((AuthStrategy::EnvironmentToken, token))
            } else {
                Err(anyhow!(
                    "No GitHub authentication found. Please either:\n\
                     1. Install and authenticate GitHub CLI: gh auth login\n\
                     2. Set GITHUB_TOKEN environment variable"
                ))
            }
        }
        "gh_cli" => {
            let token = try_github_cli()
                .await
                .context("GitHub CLI authentication failed. Run: gh auth login")?;
            Ok((AuthStrategy::GitHubCLI, token))
        }
        "token" => {
            let token = try_environment_token()
                .context("GITHUB_TOKEN environment variable not found or invalid")?;
            Ok((AuthStrategy::EnvironmentToken, token))
        }
        other => Err(anyhow!("Unknown auth method: {}", other)),
    }
}

/// Try to get token from GitHub CLI
async fn try_github_cli() -> Result<String> {
    debug!("Attempting GitHub CLI authentication");

    let token_output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .await
        .context("Failed to run GitHub CLI (gh)")?;

    if !token_output.status.success() {
        return Err(anyhow!(
            "Failed to retrieve token from GitHub CLI: {}",
            String::from_utf8_lossy(&token_output.stderr)
        ));
    }

    let token = String::from_utf8(token_output.stdout)
        .context("GitHub CLI token is not valid UTF-8")?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(anyhow!("GitHub CLI returned empty token"));
    }

    debug!("Successfully obtained token from GitHub CLI");
    Ok(token)
}

/// Try to get token from environment variable
fn try_environment_token() -> Result<String> {
    debug!("Attempting environment variable authentication");

    let token = env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;
    let token = token.trim().to_string();

    if token.is_empty() {
        return Err(anyhow!("GITHUB_TOKEN is empty"));
    }

    const KNOWN_PREFIXES: [&str; 4] = ["ghp_", "gho_", "ghs_", "github_pat_"];
    if !KNOWN_PREFIXES.iter().any(|prefix| token.starts_with(prefix)) {
        warn!("GITHUB_TOKEN doesn't look like a GitHub token (expected ghp_, gho_, ghs_ or github_pat_ prefix)");
    }

    Ok(token)
}
