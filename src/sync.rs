//! Project push - publishes the local project into a remote repository
//!
//! A push resolves (or creates) the target repository, scans the project
//! root and uploads every file sequentially. Per-file failures are recorded
//! in the ledger and never abort the batch; only client acquisition,
//! repository resolution and the scan itself fail the whole push.

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::github::{
    ContentProbe, ContentWrite, HostError, NewRepository, RemoteHost, RemoteRepository,
};
use crate::scan::{LocalFile, ProjectScanner};

/// Optional overrides accepted by a push
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub repo_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Error,
}

/// Outcome of uploading one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub file: String,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResult {
    pub fn success(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: UploadStatus::Success,
            message: None,
        }
    }

    pub fn error(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: UploadStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Success
    }
}

/// Response body of a completed push
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub success: bool,
    pub repo_url: String,
    pub files_uploaded: usize,
    pub total_files: usize,
    pub results: Vec<UploadResult>,
}

impl PushReport {
    fn compile(repo: &RemoteRepository, results: Vec<UploadResult>) -> Self {
        let files_uploaded = results.iter().filter(|r| r.is_success()).count();

        Self {
            success: true,
            repo_url: repo.html_url.clone(),
            files_uploaded,
            total_files: results.len(),
            results,
        }
    }
}

/// Why a push failed as a whole
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("{0:#}")]
    Scan(anyhow::Error),
}

/// Commit message for a create (`Add`) or update (`Update`) of `path`
pub fn commit_message(path: &str, updating: bool) -> String {
    if updating {
        format!("Update {}", path)
    } else {
        format!("Add {}", path)
    }
}

/// Sequences one push against an already authenticated client
pub struct ProjectSynchronizer<'a> {
    host: &'a dyn RemoteHost,
    scanner: &'a ProjectScanner,
    lenient_probe: bool,
}

impl<'a> ProjectSynchronizer<'a> {
    pub fn new(host: &'a dyn RemoteHost, scanner: &'a ProjectScanner) -> Self {
        Self {
            host,
            scanner,
            lenient_probe: false,
        }
    }

    /// Treat any failed probe as "absent" instead of a per-file error
    pub fn lenient_probe(mut self, lenient: bool) -> Self {
        self.lenient_probe = lenient;
        self
    }

    /// Run a complete push of the scanner's root into `name`
    pub async fn push(&self, name: &str, description: &str) -> Result<PushReport, PushError> {
        let account = self.host.authenticated_user().await?;
        let owner = account.login.as_str();

        let repo = self.resolve_repository(owner, name, description).await?;

        let files = self
            .scanner
            .scan()
            .context("Failed to enumerate project files")
            .map_err(PushError::Scan)?;

        info!(
            "Pushing {} files from {:?} to {}/{}",
            files.len(),
            self.scanner.root(),
            owner,
            repo.name
        );

        let results = self.upload_files(owner, &repo.name, &files).await;
        let report = PushReport::compile(&repo, results);

        info!(
            "Push to {} completed: {} of {} files uploaded",
            report.repo_url, report.files_uploaded, report.total_files
        );

        Ok(report)
    }

    /// Create the repository, or fetch it when the name is already taken
    pub async fn resolve_repository(
        &self,
        owner: &str,
        name: &str,
        description: &str,
    ) -> Result<RemoteRepository, HostError> {
        let request = NewRepository::public_empty(name, description);

        match self.host.create_repository(&request).await {
            Ok(repo) => Ok(repo),
            Err(e) if e.is_conflict() => {
                debug!("Repository {}/{} already exists, reusing it", owner, name);
                self.host.get_repository(owner, name).await
            }
            Err(e) => Err(e),
        }
    }

    /// Upload each file in order, one ledger entry per file
    pub async fn upload_files(
        &self,
        owner: &str,
        repo: &str,
        files: &[LocalFile],
    ) -> Vec<UploadResult> {
        let mut results = Vec::with_capacity(files.len());

        for file in files {
            let result = match self.upload_file(owner, repo, file).await {
                Ok(()) => UploadResult::success(&file.repo_path),
                Err(e) => {
                    warn!("Failed to upload {}: {}", file.repo_path, e);
                    UploadResult::error(&file.repo_path, e.to_string())
                }
            };
            results.push(result);
        }

        results
    }

    async fn upload_file(
        &self,
        owner: &str,
        repo: &str,
        file: &LocalFile,
    ) -> Result<(), HostError> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| HostError::Other(e.into()))?;
        let content = STANDARD.encode(bytes);

        let probe = match self.host.probe_content(owner, repo, &file.repo_path).await {
            Ok(probe) => probe,
            Err(e) if self.lenient_probe => {
                warn!("Probe of {} failed, uploading as new file: {}", file.repo_path, e);
                ContentProbe::Absent
            }
            Err(e) => return Err(e),
        };

        let sha = probe.sha().map(str::to_string);
        let write = ContentWrite {
            path: file.repo_path.clone(),
            message: commit_message(&file.repo_path, sha.is_some()),
            content,
            sha,
        };

        self.host.write_content(owner, repo, &write).await?;
        debug!("Uploaded {}", file.repo_path);

        Ok(())
    }
}
