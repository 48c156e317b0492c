//! repocourier - publish a local project into a GitHub repository over HTTP
//!
//! A small API server that proxies the authenticated GitHub account: it can
//! report the account profile, list its repositories, and push every file of
//! the local project into a (possibly new) repository, reporting a per-file
//! outcome for each upload.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`github`]: GitHub API seam, client and authentication
//! - [`scan`]: Local project enumeration
//! - [`sync`]: Repository resolution and the per-file upload loop
//! - [`server`]: HTTP routes

pub mod config;
pub mod github;
pub mod scan;
pub mod server;
pub mod sync;

pub use config::Config;
pub use github::{GitHubClient, GitHubConnector, HostConnector, HostError, RemoteHost};
pub use scan::{LocalFile, ProjectScanner};
pub use server::{create_router, AppState};
pub use sync::{ProjectSynchronizer, PushReport, PushRequest, UploadResult, UploadStatus};
