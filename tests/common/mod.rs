//! Common test utilities and helpers for repocourier tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use repocourier::github::{
    ContentProbe, ContentWrite, HostConnector, HostError, NewRepository, RemoteAccount,
    RemoteHost, RemoteRepository,
};
use repocourier::{create_router, AppState, Config};

#[derive(Default)]
struct FakeState {
    repos: Vec<RemoteRepository>,
    /// (repository, path) -> blob sha
    contents: HashMap<(String, String), String>,
    writes: Vec<ContentWrite>,
    create_calls: usize,
    get_calls: usize,
    next_sha: usize,
    failing_writes: HashSet<String>,
    create_failure: Option<(u16, String)>,
}

/// In-memory stand-in for a GitHub account
pub struct FakeHost {
    pub login: String,
    state: Mutex<FakeState>,
}

impl FakeHost {
    pub fn new(login: &str) -> Arc<Self> {
        Arc::new(Self {
            login: login.to_string(),
            state: Mutex::new(FakeState::default()),
        })
    }

    fn repository(&self, name: &str, description: Option<&str>) -> RemoteRepository {
        let mut extra = Map::new();
        extra.insert("full_name".to_string(), json!(format!("{}/{}", self.login, name)));
        RemoteRepository {
            name: name.to_string(),
            html_url: format!("https://github.com/{}/{}", self.login, name),
            private: false,
            description: description.map(str::to_string),
            extra,
        }
    }

    /// Seed an existing repository
    pub fn add_repository(&self, name: &str) {
        let repo = self.repository(name, None);
        self.state.lock().unwrap().repos.push(repo);
    }

    /// Seed an existing file with a known sha
    pub fn add_file(&self, repo: &str, path: &str, sha: &str) {
        self.state
            .lock()
            .unwrap()
            .contents
            .insert((repo.to_string(), path.to_string()), sha.to_string());
    }

    pub fn fail_write(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_writes
            .insert(path.to_string());
    }

    pub fn fail_create(&self, status: u16, message: &str) {
        self.state.lock().unwrap().create_failure = Some((status, message.to_string()));
    }

    pub fn writes(&self) -> Vec<ContentWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }
}

#[async_trait]
impl RemoteHost for FakeHost {
    async fn authenticated_user(&self) -> Result<RemoteAccount, HostError> {
        let mut profile = Map::new();
        profile.insert("id".to_string(), json!(583231));
        profile.insert("name".to_string(), json!("The Octocat"));
        Ok(RemoteAccount {
            login: self.login.clone(),
            profile,
        })
    }

    async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, HostError> {
        // Newest repositories were pushed last
        let state = self.state.lock().unwrap();
        Ok(state.repos.iter().rev().cloned().collect())
    }

    async fn create_repository(
        &self,
        repo: &NewRepository,
    ) -> Result<RemoteRepository, HostError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;

        if let Some((status, message)) = &state.create_failure {
            return Err(HostError::api(*status, message.clone()));
        }
        if state.repos.iter().any(|r| r.name == repo.name) {
            return Err(HostError::api(422, "Repository creation failed."));
        }

        let created = self.repository(&repo.name, Some(&repo.description));
        state.repos.push(created.clone());
        Ok(created)
    }

    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RemoteRepository, HostError> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;

        if owner != self.login {
            return Err(HostError::api(404, "Not Found"));
        }
        state
            .repos
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| HostError::api(404, "Not Found"))
    }

    async fn probe_content(
        &self,
        _owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<ContentProbe, HostError> {
        let state = self.state.lock().unwrap();
        Ok(
            match state.contents.get(&(repo.to_string(), path.to_string())) {
                Some(sha) => ContentProbe::File { sha: sha.clone() },
                None => ContentProbe::Absent,
            },
        )
    }

    async fn write_content(
        &self,
        _owner: &str,
        repo: &str,
        write: &ContentWrite,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(write.clone());

        if state.failing_writes.contains(&write.path) {
            return Err(HostError::api(409, format!("{} does not match", write.path)));
        }

        let key = (repo.to_string(), write.path.clone());
        if state.contents.get(&key) != write.sha.as_ref() {
            return Err(HostError::api(422, "sha wasn't supplied"));
        }

        state.next_sha += 1;
        let sha = format!("sha-{}", state.next_sha);
        state.contents.insert(key, sha);
        Ok(())
    }
}

/// Connector handing out the same fake account on every request
pub struct FakeConnector {
    host: Arc<FakeHost>,
    failure: Option<String>,
}

impl FakeConnector {
    pub fn new(host: Arc<FakeHost>) -> Arc<Self> {
        Arc::new(Self { host, failure: None })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            host: FakeHost::new("nobody"),
            failure: Some(message.to_string()),
        })
    }
}

#[async_trait]
impl HostConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteHost>, HostError> {
        match &self.failure {
            Some(message) => Err(HostError::Other(anyhow::anyhow!(message.clone()))),
            None => Ok(self.host.clone()),
        }
    }
}

/// Application state publishing `root`
pub fn app_state(root: &Path, connector: Arc<dyn HostConnector>) -> Arc<AppState> {
    let mut config = Config::default();
    config.push.root = root.to_string_lossy().into_owned();
    Arc::new(AppState::new(config, connector).expect("Failed to build app state"))
}

/// Send one request through a fresh router and decode the JSON reply
pub async fn call(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(state.clone())
        .oneshot(request)
        .await
        .expect("Router failed");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Write `files` (relative path, content) under `root`
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(full, content).expect("Failed to write file");
    }
}
