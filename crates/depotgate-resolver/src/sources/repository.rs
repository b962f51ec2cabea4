//! Repository resolver
//!
//! Repositories on a version-control host keep one branch per app id. Two
//! strategies read them:
//!
//! - **Branch**: download the branch as a zipball and scan it.
//! - **Tree**: resolve the branch to a commit, list the recursive tree and
//!   download only manifest files and key-bearing VDF files.
//!
//! All branch repositories are tried before any tree repository.

use async_trait::async_trait;
use depotgate_formats::{AppId, is_key_file, is_manifest_path};
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{GithubSettings, SourceConfig, SourceKind};
use crate::error::{ResolverError, Result};
use crate::resolution::Resolution;
use crate::sources::scan::ContentScan;
use crate::sources::{Resolve, SourceContext};
use crate::transport::HttpClient;

/// Concurrent raw file downloads per tree crawl
const TREE_DOWNLOAD_CONCURRENCY: usize = 8;

/// Repository addressed on the hosting API
#[derive(Debug, Clone)]
pub struct Repository {
    name: String,
    repo: String,
    http: HttpClient,
    github: GithubSettings,
}

impl Repository {
    fn new(source: &SourceConfig, context: &SourceContext) -> Self {
        Self {
            name: source.name.clone(),
            repo: source.base_location.trim_matches('/').to_string(),
            http: context.http.clone(),
            github: context.github.clone(),
        }
    }

    fn api_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            self.github.api_base.trim_end_matches('/'),
            self.repo,
            tail
        )
    }

    fn raw_url(&self, sha: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.github.raw_base.trim_end_matches('/'),
            self.repo,
            sha,
            path
        )
    }
}

/// Zipball strategy
#[derive(Debug, Clone)]
pub struct BranchRepository {
    repository: Repository,
}

impl BranchRepository {
    pub fn new(source: &SourceConfig, context: &SourceContext) -> Self {
        Self {
            repository: Repository::new(source, context),
        }
    }
}

#[async_trait]
impl Resolve for BranchRepository {
    fn name(&self) -> &str {
        &self.repository.name
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        let repo = &self.repository;
        let url = repo.api_url(&format!("zipball/{app_id}"));

        let (status, body) = match repo.http.get_raw(&url, repo.github.timeout()).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{}: zipball request failed: {e}", repo.name);
                return Resolution::failed(e);
            }
        };

        if status == StatusCode::NOT_FOUND {
            debug!("{}: no branch for {app_id}", repo.name);
            return Resolution::Empty;
        }
        if status != StatusCode::OK {
            warn!("{}: zipball returned {status}", repo.name);
            return Resolution::failed(ResolverError::HttpStatus { status, url });
        }

        let mut scan = ContentScan::new();
        if let Err(e) = scan.add_zip(&body) {
            warn!("{}: unreadable zipball: {e}", repo.name);
            return Resolution::failed(e);
        }

        Resolution::found(scan.into_resolved(app_id, repo.name.clone()))
    }
}

/// Which kind of manifests a tree repository carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeVariant {
    Encrypted,
    Decrypted,
}

/// Tree-crawl strategy
#[derive(Debug, Clone)]
pub struct TreeRepository {
    repository: Repository,
    variant: TreeVariant,
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct TreeListing {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl TreeRepository {
    pub fn new(source: &SourceConfig, context: &SourceContext, variant: TreeVariant) -> Self {
        Self {
            repository: Repository::new(source, context),
            variant,
        }
    }

    /// Files worth downloading: manifests and key-bearing VDF files
    fn wanted(item: &TreeItem) -> bool {
        if item.kind != "blob" {
            return false;
        }
        let name = item.path.rsplit('/').next().unwrap_or(&item.path);
        is_manifest_path(name) || is_key_file(name)
    }

    async fn crawl(&self, app_id: AppId) -> Result<ContentScan> {
        let repo = &self.repository;
        let timeout = repo.github.timeout();

        let branch: BranchInfo = repo
            .http
            .get_json(&repo.api_url(&format!("branches/{app_id}")), timeout)
            .await?;
        let sha = branch.commit.sha;

        let listing: TreeListing = repo
            .http
            .get_json(
                &repo.api_url(&format!("git/trees/{sha}?recursive=1")),
                timeout,
            )
            .await?;
        if listing.truncated {
            warn!("{}: tree listing for {app_id} is truncated", repo.name);
        }

        let paths: Vec<String> = listing
            .tree
            .into_iter()
            .filter(Self::wanted)
            .map(|item| item.path)
            .collect();
        debug!("{}: downloading {} files for {app_id}", repo.name, paths.len());

        let downloads: Vec<(String, Result<bytes::Bytes>)> = stream::iter(paths)
            .map(|path| {
                let url = repo.raw_url(&sha, &path);
                async move {
                    let body = repo.http.get_bytes(&url, timeout).await;
                    (path, body)
                }
            })
            .buffer_unordered(TREE_DOWNLOAD_CONCURRENCY)
            .collect()
            .await;

        let mut scan = ContentScan::new();
        let mut sorted = downloads;
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, body) in sorted {
            match body {
                Ok(content) => scan.add_file(&path, &content),
                Err(e) => warn!("{}: failed to download {path}: {e}", repo.name),
            }
        }
        Ok(scan)
    }
}

#[async_trait]
impl Resolve for TreeRepository {
    fn name(&self) -> &str {
        &self.repository.name
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        let repo = &self.repository;
        let scan = match self.crawl(app_id).await {
            Ok(scan) => scan,
            Err(e) if e.is_not_found() => {
                debug!("{}: no branch for {app_id}", repo.name);
                return Resolution::Empty;
            }
            Err(e) => {
                warn!("{}: tree crawl failed: {e}", repo.name);
                return Resolution::failed(e);
            }
        };

        if scan.artifacts.is_empty() {
            debug!(
                "{}: {app_id} has no manifest files ({:?} tree)",
                repo.name, self.variant
            );
            return Resolution::Empty;
        }

        Resolution::found(scan.into_resolved(app_id, repo.name.clone()))
    }
}

/// Closed set of repository strategies
#[derive(Debug, Clone)]
pub enum RepositoryStrategy {
    Branch(BranchRepository),
    Tree(TreeRepository),
}

impl RepositoryStrategy {
    /// Strategy for a repository source; `None` for mirror kinds
    pub fn from_config(source: &SourceConfig, context: &SourceContext) -> Option<Self> {
        match source.kind {
            SourceKind::Branch => Some(Self::Branch(BranchRepository::new(source, context))),
            SourceKind::EncryptedTree => Some(Self::Tree(TreeRepository::new(
                source,
                context,
                TreeVariant::Encrypted,
            ))),
            SourceKind::DecryptedTree => Some(Self::Tree(TreeRepository::new(
                source,
                context,
                TreeVariant::Decrypted,
            ))),
            SourceKind::ZipMirror | SourceKind::KeyValueApi | SourceKind::SessionApi => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Branch(_))
    }
}

#[async_trait]
impl Resolve for RepositoryStrategy {
    fn name(&self) -> &str {
        match self {
            Self::Branch(r) => r.name(),
            Self::Tree(r) => r.name(),
        }
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        match self {
            Self::Branch(r) => r.resolve(app_id).await,
            Self::Tree(r) => r.resolve(app_id).await,
        }
    }
}

/// Two-pass resolver over every configured repository
#[derive(Debug, Clone, Default)]
pub struct RepositoryResolver {
    strategies: Vec<RepositoryStrategy>,
}

impl RepositoryResolver {
    pub fn new(strategies: Vec<RepositoryStrategy>) -> Self {
        Self { strategies }
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[async_trait]
impl Resolve for RepositoryResolver {
    fn name(&self) -> &str {
        "repositories"
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        let branch_pass = self.strategies.iter().filter(|s| s.is_branch());
        let tree_pass = self.strategies.iter().filter(|s| !s.is_branch());

        let mut failures = Vec::new();
        for strategy in branch_pass.chain(tree_pass) {
            match strategy.resolve(app_id).await {
                Resolution::Found(resolved) => {
                    info!("Repository {} resolved {app_id}", strategy.name());
                    return Resolution::Found(resolved);
                }
                Resolution::Empty => {}
                Resolution::Failed { reason } => {
                    failures.push(format!("{}: {reason}", strategy.name()));
                }
            }
        }

        if failures.is_empty() {
            Resolution::Empty
        } else {
            Resolution::failed(failures.join("; "))
        }
    }
}
