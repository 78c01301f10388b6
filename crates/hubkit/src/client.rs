//! GitHub REST gateway.
//!
//! This module provides [`GitHubGateway`], the [`Gateway`] implementation
//! backed by the GitHub REST API.
//!
//! # Rate Limiting
//!
//! Every response's `x-ratelimit-remaining` and `x-ratelimit-reset` headers
//! are inspected. Once fewer than [`LOW_WATERMARK`](crate::rate::LOW_WATERMARK)
//! requests remain, the next call waits for the window to reset. Failed calls
//! that are retryable go through [`with_retry`](crate::retry::with_retry).

use crate::auth::{Credentials, app_jwt};
use crate::error::{Error, Result, from_transport};
use crate::rate::{RateLimit, limited_wait, unix_now};
use crate::retry::{LogCallback, RetryConfig, with_retry_if};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reconcile::{
    CancelToken, FileMeta, Gateway, NewFile, NewRepository, NewTeam, Page, PageRequest,
    Permission, RemoteError, RemoteErrorKind, RemoteRepo, RemoteResult, RemoteTeam, RemoteUser,
    Role, RoleFilter,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Body, RequestBuilder};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
/// Environment variable overriding the API base (GitHub Enterprise)
pub const API_BASE_VAR: &str = "GITHUB_API_URL";

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("orgsync/", env!("CARGO_PKG_VERSION"));

/// Connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    /// Global timeout for a single request
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Default settings with the API base taken from `GITHUB_API_URL` if set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(base) = std::env::var(API_BASE_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            config.api_base = base.trim().trim_end_matches('/').to_string();
        }
        config
    }
}

/// GitHub REST gateway.
///
/// # Example
///
/// ```no_run
/// use hubkit::{ClientConfig, Credentials, GitHubGateway};
/// use reconcile::{CancelToken, Gateway, PageRequest};
///
/// let credentials = Credentials::from_env()?;
/// let gateway = GitHubGateway::connect(ClientConfig::from_env(), &credentials, "acme", CancelToken::new())?;
/// let teams = gateway.list_teams("acme", PageRequest::first())?;
/// println!("First page: {} teams", teams.items.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct GitHubGateway {
    agent: ureq::Agent,
    api_base: String,
    authorization: String,
    retry: RetryConfig,
    cancel: CancelToken,
}

impl GitHubGateway {
    /// Create a gateway for an already issued token.
    #[must_use]
    pub fn with_token(config: ClientConfig, token: &str, cancel: CancelToken) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            api_base: config.api_base,
            authorization: format!("Bearer {token}"),
            retry: config.retry,
            cancel,
        }
    }

    /// Create a gateway from credentials.
    ///
    /// App credentials are exchanged for an installation token of `org`.
    pub fn connect(
        config: ClientConfig,
        credentials: &Credentials,
        org: &str,
        cancel: CancelToken,
    ) -> Result<Self> {
        match credentials {
            Credentials::Token(token) => Ok(Self::with_token(config, token, cancel)),
            Credentials::App {
                app_id,
                private_key,
            } => {
                let jwt = app_jwt(*app_id, private_key, unix_now())?;
                let app = Self::with_token(config.clone(), &jwt, cancel.clone());
                let token = app.installation_token(org)?;
                log::debug!("Authenticated as GitHub App {app_id} for {org}");
                Ok(Self::with_token(config, &token, cancel))
            }
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Exchange the App JWT for an installation access token.
    fn installation_token(&self, org: &str) -> Result<String> {
        let url = self.installation_url(org);
        let installation: Installation = self
            .execute(|| self.prepare(self.agent.get(&url)).call())
            .and_then(read_json)
            .map_err(|e| Error::remote(format!("find App installation for {org}"), e))?;

        let url = self.access_token_url(installation.id);
        let token: AccessToken = self
            .execute(|| self.prepare(self.agent.post(&url)).send_empty())
            .and_then(read_json)
            .map_err(|e| Error::remote("create installation token", e))?;
        Ok(token.token)
    }

    // ------------------------------------------------------------------
    // URLs
    // ------------------------------------------------------------------

    fn teams_url(&self, org: &str) -> String {
        format!("{}/orgs/{org}/teams", self.api_base)
    }

    fn team_url(&self, org: &str, slug: &str) -> String {
        format!("{}/orgs/{org}/teams/{slug}", self.api_base)
    }

    fn team_members_url(&self, org: &str, slug: &str) -> String {
        format!("{}/members", self.team_url(org, slug))
    }

    fn membership_url(&self, org: &str, slug: &str, user: &str) -> String {
        format!("{}/memberships/{user}", self.team_url(org, slug))
    }

    fn team_repo_url(&self, org: &str, slug: &str, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}", self.team_url(org, slug))
    }

    fn org_repos_url(&self, org: &str) -> String {
        format!("{}/orgs/{org}/repos", self.api_base)
    }

    fn org_members_url(&self, org: &str) -> String {
        format!("{}/orgs/{org}/members", self.api_base)
    }

    fn org_member_url(&self, org: &str, user: &str) -> String {
        format!("{}/{user}", self.org_members_url(org))
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!(
            "{}/repos/{owner}/{repo}/contents/{}",
            self.api_base,
            path.trim_start_matches('/')
        )
    }

    fn installation_url(&self, org: &str) -> String {
        format!("{}/orgs/{org}/installation", self.api_base)
    }

    fn access_token_url(&self, installation: u64) -> String {
        format!(
            "{}/app/installations/{installation}/access_tokens",
            self.api_base
        )
    }

    // ------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------

    fn prepare<B>(&self, request: RequestBuilder<B>) -> RequestBuilder<B> {
        request
            .header("Authorization", &self.authorization)
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send a request with retry and rate pacing, turning error statuses
    /// into [`RemoteError`]s
    fn execute<F>(&self, send: F) -> RemoteResult<Response<Body>>
    where
        F: Fn() -> std::result::Result<Response<Body>, ureq::Error>,
    {
        self.execute_if(RemoteError::is_retryable, send)
    }

    /// [`execute`](Self::execute) for creates, retried only when rate limited
    fn execute_create<F>(&self, send: F) -> RemoteResult<Response<Body>>
    where
        F: Fn() -> std::result::Result<Response<Body>, ureq::Error>,
    {
        self.execute_if(create_is_retryable, send)
    }

    fn execute_if<F, P>(&self, should_retry: P, send: F) -> RemoteResult<Response<Body>>
    where
        F: Fn() -> std::result::Result<Response<Body>, ureq::Error>,
        P: Fn(&RemoteError) -> bool,
    {
        with_retry_if(&self.retry, &self.cancel, &LogCallback, should_retry, || {
            let mut response = send().map_err(from_transport)?;
            let status = response.status().as_u16();
            let limit = RateLimit::parse(
                header(&response, "x-ratelimit-remaining"),
                header(&response, "x-ratelimit-reset"),
            );

            if status >= 400 {
                let retry_after = header(&response, "retry-after").map(str::to_string);
                let body = response.body_mut().read_to_string().unwrap_or_default();
                return Err(classify(status, limit, retry_after.as_deref(), &body, unix_now()));
            }

            if let Some(pause) = limit.and_then(|l| l.pause()) {
                log::warn!(
                    "GitHub rate limit nearly exhausted, pausing {}s until reset",
                    pause.as_secs()
                );
                if !self.cancel.sleep(pause) {
                    return Err(RemoteError::cancelled());
                }
            }
            Ok(response)
        })
    }

    fn list<T, R>(&self, url: &str, query: &[(&str, &str)], page: PageRequest) -> RemoteResult<Page<T>>
    where
        R: DeserializeOwned + Into<T>,
    {
        let page_number = page.page.to_string();
        let per_page = page.per_page.to_string();
        let mut response = self.execute(|| {
            let mut request = self
                .prepare(self.agent.get(url))
                .query("per_page", &per_page)
                .query("page", &page_number);
            for (key, value) in query {
                request = request.query(*key, *value);
            }
            request.call()
        })?;

        let next_page = header(&response, "link").and_then(next_page_from_link);
        let items: Vec<R> = response.body_mut().read_json().map_err(invalid_response)?;
        Ok(Page {
            items: items.into_iter().map(Into::into).collect(),
            next_page,
        })
    }
}

impl Gateway for GitHubGateway {
    fn list_teams(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteTeam>> {
        self.list::<RemoteTeam, GitHubTeam>(&self.teams_url(org), &[], page)
    }

    fn list_team_members(
        &self,
        org: &str,
        slug: &str,
        role: RoleFilter,
        page: PageRequest,
    ) -> RemoteResult<Page<RemoteUser>> {
        self.list::<RemoteUser, GitHubUser>(
            &self.team_members_url(org, slug),
            &[("role", role.as_str())],
            page,
        )
    }

    fn list_repositories(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteRepo>> {
        self.list::<RemoteRepo, GitHubRepo>(&self.org_repos_url(org), &[("type", "all")], page)
    }

    fn list_org_members(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteUser>> {
        self.list::<RemoteUser, GitHubUser>(
            &self.org_members_url(org),
            &[("role", "member")],
            page,
        )
    }

    fn create_team(&self, org: &str, team: &NewTeam) -> RemoteResult<RemoteTeam> {
        let url = self.teams_url(org);
        let created: GitHubTeam = self
            .execute_create(|| self.prepare(self.agent.post(&url)).send_json(team))
            .and_then(read_json)?;
        Ok(created.into())
    }

    fn delete_team(&self, org: &str, slug: &str) -> RemoteResult<()> {
        let url = self.team_url(org, slug);
        self.execute(|| self.prepare(self.agent.delete(&url)).call())
            .map(drop)
    }

    fn set_team_membership(
        &self,
        org: &str,
        slug: &str,
        user: &str,
        role: Role,
    ) -> RemoteResult<()> {
        let url = self.membership_url(org, slug, user);
        let body = json!({ "role": role.as_str() });
        self.execute(|| self.prepare(self.agent.put(&url)).send_json(&body))
            .map(drop)
    }

    fn create_repository(&self, org: &str, repo: &NewRepository) -> RemoteResult<()> {
        let url = self.org_repos_url(org);
        self.execute_create(|| self.prepare(self.agent.post(&url)).send_json(repo))
            .map(drop)
    }

    fn add_team_repository(
        &self,
        org: &str,
        slug: &str,
        owner: &str,
        repo: &str,
        permission: Permission,
    ) -> RemoteResult<()> {
        let url = self.team_repo_url(org, slug, owner, repo);
        let body = json!({ "permission": permission.as_str() });
        self.execute(|| self.prepare(self.agent.put(&url)).send_json(&body))
            .map(drop)
    }

    fn get_file(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> RemoteResult<Option<FileMeta>> {
        let url = self.contents_url(org, repo, path);
        let response = self.execute(|| {
            self.prepare(self.agent.get(&url))
                .query("ref", branch)
                .call()
        });
        match response.and_then(read_json::<GitHubContent>) {
            Ok(content) => Ok(Some(content.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_file(&self, org: &str, repo: &str, file: &NewFile) -> RemoteResult<()> {
        let url = self.contents_url(org, repo, &file.path);
        let body = json!({
            "message": file.message,
            "content": STANDARD.encode(file.content.as_bytes()),
            "branch": file.branch,
        });
        self.execute_create(|| self.prepare(self.agent.put(&url)).send_json(&body))
            .map(drop)
    }

    fn remove_org_member(&self, org: &str, user: &str) -> RemoteResult<()> {
        let url = self.org_member_url(org, user);
        self.execute(|| self.prepare(self.agent.delete(&url)).call())
            .map(drop)
    }
}

// =============================================================================
// Response handling
// =============================================================================

fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn read_json<T: DeserializeOwned>(mut response: Response<Body>) -> RemoteResult<T> {
    response.body_mut().read_json().map_err(invalid_response)
}

fn invalid_response(err: ureq::Error) -> RemoteError {
    RemoteError::new(
        RemoteErrorKind::Other,
        format!("invalid API response: {err}"),
    )
}

/// Whether a create may be sent again after `err`
///
/// A network failure or 5xx may have happened after the server applied the
/// create, and a resend would then fail with 422. Rate limiting rejects the
/// request before it is processed.
fn create_is_retryable(err: &RemoteError) -> bool {
    err.kind == RemoteErrorKind::RateLimited
}

/// Classify an error status
///
/// A 403 with an exhausted rate limit or a `retry-after` is rate limiting,
/// not a permission problem. Rate-limited errors carry the wait until the
/// limit resets.
fn classify(
    status: u16,
    limit: Option<RateLimit>,
    retry_after: Option<&str>,
    body: &str,
    now: u64,
) -> RemoteError {
    let message = serde_json::from_str::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let mut error = RemoteError::from_status(status, message);
    if status == 403 && (limit.is_some_and(|l| l.remaining == 0) || retry_after.is_some()) {
        error.kind = RemoteErrorKind::RateLimited;
    }
    if error.kind == RemoteErrorKind::RateLimited
        && let Some(wait) = limited_wait(retry_after, limit, now)
    {
        error = error.with_retry_after(wait);
    }
    error
}

/// Extract the `page` parameter of the `rel="next"` link
fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == "rel=\"next\"") {
            return None;
        }
        let url = target.trim().trim_start_matches('<').trim_end_matches('>');
        let (_, query) = url.split_once('?')?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("page="))
            .and_then(|n| n.parse().ok())
    })
}

// =============================================================================
// GitHub API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubTeam {
    id: u64,
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    #[serde(default)]
    private: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubContent {
    path: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Installation {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    token: String,
}

impl From<GitHubTeam> for RemoteTeam {
    fn from(t: GitHubTeam) -> Self {
        Self {
            id: t.id,
            name: t.name,
            slug: t.slug,
        }
    }
}

impl From<GitHubUser> for RemoteUser {
    fn from(u: GitHubUser) -> Self {
        Self { login: u.login }
    }
}

impl From<GitHubRepo> for RemoteRepo {
    fn from(r: GitHubRepo) -> Self {
        Self {
            name: r.name,
            private: r.private,
        }
    }
}

impl From<GitHubContent> for FileMeta {
    fn from(c: GitHubContent) -> Self {
        Self {
            path: c.path,
            sha: c.sha,
        }
    }
}
