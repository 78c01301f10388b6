//! In-memory gateway for tests and offline runs
//!
//! [`MockGateway`] keeps a small model of an organization (teams with
//! role-tagged members, repositories, files, org members), paginates listings
//! with a configurable page size, records every call, and can be told to fail
//! specific operations.
//!
//! ```
//! use reconcile::mock::MockGateway;
//! use reconcile::{CancelToken, DesiredState, TeamSpec, compute_plan};
//!
//! let gateway = MockGateway::new();
//! gateway.add_team("Platform", "platform");
//!
//! let desired = DesiredState {
//!     org: "acme".into(),
//!     teams: vec![TeamSpec::named("Platform")],
//!     ..Default::default()
//! };
//! let plan = compute_plan(&desired, &gateway, &CancelToken::new()).unwrap();
//! assert!(plan.is_empty());
//! ```

use crate::error::{RemoteError, RemoteErrorKind};
use crate::gateway::{
    FileMeta, Gateway, NewFile, NewRepository, NewTeam, Page, PageRequest, RemoteRepo,
    RemoteResult, RemoteTeam, RemoteUser, RoleFilter,
};
use crate::types::{Permission, Role, slug_for};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
struct MockTeam {
    id: u64,
    name: String,
    members: BTreeMap<String, Role>,
    repos: BTreeMap<String, Permission>,
}

#[derive(Debug, Default)]
struct MockState {
    teams: BTreeMap<String, MockTeam>,
    next_team_id: u64,
    /// Lower-cased name to actual name
    repos: BTreeMap<String, RemoteRepo>,
    /// (lower-cased repo, path, branch)
    files: BTreeMap<(String, String, String), String>,
    org_members: BTreeSet<String>,
    failures: HashMap<String, RemoteError>,
    calls: Vec<String>,
}

/// In-memory [`Gateway`] implementation
#[derive(Debug, Clone)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
    page_size: usize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create an empty organization.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_team_id: 1,
                ..Default::default()
            })),
            page_size: 100,
        }
    }

    /// Use a smaller page size to exercise pagination.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn add_team(&self, name: &str, slug: &str) {
        let mut state = self.state();
        let id = state.next_team_id;
        state.next_team_id += 1;
        state.teams.insert(
            slug.to_string(),
            MockTeam {
                id,
                name: name.to_string(),
                ..Default::default()
            },
        );
    }

    /// Add a user to a team (and to the organization).
    pub fn add_team_member(&self, slug: &str, login: &str, role: Role) {
        let mut state = self.state();
        state.org_members.insert(login.to_string());
        if let Some(team) = state.teams.get_mut(slug) {
            team.members.insert(login.to_string(), role);
        }
    }

    pub fn add_repo(&self, name: &str) {
        self.state().repos.insert(
            name.to_lowercase(),
            RemoteRepo {
                name: name.to_string(),
                private: true,
            },
        );
    }

    pub fn add_file(&self, repo: &str, path: &str, branch: &str, content: &str) {
        self.state().files.insert(
            (repo.to_lowercase(), path.to_string(), branch.to_string()),
            content.to_string(),
        );
    }

    pub fn add_org_member(&self, login: &str) {
        self.state().org_members.insert(login.to_string());
    }

    /// Make every call matching `key` fail with `error`.
    ///
    /// Keys are the operation name optionally followed by `:` and the primary
    /// identifier, e.g. `create_repository` or `create_repository:infra`.
    pub fn fail(&self, key: &str, error: RemoteError) {
        self.state().failures.insert(key.to_string(), error);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Every call made so far, as `operation:identifier`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Calls that mutate state.
    pub fn mutations(&self) -> Vec<String> {
        const READS: [&str; 5] = [
            "list_teams",
            "list_team_members",
            "list_repositories",
            "list_org_members",
            "get_file",
        ];
        self.calls()
            .into_iter()
            .filter(|c| !READS.iter().any(|r| c.split(':').next() == Some(*r)))
            .collect()
    }

    pub fn team_slugs(&self) -> Vec<String> {
        self.state().teams.keys().cloned().collect()
    }

    pub fn team_role(&self, slug: &str, login: &str) -> Option<Role> {
        self.state()
            .teams
            .get(slug)
            .and_then(|t| t.members.get(login).copied())
    }

    pub fn team_permission(&self, slug: &str, repo: &str) -> Option<Permission> {
        self.state()
            .teams
            .get(slug)
            .and_then(|t| t.repos.get(&repo.to_lowercase()).copied())
    }

    pub fn has_repo(&self, name: &str) -> bool {
        self.state().repos.contains_key(&name.to_lowercase())
    }

    pub fn file(&self, repo: &str, path: &str, branch: &str) -> Option<String> {
        self.state()
            .files
            .get(&(repo.to_lowercase(), path.to_string(), branch.to_string()))
            .cloned()
    }

    pub fn is_org_member(&self, login: &str) -> bool {
        self.state().org_members.contains(login)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Record a call and return an injected failure for it, if any.
    fn record(&self, state: &mut MockState, op: &str, id: &str) -> RemoteResult<()> {
        let key = format!("{op}:{id}");
        state.calls.push(key.clone());
        match state
            .failures
            .get(&key)
            .or_else(|| state.failures.get(op))
        {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn paginate<T: Clone>(&self, items: &[T], request: PageRequest) -> Page<T> {
        let page = request.page.max(1) as usize;
        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(items.len());
        let slice = if start < items.len() {
            items[start..end].to_vec()
        } else {
            Vec::new()
        };
        let next_page = (end < items.len()).then(|| request.page.max(1) + 1);
        Page {
            items: slice,
            next_page,
        }
    }
}

impl Gateway for MockGateway {
    fn list_teams(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteTeam>> {
        let mut state = self.state();
        self.record(&mut state, "list_teams", org)?;
        let teams: Vec<RemoteTeam> = state
            .teams
            .iter()
            .map(|(slug, t)| RemoteTeam {
                id: t.id,
                name: t.name.clone(),
                slug: slug.clone(),
            })
            .collect();
        Ok(self.paginate(&teams, page))
    }

    fn list_team_members(
        &self,
        _org: &str,
        slug: &str,
        role: RoleFilter,
        page: PageRequest,
    ) -> RemoteResult<Page<RemoteUser>> {
        let mut state = self.state();
        self.record(&mut state, "list_team_members", slug)?;
        let team = state
            .teams
            .get(slug)
            .ok_or_else(|| RemoteError::not_found(format!("team {slug} not found")))?;
        let users: Vec<RemoteUser> = team
            .members
            .iter()
            .filter(|(_, r)| match role {
                RoleFilter::Maintainer => **r == Role::Maintainer,
                RoleFilter::Member => **r == Role::Member,
                RoleFilter::All => true,
            })
            .map(|(login, _)| RemoteUser {
                login: login.clone(),
            })
            .collect();
        Ok(self.paginate(&users, page))
    }

    fn list_repositories(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteRepo>> {
        let mut state = self.state();
        self.record(&mut state, "list_repositories", org)?;
        let repos: Vec<RemoteRepo> = state.repos.values().cloned().collect();
        Ok(self.paginate(&repos, page))
    }

    fn list_org_members(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteUser>> {
        let mut state = self.state();
        self.record(&mut state, "list_org_members", org)?;
        let users: Vec<RemoteUser> = state
            .org_members
            .iter()
            .map(|login| RemoteUser {
                login: login.clone(),
            })
            .collect();
        Ok(self.paginate(&users, page))
    }

    fn create_team(&self, _org: &str, team: &NewTeam) -> RemoteResult<RemoteTeam> {
        let mut state = self.state();
        self.record(&mut state, "create_team", &team.name)?;
        let slug = slug_for(&team.name);
        if state.teams.contains_key(&slug) {
            return Err(RemoteError::already_exists(format!(
                "team {slug} already exists"
            )));
        }
        let id = state.next_team_id;
        state.next_team_id += 1;
        state.teams.insert(
            slug.clone(),
            MockTeam {
                id,
                name: team.name.clone(),
                ..Default::default()
            },
        );
        Ok(RemoteTeam {
            id,
            name: team.name.clone(),
            slug,
        })
    }

    fn delete_team(&self, _org: &str, slug: &str) -> RemoteResult<()> {
        let mut state = self.state();
        self.record(&mut state, "delete_team", slug)?;
        state
            .teams
            .remove(slug)
            .map(|_| ())
            .ok_or_else(|| RemoteError::not_found(format!("team {slug} not found")))
    }

    fn set_team_membership(
        &self,
        _org: &str,
        slug: &str,
        user: &str,
        role: Role,
    ) -> RemoteResult<()> {
        let mut state = self.state();
        self.record(&mut state, "set_team_membership", &format!("{slug}/{user}"))?;
        let team = state
            .teams
            .get_mut(slug)
            .ok_or_else(|| RemoteError::not_found(format!("team {slug} not found")))?;
        team.members.insert(user.to_string(), role);
        state.org_members.insert(user.to_string());
        Ok(())
    }

    fn create_repository(&self, _org: &str, repo: &NewRepository) -> RemoteResult<()> {
        let mut state = self.state();
        self.record(&mut state, "create_repository", &repo.name)?;
        let key = repo.name.to_lowercase();
        if state.repos.contains_key(&key) {
            return Err(RemoteError::already_exists(
                "name already exists on this account",
            ));
        }
        state.repos.insert(
            key,
            RemoteRepo {
                name: repo.name.clone(),
                private: repo.private,
            },
        );
        Ok(())
    }

    fn add_team_repository(
        &self,
        _org: &str,
        slug: &str,
        _owner: &str,
        repo: &str,
        permission: Permission,
    ) -> RemoteResult<()> {
        let mut state = self.state();
        self.record(&mut state, "add_team_repository", &format!("{slug}/{repo}"))?;
        let key = repo.to_lowercase();
        if !state.repos.contains_key(&key) {
            return Err(RemoteError::not_found(format!("repository {repo} not found")));
        }
        let team = state
            .teams
            .get_mut(slug)
            .ok_or_else(|| RemoteError::not_found(format!("team {slug} not found")))?;
        team.repos.insert(key, permission);
        Ok(())
    }

    fn get_file(
        &self,
        _org: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> RemoteResult<Option<FileMeta>> {
        let mut state = self.state();
        self.record(&mut state, "get_file", &format!("{repo}/{path}"))?;
        let key = repo.to_lowercase();
        if !state.repos.contains_key(&key) {
            return Err(RemoteError::not_found(format!("repository {repo} not found")));
        }
        let found = state
            .files
            .contains_key(&(key, path.to_string(), branch.to_string()));
        Ok(found.then(|| FileMeta {
            path: path.to_string(),
            sha: format!("mock-{path}"),
        }))
    }

    fn create_file(&self, _org: &str, repo: &str, file: &NewFile) -> RemoteResult<()> {
        let mut state = self.state();
        self.record(&mut state, "create_file", &format!("{repo}/{}", file.path))?;
        let key = (
            repo.to_lowercase(),
            file.path.clone(),
            file.branch.clone(),
        );
        if state.files.contains_key(&key) {
            return Err(RemoteError::already_exists("sha wasn't supplied"));
        }
        state.files.insert(key, file.content.clone());
        Ok(())
    }

    fn remove_org_member(&self, _org: &str, user: &str) -> RemoteResult<()> {
        let mut state = self.state();
        self.record(&mut state, "remove_org_member", user)?;
        if !state.org_members.remove(user) {
            return Err(RemoteError::new(
                RemoteErrorKind::NotFound,
                format!("{user} is not a member"),
            ));
        }
        for team in state.teams.values_mut() {
            team.members.remove(user);
        }
        Ok(())
    }
}
