//! Remote gateway trait
//!
//! The [`Gateway`] trait is the engine's only view of the organization. It
//! exposes paginated listings and single mutations; retry, backoff and
//! rate-limit pacing belong to implementations.
//!
//! Use [`MockGateway`](crate::mock::MockGateway) for testing without network
//! access.

use crate::context::CancelToken;
use crate::error::{Error, RemoteError, Result};
use crate::types::{Permission, Role};
use serde::{Deserialize, Serialize};

/// Page size used for every listing
pub const PAGE_SIZE: u32 = 100;

/// Result of a single remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Which page of a listing to fetch (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn first() -> Self {
        Self {
            page: 1,
            per_page: PAGE_SIZE,
        }
    }

    pub fn at(page: u32) -> Self {
        Self {
            page,
            per_page: PAGE_SIZE,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Next page to request, `None` on the last page
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: None,
        }
    }
}

/// Role filter for team member listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    Maintainer,
    Member,
    All,
}

impl RoleFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maintainer => "maintainer",
            Self::Member => "member",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTeam {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepo {
    pub name: String,
    #[serde(default)]
    pub private: bool,
}

/// Metadata of an existing file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub path: String,
    pub sha: String,
}

/// Request body for team creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTeam {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
}

/// Request body for repository creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRepository {
    pub name: String,
    pub private: bool,
    pub allow_auto_merge: bool,
    pub allow_merge_commit: bool,
    pub delete_branch_on_merge: bool,
}

impl NewRepository {
    /// Repository with the managed merge policy: auto-merge on, merge commits
    /// off, head branches deleted on merge
    pub fn managed(name: impl Into<String>, private: bool) -> Self {
        Self {
            name: name.into(),
            private,
            allow_auto_merge: true,
            allow_merge_commit: false,
            delete_branch_on_merge: true,
        }
    }
}

/// A file to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub path: String,
    pub content: String,
    pub message: String,
    pub branch: String,
}

/// Read and write access to one collaboration platform
///
/// Listings are paginated: callers pass a [`PageRequest`] and follow
/// [`Page::next_page`] until it is `None` (see [`collect_pages`]).
pub trait Gateway: Send + Sync {
    fn list_teams(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteTeam>>;

    /// List a team's members filtered by role
    ///
    /// Returns a `NotFound` error if the team does not exist.
    fn list_team_members(
        &self,
        org: &str,
        slug: &str,
        role: RoleFilter,
        page: PageRequest,
    ) -> RemoteResult<Page<RemoteUser>>;

    fn list_repositories(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteRepo>>;

    fn list_org_members(&self, org: &str, page: PageRequest) -> RemoteResult<Page<RemoteUser>>;

    fn create_team(&self, org: &str, team: &NewTeam) -> RemoteResult<RemoteTeam>;

    fn delete_team(&self, org: &str, slug: &str) -> RemoteResult<()>;

    /// Add a user to a team, or update their role if already a member
    fn set_team_membership(&self, org: &str, slug: &str, user: &str, role: Role)
    -> RemoteResult<()>;

    /// Create a repository. Returns `AlreadyExists` if the name is taken.
    fn create_repository(&self, org: &str, repo: &NewRepository) -> RemoteResult<()>;

    fn add_team_repository(
        &self,
        org: &str,
        slug: &str,
        owner: &str,
        repo: &str,
        permission: Permission,
    ) -> RemoteResult<()>;

    /// Fetch file metadata at `branch`, `Ok(None)` if the file is absent
    fn get_file(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> RemoteResult<Option<FileMeta>>;

    fn create_file(&self, org: &str, repo: &str, file: &NewFile) -> RemoteResult<()>;

    fn remove_org_member(&self, org: &str, user: &str) -> RemoteResult<()>;
}

/// Drain a paginated listing
///
/// Checks `cancel` before every page. Remote failures are wrapped with
/// `context`; a cancelled call becomes [`Error::Cancelled`].
pub fn collect_pages<T, F>(cancel: &CancelToken, context: &str, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(PageRequest) -> RemoteResult<Page<T>>,
{
    let mut items = Vec::new();
    let mut request = PageRequest::first();
    loop {
        cancel.check()?;
        let page = fetch(request).map_err(|e| Error::remote(context, e))?;
        items.extend(page.items);
        match page.next_page {
            Some(next) if next > 0 => request = PageRequest::at(next),
            _ => break,
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteErrorKind;
    use std::cell::RefCell;

    #[test]
    fn test_collect_pages_follows_cursor() {
        let requested = RefCell::new(Vec::new());
        let items = collect_pages(&CancelToken::new(), "list", |req| {
            requested.borrow_mut().push(req.page);
            Ok(Page {
                items: vec![req.page * 10, req.page * 10 + 1],
                next_page: (req.page < 3).then_some(req.page + 1),
            })
        })
        .unwrap();

        assert_eq!(items, vec![10, 11, 20, 21, 30, 31]);
        assert_eq!(*requested.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_collect_pages_zero_cursor_terminates() {
        let items = collect_pages(&CancelToken::new(), "list", |_| {
            Ok(Page {
                items: vec!["a"],
                next_page: Some(0),
            })
        })
        .unwrap();
        assert_eq!(items, vec!["a"]);
    }

    #[test]
    fn test_collect_pages_wraps_errors() {
        let err = collect_pages::<u32, _>(&CancelToken::new(), "list teams", |_| {
            Err(RemoteError::from_status(500, "boom"))
        })
        .unwrap_err();
        match err {
            Error::Remote { context, source } => {
                assert_eq!(context, "list teams");
                assert_eq!(source.kind, RemoteErrorKind::Network);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_collect_pages_observes_cancel() {
        let cancel = CancelToken::new();
        let calls = RefCell::new(0);
        let err = collect_pages(&cancel, "list", |req| {
            *calls.borrow_mut() += 1;
            cancel.cancel();
            Ok(Page {
                items: vec![req.page],
                next_page: Some(req.page + 1),
            })
        })
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_managed_repository_policy() {
        let repo = NewRepository::managed("infra", true);
        assert!(repo.private);
        assert!(repo.allow_auto_merge);
        assert!(!repo.allow_merge_commit);
        assert!(repo.delete_branch_on_merge);
    }
}
