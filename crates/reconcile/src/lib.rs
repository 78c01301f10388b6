//! # Reconcile
//!
//! Plans and applies the changes that move a GitHub organization to a
//! declared desired state.
//!
//! ## Core Concepts
//!
//! - **DesiredState**: the organization, its teams and policy flags
//! - **Gateway**: paginated read access and single mutations against the
//!   organization
//! - **Change**: one typed mutation, tagged by scope and action
//! - **Plan**: every change computed for a run, plus warnings
//! - **Tier**: the precedence bucket that orders changes at apply time
//!
//! ## Example
//!
//! ```
//! use reconcile::mock::MockGateway;
//! use reconcile::{CancelToken, DesiredState, Policy, TeamSpec, apply_simple, compute_plan};
//!
//! let mut team = TeamSpec::named("Platform");
//! team.maintainers = vec!["alice".into()];
//! team.repositories.insert("infra".into(), "write".into());
//!
//! let desired = DesiredState {
//!     org: "acme".into(),
//!     teams: vec![team],
//!     policy: Policy { create_repo: true, ..Default::default() },
//! };
//!
//! let gateway = MockGateway::new();
//! let cancel = CancelToken::new();
//! let plan = compute_plan(&desired, &gateway, &cancel)?;
//! assert_eq!(plan.len(), 4);
//!
//! let summary = apply_simple(plan, &gateway, &cancel)?;
//! assert_eq!(summary.applied, 4);
//! assert!(compute_plan(&desired, &gateway, &cancel)?.changes.iter().all(|c| {
//!     c.kind() == reconcile::ChangeKind::TeamRepoGrant
//! }));
//! # Ok::<(), reconcile::Error>(())
//! ```
//!
//! Planning never mutates the organization. Applying stops at the first
//! fatal error and leaves earlier changes in place.

pub mod context;
pub mod desired;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod mock;
pub mod planner;
pub mod types;

pub use context::{ApplyProgress, CancelToken, NoProgress};
pub use desired::{DesiredIndex, DesiredState, Policy, TeamSpec};
pub use error::{Error, RemoteError, RemoteErrorKind, Result};
pub use executor::{apply, apply_simple};
pub use gateway::{
    FileMeta, Gateway, NewFile, NewRepository, NewTeam, PAGE_SIZE, Page, PageRequest, RemoteRepo,
    RemoteResult, RemoteTeam, RemoteUser, RoleFilter, collect_pages,
};
pub use planner::{PlanOptions, compute_plan, compute_plan_with};
pub use types::{
    Action, ApplySummary, Change, ChangeDetails, ChangeKind, ChangeOutcome, Permission, Plan, Role,
    Scope, Tier, slug_for,
};
