//! Plan computation
//!
//! Each planner compares one concern of the desired state against freshly
//! listed remote state and returns typed [`Change`]s. They run in a fixed
//! order because later planners use the slug index built by the first:
//!
//! 1. [`teams`]: team existence, builds the [`DesiredIndex`](crate::DesiredIndex)
//! 2. [`membership`]: team roles
//! 3. [`repos`]: repositories, permission grants, provisioned files
//! 4. [`cleanup`]: orphan teams and memberless users
//!
//! Planners only read from the gateway. The first remote failure aborts
//! planning; no partial plan is returned.

pub mod cleanup;
pub mod membership;
pub mod repos;
pub mod teams;

use crate::context::CancelToken;
use crate::desired::DesiredState;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::types::{Change, Plan};
use rayon::prelude::*;

/// Planning options
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Number of teams whose members are listed concurrently
    pub jobs: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Output of a single planner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Planned {
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
}

/// Compute the plan that moves the organization to `desired`
pub fn compute_plan(
    desired: &DesiredState,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
) -> Result<Plan> {
    compute_plan_with(desired, gateway, cancel, &PlanOptions::default())
}

/// Compute a plan with explicit options
pub fn compute_plan_with(
    desired: &DesiredState,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
    opts: &PlanOptions,
) -> Result<Plan> {
    let mut plan = Plan::new();

    let team_plan = teams::plan_teams(desired, gateway, cancel)?;
    log::debug!(
        "Team planner: {} change(s), {} desired team(s)",
        team_plan.changes.len(),
        team_plan.index.len()
    );
    plan.extend(team_plan.changes);
    plan.warnings.extend(team_plan.warnings);
    let index = team_plan.index;

    let members = membership::plan_membership(&desired.org, &index, gateway, cancel, opts)?;
    log::debug!("Membership planner: {} change(s)", members.len());
    plan.extend(members);

    let repos = repos::plan_repositories(desired, gateway, cancel)?;
    log::debug!("Repository planner: {} change(s)", repos.len());
    plan.extend(repos);

    let cleanup = cleanup::plan_cleanup(desired, &index, gateway, cancel, opts)?;
    log::debug!(
        "Cleanup planner: {} change(s), {} warning(s)",
        cleanup.changes.len(),
        cleanup.warnings.len()
    );
    plan.extend(cleanup.changes);
    plan.warnings.extend(cleanup.warnings);

    log::info!(
        "Planned {} change(s) for {} with {} warning(s)",
        plan.len(),
        desired.org,
        plan.warnings.len()
    );
    Ok(plan)
}

/// Run `fetch` for every item, up to `jobs` at a time
///
/// Results keep the input order. The first error wins.
pub(crate) fn fetch_all<I, T, F>(items: &[I], jobs: usize, fetch: F) -> Result<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> Result<T> + Sync,
{
    if jobs <= 1 || items.len() <= 1 {
        return items.iter().map(&fetch).collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| items.par_iter().map(&fetch).collect()),
        Err(e) => {
            log::warn!("Failed to create thread pool, listing sequentially: {e}");
            items.iter().map(&fetch).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::{Policy, TeamSpec};
    use crate::error::{Error, RemoteError};
    use crate::mock::MockGateway;
    use crate::types::{ChangeDetails, Role};

    fn platform() -> DesiredState {
        let mut team = TeamSpec::named("Platform");
        team.maintainers = vec!["alice".into(), "bob".into()];
        team.members = vec!["alice".into()];
        team.repositories.insert("infra".into(), "write".into());
        DesiredState {
            org: "acme".into(),
            teams: vec![team],
            policy: Policy {
                create_repo: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_fetch_all_preserves_order() {
        let items: Vec<u32> = (0..50).collect();
        let doubled = fetch_all(&items, 8, |n| Ok(n * 2)).unwrap();
        assert_eq!(doubled, (0..50).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_fetch_all_returns_error() {
        let items = vec![1, 2, 3];
        let err = fetch_all(&items, 2, |n| {
            if *n == 2 {
                Err(Error::Cancelled)
            } else {
                Ok(*n)
            }
        })
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_planners_run_in_order() {
        let gateway = MockGateway::new();
        let plan = compute_plan(&platform(), &gateway, &CancelToken::new()).unwrap();

        let labels: Vec<String> = plan.changes.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "team:create platform",
                "team-member:ensure platform",
                "team-member:ensure platform",
                "repo:ensure infra",
                "team-repo:grant platform/infra",
            ]
        );
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_planning_is_read_only() {
        let gateway = MockGateway::new();
        gateway.add_team("Legacy", "legacy");
        gateway.add_org_member("dave");
        let mut desired = platform();
        desired.policy.delete_unconfigured_teams = true;
        desired.policy.remove_members_without_team = true;
        desired.policy.add_default_readme = true;

        compute_plan(&desired, &gateway, &CancelToken::new()).unwrap();
        assert!(gateway.mutations().is_empty());
    }

    #[test]
    fn test_first_remote_error_aborts() {
        let gateway = MockGateway::new();
        gateway.fail("list_repositories", RemoteError::from_status(502, "bad gateway"));

        let err = compute_plan(&platform(), &gateway, &CancelToken::new()).unwrap_err();
        match err {
            Error::Remote { source, .. } => assert_eq!(source.status, Some(502)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_before_planning() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = compute_plan(&platform(), &MockGateway::new(), &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let gateway = MockGateway::new();
        let mut desired = platform();
        for i in 0..6 {
            let mut team = TeamSpec::named(format!("Team {i}"));
            team.members = vec![format!("user{i}")];
            gateway.add_team(&team.name, &format!("team-{i}"));
            gateway.add_team_member(&format!("team-{i}"), &format!("user{i}"), Role::Maintainer);
            desired.teams.push(team);
        }

        let cancel = CancelToken::new();
        let sequential =
            compute_plan_with(&desired, &gateway, &cancel, &PlanOptions { jobs: 1 }).unwrap();
        let parallel =
            compute_plan_with(&desired, &gateway, &cancel, &PlanOptions { jobs: 8 }).unwrap();
        assert_eq!(sequential, parallel);

        // Demotions from maintainer to member are emitted too
        let demotions = sequential
            .changes
            .iter()
            .filter(|c| matches!(c.details(), ChangeDetails::TeamMemberEnsure(d) if d.role == Role::Member))
            .count();
        assert_eq!(demotions, 6);
    }
}
