//! Cleanup planner: orphan teams and memberless users
//!
//! Both sub-policies enumerate the whole organization, which costs one call
//! per team on top of the listings. Enumeration is skipped when neither the
//! policy nor its warning is enabled.

use super::membership::{desired_roles, list_members};
use super::teams::list_remote_teams;
use super::{PlanOptions, Planned, fetch_all};
use crate::context::CancelToken;
use crate::desired::{DesiredIndex, DesiredState};
use crate::error::Result;
use crate::gateway::{Gateway, RemoteTeam, RoleFilter, collect_pages};
use crate::types::{Change, ChangeDetails, OrgMemberRemove, TeamDelete};
use std::collections::BTreeSet;

/// Plan orphan team deletion and memberless user removal
pub fn plan_cleanup(
    desired: &DesiredState,
    index: &DesiredIndex,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
    opts: &PlanOptions,
) -> Result<Planned> {
    let policy = &desired.policy;
    let orphans = policy.delete_unconfigured_teams || policy.warn_unmanaged_teams;
    let memberless = policy.remove_members_without_team || policy.warn_members_without_any_team;

    let mut planned = Planned::default();
    if !orphans && !memberless {
        return Ok(planned);
    }

    let org = desired.org.as_str();
    let teams = list_remote_teams(org, gateway, cancel)?;

    if orphans {
        for team in teams.iter().filter(|t| !index.contains(&t.slug)) {
            if policy.delete_unconfigured_teams {
                planned.changes.push(Change::new(
                    team.slug.clone(),
                    ChangeDetails::TeamDelete(TeamDelete {
                        org: org.to_string(),
                        slug: team.slug.clone(),
                    }),
                ));
            }
            if policy.warn_unmanaged_teams {
                planned
                    .warnings
                    .push(format!("team {} is unmanaged", team.slug));
            }
        }
    }

    if memberless {
        let protected = members_of_any_team(org, &teams, index, gateway, cancel, opts)?;
        let members = collect_pages(cancel, &format!("list members of {org}"), |page| {
            gateway.list_org_members(org, page)
        })?;

        let mut seen = BTreeSet::new();
        for login in members.into_iter().map(|u| u.login.to_lowercase()) {
            if protected.contains(&login) || !seen.insert(login.clone()) {
                continue;
            }
            if policy.remove_members_without_team {
                planned.changes.push(Change::new(
                    login.clone(),
                    ChangeDetails::OrgMemberRemove(OrgMemberRemove {
                        org: org.to_string(),
                        user: login.clone(),
                    }),
                ));
            }
            if policy.warn_members_without_any_team {
                planned
                    .warnings
                    .push(format!("member {login} is not in any team"));
            }
        }
    }

    Ok(planned)
}

/// Logins that belong to at least one team
///
/// Covers every remote team's members (any role) plus the users the desired
/// state places in a team, so a user added during this run is never removed
/// by it.
fn members_of_any_team(
    org: &str,
    teams: &[RemoteTeam],
    index: &DesiredIndex,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
    opts: &PlanOptions,
) -> Result<BTreeSet<String>> {
    let listings = fetch_all(teams, opts.jobs, |team| {
        list_members(org, &team.slug, RoleFilter::All, gateway, cancel)
    })?;

    let mut logins: BTreeSet<String> = listings.into_iter().flatten().collect();
    for (_, team) in index.iter() {
        logins.extend(desired_roles(team).into_keys());
    }
    Ok(logins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::{Policy, TeamSpec};
    use crate::mock::MockGateway;
    use crate::planner::teams::build_index;
    use crate::types::{ChangeKind, Role};

    fn run(gateway: &MockGateway, teams: Vec<TeamSpec>, policy: Policy) -> Planned {
        let desired = DesiredState {
            org: "acme".into(),
            teams,
            policy,
        };
        let (index, _) = build_index(&desired.teams);
        plan_cleanup(
            &desired,
            &index,
            gateway,
            &CancelToken::new(),
            &PlanOptions::default(),
        )
        .unwrap()
    }

    fn seeded() -> MockGateway {
        let gateway = MockGateway::new();
        gateway.add_team("Platform", "platform");
        gateway.add_team("Legacy", "legacy");
        gateway.add_team_member("platform", "alice", Role::Maintainer);
        gateway.add_team_member("legacy", "bob", Role::Member);
        gateway.add_org_member("carol");
        gateway
    }

    #[test]
    fn test_disabled_policies_make_no_calls() {
        let gateway = seeded();
        let planned = run(&gateway, vec![TeamSpec::named("Platform")], Policy::default());
        assert_eq!(planned, Planned::default());
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn test_orphan_teams_deleted() {
        let planned = run(
            &seeded(),
            vec![TeamSpec::named("Platform")],
            Policy {
                delete_unconfigured_teams: true,
                ..Default::default()
            },
        );
        assert_eq!(planned.changes.len(), 1);
        assert_eq!(planned.changes[0].kind(), ChangeKind::TeamDelete);
        assert_eq!(planned.changes[0].target(), "legacy");
        assert!(planned.warnings.is_empty());
    }

    #[test]
    fn test_orphan_teams_warned_only() {
        let planned = run(
            &seeded(),
            vec![TeamSpec::named("Platform")],
            Policy {
                warn_unmanaged_teams: true,
                ..Default::default()
            },
        );
        assert!(planned.changes.is_empty());
        assert_eq!(planned.warnings, vec!["team legacy is unmanaged"]);
    }

    #[test]
    fn test_memberless_users_removed() {
        let planned = run(
            &seeded(),
            vec![TeamSpec::named("Platform")],
            Policy {
                remove_members_without_team: true,
                warn_members_without_any_team: true,
                ..Default::default()
            },
        );
        let targets: Vec<&str> = planned.changes.iter().map(Change::target).collect();
        assert_eq!(targets, vec!["carol"]);
        assert_eq!(planned.changes[0].kind(), ChangeKind::OrgMemberRemove);
        assert_eq!(planned.warnings, vec!["member carol is not in any team"]);
    }

    #[test]
    fn test_desired_members_are_protected() {
        let mut platform = TeamSpec::named("Platform");
        platform.members = vec!["Carol".into()];
        let planned = run(
            &seeded(),
            vec![platform],
            Policy {
                remove_members_without_team: true,
                ..Default::default()
            },
        );
        assert!(planned.changes.is_empty());
    }
}
