//! Team membership planner
//!
//! Only adds users or changes their role. Users present remotely but absent
//! from the desired state are left in place; removal happens solely through
//! the memberless-user cleanup policy.

use super::{PlanOptions, fetch_all};
use crate::context::CancelToken;
use crate::desired::{DesiredIndex, TeamSpec};
use crate::error::{Error, Result};
use crate::gateway::{Gateway, RoleFilter, collect_pages};
use crate::types::{Change, ChangeDetails, Role, TeamMemberEnsure};
use std::collections::BTreeMap;

/// Lower-cased login to role
pub type RoleMap = BTreeMap<String, Role>;

/// Desired roles for a team
///
/// Maintainers are inserted first, so a login listed as both maintainer and
/// member ends up a maintainer.
pub fn desired_roles(team: &TeamSpec) -> RoleMap {
    let mut roles = RoleMap::new();
    for login in normalized(&team.maintainers) {
        roles.insert(login, Role::Maintainer);
    }
    for login in normalized(&team.members) {
        roles.entry(login).or_insert(Role::Member);
    }
    roles
}

fn normalized(logins: &[String]) -> impl Iterator<Item = String> + '_ {
    logins
        .iter()
        .map(|login| login.trim().to_lowercase())
        .filter(|login| !login.is_empty())
}

/// Observed roles for a team
///
/// Built from the maintainer listing, then the member listing. A team that
/// does not exist yet yields an empty map.
pub fn observed_roles(
    org: &str,
    slug: &str,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
) -> Result<RoleMap> {
    let mut roles = RoleMap::new();
    for login in list_members(org, slug, RoleFilter::Maintainer, gateway, cancel)? {
        roles.insert(login, Role::Maintainer);
    }
    for login in list_members(org, slug, RoleFilter::Member, gateway, cancel)? {
        roles.entry(login).or_insert(Role::Member);
    }
    Ok(roles)
}

/// Lower-cased logins of a team's members with the given role
///
/// A 404 for the team is treated as an empty listing.
pub fn list_members(
    org: &str,
    slug: &str,
    role: RoleFilter,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
) -> Result<Vec<String>> {
    let context = format!("list {} members of team {slug}", role.as_str());
    let users = collect_pages(cancel, &context, |page| {
        gateway.list_team_members(org, slug, role, page)
    });
    match users {
        Ok(users) => Ok(users.into_iter().map(|u| u.login.to_lowercase()).collect()),
        Err(Error::Remote { source, .. }) if source.is_not_found() => {
            log::debug!("Team {slug} not found, treating its {} list as empty", role.as_str());
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Changes that bring one team's roles from `observed` to `desired`
pub fn diff_roles(org: &str, slug: &str, desired: &RoleMap, observed: &RoleMap) -> Vec<Change> {
    desired
        .iter()
        .filter(|(login, role)| observed.get(*login) != Some(*role))
        .map(|(login, role)| {
            Change::new(
                slug,
                ChangeDetails::TeamMemberEnsure(TeamMemberEnsure {
                    org: org.to_string(),
                    slug: slug.to_string(),
                    user: login.clone(),
                    role: *role,
                }),
            )
        })
        .collect()
}

/// Emit `team-member:ensure` changes for every desired team
///
/// Teams are visited in slug order and users in login order. Member listings
/// for different teams are fetched concurrently.
pub fn plan_membership(
    org: &str,
    index: &DesiredIndex,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
    opts: &PlanOptions,
) -> Result<Vec<Change>> {
    let teams: Vec<(&String, &TeamSpec)> = index.iter().collect();
    let observed = fetch_all(&teams, opts.jobs, |(slug, _)| {
        observed_roles(org, slug, gateway, cancel)
    })?;

    Ok(teams
        .iter()
        .zip(&observed)
        .flat_map(|((slug, team), observed)| diff_roles(org, slug, &desired_roles(team), observed))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::mock::MockGateway;

    fn team(maintainers: &[&str], members: &[&str]) -> TeamSpec {
        TeamSpec {
            name: "Platform".into(),
            maintainers: maintainers.iter().map(ToString::to_string).collect(),
            members: members.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    fn index_of(team: TeamSpec) -> DesiredIndex {
        let mut index = DesiredIndex::new();
        index.insert("platform".into(), team);
        index
    }

    fn roles(changes: &[Change]) -> Vec<(String, Role)> {
        changes
            .iter()
            .map(|c| match c.details() {
                ChangeDetails::TeamMemberEnsure(d) => (d.user.clone(), d.role),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_maintainer_wins() {
        let desired = desired_roles(&team(&["Alice"], &["alice", "bob"]));
        assert_eq!(desired.get("alice"), Some(&Role::Maintainer));
        assert_eq!(desired.get("bob"), Some(&Role::Member));
        assert_eq!(desired.len(), 2);
    }

    #[test]
    fn test_maintainer_wins_when_listed_as_member_first() {
        let desired = desired_roles(&TeamSpec {
            members: vec!["alice".into()],
            maintainers: vec!["alice".into()],
            ..Default::default()
        });
        assert_eq!(desired.get("alice"), Some(&Role::Maintainer));
    }

    #[test]
    fn test_only_differences_emitted() {
        let gateway = MockGateway::new();
        gateway.add_team("Platform", "platform");
        gateway.add_team_member("platform", "alice", Role::Maintainer);
        gateway.add_team_member("platform", "bob", Role::Maintainer);
        gateway.add_team_member("platform", "zed", Role::Member);

        let changes = plan_membership(
            "acme",
            &index_of(team(&["alice"], &["bob", "carol"])),
            &gateway,
            &CancelToken::new(),
            &PlanOptions::default(),
        )
        .unwrap();

        // alice unchanged, bob demoted, carol added, zed left alone
        assert_eq!(
            roles(&changes),
            vec![("bob".into(), Role::Member), ("carol".into(), Role::Member)]
        );
        assert!(changes.iter().all(|c| c.target() == "platform"));
    }

    #[test]
    fn test_missing_team_degrades_to_empty() {
        let changes = plan_membership(
            "acme",
            &index_of(team(&["bob", "alice"], &["alice"])),
            &MockGateway::new(),
            &CancelToken::new(),
            &PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(
            roles(&changes),
            vec![
                ("alice".into(), Role::Maintainer),
                ("bob".into(), Role::Maintainer)
            ]
        );
    }

    #[test]
    fn test_other_listing_errors_are_fatal() {
        let gateway = MockGateway::new();
        gateway.add_team("Platform", "platform");
        gateway.fail(
            "list_team_members:platform",
            RemoteError::from_status(500, "boom"),
        );

        let err = plan_membership(
            "acme",
            &index_of(team(&["alice"], &[])),
            &gateway,
            &CancelToken::new(),
            &PlanOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("list maintainer members of team platform"));
    }

    #[test]
    fn test_observed_roles_paginates() {
        let gateway = MockGateway::new().with_page_size(2);
        gateway.add_team("Platform", "platform");
        for login in ["a", "b", "c", "d", "e"] {
            gateway.add_team_member("platform", login, Role::Member);
        }
        gateway.add_team_member("platform", "Boss", Role::Maintainer);

        let observed = observed_roles("acme", "platform", &gateway, &CancelToken::new()).unwrap();
        assert_eq!(observed.len(), 6);
        assert_eq!(observed.get("boss"), Some(&Role::Maintainer));
    }
}
