//! Team existence planner

use crate::context::CancelToken;
use crate::desired::{DesiredIndex, DesiredState, TeamSpec};
use crate::error::Result;
use crate::gateway::{Gateway, RemoteTeam, collect_pages};
use crate::types::{Change, ChangeDetails, TeamCreate};
use std::collections::BTreeSet;

/// Output of the team existence planner
#[derive(Debug, Clone, Default)]
pub struct TeamPlan {
    /// One `team:create` per desired slug missing remotely, in slug order
    pub changes: Vec<Change>,
    /// Desired teams keyed by slug, for the downstream planners
    pub index: DesiredIndex,
    pub warnings: Vec<String>,
}

/// Index desired teams by slug
///
/// Teams without a name or slug are skipped. A later team with the same slug
/// replaces an earlier one. Both cases produce a warning.
pub fn build_index(teams: &[TeamSpec]) -> (DesiredIndex, Vec<String>) {
    let mut index = DesiredIndex::new();
    let mut warnings = Vec::new();

    for (position, team) in teams.iter().enumerate() {
        let Some(slug) = team.slug() else {
            warnings.push(format!(
                "team #{} has neither a name nor a slug, skipped",
                position + 1
            ));
            continue;
        };
        if index.insert(slug.clone(), team.clone()).is_some() {
            warnings.push(format!(
                "team {slug} is configured more than once, the last definition wins"
            ));
        }
    }

    (index, warnings)
}

/// List every team in the organization
pub fn list_remote_teams(
    org: &str,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
) -> Result<Vec<RemoteTeam>> {
    collect_pages(cancel, &format!("list teams of {org}"), |page| {
        gateway.list_teams(org, page)
    })
}

/// Emit `team:create` for every desired team that does not exist yet
///
/// Existing teams are left alone: description and privacy drift are not
/// reconciled.
pub fn plan_teams(
    desired: &DesiredState,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
) -> Result<TeamPlan> {
    let (index, warnings) = build_index(&desired.teams);
    let remote: BTreeSet<String> = list_remote_teams(&desired.org, gateway, cancel)?
        .into_iter()
        .map(|team| team.slug)
        .collect();

    let changes = index
        .iter()
        .filter(|(slug, _)| !remote.contains(*slug))
        .map(|(slug, team)| create_change(&desired.org, slug, team))
        .collect();

    Ok(TeamPlan {
        changes,
        index,
        warnings,
    })
}

fn create_change(org: &str, slug: &str, team: &TeamSpec) -> Change {
    Change::new(
        slug,
        ChangeDetails::TeamCreate(TeamCreate {
            org: org.to_string(),
            name: team.display_name(),
            description: team.description.clone(),
            privacy: team.privacy.clone(),
        }),
    )
}
