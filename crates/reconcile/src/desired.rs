//! Desired-state model
//!
//! Produced by configuration loading and consumed read-only by the planners.

use crate::types::slug_for;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Target state of one organization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    pub org: String,
    #[serde(default)]
    pub teams: Vec<TeamSpec>,
    #[serde(default)]
    pub policy: Policy,
}

/// Desired configuration of a single team
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `closed` or `secret`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    /// Parent team slugs. Recorded but not reconciled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    /// Repository name to permission string (normalized at planning time)
    #[serde(default)]
    pub repositories: BTreeMap<String, String>,
}

impl TeamSpec {
    /// Create a team with just a display name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The team's slug: explicit if configured, otherwise derived from the name
    ///
    /// `None` when neither a slug nor a name is set.
    pub fn slug(&self) -> Option<String> {
        match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => Some(slug.to_string()),
            _ if !self.name.trim().is_empty() => Some(slug_for(&self.name)),
            _ => None,
        }
    }

    /// Display name, falling back to the slug
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.slug().unwrap_or_default()
        } else {
            self.name.clone()
        }
    }
}

/// Organization-level policy flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Create repositories referenced by teams that do not exist yet
    #[serde(default)]
    pub create_repo: bool,
    /// Provision a templated README.md in every referenced repository
    #[serde(default)]
    pub add_default_readme: bool,
    /// Provision `.github/renovate.json` from `renovate_config`
    #[serde(default)]
    pub add_renovate_config: bool,
    #[serde(default)]
    pub renovate_config: Option<String>,
    /// Delete remote teams that are not configured
    #[serde(default)]
    pub delete_unconfigured_teams: bool,
    /// Remove organization members that belong to no team
    #[serde(default)]
    pub remove_members_without_team: bool,
    /// Warn about unconfigured teams instead of (or as well as) deleting
    #[serde(default)]
    pub warn_unmanaged_teams: bool,
    /// Warn about members that belong to no team
    #[serde(default)]
    pub warn_members_without_any_team: bool,
}

impl Policy {
    /// Renovate template, if provisioning is enabled and a template is set
    pub fn renovate_template(&self) -> Option<&str> {
        if !self.add_renovate_config {
            return None;
        }
        self.renovate_config
            .as_deref()
            .filter(|template| !template.is_empty())
    }
}

/// Desired teams keyed by slug
///
/// Built by the team existence planner and handed explicitly to the
/// membership and cleanup planners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredIndex {
    teams: BTreeMap<String, TeamSpec>,
}

impl DesiredIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a team under `slug`, replacing any earlier team with the same slug
    pub fn insert(&mut self, slug: String, team: TeamSpec) -> Option<TeamSpec> {
        self.teams.insert(slug, team)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.teams.contains_key(slug)
    }

    pub fn get(&self, slug: &str) -> Option<&TeamSpec> {
        self.teams.get(slug)
    }

    /// Teams in slug order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TeamSpec)> {
        self.teams.iter()
    }

    pub fn slugs(&self) -> impl Iterator<Item = &String> {
        self.teams.keys()
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_explicit_wins() {
        let team = TeamSpec {
            name: "Platform Team".into(),
            slug: Some("plat".into()),
            ..Default::default()
        };
        assert_eq!(team.slug().as_deref(), Some("plat"));
    }

    #[test]
    fn test_slug_derived_from_name() {
        let team = TeamSpec::named("Platform Team");
        assert_eq!(team.slug().as_deref(), Some("platform-team"));
    }

    #[test]
    fn test_slug_blank_explicit_falls_back() {
        let team = TeamSpec {
            name: "Infra".into(),
            slug: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(team.slug().as_deref(), Some("infra"));
    }

    #[test]
    fn test_slug_missing() {
        assert_eq!(TeamSpec::default().slug(), None);
    }

    #[test]
    fn test_renovate_template() {
        let mut policy = Policy {
            renovate_config: Some("{}".into()),
            ..Default::default()
        };
        assert_eq!(policy.renovate_template(), None);

        policy.add_renovate_config = true;
        assert_eq!(policy.renovate_template(), Some("{}"));

        policy.renovate_config = Some(String::new());
        assert_eq!(policy.renovate_template(), None);
    }
}
