//! Core types for planning and applying organization changes

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Scopes, actions, roles, permissions
// ============================================================================

/// Resource class a change targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    Team,
    TeamMember,
    Repo,
    TeamRepo,
    RepoFile,
    OrgMember,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::TeamMember => "team-member",
            Self::Repo => "repo",
            Self::TeamRepo => "team-repo",
            Self::RepoFile => "repo-file",
            Self::OrgMember => "org-member",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Delete,
    Ensure,
    Grant,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Ensure => "ensure",
            Self::Grant => "grant",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a user inside a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Maintainer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Maintainer => "maintainer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository permission granted to a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Pull,
    Triage,
    Push,
    Maintain,
    Admin,
}

impl Permission {
    /// Normalize a configured permission string.
    ///
    /// Accepts the canonical names plus the `read`/`write` aliases,
    /// case-insensitively. Anything else falls back to `pull`.
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "read" | "pull" => Self::Pull,
            "triage" => Self::Triage,
            "write" | "push" => Self::Push,
            "maintain" => Self::Maintain,
            "admin" => Self::Admin,
            _ => Self::Pull,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Triage => "triage",
            Self::Push => "push",
            Self::Maintain => "maintain",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a team slug from its display name
///
/// Lower-cases the name and replaces spaces with hyphens.
pub fn slug_for(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

// ============================================================================
// Change payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCreate {
    pub org: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDelete {
    pub org: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMemberEnsure {
    pub org: String,
    pub slug: String,
    pub user: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEnsure {
    pub org: String,
    pub name: String,
    #[serde(default = "default_private")]
    pub private: bool,
}

fn default_private() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRepoGrant {
    pub org: String,
    pub slug: String,
    pub repo: String,
    pub permission: Permission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFileEnsure {
    pub org: String,
    pub repo: String,
    pub path: String,
    pub content: String,
    pub message: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMemberRemove {
    pub org: String,
    pub user: String,
}

/// Payload of a change, one variant per `(scope, action)` pair
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeDetails {
    TeamCreate(TeamCreate),
    TeamDelete(TeamDelete),
    TeamMemberEnsure(TeamMemberEnsure),
    RepoEnsure(RepoEnsure),
    TeamRepoGrant(TeamRepoGrant),
    RepoFileEnsure(RepoFileEnsure),
    OrgMemberRemove(OrgMemberRemove),
    /// A pair this version does not know; carried through and applied as a no-op
    Unrecognized {
        scope: String,
        action: String,
        raw: serde_json::Value,
    },
}

impl ChangeDetails {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::TeamCreate(_) => ChangeKind::TeamCreate,
            Self::TeamDelete(_) => ChangeKind::TeamDelete,
            Self::TeamMemberEnsure(_) => ChangeKind::TeamMemberEnsure,
            Self::RepoEnsure(_) => ChangeKind::RepoEnsure,
            Self::TeamRepoGrant(_) => ChangeKind::TeamRepoGrant,
            Self::RepoFileEnsure(_) => ChangeKind::RepoFileEnsure,
            Self::OrgMemberRemove(_) => ChangeKind::OrgMemberRemove,
            Self::Unrecognized { .. } => ChangeKind::Unrecognized,
        }
    }

    fn to_value(&self) -> serde_json::Value {
        let value = match self {
            Self::TeamCreate(d) => serde_json::to_value(d),
            Self::TeamDelete(d) => serde_json::to_value(d),
            Self::TeamMemberEnsure(d) => serde_json::to_value(d),
            Self::RepoEnsure(d) => serde_json::to_value(d),
            Self::TeamRepoGrant(d) => serde_json::to_value(d),
            Self::RepoFileEnsure(d) => serde_json::to_value(d),
            Self::OrgMemberRemove(d) => serde_json::to_value(d),
            Self::Unrecognized { raw, .. } => return raw.clone(),
        };
        // Plain string/bool/enum structs always serialize
        value.unwrap_or_default()
    }
}

// ============================================================================
// Change kinds and precedence
// ============================================================================

/// Every change kind the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    TeamCreate,
    TeamDelete,
    TeamMemberEnsure,
    RepoEnsure,
    TeamRepoGrant,
    RepoFileEnsure,
    OrgMemberRemove,
    Unrecognized,
}

impl ChangeKind {
    /// All kinds with a known `(scope, action)` pair
    pub const KNOWN: [ChangeKind; 7] = [
        Self::TeamCreate,
        Self::TeamDelete,
        Self::TeamMemberEnsure,
        Self::RepoEnsure,
        Self::TeamRepoGrant,
        Self::RepoFileEnsure,
        Self::OrgMemberRemove,
    ];

    /// The `(scope, action)` pair, or `None` for unrecognized changes
    pub fn pair(self) -> Option<(Scope, Action)> {
        match self {
            Self::TeamCreate => Some((Scope::Team, Action::Create)),
            Self::TeamDelete => Some((Scope::Team, Action::Delete)),
            Self::TeamMemberEnsure => Some((Scope::TeamMember, Action::Ensure)),
            Self::RepoEnsure => Some((Scope::Repo, Action::Ensure)),
            Self::TeamRepoGrant => Some((Scope::TeamRepo, Action::Grant)),
            Self::RepoFileEnsure => Some((Scope::RepoFile, Action::Ensure)),
            Self::OrgMemberRemove => Some((Scope::OrgMember, Action::Remove)),
            Self::Unrecognized => None,
        }
    }

    /// Look up a kind by its serialized labels
    pub fn from_labels(scope: &str, action: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|kind| {
                kind.pair()
                    .is_some_and(|(s, a)| s.as_str() == scope && a.as_str() == action)
            })
            .unwrap_or(Self::Unrecognized)
    }

    /// Apply-time precedence tier
    ///
    /// Exhaustive on purpose: a new kind does not compile until it has a tier.
    pub fn tier(self) -> Tier {
        match self {
            Self::Unrecognized => Tier::Passthrough,
            Self::TeamCreate | Self::RepoEnsure => Tier::Creation,
            Self::TeamRepoGrant => Tier::Grant,
            Self::TeamMemberEnsure => Tier::Membership,
            Self::RepoFileEnsure => Tier::Content,
            Self::TeamDelete | Self::OrgMemberRemove => Tier::Destructive,
        }
    }
}

/// Ordering bucket for applying changes, low to high
///
/// Prerequisites (teams, repositories) come before anything that depends on
/// them, and deletions come last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Passthrough = 0,
    Creation = 10,
    Grant = 20,
    Membership = 30,
    Content = 40,
    Destructive = 90,
}

// ============================================================================
// Change
// ============================================================================

/// A single intended mutation against the organization
///
/// Scope and action are derived from the details, so the pair always matches
/// the payload. Serialized as `{scope, target, action, details}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChange", into = "RawChange")]
pub struct Change {
    target: String,
    details: ChangeDetails,
}

impl Change {
    pub fn new(target: impl Into<String>, details: ChangeDetails) -> Self {
        Self {
            target: target.into(),
            details,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn details(&self) -> &ChangeDetails {
        &self.details
    }

    pub fn kind(&self) -> ChangeKind {
        self.details.kind()
    }

    pub fn tier(&self) -> Tier {
        self.kind().tier()
    }

    /// Scope label, including the raw label of unrecognized changes
    pub fn scope(&self) -> &str {
        match (&self.details, self.kind().pair()) {
            (ChangeDetails::Unrecognized { scope, .. }, _) => scope.as_str(),
            (_, Some((scope, _))) => scope.as_str(),
            (_, None) => "",
        }
    }

    /// Action label, including the raw label of unrecognized changes
    pub fn action(&self) -> &str {
        match (&self.details, self.kind().pair()) {
            (ChangeDetails::Unrecognized { action, .. }, _) => action.as_str(),
            (_, Some((_, action))) => action.as_str(),
            (_, None) => "",
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.scope(), self.action(), self.target)
    }
}

/// Wire form of a [`Change`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChange {
    pub scope: String,
    pub target: String,
    pub action: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl From<Change> for RawChange {
    fn from(change: Change) -> Self {
        Self {
            scope: change.scope().to_string(),
            action: change.action().to_string(),
            details: change.details.to_value(),
            target: change.target,
        }
    }
}

impl TryFrom<RawChange> for Change {
    type Error = Error;

    fn try_from(raw: RawChange) -> Result<Self> {
        let details = match ChangeKind::from_labels(&raw.scope, &raw.action) {
            ChangeKind::TeamCreate => ChangeDetails::TeamCreate(decode(&raw)?),
            ChangeKind::TeamDelete => ChangeDetails::TeamDelete(decode(&raw)?),
            ChangeKind::TeamMemberEnsure => ChangeDetails::TeamMemberEnsure(decode(&raw)?),
            ChangeKind::RepoEnsure => ChangeDetails::RepoEnsure(decode(&raw)?),
            ChangeKind::TeamRepoGrant => ChangeDetails::TeamRepoGrant(decode(&raw)?),
            ChangeKind::RepoFileEnsure => ChangeDetails::RepoFileEnsure(decode(&raw)?),
            ChangeKind::OrgMemberRemove => ChangeDetails::OrgMemberRemove(decode(&raw)?),
            ChangeKind::Unrecognized => ChangeDetails::Unrecognized {
                scope: raw.scope,
                action: raw.action,
                raw: raw.details,
            },
        };
        Ok(Self {
            target: raw.target,
            details,
        })
    }
}

fn decode<T: DeserializeOwned>(raw: &RawChange) -> Result<T> {
    serde_json::from_value(raw.details.clone()).map_err(|e| Error::MalformedChange {
        scope: raw.scope.clone(),
        action: raw.action.clone(),
        message: e.to_string(),
    })
}

// ============================================================================
// Plan
// ============================================================================

/// The complete set of changes computed for one run
///
/// Pure data: building, printing or discarding a plan never touches the
/// remote organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub changes: Vec<Change>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    changes: Vec<RawChange>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn extend(&mut self, changes: impl IntoIterator<Item = Change>) {
        self.changes.extend(changes);
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Changes stably sorted by precedence tier
    ///
    /// Changes in the same tier keep their plan order.
    pub fn ordered(&self) -> Vec<&Change> {
        let mut ordered: Vec<&Change> = self.changes.iter().collect();
        ordered.sort_by_key(|c| c.tier());
        ordered
    }

    /// Consume the plan into its changes in apply order
    pub fn into_ordered(self) -> Vec<Change> {
        let mut changes = self.changes;
        changes.sort_by_key(Change::tier);
        changes
    }

    /// Count of changes per `scope:action` label, in first-seen order
    pub fn counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for change in &self.changes {
            let label = format!("{}:{}", change.scope(), change.action());
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((label, 1)),
            }
        }
        counts
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidPlan(e.to_string()))
    }

    /// Parse a serialized plan
    ///
    /// A change whose details do not fit its scope and action is reported as
    /// [`Error::MalformedChange`]; unknown pairs load as unrecognized no-ops.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawPlan =
            serde_json::from_str(json).map_err(|e| Error::InvalidPlan(e.to_string()))?;
        let changes = raw
            .changes
            .into_iter()
            .map(Change::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            changes,
            warnings: raw.warnings,
        })
    }
}

// ============================================================================
// Apply outcomes
// ============================================================================

/// Result of applying one change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOutcome {
    /// The mutation was issued and succeeded
    Applied,
    /// The remote reported a benign race (e.g. repository already exists)
    Tolerated { reason: String },
    /// Desired state already held, nothing issued
    Skipped { reason: String },
    /// Unrecognized change kind, passed over
    Ignored,
}

/// Summary of an apply run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub applied: usize,
    pub tolerated: usize,
    pub skipped: usize,
    pub ignored: usize,
}

impl ApplySummary {
    pub fn add_outcome(&mut self, outcome: &ChangeOutcome) {
        match outcome {
            ChangeOutcome::Applied => self.applied += 1,
            ChangeOutcome::Tolerated { .. } => self.tolerated += 1,
            ChangeOutcome::Skipped { .. } => self.skipped += 1,
            ChangeOutcome::Ignored => self.ignored += 1,
        }
    }

    /// Total number of changes processed
    pub fn total(&self) -> usize {
        self.applied + self.tolerated + self.skipped + self.ignored
    }
}
