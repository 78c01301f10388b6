//! Change applier - executes a plan against the gateway in precedence order

use crate::context::{ApplyProgress, CancelToken, NoProgress};
use crate::error::{Error, RemoteError, Result};
use crate::gateway::{Gateway, NewFile, NewRepository, NewTeam};
use crate::types::{
    ApplySummary, Change, ChangeDetails, ChangeOutcome, OrgMemberRemove, Plan, RepoEnsure,
    RepoFileEnsure, TeamCreate, TeamDelete, TeamMemberEnsure, TeamRepoGrant,
};

/// A fatal failure of a single change: operation context plus the remote error
type Failure = (String, RemoteError);

/// Apply a plan
///
/// Changes are stably sorted by tier and applied one at a time. The first
/// fatal error stops the run with [`Error::ApplyFailed`]; changes applied
/// before it stay applied. Cancellation is checked before every change.
pub fn apply<P: ApplyProgress>(
    plan: Plan,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<ApplySummary> {
    let changes = plan.into_ordered();
    let mut summary = ApplySummary::default();
    progress.on_start(changes.len());

    for (index, change) in changes.iter().enumerate() {
        cancel.check()?;
        progress.on_change_start(index, change);
        log::debug!("Applying {change}");

        let outcome = apply_change(change, gateway).map_err(|(message, source)| {
            if source.is_cancelled() {
                return Error::Cancelled;
            }
            Error::ApplyFailed {
                scope: change.scope().to_string(),
                target: change.target().to_string(),
                action: change.action().to_string(),
                applied: index,
                message,
                source,
            }
        })?;

        match &outcome {
            ChangeOutcome::Applied => log::info!("Applied {change}"),
            ChangeOutcome::Tolerated { reason } => log::info!("Tolerated {change}: {reason}"),
            ChangeOutcome::Skipped { reason } => log::info!("Skipped {change}: {reason}"),
            ChangeOutcome::Ignored => log::warn!("Ignoring unrecognized change {change}"),
        }
        summary.add_outcome(&outcome);
        progress.on_change_complete(index, change, &outcome);
    }

    Ok(summary)
}

/// Apply a plan without progress reporting
pub fn apply_simple(plan: Plan, gateway: &dyn Gateway, cancel: &CancelToken) -> Result<ApplySummary> {
    apply(plan, gateway, cancel, &mut NoProgress)
}

/// Dispatch one change to its handler
fn apply_change(change: &Change, gateway: &dyn Gateway) -> std::result::Result<ChangeOutcome, Failure> {
    match change.details() {
        ChangeDetails::TeamCreate(d) => create_team(gateway, d),
        ChangeDetails::TeamDelete(d) => delete_team(gateway, d),
        ChangeDetails::TeamMemberEnsure(d) => ensure_member(gateway, d),
        ChangeDetails::RepoEnsure(d) => ensure_repo(gateway, d),
        ChangeDetails::TeamRepoGrant(d) => grant_repo(gateway, d),
        ChangeDetails::RepoFileEnsure(d) => ensure_file(gateway, d),
        ChangeDetails::OrgMemberRemove(d) => remove_member(gateway, d),
        ChangeDetails::Unrecognized { .. } => Ok(ChangeOutcome::Ignored),
    }
}

fn create_team(gateway: &dyn Gateway, d: &TeamCreate) -> std::result::Result<ChangeOutcome, Failure> {
    let team = NewTeam {
        name: d.name.clone(),
        description: d.description.clone(),
        privacy: d.privacy.clone(),
    };
    gateway
        .create_team(&d.org, &team)
        .map(|_| ChangeOutcome::Applied)
        .map_err(|e| (format!("create team \"{}\"", d.name), e))
}

fn delete_team(gateway: &dyn Gateway, d: &TeamDelete) -> std::result::Result<ChangeOutcome, Failure> {
    gateway
        .delete_team(&d.org, &d.slug)
        .map(|()| ChangeOutcome::Applied)
        .map_err(|e| (format!("delete team {}", d.slug), e))
}

fn ensure_member(
    gateway: &dyn Gateway,
    d: &TeamMemberEnsure,
) -> std::result::Result<ChangeOutcome, Failure> {
    gateway
        .set_team_membership(&d.org, &d.slug, &d.user, d.role)
        .map(|()| ChangeOutcome::Applied)
        .map_err(|e| (format!("add {} as {} to {}", d.user, d.role, d.slug), e))
}

fn ensure_repo(gateway: &dyn Gateway, d: &RepoEnsure) -> std::result::Result<ChangeOutcome, Failure> {
    match gateway.create_repository(&d.org, &NewRepository::managed(&d.name, d.private)) {
        Ok(()) => Ok(ChangeOutcome::Applied),
        Err(e) if e.is_already_exists() => Ok(ChangeOutcome::Tolerated {
            reason: format!("repository {} already exists", d.name),
        }),
        Err(e) => Err((format!("create repository {}/{}", d.org, d.name), e)),
    }
}

fn grant_repo(gateway: &dyn Gateway, d: &TeamRepoGrant) -> std::result::Result<ChangeOutcome, Failure> {
    gateway
        .add_team_repository(&d.org, &d.slug, &d.org, &d.repo, d.permission)
        .map(|()| ChangeOutcome::Applied)
        .map_err(|e| {
            (
                format!("grant {} on {}/{} to {}", d.permission, d.org, d.repo, d.slug),
                e,
            )
        })
}

/// Create the file unless it already exists on the branch
fn ensure_file(gateway: &dyn Gateway, d: &RepoFileEnsure) -> std::result::Result<ChangeOutcome, Failure> {
    let location = format!("{}/{}:{}@{}", d.org, d.repo, d.path, d.branch);
    let existing = match gateway.get_file(&d.org, &d.repo, &d.path, &d.branch) {
        Ok(meta) => meta,
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err((format!("check {location}"), e)),
    };
    if existing.is_some() {
        return Ok(ChangeOutcome::Skipped {
            reason: format!("{} already present", d.path),
        });
    }

    let file = NewFile {
        path: d.path.clone(),
        content: d.content.clone(),
        message: d.message.clone(),
        branch: d.branch.clone(),
    };
    gateway
        .create_file(&d.org, &d.repo, &file)
        .map(|()| ChangeOutcome::Applied)
        .map_err(|e| (format!("create {location}"), e))
}

fn remove_member(
    gateway: &dyn Gateway,
    d: &OrgMemberRemove,
) -> std::result::Result<ChangeOutcome, Failure> {
    gateway
        .remove_org_member(&d.org, &d.user)
        .map(|()| ChangeOutcome::Applied)
        .map_err(|e| (format!("remove {} from {}", d.user, d.org), e))
}
