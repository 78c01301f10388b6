//! Repository and permission planner

use crate::context::CancelToken;
use crate::desired::DesiredState;
use crate::error::Result;
use crate::gateway::{Gateway, collect_pages};
use crate::types::{Change, ChangeDetails, Permission, RepoEnsure, RepoFileEnsure, TeamRepoGrant};
use std::collections::BTreeSet;

pub const README_PATH: &str = "README.md";
pub const README_MESSAGE: &str = "chore: add default README";
pub const RENOVATE_PATH: &str = ".github/renovate.json";
pub const RENOVATE_MESSAGE: &str = "chore: add Renovate config";
/// Branch provisioned files are committed to
pub const DEFAULT_BRANCH: &str = "main";

/// Templated README for a new repository
pub fn default_readme(org: &str, repo: &str) -> String {
    format!(
        "# {repo}\n\
         \n\
         Clone the repository:\n\
         \n\
         ```bash\n\
         git clone git@github.com:{org}/{repo}.git\n\
         ```\n\
         \n\
         Every repository should carry a README, a LICENSE and a .gitignore.\n\
         \n\
         To push an existing local repository instead:\n\
         \n\
         ```bash\n\
         git remote add origin git@github.com:{org}/{repo}.git\n\
         git branch -M {DEFAULT_BRANCH}\n\
         git push -u origin {DEFAULT_BRANCH}\n\
         ```\n"
    )
}

/// Lower-cased names of every repository in the organization
pub fn list_remote_repositories(
    org: &str,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
) -> Result<BTreeSet<String>> {
    let repos = collect_pages(cancel, &format!("list repositories of {org}"), |page| {
        gateway.list_repositories(org, page)
    })?;
    Ok(repos.into_iter().map(|r| r.name.to_lowercase()).collect())
}

/// Emit repository, grant and file changes for every `(team, repo)` pair
///
/// Teams are visited in configuration order and repositories in name order.
/// A missing repository is created at most once per run. File changes are
/// always emitted; whether the file already exists is checked at apply time.
pub fn plan_repositories(
    desired: &DesiredState,
    gateway: &dyn Gateway,
    cancel: &CancelToken,
) -> Result<Vec<Change>> {
    let org = desired.org.as_str();
    let policy = &desired.policy;
    let mut changes = Vec::new();

    if desired.teams.iter().all(|t| t.repositories.is_empty()) {
        return Ok(changes);
    }
    let mut existing = list_remote_repositories(org, gateway, cancel)?;

    for team in &desired.teams {
        // Already reported by the team planner
        let Some(slug) = team.slug() else { continue };

        for (repo, permission) in &team.repositories {
            let key = repo.to_lowercase();

            if policy.create_repo && !existing.contains(&key) {
                changes.push(Change::new(
                    key.clone(),
                    ChangeDetails::RepoEnsure(RepoEnsure {
                        org: org.to_string(),
                        name: repo.clone(),
                        private: true,
                    }),
                ));
                existing.insert(key.clone());
            }

            changes.push(Change::new(
                format!("{slug}/{key}"),
                ChangeDetails::TeamRepoGrant(TeamRepoGrant {
                    org: org.to_string(),
                    slug: slug.clone(),
                    repo: repo.clone(),
                    permission: Permission::normalize(permission),
                }),
            ));

            if policy.add_default_readme {
                changes.push(file_change(
                    org,
                    repo,
                    README_PATH,
                    default_readme(org, repo),
                    README_MESSAGE,
                ));
            }

            if let Some(template) = policy.renovate_template() {
                changes.push(file_change(
                    org,
                    repo,
                    RENOVATE_PATH,
                    template.to_string(),
                    RENOVATE_MESSAGE,
                ));
            }
        }
    }

    Ok(changes)
}

fn file_change(org: &str, repo: &str, path: &str, content: String, message: &str) -> Change {
    Change::new(
        format!("{}:{path}", repo.to_lowercase()),
        ChangeDetails::RepoFileEnsure(RepoFileEnsure {
            org: org.to_string(),
            repo: repo.to_string(),
            path: path.to_string(),
            content,
            message: message.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
        }),
    )
}
