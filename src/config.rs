//! Config directory loading
//!
//! ```text
//! <dir>/app.yaml        org, auth and policy flags
//! <dir>/org.yaml        owners
//! <dir>/teams/*.yaml    one team per file
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{DesiredState, Policy, TeamSpec, slug_for};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_FILE: &str = "app.yaml";
pub const ORG_FILE: &str = "org.yaml";
pub const TEAMS_DIR: &str = "teams";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub org: String,
    /// GitHub App id, used when no token is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<u64>,
    /// Inline PEM or path to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default)]
    pub dry_warnings: DryWarnings,
    #[serde(default)]
    pub remove_members_without_team: bool,
    #[serde(default)]
    pub delete_unconfigured_teams: bool,
    #[serde(default)]
    pub create_repo: bool,
    #[serde(default)]
    pub add_renovate_config: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renovate_config: Option<String>,
    #[serde(default)]
    pub add_default_readme: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryWarnings {
    #[serde(default)]
    pub warn_unmanaged_teams: bool,
    #[serde(default)]
    pub warn_members_without_any_team: bool,
}

/// Organization-level settings. Owners are informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgConfig {
    #[serde(default)]
    pub owners: Vec<String>,
}

/// Everything read from a config directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub app: AppConfig,
    pub org: OrgConfig,
    pub teams: Vec<TeamSpec>,
}

impl Config {
    /// Load `app.yaml`, `org.yaml` and every `teams/*.yaml` under `dir`
    ///
    /// Team files are read in file name order. A missing `teams/`
    /// directory means no teams.
    pub fn load(dir: &Path) -> Result<Self> {
        let app: AppConfig = read_yaml(&dir.join(APP_FILE))?;
        let org: OrgConfig = read_yaml(&dir.join(ORG_FILE))?;

        let mut teams = Vec::new();
        for path in team_files(&dir.join(TEAMS_DIR))? {
            teams.push(read_yaml::<TeamSpec>(&path)?);
        }

        if app.org.trim().is_empty() {
            bail!("app.org is required in {}", dir.join(APP_FILE).display());
        }

        log::debug!(
            "Loaded config for {} ({} team(s), {} owner(s))",
            app.org,
            teams.len(),
            org.owners.len()
        );
        Ok(Self { app, org, teams })
    }

    /// Desired state for the reconcile engine
    pub fn desired_state(&self) -> DesiredState {
        let app = &self.app;
        DesiredState {
            org: app.org.trim().to_string(),
            teams: self.teams.clone(),
            policy: Policy {
                create_repo: app.create_repo,
                add_default_readme: app.add_default_readme,
                add_renovate_config: app.add_renovate_config,
                renovate_config: app.renovate_config.clone(),
                delete_unconfigured_teams: app.delete_unconfigured_teams,
                remove_members_without_team: app.remove_members_without_team,
                warn_unmanaged_teams: app.dry_warnings.warn_unmanaged_teams,
                warn_members_without_any_team: app.dry_warnings.warn_members_without_any_team,
            },
        }
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML in {}", path.display()))
}

fn team_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        log::debug!("No teams directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Could not list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Default location of a team file: `<dir>/teams/<slug>.yaml`
pub fn team_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(TEAMS_DIR).join(format!("{}.yaml", slug_for(name)))
}

/// Write a skeleton team file with `name` and empty member and repository lists
///
/// Parent directories are created as needed. An existing file is left
/// untouched and reported as an error.
pub fn bootstrap_team_yaml(path: &Path, name: &str) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }

    let team = TeamSpec::named(name);
    let content = serde_yaml::to_string(&team).context("Could not serialize team")?;
    fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))?;
    Ok(())
}
