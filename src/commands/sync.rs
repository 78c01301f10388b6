//! `orgsync sync`: plan, print, and apply
//!
//! With `--dry` the plan is printed (and optionally saved with `--out`) and
//! nothing is mutated. With `--plan` a saved plan is applied as-is.

use anyhow::{Context as AnyhowContext, Result};
use hubkit::auth::{APP_ID_VAR, APP_KEY_VAR};
use hubkit::{ClientConfig, Credentials, GitHubGateway};
use reconcile::{Plan, PlanOptions};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::cli::SyncArgs;
use crate::config::{AppConfig, Config};
use crate::signal;
use crate::ui;

pub fn run(ctx: &Context, args: SyncArgs) -> Result<()> {
    let config = Config::load(&args.config.config)?;
    let desired = config.desired_state();
    let cancel = signal::install();

    let credentials = credentials(&config.app, |var| std::env::var(var).ok())?;
    let client_config = ClientConfig::from_env();
    if ctx.verbose > 0 {
        ui::kv("api", &client_config.api_base);
        ui::kv("auth", auth_label(&credentials));
    }
    let gateway = GitHubGateway::connect(client_config, &credentials, &desired.org, cancel.clone())
        .with_context(|| format!("Could not authenticate for org {}", desired.org))?;
    log::info!("auth: {}", auth_label(&credentials));

    let plan = match &args.plan {
        Some(path) => load_plan(path)?,
        None => {
            let opts = PlanOptions {
                jobs: usize::from(args.jobs.max(1)),
            };
            reconcile::compute_plan_with(&desired, &gateway, &cancel, &opts)
                .context("Failed to compute plan")?
        }
    };

    if shows_plan(ctx, args.dry) {
        ui::print_plan(&desired.org, &plan);
    }

    if let Some(out) = &args.out {
        save_plan(&plan, out)?;
        ui::info(&format!("Plan written to {}", out.display()));
    }

    if args.dry {
        println!();
        ui::info("Dry run - no changes applied");
        return Ok(());
    }

    if plan.is_empty() {
        return Ok(());
    }

    let mut progress = ui::ConsoleProgress::new(ctx.quiet);
    let summary = reconcile::apply(plan, &gateway, &cancel, &mut progress)?;

    if !ctx.quiet {
        ui::print_summary(&summary);
        println!();
    }
    ui::success(&format!("Sync complete for {}", desired.org));
    Ok(())
}

/// The plan is always printed on a dry run; `--quiet` only hides it when applying
fn shows_plan(ctx: &Context, dry: bool) -> bool {
    dry || !ctx.quiet
}

/// Resolve credentials: `GITHUB_TOKEN` first, then the App id and key from
/// `app.yaml`, falling back to their environment variables
fn credentials(app: &AppConfig, env: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    let app_id = app.app_id.filter(|id| *id != 0).map(|id| id.to_string());
    let private_key = app
        .private_key
        .clone()
        .filter(|key| !key.trim().is_empty());

    Credentials::from_lookup(|var| match var {
        APP_ID_VAR => app_id.clone().or_else(|| env(var)),
        APP_KEY_VAR => private_key.clone().or_else(|| env(var)),
        _ => env(var),
    })
    .context("No usable GitHub credentials: set GITHUB_TOKEN or app_id + private_key")
}

fn auth_label(credentials: &Credentials) -> &'static str {
    match credentials {
        Credentials::Token(_) => "personal access token",
        Credentials::App { .. } => "GitHub App",
    }
}

fn load_plan(path: &Path) -> Result<Plan> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    Plan::from_json(&content).with_context(|| format!("Invalid plan in {}", path.display()))
}

fn save_plan(plan: &Plan, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    let json = plan.to_json_pretty()?;
    fs::write(path, json).with_context(|| format!("Could not write {}", path.display()))
}
