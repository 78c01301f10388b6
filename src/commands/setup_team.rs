//! `orgsync setup-team`: write a skeleton team file

use anyhow::{Result, bail};

use crate::Context;
use crate::cli::SetupTeamArgs;
use crate::config;
use crate::ui;

pub fn run(ctx: &Context, args: SetupTeamArgs) -> Result<()> {
    let name = args.name.trim();
    if name.is_empty() {
        bail!("--name must not be empty");
    }

    let path = args
        .file
        .unwrap_or_else(|| config::team_file_path(&args.config.config, name));
    config::bootstrap_team_yaml(&path, name)?;

    if !ctx.quiet {
        ui::success(&format!("Created {}", path.display()));
        ui::dim("Fill in maintainers, members and repositories, then run `orgsync sync --dry`");
    }
    Ok(())
}
