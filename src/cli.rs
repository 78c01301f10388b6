use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "orgsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Sync GitHub org teams, members and repository permissions from YAML", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logs (same as -vv)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Synchronize org state to match the YAML configuration
    Sync(SyncArgs),

    /// Bootstrap a team YAML file for a given team name
    SetupTeam(SetupTeamArgs),

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Path to the config directory (app.yaml, org.yaml, teams/)
    #[arg(short, long, env = "ORGSYNC_CONFIG")]
    pub config: PathBuf,
}

#[derive(Parser)]
pub struct SyncArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Show the plan without applying changes
    #[arg(long)]
    pub dry: bool,

    /// Write the computed plan as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Apply a previously saved plan instead of computing one
    #[arg(short, long, value_name = "FILE", conflicts_with = "out")]
    pub plan: Option<PathBuf>,

    /// Number of teams whose members are fetched in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,
}

#[derive(Parser)]
pub struct SetupTeamArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Team display name
    #[arg(short, long)]
    pub name: String,

    /// Force the output file path
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}
