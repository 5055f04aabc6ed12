use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "idpctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of identity-directory app clients", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory service endpoint
    #[arg(long, env = "IDPCTL_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Settings file (default: <config dir>/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Desired configuration
    #[arg(short, long, global = true, default_value = "resources.toml")]
    pub resources: PathBuf,

    /// State file (default: <state dir>/state.toml)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(TargetArgs),

    /// Make the remote match the desired configuration
    Apply(ApplyArgs),

    /// Delete every tracked entity
    Destroy(ApplyArgs),

    /// Adopt an existing client: <type>.<name> <parent-id>/<resource-id>
    Import(ImportArgs),

    /// Re-read every tracked entity and record drift
    Refresh(RefreshArgs),

    /// Show tracked entities
    Show(ShowArgs),

    /// Check the desired configuration without contacting the remote
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    /// Limit to a resource type or address: "type" or "type.name"
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Skip confirmation of replacements and deletions
    #[arg(short, long)]
    pub yes: bool,

    /// Show the plan without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Entities reconciled in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Address to record the entity under, e.g. user_pool_client.web
    pub address: String,

    /// Remote identifier, "<parent-id>/<resource-id>"
    pub id: String,
}

#[derive(Args)]
pub struct RefreshArgs {
    /// Entities refreshed in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Address to show; all entities when omitted
    pub address: Option<String>,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::try_parse_from([
            "idpctl",
            "apply",
            "--target",
            "user_pool_client.web",
            "--yes",
            "-j",
            "2",
        ])
        .unwrap();

        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.target.target.as_deref(), Some("user_pool_client.web"));
        assert!(args.yes);
        assert!(!args.dry_run);
        assert_eq!(args.jobs, Some(2));
        assert_eq!(cli.resources, PathBuf::from("resources.toml"));
    }

    #[test]
    fn test_import_args() {
        let cli = Cli::try_parse_from(["idpctl", "import", "user_pool_client.web", "pool1/c-1"]).unwrap();
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.address, "user_pool_client.web");
        assert_eq!(args.id, "pool1/c-1");
    }
}
