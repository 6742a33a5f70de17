//! Command-line interface

use clap::{Args, Parser, Subcommand};

/// Health check API for the Google Cloud services an application depends on
#[derive(Parser, Debug)]
#[command(name = "cloud-health")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    PROJECT_ID              Google Cloud project (looked up on the metadata server if unset)
    REGION                  Region of Vertex AI (default: us-central1)
    LOCATION                Location of Document AI (default: us)
    HEALTH_PROFILE          Configuration profile (default: release)
    HEALTH_<SECTION>__<KEY> Override any configuration key (e.g. HEALTH_SERVER__BIND)
    RUST_LOG                Log filter, overrides log.level
"#)]
pub struct Cli {
    /// Configuration profile to load
    #[arg(long, global = true, env = "HEALTH_PROFILE", default_value = "release")]
    pub profile: String,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Probe every dependency once and print the report
    Check(CheckArgs),
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Serve(ServeArgs::default())
    }
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on, overrides server.bind
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["cloud-health", "--profile", "debug"]).unwrap();

        assert_eq!(cli.profile, "debug");
        assert!(matches!(
            cli.command.unwrap_or_default(),
            Commands::Serve(ServeArgs { bind: None })
        ));
    }

    #[test]
    fn check_accepts_json_flag() {
        let cli = Cli::try_parse_from(["cloud-health", "check", "--json"]).unwrap();

        assert!(matches!(cli.command, Some(Commands::Check(CheckArgs { json: true }))));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
