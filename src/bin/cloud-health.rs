use clap::Parser;
use cloud_health::api::AppState;
use cloud_health::cli::{CheckArgs, Cli, Commands, ServeArgs};
use cloud_health::config::AppConfig;
use cloud_health::health::{Aggregator, print_report};
use cloud_health::{bootstrap, logging, server};
use tracing::info;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.profile)?;
    logging::init(&config.log)?;

    info!(
        profile = %config.profile,
        version = %cloud_health::build_info::version_string(),
        "Starting cloud-health"
    );

    let aggregator = bootstrap::google_cloud_aggregator(&config).await?;

    match cli.command.unwrap_or_default() {
        Commands::Serve(args) => serve(args, &config, aggregator).await,
        Commands::Check(args) => check(args, &config, aggregator).await,
    }
}

async fn serve(args: ServeArgs, config: &AppConfig, aggregator: Aggregator) -> color_eyre::Result<()> {
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let state = AppState::new(aggregator, config.health.deadline());

    server::run(state, &bind).await?;
    Ok(())
}

async fn check(args: CheckArgs, config: &AppConfig, aggregator: Aggregator) -> color_eyre::Result<()> {
    let report = match config.health.deadline() {
        Some(deadline) => aggregator.run_all_within(deadline).await?,
        None => aggregator.run_all().await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    std::process::exit(report.exit_code());
}
