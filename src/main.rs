//! fleetmon CLI entry point.

use clap::Parser;

use fleetmon::cli::commands::{change, query};
use fleetmon::cli::{handle_error, Cli, Commands};
use fleetmon::domain::models::ChangeKind;
use fleetmon::infrastructure::config::ConfigLoader;
use fleetmon::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Query(args) => query::execute(args, &config, cli.json).await,
        Commands::Enable(args) => {
            let kind = ChangeKind::Enable(args.toggles());
            change::execute(kind, &args.target, &config, cli.json).await
        }
        Commands::Disable(args) => {
            let kind = ChangeKind::Disable(args.toggles());
            change::execute(kind, &args.target, &config, cli.json).await
        }
        Commands::Downtime(args) => {
            change::execute(args.kind(), &args.target, &config, cli.json).await
        }
        Commands::DowntimeDelete(target) => {
            change::execute(ChangeKind::DowntimeDelete, &target, &config, cli.json).await
        }
        Commands::Ack(args) => {
            let kind = ChangeKind::Ack {
                comment: args.comment.clone(),
            };
            change::execute(kind, &args.target, &config, cli.json).await
        }
        Commands::AckDelete(target) => {
            change::execute(ChangeKind::AckDelete, &target, &config, cli.json).await
        }
        Commands::Passive(args) => {
            let kind = ChangeKind::PassiveRun {
                submit: args.submit,
            };
            change::execute(kind, &args.target, &config, cli.json).await
        }
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
