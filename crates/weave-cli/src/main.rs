//! Weave CLI: the `weave` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weave=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            facts,
            config,
            target,
            out,
            json,
        } => commands::resolve::run(facts, config, target, out, json),

        Commands::Check {
            facts,
            config,
            json,
        } => commands::check::run(facts, config, json),

        Commands::VerifyPlans {
            facts,
            plans,
            config,
            json,
        } => commands::verify_plans::run(facts, plans, config, json),
    }
}
