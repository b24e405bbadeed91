use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "weave",
    about = "Weave: deterministic mixin composition planning",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve composition plans for every target in a fact stream
    Resolve {
        /// Path to the facts JSONL
        #[arg(long)]
        facts: String,

        /// Resolver config TOML (defaults to ./weave.toml when present)
        #[arg(long)]
        config: Option<String>,

        /// Resolve only this target type
        #[arg(long)]
        target: Option<String>,

        /// Write resolved plans to this plans JSONL
        #[arg(long)]
        out: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a fact stream without producing plans
    Check {
        /// Path to the facts JSONL
        #[arg(long)]
        facts: String,

        /// Resolver config TOML (defaults to ./weave.toml when present)
        #[arg(long)]
        config: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-resolve a fact stream and compare against a stored plans JSONL
    VerifyPlans {
        /// Path to the facts JSONL
        #[arg(long)]
        facts: String,

        /// Path to the stored plans JSONL
        #[arg(long)]
        plans: String,

        /// Resolver config TOML (defaults to ./weave.toml when present)
        #[arg(long)]
        config: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
