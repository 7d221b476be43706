use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "temp-relay")]
#[command(about = "Aggregates inside/outside temperatures behind a small HTTP facade")]
#[command(version = "0.1")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, default_value = "config.json")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP facade in front of the upstream device API
    Serve,

    /// Poll the facade on a fixed cadence and log every state change
    Watch,

    /// Run a single aggregation cycle and print the reading
    Fetch,
}
