use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "lagscale",
    about = "lagscale — lag-based scale decisions for partitioned consumers",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one poll of a scaler against a snapshot file and print the result.
    Evaluate {
        /// Trigger configuration (TOML)
        #[arg(short, long)]
        config: String,
        /// Partition state snapshot (JSON)
        #[arg(short, long)]
        snapshot: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Poll a scaler on an interval until Ctrl-C.
    ///
    /// The snapshot file is re-read on every poll, so editing it simulates
    /// a moving consumer group. The interval defaults to the config's
    /// `polling_interval`.
    Watch {
        /// Trigger configuration (TOML)
        #[arg(short, long)]
        config: String,
        /// Partition state snapshot (JSON)
        #[arg(short, long)]
        snapshot: String,
        /// Override the polling interval (e.g. "5s", "1m").
        #[arg(short, long)]
        interval: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lagscale=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate { config, snapshot, format } => {
            commands::evaluate::evaluate(&config, &snapshot, &format).await
        }
        Commands::Watch { config, snapshot, interval } => {
            commands::watch::watch(&config, &snapshot, interval.as_deref()).await
        }
    }
}
