//! DataBuddy command-line entry point.
//!
//! Two behaviors: `init` a fresh data directory, or the default `serve`.
//! Every flag also binds to an `APP_*` environment variable via `clap`'s
//! `env` attribute.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use databuddy::ServerConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "databuddy", version, about = "DataBuddy Global Datastore")]
struct Cli {
    /// Directory where all data is stored.
    #[arg(short = 'd', long, env = "APP_DATADIR", default_value = databuddy::DEFAULT_DATADIR)]
    datadir: PathBuf,

    /// Level of logs to display.
    #[arg(long, env = "APP_LOGLEVEL", default_value = databuddy::DEFAULT_LOG_LEVEL)]
    loglevel: String,

    /// Enable development mode (human-readable, ANSI-colored logs).
    #[arg(short = 'D', long, env = "APP_DEVEL")]
    devel: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Port to listen on for RESP connections.
    #[arg(short = 'p', long, env = "APP_PORT", default_value_t = databuddy::DEFAULT_PORT)]
    port: u16,

    /// Host to listen on for RESP connections.
    #[arg(short = 'H', long, env = "APP_HOST", default_value = databuddy::DEFAULT_HOST)]
    host: String,

    /// Port which gossip traffic will use.
    #[arg(long, env = "APP_SERFPORT", default_value_t = databuddy::DEFAULT_GOSSIP_PORT)]
    serfport: u16,

    /// Comma-separated list of connection strings to join for cluster bootstrap.
    #[arg(short = 'j', long, env = "APP_JOIN", value_delimiter = ',')]
    join: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a fresh data directory.
    Init {
        /// Name of the bucket created and selected by default.
        #[arg(long, default_value = databuddy::DEFAULT_BUCKET)]
        default_bucket: String,
    },
}

fn main() {
    let cli = Cli::parse();
    install_tracing(&cli.loglevel, cli.devel);

    let result = match cli.command {
        Some(Commands::Init { default_bucket }) => databuddy::BucketRegistry::init(&cli.datadir, &default_bucket),
        None => {
            let config = ServerConfig {
                datadir: cli.datadir,
                host: cli.host,
                port: cli.port,
                gossip_host: databuddy::DEFAULT_HOST.to_string(),
                gossip_port: cli.serfport,
                join_seeds: cli.join,
                log_level: cli.loglevel,
                devel: cli.devel,
                ..ServerConfig::default()
            };
            run_server(config)
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "databuddy exited with error");
        std::process::exit(1);
    }
}

fn run_server(config: ServerConfig) -> databuddy::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("building tokio runtime");
    runtime.block_on(databuddy::serve(config))
}

fn install_tracing(loglevel: &str, devel: bool) {
    let filter = EnvFilter::try_new(loglevel).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if devel {
        subscriber.pretty().with_ansi(true).init();
    } else {
        subscriber.json().init();
    }
}
