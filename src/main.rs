//! `balancers` command line tool.
//!
//! Builds a round-robin balancer from a config file and/or `--backend`
//! flags, then either prints the health of every member or sends GET
//! requests through the load-balancing transport.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use http_body_util::{BodyExt, Empty};

use balancers::config::load_config;
use balancers::http::HyperUpstream;
use balancers::observability::init_logging;
use balancers::{request_id, Balancer, BalancerConfig, RoundRobin, Target, Transport};

#[derive(Parser)]
#[command(name = "balancers")]
#[command(about = "Client-side HTTP load balancer", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend URL; repeat for several. Replaces the configured backends.
    #[arg(short, long = "backend")]
    backends: Vec<String>,

    /// Log level, overriding the configuration.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the health of every backend
    Status,
    /// Send GET requests through the balancer
    Get {
        /// Path and query, e.g. "/_cluster/health?pretty"
        path: String,

        /// Number of requests to send.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Pause between requests, in milliseconds.
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };
    if !cli.backends.is_empty() {
        config.backends = cli.backends.clone();
    }
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    init_logging(&level);

    tracing::info!(
        version = balancers::constants::VERSION,
        backends = config.backends.len(),
        interval_ms = config.health_check.interval_ms,
        "balancers starting"
    );

    let balancer = RoundRobin::from_config(&config).await?;

    match cli.command {
        Commands::Status => {
            for snapshot in balancer.snapshots() {
                println!("{}\t{}", snapshot.state, snapshot.target);
            }
        }
        Commands::Get {
            path,
            count,
            delay_ms,
        } => {
            let transport: Transport<HyperUpstream<Empty<Bytes>>> =
                Transport::with_default_upstream(balancer);
            for i in 0..count {
                if i > 0 && delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }

                let mut request = http::Request::get(path.as_str()).body(Empty::new())?;
                let id = request_id(&mut request);
                match transport.send(request).await {
                    Ok(response) => {
                        let status = response.status();
                        let backend = response
                            .extensions()
                            .get::<Target>()
                            .map(ToString::to_string)
                            .unwrap_or_default();
                        let body = response.into_body().collect().await?.to_bytes();
                        tracing::info!(request_id = %id, backend = %backend, status = %status, bytes = body.len(), "Response received");
                        println!("{}", String::from_utf8_lossy(&body));
                    }
                    Err(e) => {
                        tracing::error!(request_id = %id, error = %e, "Request failed");
                    }
                }
            }
        }
    }

    Ok(())
}
