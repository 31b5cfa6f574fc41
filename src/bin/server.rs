//! Kizuna chat server
//!
//! Runs the persona-grounded chat backend as an HTTP server.

use std::process;

use clap::Parser;
use tracing::{error, info};

use kizuna::config::AppConfig;
use kizuna::server::state::AppContext;
use kizuna::server::ChatServer;

#[derive(Parser)]
#[command(name = "kizuna-server")]
#[command(about = "Persona-grounded companion chat backend")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(long, env = "KIZUNA_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "KIZUNA_PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = if args.verbose {
        "kizuna=debug,kizuna_server=debug"
    } else {
        "kizuna=info,kizuna_server=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    info!(
        "Starting kizuna server on {}:{} (db: {:?})",
        config.host, config.port, config.db_path
    );

    let context = match AppContext::from_config(&config) {
        Ok(context) => context,
        Err(e) => {
            error!("Failed to build application context: {}", e);
            process::exit(1);
        }
    };

    let server = ChatServer::new(config, context);
    if let Err(e) = server.start().await {
        error!("Server failed: {}", e);
        process::exit(1);
    }
}
