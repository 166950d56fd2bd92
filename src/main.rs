//! Cyprus bridge daemon.

use std::{error::Error, path::PathBuf, process};

use clap::{ArgAction, Parser};
use cyprus::{
    config::Config,
    server::ServerModule,
    tracing_config,
};
use tracing::{Level, error, info, span};

/// Local bridge between desktop media players and a remote client.
#[derive(Parser, Debug)]
#[command(name = "cyprus")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serve over TLS with a self-signed certificate (true/false).
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    secure: Option<bool>,

    /// Port to listen on (overrides config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the configuration file (TOML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write logs to a daily rotated file.
    #[arg(long)]
    log_file: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(secure) = args.secure {
        config.server.secure = secure;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    let _guard = if args.log_file {
        Some(tracing_config::init_with_file(config.general.log_level)?)
    } else {
        tracing_config::init(config.general.log_level)?;
        None
    };

    let _span = span!(Level::INFO, "cyprus_main").entered();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        secure = config.server.secure,
        "Starting Cyprus"
    );

    if let Err(e) = ServerModule::new(config).run().await {
        error!(error = %e, "Server failed");
        process::exit(1);
    }

    Ok(())
}
