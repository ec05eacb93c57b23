use cinder_server::{Config, Server};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 6379)]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::fmt()
        .with_env_filter(format!("cinder_server={log_level}"))
        .init();

    let config = if let Some(config_path) = args.config {
        Config::from_file(&config_path)?
    } else {
        Config {
            bind_addr: args.bind,
            port: args.port,
            ..Default::default()
        }
    };

    info!(
        "Starting cinder-server v{} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.bind_addr,
        config.port
    );

    let mut server = Server::new(config)?;

    let handle = server.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, shutting down gracefully...");
        handle.shutdown();
    })?;

    if let Err(e) = server.run() {
        error!("Server error: {e}");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
