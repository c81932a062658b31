use std::env;

use clap::Parser;
use log::log_enabled;
use tilemap::TilemapResult;
use tilemap::args::Args;
use tilemap::config::{Config, OsEnv, read_config};
use tilemap::logging::{init_tracing, log_filter};
use tilemap::srv::new_server;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn start(args: Args) -> TilemapResult<()> {
    info!("Starting tilemap v{VERSION}");

    let env = OsEnv;
    let save_config = args.save_config.clone();
    let mut config = if let Some(ref cfg_filename) = args.config {
        info!("Using {}", cfg_filename.display());
        read_config(cfg_filename, &env)?
    } else {
        info!("Config file is not specified, serving the .mbtiles files given on the command line");
        Config::default()
    };

    args.merge_into_config(&mut config)?;
    config.finalize()?;
    let sources = config.resolve().await?;

    if let Some(file_name) = save_config {
        config.save_to_file(file_name.as_path())?;
    } else {
        info!("Use --save-config to save or print the configuration.");
    }

    let (server, listen_addresses) = new_server(config.srv, sources)?;
    info!("tilemap has been started on {listen_addresses}.");
    info!("Use http://{listen_addresses}/wmts?SERVICE=WMTS&REQUEST=GetCapabilities to list the layers.");

    server.await
}

#[tokio::main]
async fn main() {
    let filter = log_filter(env::var("RUST_LOG").ok());
    init_tracing(&filter, env::var("TILEMAP_FORMAT").ok());

    let args = Args::parse();
    if let Err(e) = start(args).await {
        // Ensure the message is printed, even if the logging is disabled
        if log_enabled!(log::Level::Error) {
            error!("{e}");
        } else {
            eprintln!("{e}");
        }
        std::process::exit(1);
    }
}
