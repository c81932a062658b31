use std::path::PathBuf;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use tilemap_core::config::{SourceConfig, SourceType};
use tracing::info;

use crate::TilemapError::ConfigAndFilesError;
use crate::TilemapResult;
use crate::config::{
    Config, ConfigFileError, KEEP_ALIVE_DEFAULT, LISTEN_ADDRESSES_DEFAULT, SrvConfig,
};

/// Defines the styles used for the CLI help output.
const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug, PartialEq, Default)]
#[command(
    about,
    version,
    after_help = "Use RUST_LOG environment variable to control logging level, e.g. RUST_LOG=debug or RUST_LOG=tilemap=debug. Use TILEMAP_FORMAT to pick the log format: full, compact, pretty or json.",
    styles = HELP_STYLES
)]
pub struct Args {
    /// Path to config file. If set, no .mbtiles files may be given.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Save resulting config to a file or use "-" to print to stdout.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
    #[command(flatten)]
    pub srv: SrvArgs,
    /// `.mbtiles` files to serve, each published under its file name without the extension.
    pub files: Vec<PathBuf>,
}

#[allow(clippy::doc_markdown)]
#[derive(clap::Args, PartialEq, Debug, Default)]
pub struct SrvArgs {
    #[arg(help = format!("Connection keep alive timeout. [DEFAULT: {KEEP_ALIVE_DEFAULT}]"), short, long)]
    pub keep_alive: Option<u64>,
    #[arg(help = format!("The socket address to bind. [DEFAULT: {LISTEN_ADDRESSES_DEFAULT}]"), short, long)]
    pub listen_addresses: Option<String>,
    /// Path prefix used in the URLs of capabilities documents.
    ///
    /// Must begin with a `/`. Examples: `/`, `/tiles`
    #[arg(long)]
    pub base_path: Option<String>,
    /// Number of web server workers
    #[arg(short = 'W', long)]
    pub workers: Option<usize>,
}

impl SrvArgs {
    fn merge_into_config(self, srv_config: &mut SrvConfig) {
        if self.keep_alive.is_some() {
            srv_config.keep_alive = self.keep_alive;
        }
        if self.listen_addresses.is_some() {
            srv_config.listen_addresses = self.listen_addresses;
        }
        if self.base_path.is_some() {
            srv_config.base_path = self.base_path;
        }
        if self.workers.is_some() {
            srv_config.worker_processes = self.workers;
        }
    }
}

impl Args {
    /// Applies the command line on top of `config`.
    pub fn merge_into_config(self, config: &mut Config) -> TilemapResult<()> {
        if self.config.is_some() && !self.files.is_empty() {
            return Err(ConfigAndFilesError(
                self.files
                    .iter()
                    .map(|f| f.display().to_string())
                    .collect(),
            ));
        }

        self.srv.merge_into_config(&mut config.srv);

        for file in self.files {
            let cfg = mbtiles_source(file)?;
            info!("Serving {} as source {}", cfg.location, cfg.id);
            config.sources.push(cfg);
        }
        Ok(())
    }
}

fn mbtiles_source(file: PathBuf) -> TilemapResult<SourceConfig> {
    let is_mbtiles = file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mbtiles"));
    let stem = file.file_stem().and_then(|s| s.to_str());
    match stem {
        Some(id) if is_mbtiles && !id.is_empty() => Ok(SourceConfig::new(
            id,
            SourceType::Mbtiles,
            file.display().to_string(),
        )),
        _ => Err(ConfigFileError::InvalidFilePath(file).into()),
    }
}
