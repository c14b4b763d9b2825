mod commands;
mod config;
mod effects;
mod logging;
mod render;
mod repl;

use std::path::PathBuf;

use docquery_engine::ClientConfig;
use docquery_logging::{dq_info, dq_warn};
use log::LevelFilter;

pub use logging::LogDestination;

use crate::cli::{Cli, Command};

/// Effective settings after merging the config file with flags and env.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub export_dir: PathBuf,
    pub stream_by_default: bool,
    pub json: bool,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let file_config = config::load(cli.config.as_deref())?;
    let level = docquery_logging::parse_level(&file_config.log_level);
    logging::initialize(
        cli.log.unwrap_or(file_config.log),
        level.unwrap_or(LevelFilter::Info),
    );
    if level.is_none() {
        dq_warn!("Unknown log level {:?}; using info", file_config.log_level);
    }

    let settings = Settings {
        client: file_config.client_config(cli.base_url.as_deref())?,
        export_dir: file_config.export_dir,
        stream_by_default: file_config.stream_by_default,
        json: cli.json,
    };
    dq_info!(
        "docquery {} using {}",
        env!("CARGO_PKG_VERSION"),
        settings.client.base_url()
    );

    match cli.command {
        Command::Chat => repl::run(&settings),
        command => commands::run(command, &settings),
    }
}
