pub mod config;
pub mod joystick;
pub mod mqtt;
pub mod pipeline;

use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{Cli, Config};
use crate::joystick::JoystickReader;
use crate::mqtt::MqttSession;
use crate::pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        print_version();
        return Ok(());
    }

    setup(cli.verbose)?;

    let config = Config::load(&cli).wrap_err("Invalid configuration")?;
    info!(
        "Publishing events from {} to {}...",
        config.device.display(),
        config.mqtt.address()
    );

    let reader = JoystickReader::open(&config.device).await?;
    let session = MqttSession::connect(&config.mqtt);

    let pipeline = Pipeline::new(&config, reader, session.publisher()).start()?;
    let terminated = pipeline.run().await;

    let stats = terminated.stats();
    error!(
        records_read = stats.records_read,
        events_ignored = stats.events_ignored,
        events_published = stats.events_published,
        "Shutting down after fatal error"
    );

    Err(terminated.into_error().into())
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

// stdout is reserved for the --debug echo
fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}

fn print_version() {
    eprintln!(
        "{} {}\n\
         Licensed under the Apache License, Version 2.0\n\
         http://www.apache.org/licenses/LICENSE-2.0\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
}
