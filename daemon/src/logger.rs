// Logging setup: colored stdout dispatch with per-module noise control.

use anyhow::Result;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use pyre_common::environment::Environment;

pub fn init(env: &Environment) -> Result<()> {
    let default_level = match env {
        Environment::Development => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(default_level)
        // Dependency chatter stays out of the relay's logs
        .level_for("sqlx", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("actix_server", LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}
