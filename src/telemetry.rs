use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, Settings};

/// Logs go to stderr; stdout carries the protocol.
pub fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .map_err(|err| anyhow::anyhow!("invalid log filter {:?}: {}", settings.log_level, err))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match settings.log_format {
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?,
        LogFormat::Text => builder
            .with_ansi(false)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?,
    }

    Ok(())
}
