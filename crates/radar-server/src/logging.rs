//! Tracing subscriber setup shared by the binaries.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` refines the default
/// `radar_server=debug` directive.
pub fn init_tracing(log_json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("radar_server=debug".parse()?);

    let (json, plain) = if log_json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init()?;
    Ok(())
}
