//! OracleBot binary
//!
//! `oraclebot` runs one cycle and exits. `oraclebot serve` (feature
//! `trigger`) starts the HTTP trigger instead.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use oraclebot::config::AppConfig;
use oraclebot::engine::OracleBot;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(config.bot.log_json);

    info!("🔮 NEAR Price Oracle Validator Bot, v.{}", config.bot.version);
    info!("{}", config.digest());

    let bot = Arc::new(OracleBot::from_config(config)?);

    match std::env::args().nth(1).as_deref() {
        None | Some("run") => {
            if let Err(e) = bot.run_cycle().await {
                error!(error = %e, "Cycle failed");
                return Err(e.into());
            }
            Ok(())
        }
        #[cfg(feature = "trigger")]
        Some("serve") => oraclebot::trigger::serve(bot).await,
        Some(other) => bail!("Unknown command {other}; expected `run` or `serve`"),
    }
}
