//! Bracket order placement - Entry Point
//!
//! Places one entry order with a linked protective stop, optionally waiting
//! for the market to trade through a price first.

use anyhow::{bail, Result};
use bracket_bot::{derive_client_id, AppConfig, Application, ConfigOverrides, OrderIntent};
use bracket_core::{BracketRequest, OrderAction, OrderType, Price};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Place a bracket order (entry + protective stop)
#[derive(Parser, Debug)]
#[command(name = "place-order", version, about, long_about = None)]
struct Args {
    /// BUY or SELL
    action: OrderAction,

    /// Exchange-local symbol, e.g. MESM0
    symbol: String,

    /// Entry price (ignored for MKT entries)
    #[arg(short, long)]
    price: Option<Price>,

    /// Protective stop trigger price
    #[arg(short, long)]
    stop: Price,

    /// Number of contracts
    #[arg(short, long, default_value_t = 1)]
    quantity: u32,

    /// Entry order type: LMT, STP, "STP LMT" or MKT
    #[arg(short = 't', long = "type", default_value = "LMT")]
    order_type: OrderType,

    /// Submit only once the last trade is at or above this price
    #[arg(short, long)]
    above: Option<Price>,

    /// Submit only once the last trade is at or below this price
    #[arg(short, long)]
    below: Option<Price>,

    /// Configuration file path (can also be set via BRACKET_CONFIG env var)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Venue gateway host
    #[arg(long)]
    host: Option<String>,

    /// Venue gateway port
    #[arg(long)]
    port: Option<u16>,

    /// Fixed session id (random per run when omitted)
    #[arg(long)]
    client_id: Option<u32>,

    /// Resolve and build the bracket without sending it
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn intent(&self) -> OrderIntent {
        OrderIntent {
            symbol: self.symbol.clone(),
            request: BracketRequest {
                action: self.action,
                order_type: self.order_type,
                quantity: self.quantity,
                price: self.price.unwrap_or(Price::ZERO),
                stop_price: self.stop,
            },
            above: self.above,
            below: self.below,
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id,
            dry_run: self.dry_run,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    bracket_telemetry::init_logging()?;

    info!("Starting place-order v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > BRACKET_CONFIG env var > config/default.toml (optional)
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var_os("BRACKET_CONFIG").map(PathBuf::from));

    info!(config_path = ?config_path, "Loading configuration");

    let mut config = AppConfig::load(config_path.as_deref())?;
    config.apply_overrides(&args.overrides());
    info!(
        mode = ?config.mode,
        host = %config.venue.host,
        port = config.venue.port,
        "Configuration loaded"
    );

    let intent = args.intent();
    let client_id = config
        .venue
        .client_id
        .unwrap_or_else(|| derive_client_id(&intent));

    let app = Application::new(config)?;
    let outcome = app.run(&intent, client_id)?;
    outcome.log_summary();

    let stop_rejections = outcome.stop_rejections();
    if !stop_rejections.is_empty() {
        bail!(
            "protective stop rejected by the venue (order id {}); entry {} may be unprotected",
            stop_rejections[0].order_id,
            outcome.submission.bracket().entry_id
        );
    }

    Ok(())
}
