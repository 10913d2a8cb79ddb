//! payrouter
//!
//! Loads a gateway config, registers its sandbox backends, builds the router
//! and drives payments through it.
//!
//! # Architecture Overview
//!
//! ```text
//!     charge / authorize                 capture / refund / lookup
//!            │                                      │
//!            ▼                                      ▼
//!   ┌─────────────────┐                  ┌─────────────────────┐
//!   │  PaymentRouter  │                  │ txid "backend:raw"  │
//!   │  (strategy)     │                  │ exact backend only  │
//!   └────────┬────────┘                  └──────────┬──────────┘
//!            │ candidates                           │
//!            ▼                                      │
//!   ┌─────────────────┐                             │
//!   │ breaker + load  │ per backend                 │
//!   └────────┬────────┘                             │
//!            ▼                                      ▼
//!   ┌──────────────────────────────────────────────────────────┐
//!   │                        Registry                          │
//!   │   stripe   square   adyen   ...   mpc   (sandbox here)   │
//!   └──────────────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use payrouter::config::load_config;
use payrouter::observability::{logging, metrics};
use payrouter::processor::{BackendType, Cents, PaymentProcessor, PaymentRequest, RefundRequest};
use payrouter::sandbox::SandboxProcessor;
use payrouter::{PaymentRouter, Registry};

#[derive(Parser)]
#[command(name = "payrouter")]
#[command(about = "Route payments across processors with failover", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "payrouter.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Charge through the router
    Charge {
        /// Amount in minor units
        #[arg(long)]
        amount: i64,
        #[arg(long, default_value = "usd")]
        currency: String,
        /// Bypass the router and use this backend via the registry
        #[arg(long)]
        processor: Option<String>,
    },
    /// Authorize, capture, refund and look up one payment
    Flow {
        #[arg(long, default_value_t = 1000)]
        amount: i64,
        #[arg(long, default_value = "usd")]
        currency: String,
    },
    /// List backend registration, breaker state and load
    Backends,
}

#[derive(Serialize)]
struct Step<'a, T: Serialize> {
    step: &'a str,
    result: T,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability);
    tracing::info!("payrouter v0.1.0 starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let registry = Arc::new(Registry::new(config.registry.clone()));
    for sandbox in &config.sandbox {
        registry.register(Arc::new(SandboxProcessor::from_config(sandbox)));
    }
    tracing::info!(
        backends = registry.list_types().len(),
        strategy = config.router.strategy.as_str(),
        "Configuration loaded"
    );

    let router = PaymentRouter::new(registry.clone(), config.router.clone());

    match cli.command {
        Commands::Charge {
            amount,
            currency,
            processor,
        } => {
            let req = PaymentRequest::new(amount, currency.as_str());
            let result = match processor {
                Some(name) => {
                    let req = req.with_processor(BackendType::from(name));
                    let backend = registry.select_processor(&req).await?;
                    backend.charge(req).await?
                }
                None => router.charge(req).await?,
            };
            print_json(&result)?;
        }
        Commands::Flow { amount, currency } => {
            let auth = router
                .authorize(PaymentRequest::new(amount, currency.as_str()))
                .await?;
            print_json(&Step { step: "authorize", result: &auth })?;

            let captured = router.capture(&auth.transaction_id, Cents(amount)).await?;
            print_json(&Step { step: "capture", result: &captured })?;

            let refund = router
                .refund(RefundRequest::new(captured.transaction_id.clone(), amount / 2))
                .await?;
            print_json(&Step { step: "refund", result: &refund })?;

            let tx = router.get_transaction(&captured.transaction_id).await?;
            print_json(&Step { step: "lookup", result: &tx })?;
        }
        Commands::Backends => {
            print_json(&router.backend_status().await)?;
        }
    }

    Ok(())
}
