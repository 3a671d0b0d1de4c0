pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{AmountCurrencyExtractor, ConversionEngine, RateProvider, ReceiptProcessor};
use crate::providers::exchange_rate_api::ExchangeRateApiFeed;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

pub enum AppCommand {
    /// Extract and convert the amounts in a receipt's text
    Convert {
        input: Option<PathBuf>,
        receipt_id: Option<String>,
        json: bool,
    },
    /// Show the resolved exchange rates
    Rates,
}

/// Wires the extractor, rate provider and conversion engine from config.
pub fn build_processor(config: &AppConfig) -> Result<ReceiptProcessor> {
    let feed = ExchangeRateApiFeed::from_config(&config.providers.exchange_rate_api)
        .context("Failed to build exchange rate client")?;
    let rate_provider = RateProvider::new(
        Box::new(feed),
        config.currency.fallback_rates.clone(),
        config.currency.bands(),
    );
    let extractor = AmountCurrencyExtractor::new().context("Invalid amount extraction rule")?;

    Ok(ReceiptProcessor::new(
        extractor,
        rate_provider,
        ConversionEngine::new(&config.currency.home)
            .with_price_references(config.currency.price_references()),
        config.currency.targets.clone(),
    ))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("receipt-fx starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let processor = build_processor(&config)?;

    match command {
        AppCommand::Convert {
            input,
            receipt_id,
            json,
        } => cli::convert::run(&processor, input.as_deref(), receipt_id.as_deref(), json).await,
        AppCommand::Rates => cli::rates::run(&processor).await,
    }
}
