//! Phased processing of one receipt's recognized text

use crate::core::conversion::{ConversionEngine, ConversionRecord, ConversionSummary};
use crate::core::currency::detect_currencies;
use crate::core::extract::{AmountCurrencyExtractor, AmountOccurrence};
use crate::core::rates::{RateProvider, RateTable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptReport {
    pub receipt_id: String,
    pub processed_at: DateTime<Utc>,
    pub home_currency: String,
    pub detected_currencies: Vec<String>,
    pub amounts: Vec<AmountOccurrence>,
    pub rates: RateTable,
    pub conversions: Vec<ConversionRecord>,
    pub summary: ConversionSummary,
}

/// Runs extraction, detection, rate resolution and conversion for a receipt.
pub struct ReceiptProcessor {
    extractor: AmountCurrencyExtractor,
    rate_provider: RateProvider,
    engine: ConversionEngine,
    target_currencies: Vec<String>,
}

impl ReceiptProcessor {
    pub fn new(
        extractor: AmountCurrencyExtractor,
        rate_provider: RateProvider,
        engine: ConversionEngine,
        target_currencies: Vec<String>,
    ) -> Self {
        Self {
            extractor,
            rate_provider,
            engine,
            target_currencies,
        }
    }

    pub fn home_currency(&self) -> &str {
        self.engine.home_currency()
    }

    /// Resolves the rate table for the configured targets.
    pub async fn rates(&self) -> RateTable {
        self.rate_provider
            .get_rates(self.engine.home_currency(), &self.target_currencies)
            .await
    }

    pub async fn process(&self, receipt_id: &str, text: &str) -> ReceiptReport {
        info!(receipt_id, "Processing receipt ({} chars)", text.chars().count());

        let amounts = self.extractor.extract(text);
        let detected_currencies: Vec<String> = detect_currencies(text).into_iter().collect();
        debug!(?detected_currencies, "Detected currencies");

        let rates = if amounts.is_empty() {
            debug!("No amounts found, skipping rate lookup");
            RateTable::new()
        } else {
            self.rates().await
        };

        let conversions = self.engine.convert(&amounts, &rates);
        let summary = self.engine.summarize(&conversions);
        info!(
            receipt_id,
            "Receipt total: {} {}", summary.total_converted, summary.home_currency
        );

        ReceiptReport {
            receipt_id: receipt_id.to_string(),
            processed_at: Utc::now(),
            home_currency: self.engine.home_currency().to_string(),
            detected_currencies,
            amounts,
            rates,
            conversions,
            summary,
        }
    }
}
