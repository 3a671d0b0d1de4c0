//! Exchange rate resolution with plausibility checks and fallback rates

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Home currency the built-in plausible bands are expressed in.
pub const DEFAULT_BAND_HOME: &str = "JPY";

/// Why a live rate could not be obtained from the feed.
#[derive(Error, Debug)]
pub enum RateFetchError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error: {status} for base currency: {base}")]
    Status { status: u16, base: String },

    #[error("Failed to parse rate response for {base}: {source}")]
    Malformed {
        base: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No rate data found for base currency: {0}")]
    MissingRates(String),
}

/// Source of live rates.
///
/// Implementations return direct quotes: units of `base` per one unit of
/// each quoted currency.
#[async_trait]
pub trait RateFeed: Send + Sync {
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>, RateFetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOrigin {
    Live,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The feed failed as a whole.
    FeedUnavailable,
    /// The live rate fell outside the plausible band.
    OutOfRange,
    /// The feed answered but did not quote this currency.
    NotQuoted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: Decimal,
    pub origin: RateOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl RateEntry {
    pub fn live(rate: Decimal) -> Self {
        Self {
            rate,
            origin: RateOrigin::Live,
            fallback_reason: None,
        }
    }

    pub fn fallback(rate: Decimal, reason: FallbackReason) -> Self {
        Self {
            rate,
            origin: RateOrigin::Fallback,
            fallback_reason: Some(reason),
        }
    }
}

/// Resolved rates for one conversion request, keyed by currency code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable {
    entries: BTreeMap<String, RateEntry>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, currency: &str, entry: RateEntry) {
        self.entries.insert(currency.to_string(), entry);
    }

    pub fn get(&self, currency: &str) -> Option<&RateEntry> {
        self.entries.get(currency)
    }

    /// Multiplier for `currency`, or identity when the table has no entry.
    pub fn rate_for(&self, currency: &str) -> Decimal {
        self.get(currency).map_or(Decimal::ONE, |e| e.rate)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RateEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inclusive range a live rate must fall in to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibleBand {
    pub min: Decimal,
    pub max: Decimal,
}

impl PlausibleBand {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, rate: Decimal) -> bool {
        self.min <= rate && rate <= self.max
    }

    /// Bands for a JPY home currency, in yen per one unit of each currency.
    pub fn jpy_defaults() -> HashMap<String, PlausibleBand> {
        [
            ("USD", Decimal::new(100, 0), Decimal::new(200, 0)),
            ("EUR", Decimal::new(120, 0), Decimal::new(180, 0)),
            ("THB", Decimal::new(3, 0), Decimal::new(6, 0)),
            ("KRW", Decimal::new(8, 2), Decimal::new(15, 2)),
            ("CNY", Decimal::new(15, 0), Decimal::new(25, 0)),
            ("MYR", Decimal::new(25, 0), Decimal::new(40, 0)),
        ]
        .into_iter()
        .map(|(code, min, max)| (code.to_string(), PlausibleBand::new(min, max)))
        .collect()
    }
}

/// Builds a [`RateTable`] from a live feed, falling back to static rates.
pub struct RateProvider {
    feed: Box<dyn RateFeed>,
    fallback_rates: HashMap<String, Decimal>,
    bands: HashMap<String, PlausibleBand>,
}

impl RateProvider {
    pub fn new(
        feed: Box<dyn RateFeed>,
        fallback_rates: HashMap<String, Decimal>,
        bands: HashMap<String, PlausibleBand>,
    ) -> Self {
        Self {
            feed,
            fallback_rates,
            bands,
        }
    }

    /// Resolves a rate for each target currency relative to `base_currency`.
    ///
    /// Never fails: feed errors and implausible values are replaced by the
    /// configured fallback rates.
    pub async fn get_rates(&self, base_currency: &str, target_currencies: &[String]) -> RateTable {
        match self.feed.fetch_rates(base_currency).await {
            Ok(live) => self.validate(&live, target_currencies),
            Err(e) => {
                warn!("Failed to fetch live rates, using fallback rates: {e}");
                self.fallback_table(target_currencies, FallbackReason::FeedUnavailable)
            }
        }
    }

    fn validate(&self, live: &HashMap<String, Decimal>, targets: &[String]) -> RateTable {
        let mut table = RateTable::new();
        for currency in targets {
            let Some(&rate) = live.get(currency) else {
                warn!(currency = %currency, "Live rates do not quote currency, using fallback");
                self.insert_fallback(&mut table, currency, FallbackReason::NotQuoted);
                continue;
            };

            match self.bands.get(currency) {
                Some(band) if !band.contains(rate) => {
                    warn!(
                        currency = %currency,
                        %rate,
                        "Live rate outside plausible range {}..={}, using fallback",
                        band.min,
                        band.max
                    );
                    self.insert_fallback(&mut table, currency, FallbackReason::OutOfRange);
                }
                _ => {
                    debug!(currency = %currency, %rate, "Accepted live rate");
                    table.insert(currency, RateEntry::live(rate));
                }
            }
        }
        info!("Resolved {} rate(s) from live feed", table.len());
        table
    }

    fn fallback_table(&self, targets: &[String], reason: FallbackReason) -> RateTable {
        let mut table = RateTable::new();
        for currency in targets {
            self.insert_fallback(&mut table, currency, reason);
        }
        table
    }

    fn insert_fallback(&self, table: &mut RateTable, currency: &str, reason: FallbackReason) {
        match self.fallback_rates.get(currency) {
            Some(&rate) => table.insert(currency, RateEntry::fallback(rate, reason)),
            None => warn!(
                currency = %currency,
                "No fallback rate configured, amounts will convert at identity"
            ),
        }
    }
}
