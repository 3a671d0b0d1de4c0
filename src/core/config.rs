use crate::core::comparison::{DEFAULT_REFERENCE_HOME, PriceReference};
use crate::core::rates::{DEFAULT_BAND_HOME, PlausibleBand};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

/// How the rate endpoint quotes currencies against the requested base.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateQuotation {
    /// Units of the quoted currency per one unit of base.
    #[default]
    Indirect,
    /// Units of base per one unit of the quoted currency.
    Direct,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub quotation: RateQuotation,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    1
}

impl Default for ExchangeRateApiConfig {
    fn default() -> Self {
        ExchangeRateApiConfig {
            base_url: "https://api.exchangerate-api.com/v4".to_string(),
            quotation: RateQuotation::default(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub exchange_rate_api: ExchangeRateApiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurrencyConfig {
    pub home: String,
    pub targets: Vec<String>,
    #[serde(default)]
    pub fallback_rates: HashMap<String, Decimal>,
    #[serde(default)]
    pub plausible_ranges: Option<HashMap<String, PlausibleBand>>,
    /// Everyday prices in the home currency used to describe the total.
    #[serde(default)]
    pub price_references: Option<Vec<PriceReference>>,
}

impl CurrencyConfig {
    /// Plausible bands to validate live rates against.
    ///
    /// Configured ranges win. Otherwise the built-in bands apply, but only
    /// for the home currency they are expressed in.
    pub fn bands(&self) -> HashMap<String, PlausibleBand> {
        match &self.plausible_ranges {
            Some(ranges) => ranges.clone(),
            None if self.home.eq_ignore_ascii_case(DEFAULT_BAND_HOME) => {
                PlausibleBand::jpy_defaults()
            }
            None => {
                debug!(
                    home = %self.home,
                    "No plausible ranges configured, live rates are accepted as-is"
                );
                HashMap::new()
            }
        }
    }

    /// Price references for the total comparison, built-in ones for a yen home.
    pub fn price_references(&self) -> Vec<PriceReference> {
        match &self.price_references {
            Some(references) => references.clone(),
            None if self.home.eq_ignore_ascii_case(DEFAULT_REFERENCE_HOME) => {
                PriceReference::jpy_defaults()
            }
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "receipt-fx", "receipt-fx")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.normalize();
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Upper-cases currency codes and warns about targets without a fallback.
    fn normalize(&mut self) {
        let currency = &mut self.currency;
        currency.home = currency.home.to_uppercase();
        for target in currency.targets.iter_mut() {
            *target = target.to_uppercase();
        }
        currency.fallback_rates = std::mem::take(&mut currency.fallback_rates)
            .into_iter()
            .map(|(code, rate)| (code.to_uppercase(), rate))
            .collect();
        if let Some(ranges) = currency.plausible_ranges.take() {
            currency.plausible_ranges = Some(
                ranges
                    .into_iter()
                    .map(|(code, band)| (code.to_uppercase(), band))
                    .collect(),
            );
        }

        for target in &currency.targets {
            if !currency.fallback_rates.contains_key(target) {
                warn!(currency = %target, "Target currency has no fallback rate");
            }
        }
    }
}
