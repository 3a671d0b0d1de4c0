//! Conversion of extracted amounts into the home currency

use crate::core::comparison::{Comparison, PriceReference, compare, comparison_message};
use crate::core::extract::AmountOccurrence;
use crate::core::rates::{RateOrigin, RateTable};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Decimal places kept in converted amounts.
pub const AMOUNT_PRECISION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub original_amount: Decimal,
    pub original_currency: String,
    /// Always in the engine's home currency.
    pub converted_amount: Decimal,
    pub exchange_rate: Decimal,
    /// `None` when no rate was resolved and the identity rate applied.
    pub rate_source: Option<RateOrigin>,
    pub conversion_date: DateTime<Utc>,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub home_currency: String,
    pub total_converted: Decimal,
    /// Converted totals per original currency.
    pub per_currency: BTreeMap<String, Decimal>,
    pub counted: usize,
    pub duplicates_skipped: usize,
    /// Everyday items the total would buy at home.
    pub comparisons: Vec<Comparison>,
}

impl ConversionSummary {
    pub fn comparison_message(&self) -> String {
        comparison_message(self.total_converted, &self.home_currency, &self.comparisons)
    }
}

pub struct ConversionEngine {
    home_currency: String,
    price_references: Vec<PriceReference>,
}

impl ConversionEngine {
    pub fn new(home_currency: &str) -> Self {
        Self {
            home_currency: home_currency.to_string(),
            price_references: Vec::new(),
        }
    }

    pub fn with_price_references(mut self, references: Vec<PriceReference>) -> Self {
        self.price_references = references;
        self
    }

    pub fn home_currency(&self) -> &str {
        &self.home_currency
    }

    /// Converts each amount with its rate from `rates`, defaulting to 1.0.
    ///
    /// Amounts are rounded half away from zero to [`AMOUNT_PRECISION`]
    /// places. Output order matches input order. A product too large for a
    /// decimal keeps the record at the identity rate.
    pub fn convert(&self, amounts: &[AmountOccurrence], rates: &RateTable) -> Vec<ConversionRecord> {
        let now = Utc::now();
        let records: Vec<ConversionRecord> = amounts
            .iter()
            .map(|occurrence| {
                let (converted, entry) = match rates.get(&occurrence.currency_code) {
                    Some(entry) => match occurrence.amount.checked_mul(entry.rate) {
                        Some(converted) => (converted, Some(entry)),
                        None => {
                            warn!(
                                amount = %occurrence.amount,
                                currency = %occurrence.currency_code,
                                "Conversion overflowed, keeping amount at identity"
                            );
                            (occurrence.amount, None)
                        }
                    },
                    None => {
                        debug!(
                            currency = %occurrence.currency_code,
                            "No rate resolved, converting at identity"
                        );
                        (occurrence.amount, None)
                    }
                };
                ConversionRecord {
                    original_amount: occurrence.amount,
                    original_currency: occurrence.currency_code.clone(),
                    converted_amount: round_amount(converted),
                    exchange_rate: entry.map_or(Decimal::ONE, |e| e.rate),
                    rate_source: entry.map(|e| e.origin),
                    conversion_date: now,
                    context: occurrence.surrounding_context.clone(),
                }
            })
            .collect();

        info!(
            "Converted {} amount(s) to {}",
            records.len(),
            self.home_currency
        );
        records
    }

    /// Totals the records, counting each (amount, currency) pair once so a
    /// total detected on several lines is not summed twice.
    pub fn summarize(&self, records: &[ConversionRecord]) -> ConversionSummary {
        let mut seen = HashSet::new();
        let mut per_currency: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut total = Decimal::ZERO;
        let mut counted = 0;
        let mut duplicates = 0;

        for record in records {
            if !seen.insert((record.original_amount, record.original_currency.as_str())) {
                duplicates += 1;
                continue;
            }
            let subtotal = per_currency
                .get(&record.original_currency)
                .copied()
                .unwrap_or_default();
            let (Some(new_total), Some(new_subtotal)) = (
                total.checked_add(record.converted_amount),
                subtotal.checked_add(record.converted_amount),
            ) else {
                warn!(
                    amount = %record.converted_amount,
                    currency = %record.original_currency,
                    "Total overflowed, leaving amount out of the summary"
                );
                continue;
            };
            total = new_total;
            per_currency.insert(record.original_currency.clone(), new_subtotal);
            counted += 1;
        }

        let total = round_amount(total);

        ConversionSummary {
            home_currency: self.home_currency.clone(),
            total_converted: total,
            per_currency,
            counted,
            duplicates_skipped: duplicates,
            comparisons: compare(total, &self.price_references),
        }
    }
}

fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}
