//! Core business logic: extraction, rate resolution and conversion

pub mod comparison;
pub mod config;
pub mod conversion;
pub mod currency;
pub mod extract;
pub mod log;
pub mod rates;
pub mod receipt;

// Re-export main types for cleaner imports
pub use comparison::{Comparison, PriceReference};
pub use conversion::{ConversionEngine, ConversionRecord, ConversionSummary};
pub use currency::{UNKNOWN_CURRENCY, detect_currencies};
pub use extract::{AmountCurrencyExtractor, AmountOccurrence};
pub use rates::{RateFeed, RateFetchError, RateProvider, RateTable};
pub use receipt::{ReceiptProcessor, ReceiptReport};
