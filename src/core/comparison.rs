//! Everyday-price comparisons for a converted total

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Home currency the built-in price references are expressed in.
pub const DEFAULT_REFERENCE_HOME: &str = "JPY";

/// A familiar item and its typical price in the home currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceReference {
    pub label: String,
    pub price: Decimal,
}

impl PriceReference {
    pub fn new(label: &str, price: Decimal) -> Self {
        Self {
            label: label.to_string(),
            price,
        }
    }

    /// Typical prices in Japan, in yen.
    pub fn jpy_defaults() -> Vec<Self> {
        vec![
            Self::new("hamburgers", Decimal::from(500)),
            Self::new("cups of coffee", Decimal::from(300)),
            Self::new("train fares", Decimal::from(200)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub label: String,
    pub count: u64,
}

/// How many whole items of each reference `amount` would buy. References
/// the amount cannot buy once are left out.
pub fn compare(amount: Decimal, references: &[PriceReference]) -> Vec<Comparison> {
    references
        .iter()
        .filter(|reference| reference.price > Decimal::ZERO)
        .filter_map(|reference| {
            let count = amount.checked_div(reference.price)?.floor().to_u64()?;
            (count > 0).then(|| Comparison {
                label: reference.label.clone(),
                count,
            })
        })
        .collect()
}

/// One-line description of `amount`, e.g. "About the price of 2 hamburgers".
pub fn comparison_message(
    amount: Decimal,
    home_currency: &str,
    comparisons: &[Comparison],
) -> String {
    if comparisons.is_empty() {
        return format!("About {amount:.2} {home_currency}");
    }
    let items: Vec<String> = comparisons
        .iter()
        .map(|c| format!("{} {}", c.count, c.label))
        .collect();
    format!("About the price of {}", items.join(", "))
}
