//! Amount and currency extraction from receipt text

use crate::core::currency::resolve_designator;
use regex::{Captures, Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info};

/// Characters of context kept on each side of a match.
const CONTEXT_CHARS: usize = 20;

/// Largest amount accepted from a receipt (10^12). Longer digit runs are card
/// or reference numbers.
const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

const NUMBER: &str = r"([0-9０-９]+[.．]?[0-9０-９]*)";
const SYMBOL: &str = r"(\$|€|฿|₩|¥|元)";

/// A detected amount and its currency at a position in the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountOccurrence {
    pub amount: Decimal,
    pub currency_code: String,
    pub raw_symbol: Option<String>,
    /// Byte offset of the numeric literal in the scanned text.
    pub text_offset: usize,
    pub surrounding_context: String,
    pub rule_index: usize,
}

/// Declarative description of one matching rule.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub name: &'static str,
    pub pattern: String,
    pub amount_group: usize,
    pub designator_group: usize,
}

impl RuleSpec {
    fn new(
        name: &'static str,
        pattern: String,
        amount_group: usize,
        designator_group: usize,
    ) -> Self {
        Self {
            name,
            pattern,
            amount_group,
            designator_group,
        }
    }
}

/// The receipt rules, in the order they are applied.
pub fn default_rule_specs() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new("letter-prefix", format!(r"(RM|MYR)\s*{NUMBER}"), 2, 1),
        RuleSpec::new("symbol-prefix", format!(r"{SYMBOL}\s*{NUMBER}"), 2, 1),
        RuleSpec::new("letter-suffix", format!(r"{NUMBER}\s*(RM|MYR)"), 1, 2),
        RuleSpec::new("symbol-suffix", format!(r"{NUMBER}\s*{SYMBOL}"), 1, 2),
        RuleSpec::new(
            "total-line",
            format!(r"Total[:\s]*(RM|MYR|\$|€|฿|₩|¥|元)?\s*{NUMBER}"),
            2,
            1,
        ),
        RuleSpec::new(
            "iso-code",
            format!(r"{NUMBER}\s*(USD|EUR|THB|KRW|JPY|CNY|MYR)"),
            1,
            2,
        ),
    ]
}

struct CompiledRule {
    spec: RuleSpec,
    regex: Regex,
}

impl CompiledRule {
    fn occurrence(&self, rule_index: usize, text: &str, caps: &Captures) -> Option<AmountOccurrence> {
        let whole = caps.get(0)?;
        let amount_match = caps.get(self.spec.amount_group)?;
        let designator = caps.get(self.spec.designator_group);
        if designator.is_some_and(|d| is_renminbi(text, d.as_str(), d.end())) {
            debug!(rule = self.spec.name, "Skipping RMB amount");
            return None;
        }
        let raw_symbol = designator.map(|m| m.as_str().to_string());

        let literal = ascii_digits(amount_match.as_str());
        let amount = match Decimal::from_str(&literal) {
            Ok(amount) if amount <= MAX_AMOUNT => amount,
            Ok(amount) => {
                debug!(rule = self.spec.name, %amount, "Skipping implausibly large amount");
                return None;
            }
            Err(e) => {
                debug!(
                    rule = self.spec.name,
                    literal = amount_match.as_str(),
                    "Skipping unparsable amount: {e}"
                );
                return None;
            }
        };

        Some(AmountOccurrence {
            amount,
            currency_code: resolve_designator(raw_symbol.as_deref()),
            raw_symbol,
            text_offset: amount_match.start(),
            surrounding_context: context_window(text, whole.start(), whole.end()),
            rule_index,
        })
    }
}

/// Scans text for amounts using an ordered list of rules.
pub struct AmountCurrencyExtractor {
    rules: Vec<CompiledRule>,
}

impl AmountCurrencyExtractor {
    /// Builds an extractor with the receipt rules.
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_rules(default_rule_specs())
    }

    /// Builds an extractor from custom rules. Patterns match case-insensitively.
    pub fn with_rules(specs: Vec<RuleSpec>) -> Result<Self, regex::Error> {
        let rules = specs
            .into_iter()
            .map(|spec| -> Result<CompiledRule, regex::Error> {
                let regex = RegexBuilder::new(&spec.pattern)
                    .case_insensitive(true)
                    .build()?;
                Ok(CompiledRule { spec, regex })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Returns every amount found in `text`, deduplicated on
    /// (offset, amount, currency) and kept in discovery order.
    pub fn extract(&self, text: &str) -> Vec<AmountOccurrence> {
        let mut seen = HashSet::new();
        let mut amounts = Vec::new();

        for (rule_index, rule) in self.rules.iter().enumerate() {
            for caps in rule.regex.captures_iter(text) {
                let Some(occurrence) = rule.occurrence(rule_index, text, &caps) else {
                    continue;
                };
                let key = (
                    occurrence.text_offset,
                    occurrence.amount,
                    occurrence.currency_code.clone(),
                );
                if !seen.insert(key) {
                    debug!(
                        rule = rule.spec.name,
                        offset = occurrence.text_offset,
                        "Dropping duplicate amount"
                    );
                    continue;
                }
                debug!(
                    rule = rule.spec.name,
                    "Found amount: {} {}", occurrence.amount, occurrence.currency_code
                );
                amounts.push(occurrence);
            }
        }

        info!("Extracted {} amount(s)", amounts.len());
        amounts
    }
}

/// `RM` directly followed by `B` is the renminbi abbreviation, not ringgit.
fn is_renminbi(text: &str, designator: &str, end: usize) -> bool {
    designator.eq_ignore_ascii_case("RM")
        && text[end..].chars().next().is_some_and(|c| c.eq_ignore_ascii_case(&'B'))
}

/// Maps full-width digits and decimal point to ASCII.
fn ascii_digits(literal: &str) -> String {
    literal
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            '．' => '.',
            c => c,
        })
        .collect()
}

/// Slices `text` to the match plus up to [`CONTEXT_CHARS`] characters either side.
fn context_window(text: &str, start: usize, end: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(CONTEXT_CHARS)
        .last()
        .map_or(start, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(CONTEXT_CHARS)
        .map_or(text.len(), |(i, _)| end + i);
    text[from..to].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn extract(text: &str) -> Vec<AmountOccurrence> {
        AmountCurrencyExtractor::new().unwrap().extract(text)
    }

    #[test]
    fn test_empty_text() {
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_total_line_with_ringgit_is_single_occurrence() {
        let amounts = extract("Total: RM 15.90");
        assert_eq!(amounts.len(), 1);
        assert_eq!(amounts[0].amount, dec!(15.90));
        assert_eq!(amounts[0].currency_code, "MYR");
        assert_eq!(amounts[0].raw_symbol.as_deref(), Some("RM"));
        assert_eq!(amounts[0].rule_index, 0);
    }

    #[test]
    fn test_dollar_amounts_keep_order() {
        let amounts = extract("$8.50 Tax $0.85 Total $9.35");
        let values: Vec<_> = amounts.iter().map(|a| a.amount).collect();
        assert_eq!(values, vec![dec!(8.50), dec!(0.85), dec!(9.35)]);
        assert!(amounts.iter().all(|a| a.currency_code == "USD"));
        assert!(amounts.windows(2).all(|w| w[0].text_offset < w[1].text_offset));
    }

    #[test]
    fn test_no_duplicate_triples() {
        let text = "Subtotal 12.00 USD\nTotal: $12.00\nTOTAL RM 30 30MYR ¥500 500¥";
        let amounts = extract(text);
        let mut keys = HashSet::new();
        for a in &amounts {
            assert!(keys.insert((a.text_offset, a.amount, a.currency_code.clone())));
        }
        assert!(amounts.iter().any(|a| a.currency_code == "JPY"));
    }

    #[test]
    fn test_overlapping_rules_are_all_collected() {
        // Suffix symbol and prefix symbol both claim the 5 in "5$5"
        let amounts = extract("5$5");
        assert_eq!(amounts.len(), 2);
        assert_eq!(amounts[0].text_offset, 2);
        assert_eq!(amounts[0].rule_index, 1);
        assert_eq!(amounts[1].text_offset, 0);
        assert_eq!(amounts[1].rule_index, 3);
    }

    #[test]
    fn test_total_without_designator_is_unknown() {
        let amounts = extract("Total 42.10");
        assert_eq!(amounts.len(), 1);
        assert_eq!(amounts[0].currency_code, "UNKNOWN");
        assert_eq!(amounts[0].raw_symbol, None);
    }

    #[test]
    fn test_case_insensitive_codes() {
        let amounts = extract("fare 120 thb, snack rm5.50");
        let found: Vec<_> = amounts
            .iter()
            .map(|a| (a.amount, a.currency_code.as_str()))
            .collect();
        assert!(found.contains(&(dec!(5.50), "MYR")));
        assert!(found.contains(&(dec!(120), "THB")));
    }

    #[test]
    fn test_codes_next_to_cjk_text() {
        let found: Vec<_> = ["合計RM15.90", "15.90MYR合計", "小計Total 9.00"]
            .iter()
            .map(|text| {
                let amounts = extract(text);
                assert_eq!(amounts.len(), 1, "{text}");
                (amounts[0].amount, amounts[0].currency_code.clone())
            })
            .collect();
        assert_eq!(
            found,
            vec![
                (dec!(15.90), "MYR".to_string()),
                (dec!(15.90), "MYR".to_string()),
                (dec!(9.00), "UNKNOWN".to_string()),
            ]
        );
    }

    #[test]
    fn test_total_inside_subtotal_is_matched() {
        let amounts = extract("SUBTOTAL 12.00\nTAX 1.00\nTOTAL 13.00");
        let found: Vec<_> = amounts
            .iter()
            .map(|a| (a.amount, a.currency_code.as_str()))
            .collect();
        assert_eq!(found, vec![(dec!(12.00), "UNKNOWN"), (dec!(13.00), "UNKNOWN")]);
    }

    #[test]
    fn test_rmb_is_not_ringgit() {
        assert!(extract("12 RMB").is_empty());
        assert!(extract("paid 12rmb").is_empty());

        let amounts = extract("12 RM");
        assert_eq!(amounts.len(), 1);
        assert_eq!(amounts[0].currency_code, "MYR");
    }

    #[test]
    fn test_full_width_digits() {
        let amounts = extract("合計 ¥１２００");
        assert_eq!(amounts.len(), 1);
        assert_eq!(amounts[0].amount, dec!(1200));
        assert_eq!(amounts[0].currency_code, "JPY");

        let amounts = extract("RM１５．９０");
        assert_eq!(amounts[0].amount, dec!(15.90));
    }

    #[test]
    fn test_long_digit_runs_are_skipped() {
        assert!(extract("Card no $9999999999999999999999999999").is_empty());
        assert!(extract(&format!("Ref ${}", "9".repeat(40))).is_empty());

        let amounts = extract("Card no $9999999999999999999999999999 Total $12.50");
        assert_eq!(amounts.len(), 1);
        assert_eq!(amounts[0].amount, dec!(12.50));
    }

    #[test]
    fn test_context_window_is_char_safe() {
        let text = "元元元元元元元元元元元元元元元元元元元元元元元 ฿99 ₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩₩";
        let amounts = extract(text);
        let thb = amounts.iter().find(|a| a.currency_code == "THB").unwrap();
        assert_eq!(thb.amount, dec!(99));
        assert!(thb.surrounding_context.contains("฿99"));
        assert_eq!(thb.surrounding_context.chars().count(), 3 + 2 * CONTEXT_CHARS);
    }
}
