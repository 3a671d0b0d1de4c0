//! Currency designators and presence detection

use std::collections::BTreeSet;

/// Code assigned to an amount whose currency could not be resolved.
pub const UNKNOWN_CURRENCY: &str = "UNKNOWN";

/// ISO codes recognized in receipt text.
pub const KNOWN_CODES: [&str; 7] = ["USD", "EUR", "THB", "KRW", "JPY", "CNY", "MYR"];

/// Symbols and letter prefixes mapped to their ISO code.
pub const SYMBOL_CODES: [(&str, &str); 8] = [
    ("$", "USD"),
    ("€", "EUR"),
    ("฿", "THB"),
    ("₩", "KRW"),
    ("¥", "JPY"),
    ("元", "CNY"),
    ("RM", "MYR"),
    ("MYR", "MYR"),
];

/// Resolves a matched currency designator to a currency code.
///
/// Letter designators are compared case-insensitively. A designator missing
/// from the symbol table is returned upper-cased, and `None` maps to
/// [`UNKNOWN_CURRENCY`].
pub fn resolve_designator(designator: Option<&str>) -> String {
    let Some(raw) = designator.map(str::trim).filter(|d| !d.is_empty()) else {
        return UNKNOWN_CURRENCY.to_string();
    };
    let upper = raw.to_uppercase();
    SYMBOL_CODES
        .iter()
        .find(|(symbol, _)| *symbol == upper)
        .map_or(upper, |(_, code)| code.to_string())
}

/// Returns every currency whose symbol or ISO code appears in `text`.
pub fn detect_currencies(text: &str) -> BTreeSet<String> {
    let mut detected: BTreeSet<String> = SYMBOL_CODES
        .iter()
        .filter(|(symbol, _)| text.contains(symbol))
        .map(|(_, code)| code.to_string())
        .collect();

    let upper = text.to_uppercase();
    detected.extend(
        KNOWN_CODES
            .iter()
            .filter(|code| upper.contains(*code))
            .map(|code| code.to_string()),
    );
    detected
}
