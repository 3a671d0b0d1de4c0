use super::ui;
use crate::core::ReceiptProcessor;
use crate::core::rates::{FallbackReason, RateTable};
use anyhow::Result;
use comfy_table::Cell;

fn reason_text(reason: Option<FallbackReason>) -> &'static str {
    match reason {
        Some(FallbackReason::FeedUnavailable) => "rate service unavailable",
        Some(FallbackReason::OutOfRange) => "live rate implausible",
        Some(FallbackReason::NotQuoted) => "not quoted by rate service",
        None => "",
    }
}

impl RateTable {
    pub fn display_as_table(&self, home_currency: &str) -> String {
        if self.is_empty() {
            return ui::style_text("No exchange rates resolved", ui::StyleType::Warning);
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Currency"),
            ui::header_cell(&format!("Rate ({home_currency} per unit)")),
            ui::header_cell("Source"),
            ui::header_cell("Note"),
        ]);

        for (currency, entry) in self.iter() {
            table.add_row(vec![
                Cell::new(currency),
                ui::amount_cell(entry.rate),
                ui::rate_source_cell(Some(entry.origin)),
                Cell::new(reason_text(entry.fallback_reason)),
            ]);
        }

        format!(
            "Exchange rates: {}\n\n{}",
            ui::style_text(home_currency, ui::StyleType::Title),
            table
        )
    }
}

pub async fn run(processor: &ReceiptProcessor) -> Result<()> {
    let spinner = ui::new_spinner("Fetching exchange rates...");
    let rates = processor.rates().await;
    spinner.finish_and_clear();

    println!("{}", rates.display_as_table(processor.home_currency()));
    Ok(())
}
