use super::ui;
use crate::core::{ReceiptProcessor, ReceiptReport};
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::io::Read;
use std::path::Path;

/// Longest context shown in the table before it is cut.
const CONTEXT_DISPLAY_CHARS: usize = 40;

impl ReceiptReport {
    pub fn display_as_table(&self) -> String {
        let home = &self.home_currency;

        let mut output = format!(
            "Receipt: {}\n\n",
            ui::style_text(&self.receipt_id, ui::StyleType::Title)
        );

        if self.conversions.is_empty() {
            output.push_str(&ui::style_text(
                "No amounts found in receipt text",
                ui::StyleType::Warning,
            ));
            return output;
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Amount"),
            ui::header_cell("Currency"),
            ui::header_cell("Rate"),
            ui::header_cell("Source"),
            ui::header_cell(&format!("Converted ({home})")),
            ui::header_cell("Context"),
        ]);

        for record in &self.conversions {
            table.add_row(vec![
                ui::amount_cell(record.original_amount),
                Cell::new(&record.original_currency),
                ui::amount_cell(record.exchange_rate),
                ui::rate_source_cell(record.rate_source),
                ui::amount_cell(record.converted_amount),
                Cell::new(display_context(&record.context)),
            ]);
        }
        output.push_str(&table.to_string());

        if !self.detected_currencies.is_empty() {
            output.push_str(&format!(
                "\n\n{}",
                ui::style_text(
                    &format!("Detected currencies: {}", self.detected_currencies.join(", ")),
                    ui::StyleType::Subtle
                )
            ));
        }

        if self.summary.duplicates_skipped > 0 {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!(
                        "{} repeated amount(s) left out of the total",
                        self.summary.duplicates_skipped
                    ),
                    ui::StyleType::Subtle
                )
            ));
        }

        output.push_str(&format!(
            "\n\nTotal ({}): {}",
            ui::style_text(home, ui::StyleType::TotalLabel),
            ui::style_text(
                &format!("{:.2}", self.summary.total_converted),
                ui::StyleType::TotalValue
            )
        ));
        output.push_str(&format!(
            "\n{}",
            ui::style_text(&self.summary.comparison_message(), ui::StyleType::Subtle)
        ));

        output
    }
}

fn display_context(context: &str) -> String {
    let flat = context.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > CONTEXT_DISPLAY_CHARS {
        let cut: String = flat.chars().take(CONTEXT_DISPLAY_CHARS).collect();
        format!("{cut}…")
    } else {
        flat
    }
}

/// Reads receipt text from a file, or stdin when no path or `-` is given.
pub fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read receipt text: {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read receipt text from stdin")?;
            Ok(text)
        }
    }
}

fn default_receipt_id(input: Option<&Path>) -> String {
    input
        .filter(|path| *path != Path::new("-"))
        .and_then(|path| path.file_stem())
        .map_or("stdin".to_string(), |stem| stem.to_string_lossy().into_owned())
}

pub async fn run(
    processor: &ReceiptProcessor,
    input: Option<&Path>,
    receipt_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let text = read_input(input)?;
    let receipt_id = receipt_id.map_or_else(|| default_receipt_id(input), str::to_string);

    let report = if json {
        processor.process(&receipt_id, &text).await
    } else {
        let spinner = ui::new_spinner("Converting amounts...");
        let report = processor.process(&receipt_id, &text).await;
        spinner.finish_and_clear();
        report
    };

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize receipt report")?;
        println!("{rendered}");
    } else {
        println!("{}", report.display_as_table());
    }
    Ok(())
}
