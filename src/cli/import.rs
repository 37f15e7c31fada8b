use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::error::Result;
use crate::fmt::{days, money_opt};
use crate::importer::{import_file, preview_file, ParsedBids};
use crate::settings::load_settings;

pub fn run(file: &str, format: Option<&str>, dry_run: bool) -> Result<()> {
    let file_path = PathBuf::from(file);

    if dry_run {
        let (format, parsed) = preview_file(&file_path, format)?;
        println!("{} ({})", file_path.display(), format.name());
        print_preview(&parsed);
        return Ok(());
    }

    let settings = load_settings();
    let store = open_store(&settings)?;
    let result = import_file(&store, &file_path, format, &settings.session())?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!("{} bids imported as drafts ({})", result.imported, result.format.key());
    if result.skipped > 0 {
        println!(
            "{}",
            format!(
                "{} rows skipped: missing bid number or project name",
                result.skipped
            )
            .yellow()
        );
    }
    Ok(())
}

fn print_preview(parsed: &ParsedBids) {
    let mut table = Table::new();
    table.set_header(vec!["Bid #", "Project", "Client", "Location", "Value", "Duration"]);
    for bid in &parsed.records {
        table.add_row(vec![
            Cell::new(&bid.bid_number),
            Cell::new(&bid.project_name),
            Cell::new(&bid.client_name),
            Cell::new(bid.location.as_deref().unwrap_or_default()),
            Cell::new(money_opt(bid.estimated_value)),
            Cell::new(days(bid.estimated_duration_days)),
        ]);
    }
    println!("{table}");
    println!("{} bids ready to import", parsed.records.len());
    if parsed.skipped > 0 {
        println!(
            "{}",
            format!("{} rows would be skipped: missing bid number or project name", parsed.skipped)
                .yellow()
        );
    }
}
