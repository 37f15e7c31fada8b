use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::converter::{convert_bid, job_cost_codes};
use crate::error::Result;
use crate::fmt::money_opt;
use crate::models::JobCard;
use crate::settings::load_settings;
use crate::store::{Filter, Order, Store};

pub fn convert(bid_id: i64) -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings)?;
    let job = convert_bid(&store, bid_id, &settings.session())?;
    let codes = job_cost_codes(&store, job.id)?;
    println!(
        "{}",
        format!("\u{2192} Created job {} ({}) with {} cost codes", job.job_number, job.job_name, codes.len())
            .green()
    );
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store(&load_settings())?;
    let jobs = store
        .select("jobs", &Filter::all(), &[Order::desc("created_at"), Order::desc("id")])?
        .into_iter()
        .map(JobCard::from_row)
        .collect::<Result<Vec<_>>>()?;

    if jobs.is_empty() {
        println!("No jobs yet. Convert a won bid with `hydrops jobs convert <bid-id>`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Job #", "Name", "Client", "Status", "Contract", "Start"]);
    for job in &jobs {
        table.add_row(vec![
            Cell::new(job.id),
            Cell::new(&job.job_number),
            Cell::new(&job.job_name),
            Cell::new(&job.client_name),
            Cell::new(&job.status),
            Cell::new(money_opt(job.contract_value)),
            Cell::new(job.start_date.as_deref().unwrap_or_default()),
        ]);
    }
    println!("Jobs\n{table}");
    Ok(())
}

pub fn show(id: i64) -> Result<()> {
    let store = open_store(&load_settings())?;
    let Some(row) = store.find_by_id("jobs", id)? else {
        println!("Job {id} not found. See `hydrops jobs list`.");
        return Ok(());
    };
    let job = JobCard::from_row(row)?;

    println!("{} {}", job.job_number.bold(), job.job_name);
    println!("  Client:    {}", job.client_name);
    println!("  Location:  {}", job.location.as_deref().unwrap_or("-"));
    println!("  Contract:  {}", money_opt(job.contract_value));
    println!("  Start:     {}", job.start_date.as_deref().unwrap_or("-"));
    println!("  Status:    {}", job.status);
    if let Some(bid_id) = job.bid_id {
        println!("  From bid:  #{bid_id} (`hydrops bids show {bid_id}`)");
    }
    if let Some(by) = &job.created_by {
        println!("  Created by {by}");
    }

    let codes = job_cost_codes(&store, job.id)?;
    let mut table = Table::new();
    table.set_header(vec!["Code", "Name", "Description"]);
    for code in &codes {
        table.add_row(vec![
            Cell::new(&code.code),
            Cell::new(&code.name),
            Cell::new(code.description.as_deref().unwrap_or_default()),
        ]);
    }
    println!("\nCost codes\n{table}");
    Ok(())
}
