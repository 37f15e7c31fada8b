use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::converter::delete_bid;
use crate::error::Result;
use crate::fmt::{days, money_opt};
use crate::models::{Bid, BidStatus};
use crate::settings::load_settings;
use crate::store::{Filter, Order, Store};

pub fn list(status: Option<&str>) -> Result<()> {
    let store = open_store(&load_settings())?;
    let filter = match status {
        Some(s) => Filter::eq("status", s.parse::<BidStatus>()?.as_str()),
        None => Filter::all(),
    };
    let bids = store
        .select("bids", &filter, &[Order::desc("created_at"), Order::desc("id")])?
        .into_iter()
        .map(Bid::from_row)
        .collect::<Result<Vec<_>>>()?;

    if bids.is_empty() {
        match status {
            Some(_) => println!("No bids with that status."),
            None => println!("No bids yet. Import some with `hydrops import <file>`."),
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Bid #", "Project", "Client", "Status", "Value"]);
    for bid in &bids {
        table.add_row(vec![
            Cell::new(bid.id),
            Cell::new(&bid.bid_number),
            Cell::new(&bid.project_name),
            Cell::new(&bid.client_name),
            Cell::new(bid.status.label()),
            Cell::new(money_opt(bid.estimated_value)),
        ]);
    }
    println!("Bids\n{table}");
    Ok(())
}

pub fn show(id: i64) -> Result<()> {
    let store = open_store(&load_settings())?;
    let Some(row) = store.find_by_id("bids", id)? else {
        println!("Bid {id} not found. See `hydrops bids list`.");
        return Ok(());
    };
    let bid = Bid::from_row(row)?;

    let dash = |v: Option<&str>| v.unwrap_or("-").to_string();
    println!("{} {}", bid.bid_number.bold(), bid.project_name);
    println!("  Status:    {}", bid.status.label());
    println!("  Client:    {}", if bid.client_name.is_empty() { "-" } else { bid.client_name.as_str() });
    println!("  Contact:   {}", dash(bid.client_contact.as_deref()));
    println!("  Email:     {}", dash(bid.client_email.as_deref()));
    println!("  Phone:     {}", dash(bid.client_phone.as_deref()));
    println!("  Location:  {}", dash(bid.location.as_deref()));
    println!("  Value:     {}", money_opt(bid.estimated_value));
    println!("  Duration:  {}", days(bid.estimated_duration_days));
    println!("  Created:   {}", dash(bid.created_at.as_deref()));
    if let Some(description) = &bid.description {
        println!("  Scope:     {description}");
    }
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let store = open_store(&load_settings())?;
    if !delete_bid(&store, id)? {
        println!("Bid {id} not found. See `hydrops bids list`.");
    } else {
        println!("Deleted bid {id}");
    }
    Ok(())
}
