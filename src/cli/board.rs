use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::board::{Board, Mutation};
use crate::cli::{open_store, position_index};
use crate::error::Result;
use crate::fmt::money_opt;
use crate::models::BidStatus;
use crate::settings::load_settings;

pub fn show() -> Result<()> {
    let store = open_store(&load_settings())?;
    let board = Board::load(&store)?;
    print_board(&board);
    Ok(())
}

pub fn move_bid(id: i64, status: &str, position: Option<usize>) -> Result<()> {
    let to: BidStatus = status.parse()?;
    let store = open_store(&load_settings())?;
    let mut board = Board::load(&store)?;

    let outcome = match board.move_bid_to(&store, id, to, position_index(position)) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Mutation::Failed { .. } = board.mutation() {
                println!("{}", "Move not saved; board restored.".yellow());
                board.acknowledge();
                print_board(&board);
            }
            return Err(e);
        }
    };
    if outcome.persisted {
        println!("{}", format!("\u{2192} Bid {} moved to {}", outcome.bid_id, to.label()).green());
    } else {
        println!("Bid {} reordered within {} (order is not saved)", outcome.bid_id, to.label());
    }
    print_board(&board);
    Ok(())
}

fn print_board(board: &Board) {
    if board.is_empty() {
        println!("No bids yet. Import some with `hydrops import <file>`.");
        return;
    }
    let mut table = Table::new();
    table.set_header(
        BidStatus::ALL
            .iter()
            .map(|s| format!("{} ({})", s.label(), board.column(*s).len())),
    );
    let depth = BidStatus::ALL
        .iter()
        .map(|s| board.column(*s).len())
        .max()
        .unwrap_or(0);
    for i in 0..depth {
        table.add_row(BidStatus::ALL.iter().map(|s| match board.column(*s).get(i) {
            Some(bid) => Cell::new(format!(
                "#{} {}\n{}\n{}",
                bid.id,
                bid.bid_number,
                bid.project_name,
                money_opt(bid.estimated_value)
            )),
            None => Cell::new(""),
        }));
    }
    println!("{table}");
}
