//! Bid pipeline board: bids partitioned into one column per status.
//!
//! A move is applied to the in-memory columns first and then persisted. If the store
//! rejects the status change the columns are restored from the snapshot taken before
//! the move, and the failure is kept in [`Mutation::Failed`] until acknowledged.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{HydroError, Result};
use crate::models::{into_row, Bid, BidStatus};
use crate::store::{Filter, Order, Store};

pub type Columns = BTreeMap<BidStatus, Vec<Bid>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Idle,
    Pending { original: Columns },
    Failed { original: Columns, error: String },
}

/// A drag from one (column, position) to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: BidStatus,
    pub from_index: usize,
    pub to: BidStatus,
    pub to_index: usize,
}

impl Move {
    pub fn is_reorder(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub bid_id: i64,
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    columns: Columns,
    mutation: Mutation,
}

fn empty_columns() -> Columns {
    BidStatus::ALL.into_iter().map(|s| (s, Vec::new())).collect()
}

impl Board {
    /// Partitions bids by their status, keeping the given order within each column.
    pub fn from_bids(bids: impl IntoIterator<Item = Bid>) -> Self {
        let mut columns = empty_columns();
        for bid in bids {
            columns.entry(bid.status).or_default().push(bid);
        }
        Self {
            columns,
            mutation: Mutation::Idle,
        }
    }

    /// Loads every bid, newest first. Any manual ordering from a previous board is lost.
    pub fn load(store: &dyn Store) -> Result<Self> {
        let rows = store.select(
            "bids",
            &Filter::all(),
            &[Order::desc("created_at"), Order::desc("id")],
        )?;
        let bids = rows.into_iter().map(Bid::from_row).collect::<Result<Vec<_>>>()?;
        debug!(bids = bids.len(), "board loaded");
        Ok(Self::from_bids(bids))
    }

    pub fn column(&self, status: BidStatus) -> &[Bid] {
        self.columns.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column and position of a bid.
    pub fn locate(&self, bid_id: i64) -> Option<(BidStatus, usize)> {
        self.columns.iter().find_map(|(status, bids)| {
            bids.iter().position(|b| b.id == bid_id).map(|i| (*status, i))
        })
    }

    /// Applies a move to the columns only. The destination index is clamped to the column.
    pub fn apply(&mut self, mv: Move) -> Result<i64> {
        let source = self.columns.entry(mv.from).or_default();
        if mv.from_index >= source.len() {
            return Err(HydroError::InvalidMove(format!(
                "no bid at position {} in {}",
                mv.from_index + 1,
                mv.from
            )));
        }
        let mut bid = source.remove(mv.from_index);
        bid.status = mv.to;
        let id = bid.id;
        let target = self.columns.entry(mv.to).or_default();
        let at = mv.to_index.min(target.len());
        target.insert(at, bid);
        Ok(id)
    }

    /// Moves a bid and, when it changes column, persists the new status exactly once.
    pub fn move_bid(&mut self, store: &dyn Store, mv: Move) -> Result<MoveOutcome> {
        let original = self.columns.clone();
        let bid_id = self.apply(mv)?;

        if mv.is_reorder() {
            debug!(bid_id, column = %mv.from, "reordered within column");
            return Ok(MoveOutcome { bid_id, persisted: false });
        }

        self.mutation = Mutation::Pending { original };
        let patch = into_row(&json!({ "status": mv.to }))?;
        match store.update("bids", &patch, &Filter::id(bid_id)) {
            Ok(changed) => {
                if changed == 0 {
                    warn!(bid_id, "status change matched no rows");
                }
                info!(bid_id, from = %mv.from, to = %mv.to, "bid status changed");
                self.mutation = Mutation::Idle;
                Ok(MoveOutcome { bid_id, persisted: true })
            }
            Err(e) => {
                warn!(bid_id, error = %e, "status change failed, restoring board");
                if let Mutation::Pending { original } =
                    std::mem::replace(&mut self.mutation, Mutation::Idle)
                {
                    self.columns = original.clone();
                    self.mutation = Mutation::Failed {
                        original,
                        error: e.to_string(),
                    };
                }
                Err(e)
            }
        }
    }

    /// Moves a bid by id to the given column, at `position` or the top.
    pub fn move_bid_to(
        &mut self,
        store: &dyn Store,
        bid_id: i64,
        to: BidStatus,
        position: Option<usize>,
    ) -> Result<MoveOutcome> {
        let (from, from_index) = self.locate(bid_id).ok_or(HydroError::UnknownBid(bid_id))?;
        let mv = Move {
            from,
            from_index,
            to,
            to_index: position.unwrap_or(0),
        };
        self.move_bid(store, mv)
    }

    /// Clears a recorded failure.
    pub fn acknowledge(&mut self) {
        if matches!(self.mutation, Mutation::Failed { .. }) {
            self.mutation = Mutation::Idle;
        }
    }
}
