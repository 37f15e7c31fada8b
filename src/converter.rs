use serde_json::json;
use tracing::{info, warn};

use crate::error::{HydroError, Result};
use crate::models::{into_row, Bid, BidStatus, CostCode, JobCard};
use crate::settings::Session;
use crate::store::{Filter, Order, Store};

pub fn job_number_for(bid: &Bid) -> String {
    format!("JOB-{}", bid.bid_number)
}

/// Turns a bid into a job card.
///
/// The bid is marked won, then the job is inserted, then the active cost codes are
/// attached. These are separate writes: if the job insert fails the bid stays won.
pub fn convert_bid(store: &dyn Store, bid_id: i64, session: &Session) -> Result<JobCard> {
    let bid = store
        .find_by_id("bids", bid_id)?
        .map(Bid::from_row)
        .transpose()?
        .ok_or(HydroError::UnknownBid(bid_id))?;

    if bid.status.is_closed() {
        return Err(HydroError::InvalidMove(format!(
            "bid {} is {} and cannot become a job",
            bid.bid_number, bid.status
        )));
    }
    if !store.select("jobs", &Filter::eq("bid_id", bid_id), &[])?.is_empty() {
        return Err(HydroError::AlreadyConverted(bid.bid_number));
    }

    if bid.status != BidStatus::Won {
        store.update(
            "bids",
            &into_row(&json!({ "status": BidStatus::Won }))?,
            &Filter::id(bid_id),
        )?;
    }

    let row = into_row(&json!({
        "job_number": job_number_for(&bid),
        "job_name": bid.project_name,
        "client_name": bid.client_name,
        "location": bid.location,
        "bid_id": bid.id,
        "contract_value": bid.estimated_value,
        "status": "active",
        "start_date": chrono::Local::now().date_naive().format("%Y-%m-%d").to_string(),
        "created_by": session.author(),
    }))?;
    let inserted = match store.insert("jobs", &[row]) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(bid_id, error = %e, "job insert failed after bid was marked won");
            return Err(e);
        }
    };
    let job = inserted
        .into_iter()
        .next()
        .map(JobCard::from_row)
        .transpose()?
        .ok_or_else(|| HydroError::Other("job insert returned no row".to_string()))?;

    let codes = assign_default_cost_codes(store, job.id)?;
    info!(bid_id, job_id = job.id, cost_codes = codes, "bid converted to job");
    Ok(job)
}

/// Attaches every active cost code to a job. Returns how many were attached.
pub fn assign_default_cost_codes(store: &dyn Store, job_id: i64) -> Result<usize> {
    let codes = store.select("cost_codes", &Filter::eq("is_active", 1), &[Order::asc("code")])?;
    let rows = codes
        .iter()
        .filter_map(|c| c.get("id").and_then(|id| id.as_i64()))
        .map(|code_id| into_row(&json!({ "job_id": job_id, "cost_code_id": code_id })))
        .collect::<Result<Vec<_>>>()?;
    if rows.is_empty() {
        return Ok(0);
    }
    Ok(store.insert("job_cost_codes", &rows)?.len())
}

pub fn job_cost_codes(store: &dyn Store, job_id: i64) -> Result<Vec<CostCode>> {
    let links = store.select("job_cost_codes", &Filter::eq("job_id", job_id), &[Order::asc("id")])?;
    let mut codes = Vec::with_capacity(links.len());
    for link in links {
        let Some(code_id) = link.get("cost_code_id").and_then(|id| id.as_i64()) else {
            continue;
        };
        if let Some(row) = store.find_by_id("cost_codes", code_id)? {
            codes.push(CostCode::from_row(row)?);
        }
    }
    Ok(codes)
}

/// Deletes a bid unless a job was created from it. Returns false if the bid does not exist.
pub fn delete_bid(store: &dyn Store, bid_id: i64) -> Result<bool> {
    if let Some(job) = store.select("jobs", &Filter::eq("bid_id", bid_id), &[])?.into_iter().next() {
        let job = JobCard::from_row(job)?;
        return Err(HydroError::BidHasJob(bid_id, job.job_number));
    }
    let deleted = store.delete("bids", &Filter::id(bid_id))? > 0;
    if deleted {
        info!(bid_id, "bid deleted");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::store::SqliteStore;

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, SqliteStore::new(conn))
    }

    fn add_bid(store: &SqliteStore, status: &str) -> i64 {
        store
            .connection()
            .execute(
                "INSERT INTO bids (bid_number, project_name, client_name, location, estimated_value, status) \
                 VALUES ('B-9', 'Garage Deck', 'Acme', 'Level 3', 42000.0, ?1)",
                [status],
            )
            .unwrap();
        store.connection().last_insert_rowid()
    }

    fn session() -> Session {
        Session { user_name: "Dana".into() }
    }

    #[test]
    fn test_convert_marks_bid_won_and_creates_job() {
        let (_dir, store) = test_store();
        let bid_id = add_bid(&store, "submitted");
        let job = convert_bid(&store, bid_id, &session()).unwrap();
        assert_eq!(job.job_number, "JOB-B-9");
        assert_eq!(job.job_name, "Garage Deck");
        assert_eq!(job.client_name, "Acme");
        assert_eq!(job.location.as_deref(), Some("Level 3"));
        assert_eq!(job.contract_value, Some(42000.0));
        assert_eq!(job.bid_id, Some(bid_id));
        assert_eq!(job.status, "active");
        assert_eq!(job.created_by.as_deref(), Some("Dana"));

        let bid = Bid::from_row(store.find_by_id("bids", bid_id).unwrap().unwrap()).unwrap();
        assert_eq!(bid.status, BidStatus::Won);
    }

    #[test]
    fn test_convert_populates_cost_codes() {
        let (_dir, store) = test_store();
        let bid_id = add_bid(&store, "won");
        let job = convert_bid(&store, bid_id, &session()).unwrap();
        let codes = job_cost_codes(&store, job.id).unwrap();
        assert_eq!(codes.len(), 9);
        assert_eq!(codes[0].code, "01-100");
        assert!(codes.iter().any(|c| c.name == "Hydrodemolition"));
    }

    #[test]
    fn test_inactive_cost_codes_are_skipped() {
        let (_dir, store) = test_store();
        store
            .connection()
            .execute("UPDATE cost_codes SET is_active = 0 WHERE code = '07-700'", [])
            .unwrap();
        let bid_id = add_bid(&store, "won");
        let job = convert_bid(&store, bid_id, &session()).unwrap();
        let codes = job_cost_codes(&store, job.id).unwrap();
        assert_eq!(codes.len(), 8);
        assert!(codes.iter().all(|c| c.code != "07-700"));
    }

    #[test]
    fn test_convert_twice_is_rejected() {
        let (_dir, store) = test_store();
        let bid_id = add_bid(&store, "won");
        convert_bid(&store, bid_id, &session()).unwrap();
        let err = convert_bid(&store, bid_id, &session()).unwrap_err();
        assert!(matches!(err, HydroError::AlreadyConverted(_)));
    }

    #[test]
    fn test_closed_bids_cannot_convert() {
        let (_dir, store) = test_store();
        let bid_id = add_bid(&store, "lost");
        let err = convert_bid(&store, bid_id, &session()).unwrap_err();
        assert!(matches!(err, HydroError::InvalidMove(_)));
        assert!(store.select("jobs", &Filter::all(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_bid() {
        let (_dir, store) = test_store();
        let err = convert_bid(&store, 404, &session()).unwrap_err();
        assert!(matches!(err, HydroError::UnknownBid(404)));
    }

    #[test]
    fn test_anonymous_session_leaves_author_empty() {
        let (_dir, store) = test_store();
        let bid_id = add_bid(&store, "draft");
        let job = convert_bid(&store, bid_id, &Session::default()).unwrap();
        assert_eq!(job.created_by, None);
    }

    #[test]
    fn test_delete_bid() {
        let (_dir, store) = test_store();
        let bid_id = add_bid(&store, "draft");
        assert!(delete_bid(&store, bid_id).unwrap());
        assert!(store.find_by_id("bids", bid_id).unwrap().is_none());
        assert!(!delete_bid(&store, bid_id).unwrap());
    }

    #[test]
    fn test_converted_bid_cannot_be_deleted() {
        let (_dir, store) = test_store();
        let bid_id = add_bid(&store, "won");
        convert_bid(&store, bid_id, &session()).unwrap();
        let err = delete_bid(&store, bid_id).unwrap_err();
        assert!(matches!(err, HydroError::BidHasJob(id, ref job) if id == bid_id && job == "JOB-B-9"));
        assert!(store.find_by_id("bids", bid_id).unwrap().is_some());
    }
}
