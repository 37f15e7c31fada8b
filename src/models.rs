use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HydroError, Result};
use crate::store::Row;

/// Pipeline stage of a bid. Variant order is the board's column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Draft,
    Submitted,
    Won,
    Lost,
    Cancelled,
}

impl BidStatus {
    pub const ALL: [BidStatus; 5] = [
        BidStatus::Draft,
        BidStatus::Submitted,
        BidStatus::Won,
        BidStatus::Lost,
        BidStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Won => "Won",
            Self::Lost => "Lost",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Lost and cancelled bids are closed out and cannot become jobs.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Lost | Self::Cancelled)
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidStatus {
    type Err = HydroError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == key)
            .ok_or_else(|| HydroError::UnknownStatus(s.to_string()))
    }
}

/// Normalized projection of one imported row/element, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedBid {
    pub bid_number: String,
    pub project_name: String,
    pub client_name: String,
    pub client_contact: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub estimated_value: Option<f64>,
    pub estimated_duration_days: Option<i64>,
    pub status: BidStatus,
}

impl ImportedBid {
    pub fn to_row(&self) -> Result<Row> {
        into_row(self)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub bid_number: String,
    pub project_name: String,
    #[serde(default)]
    pub client_name: String,
    pub client_contact: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub estimated_value: Option<f64>,
    pub estimated_duration_days: Option<i64>,
    pub status: BidStatus,
    pub created_at: Option<String>,
}

impl Bid {
    pub fn from_row(row: Row) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(row))?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobCard {
    pub id: i64,
    pub job_number: String,
    pub job_name: String,
    #[serde(default)]
    pub client_name: String,
    pub location: Option<String>,
    pub bid_id: Option<i64>,
    pub contract_value: Option<f64>,
    pub status: String,
    pub start_date: Option<String>,
    pub created_by: Option<String>,
}

impl JobCard {
    pub fn from_row(row: Row) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(row))?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CostCode {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

impl CostCode {
    pub fn from_row(row: Row) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(row))?)
    }
}

pub(crate) fn into_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(HydroError::Other(format!("expected a record, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("Won".parse::<BidStatus>().unwrap(), BidStatus::Won);
        assert_eq!(" submitted ".parse::<BidStatus>().unwrap(), BidStatus::Submitted);
        assert!(matches!(
            "archived".parse::<BidStatus>(),
            Err(HydroError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_status_column_order() {
        let mut statuses = vec![BidStatus::Lost, BidStatus::Draft, BidStatus::Won];
        statuses.sort();
        assert_eq!(statuses, vec![BidStatus::Draft, BidStatus::Won, BidStatus::Lost]);
    }

    #[test]
    fn test_imported_bid_row_uses_lowercase_status() {
        let bid = ImportedBid {
            bid_number: "BID-1".into(),
            project_name: "Deck".into(),
            client_name: String::new(),
            client_contact: None,
            client_email: None,
            client_phone: None,
            location: None,
            description: None,
            estimated_value: Some(10.5),
            estimated_duration_days: None,
            status: BidStatus::Draft,
        };
        let row = bid.to_row().unwrap();
        assert_eq!(row["status"], json!("draft"));
        assert_eq!(row["estimated_value"], json!(10.5));
        assert!(row["location"].is_null());
    }

    #[test]
    fn test_bid_from_row() {
        let row = json!({
            "id": 7,
            "bid_number": "BID-7",
            "project_name": "Parking Garage",
            "client_name": "City",
            "client_contact": null,
            "client_email": null,
            "client_phone": null,
            "location": "Level 2",
            "description": null,
            "estimated_value": 1200.0,
            "estimated_duration_days": 4,
            "status": "submitted",
            "created_at": "2025-01-01 00:00:00"
        });
        let serde_json::Value::Object(map) = row else { unreachable!() };
        let bid = Bid::from_row(map).unwrap();
        assert_eq!(bid.id, 7);
        assert_eq!(bid.status, BidStatus::Submitted);
        assert_eq!(bid.estimated_duration_days, Some(4));
    }
}
