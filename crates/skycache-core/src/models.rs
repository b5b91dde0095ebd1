//! Flight data model.
//!
//! These types describe the paginated envelope returned by the upstream
//! flights API and stored as the canonical document. Only the IATA codes
//! of the airline and the two endpoints take part in filtering; every
//! other field is carried through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pagination block of the upstream envelope. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub total: u64,
}

/// A full dataset as fetched from upstream and published as a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub data: Vec<FlightRecord>,
    /// Set by the publisher at write time, not by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
}

impl Dataset {
    /// An empty dataset, published when the upstream fetch fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_records(data: Vec<FlightRecord>) -> Self {
        let count = data.len() as u64;
        Self {
            pagination: Pagination {
                limit: count,
                offset: 0,
                count,
                total: count,
            },
            data,
            ingested_at: None,
        }
    }
}

/// One observed flight leg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    #[serde(default)]
    pub flight_date: Option<String>,
    #[serde(default)]
    pub flight_status: Option<String>,
    #[serde(default)]
    pub departure: Departure,
    #[serde(default)]
    pub arrival: Arrival,
    #[serde(default)]
    pub airline: Airline,
    #[serde(default)]
    pub flight: Flight,
    #[serde(default)]
    pub aircraft: Option<Value>,
    #[serde(default)]
    pub live: Option<Value>,
}

impl FlightRecord {
    /// Minimal record carrying only the fields used for filtering.
    pub fn route(airline: &str, departure: &str, arrival: &str) -> Self {
        Self {
            airline: Airline {
                iata: Some(airline.to_string()),
                ..Default::default()
            },
            departure: Departure {
                iata: Some(departure.to_string()),
                ..Default::default()
            },
            arrival: Arrival {
                iata: Some(arrival.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Departure side of a flight leg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    #[serde(default)]
    pub airport: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub iata: Option<String>,
    #[serde(default)]
    pub icao: Option<String>,
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub gate: Option<String>,
    /// Delay in minutes.
    #[serde(default)]
    pub delay: Option<i64>,
    #[serde(default)]
    pub scheduled: Option<String>,
    #[serde(default)]
    pub estimated: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
    #[serde(default)]
    pub estimated_runway: Option<String>,
    #[serde(default)]
    pub actual_runway: Option<String>,
}

/// Arrival side of a flight leg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    #[serde(default)]
    pub airport: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub iata: Option<String>,
    #[serde(default)]
    pub icao: Option<String>,
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub baggage: Option<String>,
    #[serde(default)]
    pub scheduled: Option<String>,
    #[serde(default)]
    pub estimated: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
    #[serde(default)]
    pub estimated_runway: Option<String>,
    #[serde(default)]
    pub actual_runway: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub iata: Option<String>,
    #[serde(default)]
    pub icao: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub iata: Option<String>,
    #[serde(default)]
    pub icao: Option<String>,
    #[serde(default)]
    pub codeshared: Option<Codeshare>,
}

/// The operating flight behind a marketed codeshare.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Codeshare {
    #[serde(default)]
    pub airline_name: Option<String>,
    #[serde(default)]
    pub airline_iata: Option<String>,
    #[serde(default)]
    pub airline_icao: Option<String>,
    #[serde(default)]
    pub flight_number: Option<String>,
    #[serde(default)]
    pub flight_iata: Option<String>,
    #[serde(default)]
    pub flight_icao: Option<String>,
}
