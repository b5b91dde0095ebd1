//! Flight query filters.
//!
//! A [`FlightFilter`] carries an optional airline IATA code and an optional
//! airport IATA code. Values are trimmed and upper-cased on construction;
//! blank values count as absent.
//!
//! The two dimensions are combined with **OR**: a record matches when its
//! airline matches the airline filter, or when either endpoint matches the
//! airport filter. With no filter at all every record matches.

use serde_json::Value;

use crate::models::FlightRecord;

/// Canonicalized airline/airport filter pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlightFilter {
    airline: Option<String>,
    airport: Option<String>,
}

fn canonical(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
}

impl FlightFilter {
    pub fn new(airline: Option<&str>, airport: Option<&str>) -> Self {
        Self {
            airline: canonical(airline),
            airport: canonical(airport),
        }
    }

    /// Filter that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn airline(&self) -> Option<&str> {
        self.airline.as_deref()
    }

    pub fn airport(&self) -> Option<&str> {
        self.airport.as_deref()
    }

    pub fn is_unfiltered(&self) -> bool {
        self.airline.is_none() && self.airport.is_none()
    }

    fn matches_codes(
        &self,
        airline: Option<&str>,
        departure: Option<&str>,
        arrival: Option<&str>,
    ) -> bool {
        if self.is_unfiltered() {
            return true;
        }
        let airline_hit = match (&self.airline, airline) {
            (Some(want), Some(have)) => want == have,
            _ => false,
        };
        let airport_hit = match &self.airport {
            Some(want) => departure == Some(want.as_str()) || arrival == Some(want.as_str()),
            None => false,
        };
        airline_hit || airport_hit
    }

    /// Match a typed record.
    pub fn matches(&self, record: &FlightRecord) -> bool {
        self.matches_codes(
            record.airline.iata.as_deref(),
            record.departure.iata.as_deref(),
            record.arrival.iata.as_deref(),
        )
    }

    /// Match a record held as raw JSON, without decoding its payload.
    pub fn matches_json(&self, record: &Value) -> bool {
        let code = |section: &str| {
            record
                .get(section)
                .and_then(|s| s.get("iata"))
                .and_then(Value::as_str)
        };
        self.matches_codes(code("airline"), code("departure"), code("arrival"))
    }

    /// Filter the `data` array of a canonical document, preserving order.
    ///
    /// Returns `None` when the document has no `data` array.
    pub fn apply_to_document(&self, document: &Value) -> Option<Vec<Value>> {
        let data = document.get("data")?.as_array()?;
        Some(
            data.iter()
                .filter(|record| self.matches_json(record))
                .cloned()
                .collect(),
        )
    }
}
