//! Structured path expressions for server-side filtered reads.
//!
//! A [`JsonPath`] selects elements of an array field of a stored document
//! whose nested string fields equal given values, OR-combined. It renders
//! to the RedisJSON/JSONPath dialect via `Display`, and stores that
//! cannot speak JSONPath can evaluate it directly with
//! [`JsonPath::select`] or compile the clauses into their own query
//! language.

use std::fmt;

use serde_json::Value;

use crate::filter::FlightFilter;

/// Equality clause: `@.<field...> == value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathClause {
    pub field: Vec<String>,
    pub value: String,
}

impl PathClause {
    fn new(field: &[&str], value: &str) -> Self {
        Self {
            field: field.iter().map(|s| s.to_string()).collect(),
            value: value.to_string(),
        }
    }

    fn holds(&self, element: &Value) -> bool {
        let mut cursor = element;
        for segment in &self.field {
            match cursor.get(segment) {
                Some(next) => cursor = next,
                None => return false,
            }
        }
        cursor.as_str() == Some(self.value.as_str())
    }

    /// SQLite JSON path for the field, relative to an array element.
    pub fn sqlite_path(&self) -> String {
        format!("$.{}", self.field.join("."))
    }
}

/// Filter over the elements of `$.<array>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    array: String,
    clauses: Vec<PathClause>,
}

impl JsonPath {
    /// Path equivalent to the OR predicate of a [`FlightFilter`].
    pub fn for_filter(filter: &FlightFilter) -> Self {
        let mut clauses = Vec::new();
        if let Some(airline) = filter.airline() {
            clauses.push(PathClause::new(&["airline", "iata"], airline));
        }
        if let Some(airport) = filter.airport() {
            clauses.push(PathClause::new(&["departure", "iata"], airport));
            clauses.push(PathClause::new(&["arrival", "iata"], airport));
        }
        Self {
            array: "data".to_string(),
            clauses,
        }
    }

    pub fn array(&self) -> &str {
        &self.array
    }

    /// Empty means "every element".
    pub fn clauses(&self) -> &[PathClause] {
        &self.clauses
    }

    /// Evaluate against a whole document.
    ///
    /// Returns `None` when the array field is missing or not an array.
    pub fn select(&self, document: &Value) -> Option<Vec<Value>> {
        let items = document.get(&self.array)?.as_array()?;
        Some(
            items
                .iter()
                .filter(|item| {
                    self.clauses.is_empty() || self.clauses.iter().any(|c| c.holds(item))
                })
                .cloned()
                .collect(),
        )
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "$.{}[*]", self.array);
        }
        let predicate = self
            .clauses
            .iter()
            .map(|c| format!("@.{}==\"{}\"", c.field.join("."), escape(&c.value)))
            .collect::<Vec<_>>()
            .join(" || ");
        write!(f, "$.{}[?({})]", self.array, predicate)
    }
}
