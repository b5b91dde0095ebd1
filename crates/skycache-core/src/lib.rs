//! # skycache core
//!
//! Runtime-agnostic logic for skycache: the flight data model, filter
//! semantics, structured path expressions, store key naming, result
//! normalization, and the [`store::DocumentStore`] abstraction with an
//! in-memory backend.
//!
//! This crate contains no tokio, sqlx, or network dependencies.

pub mod filter;
pub mod keys;
pub mod models;
pub mod normalize;
pub mod path;
pub mod store;

pub use filter::FlightFilter;
pub use keys::KeySpace;
pub use path::JsonPath;
pub use store::DocumentStore;
