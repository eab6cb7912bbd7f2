//! Common types and utilities shared across the Landsat STAC crates.

pub mod bbox;
pub mod error;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{StacError, StacResult};
pub use time::{DateRange, TimeParseError};
