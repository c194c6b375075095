//! Search provider abstraction.
//!
//! This module provides a `SearchProvider` trait for third-party search
//! backends and a `SearchAggregator` that fans a query out to all of them.

mod aggregate;
mod jackett;
mod types;

pub use aggregate::SearchAggregator;
pub use jackett::JackettProvider;
pub use types::*;
