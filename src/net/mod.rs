//! HTTP layer: request execution, error normalization and endpoint helpers.

pub mod api;
pub mod error;
pub mod executor;
