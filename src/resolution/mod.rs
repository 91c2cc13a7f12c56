//! Column resolution: replace identifier columns with values looked up from
//! other tables while keeping the base query's rows and order.

pub mod pipeline;

pub use pipeline::{compile_with_resolution, ROW_ID};
