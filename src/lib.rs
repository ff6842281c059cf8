pub mod config;
pub mod datasets;
mod error;
pub use error::{Error, Result};
pub mod graph;
pub mod models;
pub mod trainer;
pub mod utils;
