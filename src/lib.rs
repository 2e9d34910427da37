pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod transform;

pub use config::Config;
pub use error::EtlError;
pub use pipeline::{Pipeline, PipelineOptions, RunSummary};
pub use store::WarehouseStore;
