pub mod api;
pub mod args;
pub mod commands;
mod config;
mod context;
mod error;
pub mod export;
mod inputs;
pub mod ledger;
pub mod model;
pub mod publish;
pub mod render;
mod utils;


pub use api::Mode;
pub use config::{Config, ExtractorSettings, SheetsSettings};
pub use context::RunContext;
pub use error::Error;
pub use error::Result;
