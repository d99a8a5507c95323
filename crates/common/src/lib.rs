pub mod address;
pub mod chains;
pub mod config;
pub mod error;
pub mod observability;
pub mod types;
