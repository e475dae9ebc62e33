pub mod batch;
pub mod config;
pub mod correlation;
pub mod errors;
pub mod resolve;
pub mod scoring;
pub mod types;
