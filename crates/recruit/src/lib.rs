pub mod cache;
pub mod config;
pub mod error;
pub mod ids;
pub mod store;
pub mod telemetry;
pub mod workflows;

pub use error::AppError;
