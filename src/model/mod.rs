pub mod metrics;
pub mod user;
