//! Services for membership-service.

pub mod database;
pub mod metrics;

pub use database::{ActivationOutcome, Database, TokenCreditOutcome};
pub use metrics::{get_metrics, init_metrics};
