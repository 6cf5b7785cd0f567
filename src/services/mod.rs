//! Services layer - orchestration logic
//!
//! This module coordinates between domain logic and infrastructure.
//! Services only see their collaborators through the traits declared here,
//! so the scheduling core runs the same against helm and against test fakes.

pub mod driver;
pub mod prober;
pub mod scheduler;
pub mod spray_service;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use prober::StatusProber;
pub use spray_service::{SprayPlan, SprayService};
