//! Infrastructure layer - external I/O adapters
//!
//! This module contains all code that interacts with external systems:
//! - Helm (upgrades, listing, chart pulls)
//! - Kubernetes API (workload status)
//! - tar (packaged charts)

pub mod archive;
pub mod helm;
pub mod kube_status;

// Re-export commonly used types
pub use helm::HelmClient;
pub use kube_status::KubeStatusSource;
