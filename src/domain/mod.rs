//! Domain layer - pure business logic
//!
//! This module contains business logic with no external I/O.
//! Types and functions here can be unit tested without mocking.

pub mod manifest;
pub mod release;
pub mod unit;
pub mod wave;
pub mod workload;

