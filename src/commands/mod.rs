//! Command implementations

pub mod spray;
