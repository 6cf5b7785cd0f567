//! # Spray Configuration
//!
//! One invocation is fully described by a [`SprayOptions`] value, assembled
//! from the command line and the environment helm exports to its plugins:
//!
//! - `HELM_NAMESPACE`: target namespace (default `default`)
//! - `HELM_DEBUG`: `1`, `true` or `on` turns on debug output
//!
//! Everything is in memory for the duration of one run; nothing is persisted.

mod options;
mod prefix;

pub use options::{HelmFlags, SprayOptions, ValuesOptions, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS};
pub use prefix::ReleasePrefix;

/// Namespace used when neither `--namespace` nor `HELM_NAMESPACE` is set
pub const DEFAULT_NAMESPACE: &str = "default";

/// Interpret a `HELM_DEBUG`-style switch
pub fn parse_debug_switch(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("on")
}

/// Whether helm asked its plugin for debug output
pub fn helm_debug_from_env() -> bool {
    std::env::var("HELM_DEBUG")
        .map(|v| parse_debug_switch(&v))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_switch_values() {
        assert!(parse_debug_switch("1"));
        assert!(parse_debug_switch("TRUE"));
        assert!(parse_debug_switch("On"));
        assert!(!parse_debug_switch("0"));
        assert!(!parse_debug_switch("yes"));
        assert!(!parse_debug_switch(""));
    }
}
