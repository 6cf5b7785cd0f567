//! Runtime tool path resolution
//!
//! spray drives two external programs: `helm` for every release operation and
//! `tar` for unpacking local chart archives. Each is resolved the same way:
//!
//! 1. Check for an environment variable `{TOOL}_BIN` (e.g., `HELM_BIN`)
//! 2. Fall back to PATH-based invocation if the envvar is not set
//!
//! ```rust,ignore
//! use crate::tools::{get_tool_path, tools::HELM};
//! use tokio::process::Command;
//!
//! Command::new(get_tool_path(HELM))
//!     .args(["list", "-o", "json"])
//!     .output()
//!     .await?;
//! ```

use std::env;

use crate::error::ConfigError;

/// Get the path to an external tool
///
/// Checks for an environment variable `{TOOL}_BIN` (uppercase tool name + "_BIN").
/// Falls back to the tool name itself if the envvar is not set, which relies on PATH.
pub fn get_tool_path(tool: &str) -> String {
    env::var(tool_env_var(tool)).unwrap_or_else(|_| tool.to_string())
}

/// Name of the override variable for `tool`.
pub fn tool_env_var(tool: &str) -> String {
    format!("{}_BIN", tool.to_uppercase())
}

/// Fail fast when a tool can be found neither through its override variable
/// nor on PATH.
pub fn ensure_tool(tool: &str) -> Result<(), ConfigError> {
    let path = get_tool_path(tool);
    which::which(&path).map(|_| ()).map_err(|_| ConfigError::ToolNotFound {
        tool: tool.to_string(),
        env_var: tool_env_var(tool),
    })
}

/// Tool names used by spray
pub mod tools {
    pub const HELM: &str = "helm";
    pub const TAR: &str = "tar";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_get_tool_path_from_env() {
        env::set_var("SPRAY_TEST_TOOL_BIN", "/custom/path/to/spray-test-tool");
        assert_eq!(
            get_tool_path("spray_test_tool"),
            "/custom/path/to/spray-test-tool"
        );
        env::remove_var("SPRAY_TEST_TOOL_BIN");
    }

    #[test]
    fn test_get_tool_path_fallback() {
        env::remove_var("MISSING_TOOL_BIN");
        assert_eq!(get_tool_path("missing-tool"), "missing-tool");
    }

    #[test]
    fn test_ensure_tool_reports_override_variable() {
        let err = ensure_tool("definitely-not-an-installed-tool-4711").unwrap_err();
        assert_eq!(
            err,
            ConfigError::ToolNotFound {
                tool: "definitely-not-an-installed-tool-4711".to_string(),
                env_var: "DEFINITELY-NOT-AN-INSTALLED-TOOL-4711_BIN".to_string(),
            }
        );
    }
}
