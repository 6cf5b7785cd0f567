//! Helm client
//!
//! Every release operation goes through the `helm` binary. Output is requested
//! as JSON; older helm builds that ignore `-o json` on upgrade still print a
//! `STATUS:` line, which is used as a fallback.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::debug;

use crate::domain::release::{ReleaseInfo, ReleaseOutcome, UpgradeRequest};
use crate::error::{ChartError, ReleaseError};
use crate::infrastructure::archive;
use crate::services::driver::ReleaseBackend;
use crate::tools::{get_tool_path, tools::HELM};

/// Client for helm operations
#[derive(Debug, Clone)]
pub struct HelmClient {
    binary: String,
}

impl Default for HelmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HelmClient {
    /// Create a client resolving `helm` through `HELM_BIN` or PATH
    pub fn new() -> Self {
        Self {
            binary: get_tool_path(HELM),
        }
    }

    async fn run(&self, args: &[String]) -> std::io::Result<std::process::Output> {
        debug!("{} {}", self.binary, args.join(" "));
        Command::new(&self.binary).args(args).output().await
    }

    /// `helm pull --untar` into `dest`, returning the unpacked chart directory
    pub async fn pull(&self, reference: &str, version: Option<&str>, dest: &Path) -> Result<PathBuf, ChartError> {
        let mut args = vec![
            "pull".to_string(),
            reference.to_string(),
            "--untar".to_string(),
            "--untardir".to_string(),
            dest.display().to_string(),
        ];
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            args.push("--version".to_string());
            args.push(version.to_string());
        }

        let output = self.run(&args).await.map_err(|e| ChartError::Fetch {
            chart: reference.to_string(),
            message: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(ChartError::Fetch {
                chart: reference.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        archive::find_chart_dir(dest)
            .await
            .ok_or_else(|| ChartError::Fetch {
                chart: reference.to_string(),
                message: "pulled archive holds no Chart.yaml".to_string(),
            })
    }
}

/// Arguments of `helm upgrade --install` for one request
pub fn upgrade_args(request: &UpgradeRequest) -> Vec<String> {
    let mut args = vec![
        "upgrade".to_string(),
        "--install".to_string(),
        request.release_name.clone(),
        request.chart.clone(),
        "--namespace".to_string(),
        request.namespace.clone(),
        "--timeout".to_string(),
        format!("{}s", request.timeout.as_secs()),
        "-o".to_string(),
        "json".to_string(),
    ];

    for file in &request.value_files {
        args.push("-f".to_string());
        args.push(file.clone());
    }
    for value in &request.set_values {
        args.push("--set".to_string());
        args.push(value.clone());
    }
    for value in &request.string_values {
        args.push("--set-string".to_string());
        args.push(value.clone());
    }
    for value in &request.file_values {
        args.push("--set-file".to_string());
        args.push(value.clone());
    }

    let flags = &request.flags;
    let switches = [
        (flags.reset_values, "--reset-values"),
        (flags.reuse_values, "--reuse-values"),
        (flags.force, "--force"),
        (flags.dry_run, "--dry-run"),
        (flags.create_namespace, "--create-namespace"),
        (flags.debug, "--debug"),
    ];
    args.extend(
        switches
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| flag.to_string()),
    );

    args
}

#[derive(Debug, Deserialize)]
struct ReleaseJson {
    #[serde(default)]
    info: Option<ReleaseInfoJson>,
    #[serde(default)]
    manifest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfoJson {
    #[serde(default)]
    status: Option<String>,
}

fn status_line() -> &'static Regex {
    static STATUS: OnceLock<Regex> = OnceLock::new();
    STATUS.get_or_init(|| Regex::new(r"(?m)^STATUS:\s*(\S+)").expect("static regex"))
}

/// Read status and manifest from `helm upgrade` stdout
pub fn parse_upgrade_output(stdout: &str) -> ReleaseOutcome {
    if let Ok(release) = serde_json::from_str::<ReleaseJson>(stdout.trim()) {
        return ReleaseOutcome {
            status: release.info.and_then(|i| i.status),
            manifest: release.manifest,
        };
    }

    let status = status_line()
        .captures(stdout)
        .map(|c| c[1].to_string());
    let manifest = stdout.split_once("\nMANIFEST:\n").map(|(_, rest)| {
        rest.split_once("\nNOTES:")
            .map_or(rest, |(manifest, _)| manifest)
            .to_string()
    });
    ReleaseOutcome { status, manifest }
}

#[async_trait]
impl ReleaseBackend for HelmClient {
    async fn upgrade_install(&self, request: &UpgradeRequest) -> Result<ReleaseOutcome, ReleaseError> {
        let output = self
            .run(&upgrade_args(request))
            .await
            .map_err(|e| ReleaseError::UpgradeFailed {
                release: request.release_name.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ReleaseError::UpgradeFailed {
                release: request.release_name.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_upgrade_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn list_releases(&self, namespace: &str) -> Result<Vec<ReleaseInfo>, ReleaseError> {
        let args: Vec<String> = ["list", "--namespace", namespace, "-o", "json"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let failed = |message: String| ReleaseError::ListFailed {
            namespace: namespace.to_string(),
            message,
        };

        let output = self.run(&args).await.map_err(|e| failed(e.to_string()))?;
        if !output.status.success() {
            return Err(failed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(stdout.trim()).map_err(|e| failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HelmFlags;
    use std::time::Duration;

    fn request() -> UpgradeRequest {
        UpgradeRequest {
            release_name: "prod-db".to_string(),
            chart: "./umbrella".to_string(),
            namespace: "prod".to_string(),
            value_files: vec!["extra.yaml".to_string()],
            set_values: vec![
                "db.replicas=2".to_string(),
                "api.enabled=false,db.enabled=true".to_string(),
            ],
            string_values: vec![],
            file_values: vec![],
            flags: HelmFlags::default(),
            timeout: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_upgrade_args_order() {
        let args = upgrade_args(&request());
        assert_eq!(
            &args[..10],
            &[
                "upgrade", "--install", "prod-db", "./umbrella", "--namespace", "prod", "--timeout",
                "300s", "-o", "json"
            ]
        );
        let set_positions: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--set")
            .map(|(i, _)| i)
            .collect();
        // user overrides first, toggles last
        assert_eq!(args[set_positions[0] + 1], "db.replicas=2");
        assert_eq!(args[set_positions[1] + 1], "api.enabled=false,db.enabled=true");
        assert!(!args.contains(&"--dry-run".to_string()));
    }

    #[test]
    fn test_upgrade_args_forward_flags() {
        let mut req = request();
        req.flags = HelmFlags {
            dry_run: true,
            force: true,
            create_namespace: true,
            ..Default::default()
        };
        let args = upgrade_args(&req);
        assert!(args.contains(&"--dry-run".to_string()));
        assert!(args.contains(&"--force".to_string()));
        assert!(args.contains(&"--create-namespace".to_string()));
        assert!(!args.contains(&"--debug".to_string()));
    }

    #[test]
    fn test_parse_json_output() {
        let stdout = r#"{"name":"prod-db","info":{"status":"deployed"},"manifest":"kind: Deployment\nmetadata:\n  name: db\n"}"#;
        let outcome = parse_upgrade_output(stdout);
        assert_eq!(outcome.status.as_deref(), Some("deployed"));
        assert!(outcome.manifest.unwrap().contains("name: db"));
    }

    #[test]
    fn test_parse_legacy_text_output() {
        let stdout = "Release \"db\" has been upgraded.\nNAME: db\nSTATUS: failed\nMANIFEST:\nkind: Job\nmetadata:\n  name: m\n\nNOTES:\nbye\n";
        let outcome = parse_upgrade_output(stdout);
        assert_eq!(outcome.status.as_deref(), Some("failed"));
        assert_eq!(outcome.manifest.as_deref(), Some("kind: Job\nmetadata:\n  name: m\n"));
    }

    #[test]
    fn test_parse_output_without_status() {
        assert_eq!(parse_upgrade_output("nothing useful"), ReleaseOutcome::default());
    }
}
