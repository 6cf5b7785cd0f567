//! Chart archive unpacking
//!
//! Packaged charts (`.tgz`) are gzip'ed tarballs holding a single top-level
//! directory named after the chart. They are unpacked with `tar`.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::ChartError;
use crate::tools::{get_tool_path, tools::TAR};

/// Unpack `archive` under `dest` and return the directory holding its
/// `Chart.yaml`.
pub async fn unpack_chart(archive: &Path, dest: &Path) -> Result<PathBuf, ChartError> {
    let tar = get_tool_path(TAR);
    debug!("{} -xzf {} -C {}", tar, archive.display(), dest.display());

    let output = Command::new(&tar)
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output()
        .await
        .map_err(|e| ChartError::Read {
            path: archive.display().to_string(),
            message: format!("failed to run {}: {}", tar, e),
        })?;

    if !output.status.success() {
        return Err(ChartError::Read {
            path: archive.display().to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    find_chart_dir(dest).await.ok_or_else(|| ChartError::NotFound {
        path: archive.display().to_string(),
    })
}

/// `dest` itself or its first child directory containing a `Chart.yaml`
pub(crate) async fn find_chart_dir(dest: &Path) -> Option<PathBuf> {
    if dest.join("Chart.yaml").exists() {
        return Some(dest.to_path_buf());
    }

    let mut entries = tokio::fs::read_dir(dest).await.ok()?;
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.is_dir() && path.join("Chart.yaml").exists() {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_chart_dir_in_child() {
        let dest = tempfile::tempdir().unwrap();
        let chart = dest.path().join("postgres");
        std::fs::create_dir_all(&chart).unwrap();
        std::fs::write(chart.join("Chart.yaml"), "name: postgres\n").unwrap();
        std::fs::create_dir_all(dest.path().join("unrelated")).unwrap();

        assert_eq!(find_chart_dir(dest.path()).await, Some(chart));
    }

    #[tokio::test]
    async fn test_find_chart_dir_missing() {
        let dest = tempfile::tempdir().unwrap();
        assert_eq!(find_chart_dir(dest.path()).await, None);
    }

    #[tokio::test]
    async fn test_unpack_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.tgz");
        std::fs::write(&archive, b"not a tarball").unwrap();
        let dest = tempfile::tempdir().unwrap();

        assert!(unpack_chart(&archive, dest.path()).await.is_err());
    }
}
