//! Where the umbrella chart comes from.
//!
//! A chart argument can be a local directory, a local archive, a repository
//! reference (`stable/umbrella`) or an absolute URL. Anything that is not a
//! directory is unpacked into a private temp dir so it can be read; helm is
//! later pointed at whatever it can install from directly.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

use crate::error::{ChartError, ConfigError};
use crate::infrastructure::{archive, helm::HelmClient};

/// Classified chart reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartSource {
    Directory(PathBuf),
    Archive(PathBuf),
    Url(String),
    Repository(String),
}

pub(crate) fn is_archive_name(name: &str) -> bool {
    name.ends_with(".tgz") || name.ends_with(".tar.gz")
}

fn is_url(reference: &str) -> bool {
    reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("oci://")
}

impl ChartSource {
    pub fn classify(reference: &str) -> Self {
        if is_url(reference) {
            return Self::Url(reference.to_string());
        }
        let path = Path::new(reference);
        if path.is_dir() {
            Self::Directory(path.to_path_buf())
        } else if path.exists() || is_archive_name(reference) {
            Self::Archive(path.to_path_buf())
        } else {
            Self::Repository(reference.to_string())
        }
    }

    /// `--version` only makes sense when the chart is fetched from a repository
    pub fn check_version(&self, version: Option<&str>) -> Result<(), ConfigError> {
        if version.map_or(true, str::is_empty) {
            return Ok(());
        }
        let source_kind = match self {
            Self::Archive(_) => "chart archive",
            Self::Directory(_) => "chart directory",
            Self::Url(_) => "chart URL",
            Self::Repository(_) => return Ok(()),
        };
        Err(ConfigError::VersionWithLocalChart {
            source_kind: source_kind.to_string(),
        })
    }

    /// Make the chart readable on local disk
    pub async fn materialize(&self, helm: &HelmClient, version: Option<&str>) -> Result<LocalChart, ChartError> {
        match self {
            Self::Directory(dir) => {
                info!("Processing chart from local directory \"{}\"...", dir.display());
                Ok(LocalChart {
                    dir: dir.clone(),
                    install_ref: dir.display().to_string(),
                    _workspace: None,
                })
            }
            Self::Archive(path) => {
                info!("Processing chart from local file \"{}\"...", path.display());
                let workspace = workspace()?;
                let dir = archive::unpack_chart(path, workspace.path()).await?;
                Ok(LocalChart {
                    dir,
                    install_ref: path.display().to_string(),
                    _workspace: Some(workspace),
                })
            }
            Self::Url(reference) | Self::Repository(reference) => {
                match version {
                    Some(v) => info!("Fetching chart \"{}\" version \"{}\"...", reference, v),
                    None => info!("Fetching chart \"{}\"...", reference),
                }
                let workspace = workspace()?;
                let dir = helm.pull(reference, version, workspace.path()).await?;
                Ok(LocalChart {
                    install_ref: dir.display().to_string(),
                    dir,
                    _workspace: Some(workspace),
                })
            }
        }
    }
}

fn workspace() -> Result<TempDir, ChartError> {
    tempfile::Builder::new()
        .prefix("spray-")
        .tempdir()
        .map_err(|e| ChartError::Read {
            path: std::env::temp_dir().display().to_string(),
            message: e.to_string(),
        })
}

/// A chart available on local disk for the duration of the run
#[derive(Debug)]
pub struct LocalChart {
    /// Unpacked chart directory
    pub dir: PathBuf,
    /// What `helm upgrade` is given as chart argument
    pub install_ref: String,
    _workspace: Option<TempDir>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("umbrella-1.0.0.tgz");
        std::fs::write(&archive, b"not really gzip").unwrap();

        assert_eq!(
            ChartSource::classify(&dir.path().display().to_string()),
            ChartSource::Directory(dir.path().to_path_buf())
        );
        assert_eq!(
            ChartSource::classify(&archive.display().to_string()),
            ChartSource::Archive(archive.clone())
        );
        assert_eq!(
            ChartSource::classify("oci://registry.example.com/charts/umbrella"),
            ChartSource::Url("oci://registry.example.com/charts/umbrella".to_string())
        );
        assert_eq!(
            ChartSource::classify("stable/umbrella"),
            ChartSource::Repository("stable/umbrella".to_string())
        );
    }

    #[test]
    fn test_version_only_with_repository() {
        let repo = ChartSource::Repository("stable/umbrella".to_string());
        assert!(repo.check_version(Some("1.0.0")).is_ok());

        let url = ChartSource::Url("https://example.com/umbrella.tgz".to_string());
        assert_eq!(
            url.check_version(Some("1.0.0")),
            Err(ConfigError::VersionWithLocalChart {
                source_kind: "chart URL".to_string()
            })
        );

        let dir = ChartSource::Directory(PathBuf::from("."));
        assert!(dir.check_version(Some("1.0.0")).is_err());
        assert!(dir.check_version(None).is_ok());
        assert!(dir.check_version(Some("")).is_ok());
    }
}
