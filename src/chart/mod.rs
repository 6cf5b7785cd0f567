//! Umbrella chart loading
//!
//! Reads just enough of an unpacked chart to plan a spray: the dependency
//! declarations from `Chart.yaml`, the raw umbrella `values.yaml`, and the
//! metadata and default values of every sub-chart shipped under `charts/`.

pub mod source;

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ChartError;
use crate::infrastructure::archive;
use crate::values::Values;

pub use source::ChartSource;

/// `Chart.yaml`, reduced to the fields spray reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

/// One entry of `dependencies:`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

impl DependencySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Alias when declared, name otherwise
    pub fn used_name(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }
}

/// A sub-chart found under `charts/`
#[derive(Debug, Clone)]
pub struct SubChart {
    pub metadata: ChartMetadata,
    pub default_values: Values,
}

/// A loaded umbrella chart
#[derive(Debug, Clone)]
pub struct Chart {
    pub path: PathBuf,
    pub metadata: ChartMetadata,
    /// Umbrella `values.yaml` exactly as written (include clauses unexpanded)
    pub raw_values: String,
    pub subcharts: Vec<SubChart>,
}

impl Chart {
    /// Load an unpacked chart directory
    pub async fn load(dir: &Path) -> Result<Self, ChartError> {
        let metadata = read_metadata(dir).await?;
        let raw_values = read_optional(&dir.join("values.yaml")).await?.unwrap_or_default();
        let subcharts = load_subcharts(&dir.join("charts")).await?;

        debug!(
            "Loaded chart {} {} ({} dependencies, {} packaged sub-charts)",
            metadata.name,
            metadata.version,
            metadata.dependencies.len(),
            subcharts.len()
        );

        Ok(Self {
            path: dir.to_path_buf(),
            metadata,
            raw_values,
            subcharts,
        })
    }

    pub fn dependencies(&self) -> &[DependencySpec] {
        &self.metadata.dependencies
    }

    /// Sub-chart whose own `Chart.yaml` name is `name`
    pub fn subchart(&self, name: &str) -> Option<&SubChart> {
        self.subcharts.iter().find(|s| s.metadata.name == name)
    }

    /// `appVersion` of the sub-chart backing a dependency, if known
    pub fn app_version_of(&self, dependency: &DependencySpec) -> Option<String> {
        self.subchart(&dependency.name)
            .and_then(|s| s.metadata.app_version.clone())
    }

    /// Read a file of the chart by its chart-relative name. Paths escaping
    /// the chart directory resolve to `None`.
    pub fn read_file(&self, name: &str) -> Option<String> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }
        std::fs::read_to_string(self.path.join(relative)).ok()
    }

    /// Umbrella values with each dependency's defaults folded in under its
    /// used name; the umbrella's own settings win.
    pub fn coalesce(&self, mut umbrella: Values) -> Values {
        for dependency in self.dependencies() {
            if let Some(subchart) = self.subchart(&dependency.name) {
                umbrella.coalesce_defaults(dependency.used_name(), subchart.default_values.clone());
            }
        }
        umbrella
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, ChartError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ChartError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}

async fn read_metadata(dir: &Path) -> Result<ChartMetadata, ChartError> {
    let path = dir.join("Chart.yaml");
    let content = read_optional(&path).await?.ok_or_else(|| ChartError::NotFound {
        path: dir.display().to_string(),
    })?;
    serde_yaml::from_str(&content).map_err(|e| ChartError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

async fn load_subchart_dir(dir: &Path) -> Result<SubChart, ChartError> {
    let metadata = read_metadata(dir).await?;
    let values_path = dir.join("values.yaml");
    let default_values = match read_optional(&values_path).await? {
        Some(content) => Values::from_yaml_str(&content, &values_path.display().to_string())?,
        None => Values::new(),
    };
    Ok(SubChart {
        metadata,
        default_values,
    })
}

async fn load_subcharts(charts_dir: &Path) -> Result<Vec<SubChart>, ChartError> {
    let mut entries = match tokio::fs::read_dir(charts_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ChartError::Read {
                path: charts_dir.display().to_string(),
                message: e.to_string(),
            })
        }
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| ChartError::Read {
        path: charts_dir.display().to_string(),
        message: e.to_string(),
    })? {
        paths.push(entry.path());
    }
    // stable order regardless of directory listing order
    paths.sort();

    let mut subcharts = Vec::new();
    for path in paths {
        if path.is_dir() {
            if path.join("Chart.yaml").exists() {
                subcharts.push(load_subchart_dir(&path).await?);
            }
        } else if source::is_archive_name(&path.to_string_lossy()) {
            let workspace = tempfile::tempdir().map_err(|e| ChartError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            match archive::unpack_chart(&path, workspace.path()).await {
                Ok(unpacked) => subcharts.push(load_subchart_dir(&unpacked).await?),
                Err(e) => warn!("Ignoring sub-chart archive {}: {}", path.display(), e),
            }
        }
    }
    Ok(subcharts)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    /// Write a minimal umbrella chart with directory sub-charts
    pub fn write_umbrella(root: &Path, chart_yaml: &str, values_yaml: &str, subcharts: &[(&str, &str, &str)]) {
        std::fs::create_dir_all(root.join("charts")).unwrap();
        std::fs::write(root.join("Chart.yaml"), chart_yaml).unwrap();
        std::fs::write(root.join("values.yaml"), values_yaml).unwrap();
        for (name, app_version, values) in subcharts {
            let dir = root.join("charts").join(name);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("Chart.yaml"),
                format!("apiVersion: v2\nname: {}\nversion: 0.1.0\nappVersion: \"{}\"\n", name, app_version),
            )
            .unwrap();
            std::fs::write(dir.join("values.yaml"), values).unwrap();
        }
    }
}
