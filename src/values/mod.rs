//! Chart values: an untyped YAML tree with helm's merge semantics
//!
//! The umbrella chart defaults, each sub-chart's defaults, user value files and
//! `--set` style overrides all end up in one [`Values`] tree. The resolver only
//! ever reads two things from it: `<unit>.weight` and the `tags` table.

pub mod include;
pub mod strvals;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::config::ValuesOptions;
use crate::error::ChartError;

pub use strvals::OverrideKind;

/// Root of a values tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(Mapping);

impl Values {
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    /// Parse a values document. An empty or `null` document is an empty tree.
    pub fn from_yaml_str(content: &str, origin: &str) -> Result<Self, ChartError> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ChartError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        match value {
            Value::Null => Ok(Self::new()),
            Value::Mapping(map) => Ok(Self(map)),
            other => Err(ChartError::Parse {
                path: origin.to_string(),
                message: format!("expected a mapping at the top level, found {}", type_name(&other)),
            }),
        }
    }

    #[cfg(test)]
    pub fn mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn mapping_mut(&mut self) -> &mut Mapping {
        &mut self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a dot-separated path such as `backend.weight`
    pub fn path_value(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up a nested table by dot-separated path
    pub fn table(&self, path: &str) -> Option<&Mapping> {
        self.path_value(path).and_then(Value::as_mapping)
    }

    /// Deep-merge `other` on top of `self`; `other` wins on conflicts,
    /// nested tables are merged key by key.
    pub fn merge(&mut self, other: Values) {
        merge_mappings(&mut self.0, other.0);
    }

    /// Fold a sub-chart's defaults under `key`; values already present in
    /// `self` take precedence over the sub-chart defaults.
    pub fn coalesce_defaults(&mut self, key: &str, defaults: Values) {
        if defaults.is_empty() {
            return;
        }
        let mut merged = defaults.0;
        let key_value = Value::String(key.to_string());
        match self.0.remove(&key_value) {
            Some(Value::Mapping(existing)) => merge_mappings(&mut merged, existing),
            Some(Value::Null) | None => {}
            // a scalar in the parent replaces the whole sub-chart table
            Some(other) => {
                self.0.insert(key_value, other);
                return;
            }
        }
        self.0.insert(key_value, Value::Mapping(merged));
    }
}

impl From<Mapping> for Values {
    fn from(map: Mapping) -> Self {
        Self(map)
    }
}

fn merge_mappings(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                merge_mappings(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "table",
        Value::Tagged(_) => "tagged value",
    }
}

/// Read one `--values` source: a local file or an `http(s)` URL
pub async fn read_values_source(source: &str) -> Result<Values, ChartError> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        debug!("Fetching values file {}", source);
        let response = reqwest::get(source)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChartError::Read {
                path: source.to_string(),
                message: e.to_string(),
            })?;
        response.text().await.map_err(|e| ChartError::Read {
            path: source.to_string(),
            message: e.to_string(),
        })?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| ChartError::Read {
                path: source.to_string(),
                message: e.to_string(),
            })?
    };
    Values::from_yaml_str(&content, source)
}

/// Build the user-supplied part of the configuration: value files first,
/// then `--set`, `--set-string` and `--set-file`, each later source winning.
pub async fn user_overrides(opts: &ValuesOptions) -> Result<Values, ChartError> {
    let mut values = Values::new();

    for source in &opts.value_files {
        values.merge(read_values_source(source).await?);
    }
    for expression in &opts.values {
        strvals::parse_into(&mut values, expression, OverrideKind::Typed)?;
    }
    for expression in &opts.string_values {
        strvals::parse_into(&mut values, expression, OverrideKind::String)?;
    }
    for expression in &opts.file_values {
        strvals::parse_into(&mut values, expression, OverrideKind::File)?;
    }

    Ok(values)
}
