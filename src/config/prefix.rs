//! Release name prefixing.

use crate::error::ConfigError;

/// How release names are derived from a unit's used name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReleasePrefix {
    /// `<usedName>`
    #[default]
    None,
    /// `<namespace>-<usedName>`
    Namespace,
    /// `<prefix>-<usedName>`
    Custom(String),
}

impl ReleasePrefix {
    /// Combine the two mutually exclusive CLI modes into one value
    pub fn from_flags(custom: Option<&str>, with_namespace: bool) -> Result<Self, ConfigError> {
        let custom = custom.filter(|p| !p.is_empty());
        match (custom, with_namespace) {
            (Some(_), true) => Err(ConfigError::ConflictingPrefixes),
            (Some(prefix), false) => {
                if !prefix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
                {
                    return Err(ConfigError::InvalidPrefix {
                        prefix: prefix.to_string(),
                    });
                }
                Ok(Self::Custom(prefix.to_string()))
            }
            (None, true) => Ok(Self::Namespace),
            (None, false) => Ok(Self::None),
        }
    }

    /// The literal string prepended to every used name (`""` when none)
    pub fn resolve(&self, namespace: &str) -> String {
        match self {
            Self::None => String::new(),
            Self::Namespace if namespace.is_empty() => String::new(),
            Self::Namespace => format!("{}-", namespace),
            Self::Custom(prefix) => format!("{}-", prefix),
        }
    }
}
