//! Unit resolution
//!
//! Turns the umbrella's dependency declarations, the merged values and the
//! target/exclude filters into the ordered list of deployable units. Everything
//! untyped in the values map (weights, tag switches) is coerced here and never
//! travels further.

use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::chart::DependencySpec;
use crate::error::{ConfigError, ValidationError};
use crate::values::{type_name, Values};

/// Reserved top-level values key holding tag switches
pub const TAGS_KEY: &str = "tags";

/// Which units the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetFilter {
    All,
    Only(Vec<String>),
    Except(Vec<String>),
}

impl TargetFilter {
    /// `--target` and `--exclude` are mutually exclusive
    pub fn new(targets: &[String], excludes: &[String]) -> Result<Self, ConfigError> {
        match (targets.is_empty(), excludes.is_empty()) {
            (false, false) => Err(ConfigError::TargetAndExclude),
            (false, true) => Ok(Self::Only(targets.to_vec())),
            (true, false) => Ok(Self::Except(excludes.to_vec())),
            (true, true) => Ok(Self::All),
        }
    }

    pub fn targets(&self, used_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|n| n == used_name),
            Self::Except(names) => !names.iter().any(|n| n == used_name),
        }
    }

    /// First filter name matching no unit, as the error to report
    pub fn unknown_name(&self, units: &[Unit]) -> Option<ValidationError> {
        let known = |name: &String| units.iter().any(|u| &u.used_name == name);
        match self {
            Self::All => None,
            Self::Only(names) => names
                .iter()
                .find(|n| !known(*n))
                .map(|n| ValidationError::UnknownTarget { name: n.clone() }),
            Self::Except(names) => names
                .iter()
                .find(|n| !known(*n))
                .map(|n| ValidationError::UnknownExclude { name: n.clone() }),
        }
    }
}

/// One sub-chart to deploy as its own release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub alias: Option<String>,
    /// Alias if declared, name otherwise
    pub used_name: String,
    pub weight: u32,
    pub release_name: String,
    pub targeted: bool,
    pub tags: Vec<String>,
    pub allowed_by_tags: bool,
    pub app_version: Option<String>,
}

impl Unit {
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn is_eligible(&self, wave: u32) -> bool {
        self.targeted && self.allowed_by_tags && self.weight == wave
    }

    /// `targeted` column of the verbose table
    pub fn targeting_label(&self) -> String {
        match (self.targeted, self.has_tags()) {
            (true, false) => "true".to_string(),
            (false, _) => "false".to_string(),
            (true, true) if self.allowed_by_tags => "true (tags match)".to_string(),
            (true, true) => "false (tags mismatch)".to_string(),
        }
    }
}

/// Resolve every declared dependency into a [`Unit`], in declaration order.
///
/// `app_version` looks up the informational version of a dependency's chart.
pub fn resolve_units<F>(
    dependencies: &[DependencySpec],
    values: &Values,
    filter: &TargetFilter,
    release_prefix: &str,
    app_version: F,
) -> Result<Vec<Unit>, ValidationError>
where
    F: Fn(&DependencySpec) -> Option<String>,
{
    let tags = values.table(TAGS_KEY);

    dependencies
        .iter()
        .map(|dependency| {
            let used_name = dependency.used_name().to_string();
            let weight = coerce_weight(&used_name, values.path_value(&format!("{}.weight", used_name)))?;
            Ok(Unit {
                name: dependency.name.clone(),
                alias: dependency.alias.clone().filter(|a| !a.is_empty()),
                weight,
                release_name: format!("{}{}", release_prefix, used_name),
                targeted: filter.targets(&used_name),
                tags: dependency.tags.clone(),
                allowed_by_tags: allowed_by_tags(&dependency.tags, tags),
                app_version: app_version(dependency),
                used_name,
            })
        })
        .collect()
}

/// Untagged units are always allowed; tagged ones need at least one tag
/// switched on with a YAML boolean `true`.
pub fn allowed_by_tags(unit_tags: &[String], switches: Option<&Mapping>) -> bool {
    if unit_tags.is_empty() {
        return true;
    }
    let Some(switches) = switches else {
        return false;
    };

    unit_tags.iter().any(|tag| match switches.get(tag.as_str()) {
        Some(Value::Bool(on)) => *on,
        Some(Value::String(s)) if s.contains("{{") => {
            warn!("Ignoring templated value \"{}\" for tag \"{}\"", s, tag);
            false
        }
        _ => false,
    })
}

/// Strict weight coercion: absent or null is 0, integers, integral floats and
/// numeric strings are accepted, anything else is a validation error.
pub fn coerce_weight(unit: &str, value: Option<&Value>) -> Result<u32, ValidationError> {
    let non_integer = |value: String| ValidationError::NonIntegerWeight {
        unit: unit.to_string(),
        value,
    };
    let from_i64 = |n: i64| -> Result<u32, ValidationError> {
        if n < 0 {
            return Err(ValidationError::NegativeWeight {
                unit: unit.to_string(),
                value: n,
            });
        }
        u32::try_from(n).map_err(|_| non_integer(n.to_string()))
    };
    let from_f64 = |f: f64| -> Result<u32, ValidationError> {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            from_i64(f as i64)
        } else {
            Err(non_integer(f.to_string()))
        }
    };

    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => from_i64(i),
            (None, Some(f)) => from_f64(f),
            (None, None) => Err(non_integer(n.to_string())),
        },
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                from_i64(i)
            } else if let Ok(f) = trimmed.parse::<f64>() {
                from_f64(f).map_err(|_| non_integer(s.clone()))
            } else {
                Err(non_integer(s.clone()))
            }
        }
        Some(Value::Bool(b)) => Err(non_integer(b.to_string())),
        Some(other) => Err(non_integer(type_name(other).to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps() -> Vec<DependencySpec> {
        vec![
            DependencySpec::new("postgres").with_alias("db"),
            DependencySpec::new("api").with_tags(&["backend"]),
            DependencySpec::new("web").with_tags(&["frontend", "public"]),
        ]
    }

    fn values(yaml: &str) -> Values {
        Values::from_yaml_str(yaml, "test").unwrap()
    }

    fn resolve(yaml: &str, filter: &TargetFilter) -> Result<Vec<Unit>, ValidationError> {
        resolve_units(&deps(), &values(yaml), filter, "", |_| None)
    }

    #[test]
    fn test_used_name_and_release_prefix() {
        let units = resolve_units(&deps(), &Values::new(), &TargetFilter::All, "prod-", |d| {
            Some(format!("{}-1.0", d.name))
        })
        .unwrap();
        assert_eq!(units[0].name, "postgres");
        assert_eq!(units[0].used_name, "db");
        assert_eq!(units[0].release_name, "prod-db");
        assert_eq!(units[0].app_version.as_deref(), Some("postgres-1.0"));
        assert_eq!(units[1].alias, None);
        assert_eq!(units[1].release_name, "prod-api");
    }

    #[test]
    fn test_weights_default_to_zero() {
        let units = resolve("db:\n  weight: 2\napi:\n  weight: \"5\"\n", &TargetFilter::All).unwrap();
        let weights: Vec<u32> = units.iter().map(|u| u.weight).collect();
        assert_eq!(weights, vec![2, 5, 0]);
    }

    #[test]
    fn test_weight_coercion() {
        assert_eq!(coerce_weight("u", Some(&Value::from(3.0))), Ok(3));
        assert_eq!(coerce_weight("u", Some(&Value::from(" 4 "))), Ok(4));
        assert_eq!(coerce_weight("u", Some(&Value::Null)), Ok(0));
        assert_eq!(
            coerce_weight("u", Some(&Value::from(-1))),
            Err(ValidationError::NegativeWeight {
                unit: "u".to_string(),
                value: -1
            })
        );
        assert_eq!(
            coerce_weight("u", Some(&Value::from(1.5))),
            Err(ValidationError::NonIntegerWeight {
                unit: "u".to_string(),
                value: "1.5".to_string()
            })
        );
        assert_eq!(
            coerce_weight("u", Some(&Value::from("high"))),
            Err(ValidationError::NonIntegerWeight {
                unit: "u".to_string(),
                value: "high".to_string()
            })
        );
        assert!(coerce_weight("u", Some(&Value::from(true))).is_err());
    }

    #[test]
    fn test_negative_weight_names_unit() {
        let err = resolve("api:\n  weight: -3\n", &TargetFilter::All).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NegativeWeight {
                unit: "api".to_string(),
                value: -3
            }
        );
    }

    #[test]
    fn test_target_and_exclude_are_exclusive() {
        let one = vec!["db".to_string()];
        assert_eq!(TargetFilter::new(&one, &one), Err(ConfigError::TargetAndExclude));
        assert_eq!(TargetFilter::new(&[], &[]), Ok(TargetFilter::All));
    }

    #[test]
    fn test_target_and_exclude_are_complementary() {
        for name in ["db", "api", "web"] {
            let only = resolve("", &TargetFilter::Only(vec![name.to_string()])).unwrap();
            let except = resolve("", &TargetFilter::Except(vec![name.to_string()])).unwrap();
            for (a, b) in only.iter().zip(except.iter()) {
                assert_eq!(a.used_name, b.used_name);
                assert_ne!(a.targeted, b.targeted);
            }
        }
    }

    #[test]
    fn test_unknown_filter_names() {
        let units = resolve("", &TargetFilter::All).unwrap();
        assert_eq!(
            TargetFilter::Only(vec!["db".to_string(), "cache".to_string()]).unknown_name(&units),
            Some(ValidationError::UnknownTarget {
                name: "cache".to_string()
            })
        );
        assert_eq!(
            TargetFilter::Except(vec!["postgres".to_string()]).unknown_name(&units),
            Some(ValidationError::UnknownExclude {
                name: "postgres".to_string()
            })
        );
        assert_eq!(TargetFilter::Only(vec!["web".to_string()]).unknown_name(&units), None);
    }

    #[test]
    fn test_untagged_units_always_allowed() {
        let units = resolve("tags:\n  backend: false\n  db: false\n", &TargetFilter::All).unwrap();
        assert!(units[0].allowed_by_tags);
        assert!(!units[0].has_tags());
    }

    #[test]
    fn test_tag_rule() {
        let units = resolve("tags:\n  backend: true\n  frontend: false\n", &TargetFilter::All).unwrap();
        assert!(units[1].allowed_by_tags);
        assert!(!units[2].allowed_by_tags);

        let units = resolve("tags:\n  public: true\n", &TargetFilter::All).unwrap();
        assert!(!units[1].allowed_by_tags);
        assert!(units[2].allowed_by_tags);
    }

    #[test]
    fn test_tagged_units_need_tags_map() {
        let units = resolve("", &TargetFilter::All).unwrap();
        assert!(!units[1].allowed_by_tags);
        assert!(!units[2].allowed_by_tags);
    }

    #[test]
    fn test_tag_values_must_be_booleans() {
        let units = resolve(
            "tags:\n  backend: \"true\"\n  frontend: \"{{ .Values.web }}\"\n",
            &TargetFilter::All,
        )
        .unwrap();
        assert!(!units[1].allowed_by_tags);
        assert!(!units[2].allowed_by_tags);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let yaml = "db:\n  weight: 1\ntags:\n  backend: true\n";
        let filter = TargetFilter::Except(vec!["web".to_string()]);
        assert_eq!(resolve(yaml, &filter).unwrap(), resolve(yaml, &filter).unwrap());
    }

    #[test]
    fn test_eligibility_and_label() {
        let units = resolve("db:\n  weight: 1\ntags:\n  backend: true\n", &TargetFilter::All).unwrap();
        assert!(units[0].is_eligible(1));
        assert!(!units[0].is_eligible(0));
        assert!(!units[2].is_eligible(0));
        assert_eq!(units[0].targeting_label(), "true");
        assert_eq!(units[1].targeting_label(), "true (tags match)");
        assert_eq!(units[2].targeting_label(), "false (tags mismatch)");
    }
}
