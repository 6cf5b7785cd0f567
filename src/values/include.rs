//! Include clauses in the umbrella `values.yaml`
//!
//! A line such as
//!
//! ```text
//! #! {{ .Files.Get "config/db.yaml" | indent 2 }}
//! #! {{ pick (.Files.Get config/all.yaml) backend.env | indent 4 }}
//! ```
//!
//! is replaced by the content of the referenced chart file, optionally
//! narrowed to the table (or string leaf) at a dotted path, optionally
//! indented. Being a YAML comment, the clause is harmless to plain helm.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::Values;
use crate::error::ChartError;

fn pick_clause() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"#!\s*\{\{\s*pick\s*\(\s*\.Files?\.Get\s+([a-zA-Z0-9_"\\/.\-():]+)\s*\)\s*([a-zA-Z0-9_".\-]+)\s*(\|\s*indent\s*(\d+))?\s*\}\}\s*(\n|\z)"#,
        )
        .expect("pick clause regex is valid")
    })
}

fn get_clause() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"#!\s*\{\{\s*\.Files?\.Get\s+([a-zA-Z0-9_"\\/.\-():]+)\s*(\|\s*indent\s*(\d+))?\s*\}\}\s*(\n|\z)"#,
        )
        .expect("get clause regex is valid")
    })
}

struct Clause {
    start: usize,
    end: usize,
    text: String,
    file: String,
    sub_path: Option<String>,
    indent: Option<usize>,
}

/// Expand every include clause of `raw`.
///
/// `read_file` resolves a chart-relative file name to its content; `None`
/// means the file does not exist in the chart. Only the clauses written in
/// `raw` are expanded: clauses carried in by included content stay as they
/// are, so a file including itself cannot loop.
pub fn expand_includes<F>(raw: &str, read_file: F) -> Result<String, ChartError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;

    for clause in clauses(raw) {
        out.push_str(&raw[last..clause.start]);
        out.push_str(&replacement(&clause, &read_file)?);
        last = clause.end;
    }
    out.push_str(&raw[last..]);

    Ok(out)
}

/// Every clause of `content`, in text order
fn clauses(content: &str) -> Vec<Clause> {
    let picks = pick_clause().captures_iter(content).map(|caps| Clause {
        start: caps.get(0).map_or(0, |m| m.start()),
        end: caps.get(0).map_or(0, |m| m.end()),
        text: caps[0].to_string(),
        file: caps[1].trim_matches('"').to_string(),
        sub_path: Some(caps[2].trim_matches('"').to_string()),
        indent: caps.get(4).and_then(|m| m.as_str().parse().ok()),
    });
    let gets = get_clause().captures_iter(content).map(|caps| Clause {
        start: caps.get(0).map_or(0, |m| m.start()),
        end: caps.get(0).map_or(0, |m| m.end()),
        text: caps[0].to_string(),
        file: caps[1].trim_matches('"').to_string(),
        sub_path: None,
        indent: caps.get(3).and_then(|m| m.as_str().parse().ok()),
    });

    let mut found: Vec<Clause> = picks.chain(gets).collect();
    found.sort_by_key(|c| c.start);
    found
}

fn replacement<F>(clause: &Clause, read_file: &F) -> Result<String, ChartError>
where
    F: Fn(&str) -> Option<String>,
{
    let file_name = clause.file.trim().trim_matches('"');
    let data = read_file(file_name).ok_or_else(|| ChartError::IncludeNotFound {
        file: file_name.to_string(),
        clause: clause.text.trim_end_matches('\n').to_string(),
    })?;

    debug!(
        "Found reference to values file \"{}\" (sub-path: {}, indent: {})",
        file_name,
        clause.sub_path.as_deref().unwrap_or("-"),
        clause.indent.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
    );

    let data = match &clause.sub_path {
        Some(path) => pick(&data, file_name, path)?,
        None => data,
    };

    Ok(match clause.indent {
        Some(spaces) => {
            let pad = " ".repeat(spaces);
            format!("{}{}\n", pad, data.replace('\n', &format!("\n{}", pad)))
        }
        None => format!("{}\n", data),
    })
}

/// Narrow a values file to the table, or the string leaf, at `path`
fn pick(data: &str, file_name: &str, path: &str) -> Result<String, ChartError> {
    let values = Values::from_yaml_str(data, file_name)?;
    let not_found = || ChartError::IncludePathNotFound {
        file: file_name.to_string(),
        path: path.to_string(),
    };

    if let Some(table) = values.table(path) {
        return serde_yaml::to_string(table).map_err(|e| ChartError::Parse {
            path: file_name.to_string(),
            message: e.to_string(),
        });
    }
    values
        .path_value(path)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(not_found)
}
