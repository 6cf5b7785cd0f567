//! `--set` style overrides
//!
//! Grammar (the subset of helm's that umbrella charts actually use):
//!
//! ```text
//! expression := assignment ("," assignment)*
//! assignment := path "=" value
//! path       := segment ("." segment)*      segment may end in "[N]" indices
//! value      := "{" item ("," item)* "}" | scalar
//! ```
//!
//! `\,` `\.` `\=` and `\\` escape the separators.

use serde_yaml::{Mapping, Value};

use super::Values;
use crate::error::ChartError;

/// How the right-hand side of an assignment is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// `--set`: `null`, booleans and integers are typed, the rest is a string
    Typed,
    /// `--set-string`: always a string
    String,
    /// `--set-file`: the value is a path whose content becomes a string
    File,
}

/// Largest list index an override may address, as helm allows
const MAX_INDEX: usize = 65536;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Parse `expression` and apply every assignment to `values`
pub fn parse_into(values: &mut Values, expression: &str, kind: OverrideKind) -> Result<(), ChartError> {
    for assignment in split_unescaped(expression, ',', true) {
        if assignment.is_empty() {
            continue;
        }
        let (raw_key, raw_value) = split_once_unescaped(&assignment, '=').ok_or_else(|| {
            ChartError::InvalidOverride {
                expression: expression.to_string(),
                message: format!("key \"{}\" has no value", unescape(&assignment)),
            }
        })?;

        let path = parse_path(&raw_key, expression)?;
        let value = parse_value(&raw_value, kind, expression)?;
        set_path(values.mapping_mut(), &path, value, expression)?;
    }
    Ok(())
}

fn parse_value(raw: &str, kind: OverrideKind, expression: &str) -> Result<Value, ChartError> {
    match kind {
        OverrideKind::File => {
            let path = unescape(raw);
            std::fs::read_to_string(&path)
                .map(Value::String)
                .map_err(|e| ChartError::InvalidOverride {
                    expression: expression.to_string(),
                    message: format!("reading {}: {}", path, e),
                })
        }
        _ if raw.starts_with('{') && raw.ends_with('}') && raw.len() >= 2 => {
            let inner = &raw[1..raw.len() - 1];
            let items = split_unescaped(inner, ',', false)
                .into_iter()
                .filter(|item| !item.is_empty())
                .map(|item| scalar(&unescape(&item), kind))
                .collect();
            Ok(Value::Sequence(items))
        }
        _ => Ok(scalar(&unescape(raw), kind)),
    }
}

fn scalar(text: &str, kind: OverrideKind) -> Value {
    if kind != OverrideKind::Typed {
        return Value::String(text.to_string());
    }
    match text {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => parse_integer(text)
            .map(Value::from)
            .unwrap_or_else(|| Value::String(text.to_string())),
    }
}

/// Integers without a leading zero stay integers, like helm does
fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    text.parse().ok()
}

fn parse_path(raw: &str, expression: &str) -> Result<Vec<Segment>, ChartError> {
    let invalid = |message: String| ChartError::InvalidOverride {
        expression: expression.to_string(),
        message,
    };

    let mut path = Vec::new();
    for part in split_unescaped(raw, '.', false) {
        let part = unescape(&part);
        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part.as_str(), ""),
        };
        if name.is_empty() {
            return Err(invalid(format!("empty key segment in \"{}\"", unescape(raw))));
        }
        path.push(Segment::Key(name.to_string()));

        while let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped
                .find(']')
                .ok_or_else(|| invalid(format!("unterminated index in \"{}\"", part)))?;
            let index = stripped[..close]
                .parse::<usize>()
                .map_err(|_| invalid(format!("invalid list index in \"{}\"", part)))?;
            if index > MAX_INDEX {
                return Err(invalid(format!(
                    "index {} exceeds the maximum of {} in \"{}\"",
                    index, MAX_INDEX, part
                )));
            }
            path.push(Segment::Index(index));
            rest = &stripped[close + 1..];
        }
        if !rest.is_empty() {
            return Err(invalid(format!("unexpected \"{}\" after index in \"{}\"", rest, part)));
        }
    }
    Ok(path)
}

fn set_path(root: &mut Mapping, path: &[Segment], value: Value, expression: &str) -> Result<(), ChartError> {
    let (first, rest) = match path.split_first() {
        Some((Segment::Key(key), rest)) => (key, rest),
        _ => {
            return Err(ChartError::InvalidOverride {
                expression: expression.to_string(),
                message: "path must start with a key".to_string(),
            })
        }
    };

    let key = Value::String(first.clone());
    if rest.is_empty() {
        root.insert(key, value);
        return Ok(());
    }

    let slot = root.entry(key).or_insert(Value::Null);
    set_in_value(slot, rest, value);
    Ok(())
}

fn set_in_value(slot: &mut Value, path: &[Segment], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        *slot = value;
        return;
    };

    match segment {
        Segment::Key(key) => {
            if !slot.is_mapping() {
                *slot = Value::Mapping(Mapping::new());
            }
            if let Value::Mapping(map) = slot {
                let child = map.entry(Value::String(key.clone())).or_insert(Value::Null);
                set_in_value(child, rest, value);
            }
        }
        Segment::Index(index) => {
            if !slot.is_sequence() {
                *slot = Value::Sequence(Vec::new());
            }
            if let Value::Sequence(seq) = slot {
                if seq.len() <= *index {
                    seq.resize(*index + 1, Value::Null);
                }
                set_in_value(&mut seq[*index], rest, value);
            }
        }
    }
}

/// Split on `sep`, ignoring escaped separators and, when `respect_braces`
/// is set, separators inside `{...}`. Escapes are kept in the output.
fn split_unescaped(input: &str, sep: char, respect_braces: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '{' if respect_braces => {
                depth += 1;
                current.push(c);
            }
            '}' if respect_braces => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c == sep && depth == 0 => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn split_once_unescaped(input: &str, sep: char) -> Option<(String, String)> {
    let mut escaped = false;
    for (pos, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some((input[..pos].to_string(), input[pos + c.len_utf8()..].to_string()));
        }
    }
    None
}

fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
