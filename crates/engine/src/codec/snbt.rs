//! Compact SNBT rendering of NBT values, used for block entity payloads in block strings.

use std::collections::HashMap;
use std::fmt::Write;

use fastnbt::Value;

/// Render `value` as single-line SNBT. Compound keys are emitted in sorted order so the output
/// is stable.
pub fn to_snbt(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Render a compound, skipping the listed keys.
pub fn compound_to_snbt(compound: &HashMap<String, Value>, skip: &[&str]) -> String {
    let mut out = String::new();
    write_compound(&mut out, compound, skip);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Byte(v) => {
            let _ = write!(out, "{v}b");
        }
        Value::Short(v) => {
            let _ = write!(out, "{v}s");
        }
        Value::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Long(v) => {
            let _ = write!(out, "{v}L");
        }
        Value::Float(v) => {
            let _ = write!(out, "{v}f");
        }
        Value::Double(v) => {
            let _ = write!(out, "{v}d");
        }
        Value::String(s) => write_quoted(out, s),
        Value::ByteArray(a) => write_array(out, "B", a.iter().map(|v| format!("{v}b"))),
        Value::IntArray(a) => write_array(out, "I", a.iter().map(|v| v.to_string())),
        Value::LongArray(a) => write_array(out, "L", a.iter().map(|v| format!("{v}L"))),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Compound(map) => write_compound(out, map, &[]),
    }
}

fn write_compound(out: &mut String, map: &HashMap<String, Value>, skip: &[&str]) {
    let mut keys: Vec<&String> = map
        .keys()
        .filter(|k| !skip.contains(&k.as_str()))
        .collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if is_bare_key(key) {
            out.push_str(key);
        } else {
            write_quoted(out, key);
        }
        out.push(':');
        write_value(out, &map[key]);
    }
    out.push('}');
}

fn write_array(out: &mut String, prefix: &str, items: impl Iterator<Item = String>) {
    out.push('[');
    out.push_str(prefix);
    out.push(';');
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&item);
    }
    out.push(']');
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
}
