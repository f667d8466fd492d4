//! Descriptive facts about a produced value, shown by `repl_inspect`.

use super::value::Value;

const MAX_TYPES_LISTED: usize = 8;

/// Every inspection that applies to `value`, as `(name, result)` pairs.
#[must_use]
pub fn all_inspections(value: &Value) -> Vec<(&'static str, String)> {
    let mut inspections = vec![
        ("Type", value.type_name().to_string()),
        ("Truthy", Value::Bool(value.truthy()).to_string()),
    ];

    if let Some(len) = value.len() {
        inspections.push(("Length", len.to_string()));
    }

    match value {
        Value::Int(i) => {
            inspections.push(("Bit length", (64 - i.unsigned_abs().leading_zeros()).to_string()));
            inspections.push(("Hex", format!("{i:#x}")));
        }
        Value::Float(f) => {
            inspections.push(("Is integer", Value::Bool(f.fract() == 0.0).to_string()));
            inspections.push(("Is finite", Value::Bool(f.is_finite()).to_string()));
        }
        Value::Str(s) => {
            inspections.push(("Lines", s.lines().count().to_string()));
            inspections.push(("Bytes", s.len().to_string()));
            inspections.push(("ASCII", Value::Bool(s.is_ascii()).to_string()));
        }
        Value::List(items) => {
            let mut types: Vec<&str> = Vec::new();
            for item in items {
                if !types.contains(&item.type_name()) {
                    types.push(item.type_name());
                }
            }
            if !types.is_empty() {
                let listed: Vec<&str> = types.iter().copied().take(MAX_TYPES_LISTED).collect();
                let more = if types.len() > MAX_TYPES_LISTED { ", ..." } else { "" };
                inspections.push(("Content types", format!("{}{more}", listed.join(", "))));
            }
        }
        Value::None | Value::Bool(_) => {}
    }

    inspections
}
