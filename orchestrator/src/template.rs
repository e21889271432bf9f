//! Template expression resolution
//!
//! A template atom is a string of exactly `{{ <path> }}` where the path is
//! dot-separated segments. Atoms must span the whole string; interpolation
//! inside larger strings is not supported. Paths are resolved against the
//! execution context:
//! - `workflow.input.<rest>` reads from the caller's input
//! - `steps.<id>.outputs.<rest>` reads an earlier step's stored output
//!
//! All-digit segments index sequences. Missing keys or indices resolve to
//! null rather than raising.

use serde_json::{Map, Value};

use crate::context::ExecutionContext;

/// Extract the path segments of a template atom, or None for a literal.
///
/// `{{ workflow.input.city }}` yields `["workflow", "input", "city"]`.
fn template_path(raw: &str) -> Option<Vec<&str>> {
    let inner = raw.strip_prefix("{{")?.strip_suffix("}}")?.trim();
    if inner.is_empty() {
        return None;
    }
    let segments: Vec<&str> = inner.split('.').collect();
    // Whitespace is only legal around the whole path, never inside it
    if segments
        .iter()
        .any(|s| s.is_empty() || s.contains(char::is_whitespace))
    {
        return None;
    }
    Some(segments)
}

/// Resolve a string that may be a template atom; literals pass through
pub fn resolve_expr(raw: &str, context: &ExecutionContext) -> Value {
    match template_path(raw) {
        Some(segments) => resolve_path(&segments, context),
        None => Value::String(raw.to_string()),
    }
}

/// Resolve one value: strings may be atoms, mappings resolve key-by-key,
/// sequence elements resolve only when they are strings
pub fn resolve_value(value: &Value, context: &ExecutionContext) -> Value {
    match value {
        Value::String(s) => resolve_expr(s, context),
        Value::Object(map) => Value::Object(resolve_inputs(map, context)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => resolve_expr(s, context),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve every entry of a step's input mapping
pub fn resolve_inputs(inputs: &Map<String, Value>, context: &ExecutionContext) -> Map<String, Value> {
    inputs
        .iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, context)))
        .collect()
}

fn resolve_path(segments: &[&str], context: &ExecutionContext) -> Value {
    let resolved = match segments {
        ["workflow", "input"] => {
            return Value::Object(context.workflow_input.clone());
        }
        ["workflow", "input", first, rest @ ..] => context
            .workflow_input
            .get(*first)
            .and_then(|v| navigate(v, rest)),
        ["steps", step_id, "outputs", rest @ ..] => context
            .step_output(step_id)
            .and_then(|outputs| navigate(outputs, rest)),
        _ => None,
    };
    resolved.cloned().unwrap_or(Value::Null)
}

fn navigate<'a>(start: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = start;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) if is_index(segment) => {
                items.get(segment.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

/// Truthiness for conditional branches: null, false, zero, and empty
/// strings/collections are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Case key for switch branches.
///
/// Booleans stringify as `true`/`false`, numbers via their JSON rendering,
/// strings are used as-is without quotes.
pub fn case_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
