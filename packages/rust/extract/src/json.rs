//! Queries over decoded structured-data payloads.
//!
//! Two query shapes exist: a direct key path ([`lookup`]) and "collect every
//! value of this field exactly N object levels below the root"
//! ([`collect_field`]). The collector tells an empty listing apart from a
//! payload whose nesting no longer matches.

use serde_json::Value;
use tracing::debug;

use stundenplan_shared::{Result, StundenplanError};

/// Decode a structured-data body. Failure is a hard error for the node.
pub fn decode(body: &str) -> Result<Value> {
    serde_json::from_str(body)
        .map_err(|e| StundenplanError::decode(format!("invalid JSON payload: {e}")))
}

/// Follow `path` through nested objects.
pub fn lookup<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Render a scalar as an identifier string. Strings must be non-empty.
pub fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Collect the values of `field` found `depth` object levels below `root`.
///
/// Each level steps into the values of every object; array values are
/// flattened into the same level. Empty containers and nulls are treated as
/// "no items". Scalars where an object is expected, and objects at the final
/// level that lack `field`, are shape mismatches. A single mismatching branch
/// fails the whole query with [`StundenplanError::Shape`], even when other
/// branches matched, so a listing that gained or lost a nesting level is
/// never read partially.
pub fn collect_field<'v>(root: &'v Value, field: &str, depth: usize) -> Result<Vec<&'v Value>> {
    let mut frontier: Vec<(String, &Value)> = vec![("$".to_string(), root)];
    let mut mismatches: Vec<String> = Vec::new();

    for level in 0..depth {
        let mut next = Vec::new();
        for (path, node) in frontier {
            match node {
                Value::Object(map) => {
                    for (key, child) in map {
                        let child_path = format!("{path}.{key}");
                        match child {
                            Value::Array(items) => next.extend(
                                items
                                    .iter()
                                    .enumerate()
                                    .map(|(i, item)| (format!("{child_path}[{i}]"), item)),
                            ),
                            other => next.push((child_path, other)),
                        }
                    }
                }
                Value::Null => {}
                Value::Array(items) if items.is_empty() => {}
                other => mismatches.push(format!(
                    "{path} is {} at level {level}, expected an object",
                    type_name(other)
                )),
            }
        }
        frontier = next;
    }

    let mut hits = Vec::new();
    for (path, node) in frontier {
        match node {
            Value::Object(map) => match map.get(field) {
                Some(value) => hits.push(value),
                None if map.is_empty() => {}
                None => mismatches.push(format!("{path} has no `{field}`")),
            },
            Value::Null => {}
            Value::Array(items) if items.is_empty() => {}
            other => mismatches.push(format!(
                "{path} is {} at level {depth}, expected an object",
                type_name(other)
            )),
        }
    }

    if let Some(first) = mismatches.first() {
        return Err(StundenplanError::shape(format!(
            "`{field}` not found {depth} level(s) deep: {first} ({} mismatching branch(es), {} match(es))",
            mismatches.len(),
            hits.len()
        )));
    }

    debug!(field, depth, found = hits.len(), "collected field values");
    Ok(hits)
}

/// [`collect_field`] rendered as identifiers, in document order.
pub fn collect_ids(root: &Value, field: &str, depth: usize) -> Result<Vec<String>> {
    collect_field(root, field, depth)?
        .into_iter()
        .map(|value| {
            identifier(value).ok_or_else(|| {
                StundenplanError::shape(format!(
                    "`{field}` holds {}, expected an identifier",
                    type_name(value)
                ))
            })
        })
        .collect()
}

/// One entry of the semester listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Semester {
    pub id: String,
    pub is_current: bool,
}

/// Read the semester listing: an array of objects with `id` and the
/// current-semester flag (`isaktuelles`, or `isCurrent`).
pub fn semesters(root: &Value) -> Result<Vec<Semester>> {
    let items = root.as_array().ok_or_else(|| {
        StundenplanError::shape(format!(
            "semester listing is {}, expected an array",
            type_name(root)
        ))
    })?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let id = lookup(item, &["id"]).and_then(identifier).ok_or_else(|| {
                StundenplanError::shape(format!("semester entry {i} has no `id`"))
            })?;
            let is_current = ["isaktuelles", "isCurrent"]
                .iter()
                .find_map(|flag| lookup(item, &[*flag]))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Semester { id, is_current })
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
