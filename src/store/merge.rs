//! Deep-merge and dotted-path helpers over `serde_json::Value`.

use serde_json::{Map, Value};

/// Merge `update` onto `base` in place. Object fields merge recursively;
/// arrays and scalars are replaced wholesale.
pub fn deep_merge(base: &mut Value, update: &Value) {
    match (base, update) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            for (key, update_value) in update_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, update_value),
                    None => {
                        base_map.insert(key.clone(), update_value.clone());
                    }
                }
            }
        }
        (base, update) => *base = update.clone(),
    }
}

/// Dotted leaf paths touched by a partial update, in traversal order.
pub fn affected_paths(update: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(update, "", &mut paths);
    paths
}

fn collect_paths(value: &Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_paths(child, &path, out);
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.push(prefix.to_string());
            }
        }
    }
}

/// Look up a dotted path in a configuration value.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Build the nested single-key object `{a: {b: value}}` for path `"a.b"`.
pub fn nest_path(path: &str, value: Value) -> Value {
    let mut nested = value;
    for segment in path.rsplit('.') {
        let mut map = Map::new();
        map.insert(segment.to_string(), nested);
        nested = Value::Object(map);
    }
    nested
}
