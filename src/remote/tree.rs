//! Path operations over a hierarchical JSON tree.
//!
//! Paths are `/`-joined segments ("Schedules/3", "Variables/FeedNow").
//! Empty segments are ignored, so "Schedules" and "/Schedules/" name the
//! same node.

use serde_json::{Map, Value};

/// Splits a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Returns true when one path names an ancestor of the other (or the same
/// node). A subscription at either path observes changes at the other.
pub fn paths_related(a: &str, b: &str) -> bool {
    let a = segments(a);
    let b = segments(b);
    let shared = a.len().min(b.len());
    a[..shared] == b[..shared]
}

/// Reads the node at `path`, or `Value::Null` when absent.
pub fn get_path(tree: &Value, path: &str) -> Value {
    let mut node = tree;
    for segment in segments(path) {
        match node.get(segment) {
            Some(child) => node = child,
            None => return Value::Null,
        }
    }
    node.clone()
}

/// Replaces the node at `path`, creating intermediate objects as needed.
/// An empty path replaces the whole tree.
pub fn set_path(tree: &mut Value, path: &str, value: Value) {
    let segments = segments(path);
    let Some((last, parents)) = segments.split_last() else {
        *tree = value;
        return;
    };

    let mut node = tree;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .expect("just made an object")
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .expect("just made an object")
        .insert(last.to_string(), value);
}

/// Removes the node at `path`. Removing an absent node is not an error;
/// returns whether anything was removed.
pub fn delete_path(tree: &mut Value, path: &str) -> bool {
    let segments = segments(path);
    let Some((last, parents)) = segments.split_last() else {
        let had_value = !tree.is_null();
        *tree = Value::Null;
        return had_value;
    };

    let mut node = tree;
    for segment in parents {
        match node.get_mut(segment) {
            Some(child) => node = child,
            None => return false,
        }
    }

    match node.as_object_mut() {
        Some(map) => map.remove(*last).is_some(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path_nested() {
        let tree = json!({ "Schedules": { "0": { "id": 0 } } });
        assert_eq!(get_path(&tree, "Schedules/0/id"), json!(0));
        assert_eq!(get_path(&tree, "Schedules/0"), json!({ "id": 0 }));
    }

    #[test]
    fn test_get_path_absent_is_null() {
        let tree = json!({ "Variables": {} });
        assert_eq!(get_path(&tree, "Schedules"), Value::Null);
        assert_eq!(get_path(&tree, "Variables/FeedNow"), Value::Null);
    }

    #[test]
    fn test_get_path_ignores_empty_segments() {
        let tree = json!({ "Variables": { "FeedNow": true } });
        assert_eq!(get_path(&tree, "/Variables/FeedNow/"), json!(true));
    }

    #[test]
    fn test_set_path_creates_parents() {
        let mut tree = Value::Null;
        set_path(&mut tree, "Schedules/3", json!({ "id": 3 }));
        assert_eq!(tree, json!({ "Schedules": { "3": { "id": 3 } } }));
    }

    #[test]
    fn test_set_path_overwrites_leaf() {
        let mut tree = json!({ "Variables": { "FeedNow": false } });
        set_path(&mut tree, "Variables/FeedNow", json!(true));
        assert_eq!(get_path(&tree, "Variables/FeedNow"), json!(true));
    }

    #[test]
    fn test_set_path_replaces_scalar_parent() {
        let mut tree = json!({ "Variables": 7 });
        set_path(&mut tree, "Variables/FeedNow", json!(true));
        assert_eq!(tree, json!({ "Variables": { "FeedNow": true } }));
    }

    #[test]
    fn test_delete_path() {
        let mut tree = json!({ "Schedules": { "0": {}, "1": {} } });
        assert!(delete_path(&mut tree, "Schedules/0"));
        assert_eq!(tree, json!({ "Schedules": { "1": {} } }));
    }

    #[test]
    fn test_delete_absent_is_not_an_error() {
        let mut tree = json!({ "Schedules": {} });
        assert!(!delete_path(&mut tree, "Schedules/9"));
        assert!(!delete_path(&mut tree, "Nowhere/at/all"));
    }

    #[test]
    fn test_paths_related() {
        assert!(paths_related("Schedules", "Schedules/3"));
        assert!(paths_related("Schedules/3", "Schedules"));
        assert!(paths_related("Variables", "Variables"));
        assert!(!paths_related("Schedules", "Variables/FeedNow"));
    }
}
