// src/state_tree.rs
//
// Dot-path access and deep merge over the JSON state tree.
//
// Paths look like `progress.streak.current`. Empty segments are ignored, so
// `"progress..xp"` and `"progress.xp"` address the same node.

use serde_json::{Map, Value};

pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Returns the node at `segments`, or `None` when any segment is missing or
/// an intermediate node is not an object.
pub fn get_at<'a>(tree: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(tree, |node, segment| node.as_object()?.get(*segment))
}

pub fn get_at_mut<'a>(tree: &'a mut Value, segments: &[&str]) -> Option<&'a mut Value> {
    segments
        .iter()
        .try_fold(tree, |node, segment| node.as_object_mut()?.get_mut(*segment))
}

/// Replaces the leaf at `segments`, creating intermediate objects on the way.
/// Non-object intermediates are overwritten with empty objects. Returns the
/// previous leaf value, if there was one.
///
/// `segments` must not be empty.
pub fn set_at(tree: &mut Value, segments: &[&str], value: Value) -> Option<Value> {
    let (leaf, parents) = segments.split_last()?;

    let mut node = tree;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(leaf.to_string(), value)
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Merges `overlay` onto `base`. Objects merge key by key; every other
/// value (arrays included) in `overlay` replaces the one in `base`.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_missing_intermediate_is_none() {
        let tree = json!({"a": {"b": 1}});
        assert_eq!(get_at(&tree, &["a", "b"]), Some(&json!(1)));
        assert_eq!(get_at(&tree, &["a", "x", "y"]), None);
        assert_eq!(get_at(&tree, &["a", "b", "c"]), None);
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut tree = json!({});
        let old = set_at(&mut tree, &["a", "b", "c"], json!(5));
        assert_eq!(old, None);
        assert_eq!(tree, json!({"a": {"b": {"c": 5}}}));
    }

    #[test]
    fn test_set_overwrites_scalar_intermediate() {
        let mut tree = json!({"a": 3});
        set_at(&mut tree, &["a", "b"], json!(true));
        assert_eq!(tree, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_set_returns_previous_leaf() {
        let mut tree = json!({"xp": 10});
        assert_eq!(set_at(&mut tree, &["xp"], json!(20)), Some(json!(10)));
    }

    #[test]
    fn test_split_path_skips_empty_segments() {
        assert_eq!(split_path("progress..xp."), vec!["progress", "xp"]);
        assert!(split_path("").is_empty());
    }

    #[test]
    fn test_deep_merge_keeps_new_defaults() {
        let mut defaults = json!({
            "progress": {"xp": 0, "level": 1, "streak": {"current": 0, "longest": 0}},
            "settings": {"soundEnabled": true}
        });
        let saved = json!({
            "progress": {"xp": 900, "streak": {"current": 3}},
            "legacy": [1, 2]
        });
        deep_merge(&mut defaults, saved);

        assert_eq!(defaults["progress"]["xp"], 900);
        assert_eq!(defaults["progress"]["level"], 1);
        assert_eq!(defaults["progress"]["streak"]["current"], 3);
        assert_eq!(defaults["progress"]["streak"]["longest"], 0);
        assert_eq!(defaults["settings"]["soundEnabled"], true);
        assert_eq!(defaults["legacy"], json!([1, 2]));
    }

    #[test]
    fn test_deep_merge_replaces_arrays() {
        let mut base = json!({"list": [1, 2, 3]});
        deep_merge(&mut base, json!({"list": [9]}));
        assert_eq!(base["list"], json!([9]));
    }
}
