//! Field-by-field merging of configuration tiers.
//!
//! Higher tiers override lower ones key by key. Arrays and scalars are
//! replaced whole; an explicit `null` leaves the lower tier's value in place.

use serde_json::Value;

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// # Example
/// ```
/// use serde_json::json;
/// use todo_sync::config::deep_merge;
///
/// let base = json!({"ordering": {"tail_gap": 1000, "rebalance_step": 1000}});
/// let overlay = json!({"ordering": {"tail_gap": 10}});
/// let merged = deep_merge(base, overlay);
/// assert_eq!(merged, json!({"ordering": {"tail_gap": 10, "rebalance_step": 1000}}));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge tiers in order, later ones winning.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_merge() {
        let base = json!({"storage": {"data_dir": "/a", "guest_key": "g"}, "logging": {"level": "info"}});
        let overlay = json!({"storage": {"data_dir": "/b"}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"storage": {"data_dir": "/b", "guest_key": "g"}, "logging": {"level": "info"}})
        );
    }

    #[test]
    fn null_preserves_base() {
        let base = json!({"auth": {"code_ttl_secs": 600}});
        let overlay = json!({"auth": {"code_ttl_secs": null}});
        assert_eq!(deep_merge(base.clone(), overlay), base);
    }

    #[test]
    fn arrays_are_replaced() {
        assert_eq!(
            deep_merge(json!({"x": [1, 2]}), json!({"x": [3]})),
            json!({"x": [3]})
        );
    }

    #[test]
    fn merge_all_applies_in_order() {
        let merged = deep_merge_all(vec![
            json!({"logging": {"level": "info"}}),
            json!({"logging": {"level": "debug"}}),
            json!({"logging": {"level": "warn"}}),
        ]);
        assert_eq!(merged, json!({"logging": {"level": "warn"}}));
    }
}
