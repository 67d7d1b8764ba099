//! Deep merge of YAML configuration tiers.
//!
//! Implements field-by-field merging where higher tier values override lower tier values.
//! Arrays are replaced entirely, not concatenated.

use serde_json::Value;

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans, nulls are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use task_recur::config::deep_merge;
///
/// let base = json!({
///     "recurrence": { "enabled": true, "limit": 1 },
///     "confirmation": true
/// });
/// let overlay = json!({
///     "recurrence": { "limit": 4 }
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result["recurrence"]["limit"], 4);
/// assert_eq!(result["recurrence"]["enabled"], true);
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Both are objects: merge recursively
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        // Overlay is null: preserve base (null means "not specified")
        (base, Value::Null) => base,
        // Any other case: overlay replaces base entirely
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
///
/// Equivalent to folding `deep_merge` over the list.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overlay_changes_only_named_keys() {
        let base = json!({
            "recurrence": {"enabled": true, "limit": 1, "until_policy": "gate"},
            "confirmation": true
        });
        let overlay = json!({
            "recurrence": {"until_policy": "expire"}
        });
        let result = deep_merge(base, overlay);
        assert_eq!(
            result,
            json!({
                "recurrence": {"enabled": true, "limit": 1, "until_policy": "expire"},
                "confirmation": true
            })
        );
    }

    #[test]
    fn test_null_tier_value_keeps_lower_tier() {
        let base = json!({"recurrence": {"limit": 3}});
        let overlay = json!({"recurrence": {"limit": null}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"recurrence": {"limit": 3}}));
    }

    #[test]
    fn test_scalar_replaces_section() {
        let base = json!({"store": {"db_path": "a.db"}});
        let overlay = json!({"store": "b.db"});
        assert_eq!(deep_merge(base, overlay), json!({"store": "b.db"}));
    }

    #[test]
    fn test_merge_all_later_tiers_win() {
        let tiers = vec![
            json!({"recurrence": {"limit": 1, "enabled": true}}),
            json!({"recurrence": {"limit": 4}}),
            json!({"recurrence": {"enabled": false}}),
        ];
        let result = deep_merge_all(tiers);
        assert_eq!(result, json!({"recurrence": {"limit": 4, "enabled": false}}));
    }
}
