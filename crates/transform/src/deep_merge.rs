use serde_json::Value;

/// Recursively merge `updates` into `base`: for each key present in both
/// sides as an object, recurse; otherwise the value from `updates` wins.
///
/// Shared by the reasoning-config merge in the request transform and the
/// model-map extras merge applied to the outgoing Responses request.
pub fn deep_merge(base: &mut Value, updates: &Value) {
    let Value::Object(updates) = updates else {
        return;
    };
    let Value::Object(base) = base else {
        *base = updates.clone().into();
        return;
    };
    for (key, value) in updates {
        match base.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => deep_merge(existing, value),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merges_nested_objects() {
        let mut base = json!({"reasoning": {"effort": "low"}, "model": "a"});
        let updates = json!({"reasoning": {"summary": "auto"}, "model": "b"});
        deep_merge(&mut base, &updates);
        assert_eq!(
            base,
            json!({"reasoning": {"effort": "low", "summary": "auto"}, "model": "b"})
        );
    }

    #[test]
    fn scalar_replaces_object() {
        let mut base = json!({"reasoning": {"effort": "low"}});
        let updates = json!({"reasoning": "none"});
        deep_merge(&mut base, &updates);
        assert_eq!(base, json!({"reasoning": "none"}));
    }

    #[test]
    fn non_object_updates_are_ignored() {
        let mut base = json!({"a": 1});
        deep_merge(&mut base, &json!("not an object"));
        assert_eq!(base, json!({"a": 1}));
    }
}
