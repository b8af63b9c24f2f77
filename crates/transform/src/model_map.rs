//! Model-map resolver (C6).
//!
//! Resolves an incoming Anthropic model name against a pattern-to-replacement
//! map with exact, wildcard, and catch-all precedence, and returns the extra
//! fields (if any) that should be deep-merged into the outgoing Responses
//! request. This module is a pure function over an already-parsed map;
//! loading and caching the map from disk is `crates/config`'s job.

use serde_json::Value;

/// One entry in a parsed model map: either a bare replacement model name, or
/// a `{model, ...extras}` object whose non-`model` keys are deep-merge
/// targets for the outgoing request.
#[derive(Debug, Clone)]
pub enum MapEntry {
    Replacement(String),
    WithExtras { model: Option<String>, extras: Value },
}

impl MapEntry {
    /// Build an entry from an already-parsed YAML/JSON value, discarding
    /// shapes that are neither a non-empty string nor a non-empty object
    /// (matching the source's tolerant loader).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(MapEntry::Replacement(s.clone())),
            Value::Object(map) if !map.is_empty() => {
                let model = map.get("model").and_then(Value::as_str).map(str::to_string);
                let mut extras = serde_json::Map::new();
                for (k, v) in map {
                    if k != "model" {
                        extras.insert(k.clone(), v.clone());
                    }
                }
                Some(MapEntry::WithExtras { model, extras: Value::Object(extras) })
            }
            _ => None,
        }
    }
}

/// Resolve `model` against `map`, returning `(resolved_model, extras)`.
///
/// Precedence: (a) an exact key match; (b) the most specific wildcard
/// pattern that matches, where specificity is `(non-wildcard character
/// count, pattern length)` compared lexicographically; (c) the catch-all
/// `"*"` entry; (d) the model passed through unchanged with empty extras.
pub fn resolve(map: &[(String, MapEntry)], model: &str) -> (String, Value) {
    if let Some((_, entry)) = map.iter().find(|(k, _)| k == model) {
        return normalize(model, entry);
    }

    let mut best: Option<(&str, &MapEntry, (usize, usize))> = None;
    for (pattern, entry) in map {
        if pattern == "*" || (!pattern.contains('*') && !pattern.contains('?')) {
            continue;
        }
        if !fast_glob::glob_match(pattern, model) {
            continue;
        }
        let non_wild = pattern.chars().filter(|c| *c != '*' && *c != '?').count();
        let score = (non_wild, pattern.len());
        if best.as_ref().is_none_or(|(_, _, best_score)| score > *best_score) {
            best = Some((pattern, entry, score));
        }
    }
    if let Some((_, entry, _)) = best {
        return normalize(model, entry);
    }

    if let Some((_, entry)) = map.iter().find(|(k, _)| k == "*") {
        return normalize(model, entry);
    }

    (model.to_string(), Value::Object(serde_json::Map::new()))
}

fn normalize(requested_model: &str, entry: &MapEntry) -> (String, Value) {
    match entry {
        MapEntry::Replacement(replacement) => (replacement.clone(), Value::Object(serde_json::Map::new())),
        MapEntry::WithExtras { model, extras } => {
            (model.clone().unwrap_or_else(|| requested_model.to_string()), extras.clone())
        }
    }
}

/// Parse a raw YAML/JSON document into an ordered list of `(pattern, entry)`
/// pairs, unwrapping the optional `model_map` / `api_transformer_config.model_map`
/// nesting. Entries whose value is neither a non-empty string nor a
/// non-empty object are dropped.
pub fn parse_document(document: &Value) -> Vec<(String, MapEntry)> {
    let unwrapped = unwrap_document(document);
    let Some(map) = unwrapped.as_object() else { return Vec::new() };
    map.iter().filter_map(|(k, v)| MapEntry::from_value(v).map(|entry| (k.clone(), entry))).collect()
}

fn unwrap_document(document: &Value) -> Value {
    let Some(obj) = document.as_object() else { return document.clone() };
    if let Some(inner) = obj.get("model_map").filter(|v| v.is_object()) {
        return inner.clone();
    }
    if let Some(outer) = obj.get("api_transformer_config").and_then(Value::as_object)
        && let Some(inner) = outer.get("model_map").filter(|v| v.is_object())
    {
        return inner.clone();
    }
    document.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(doc: Value) -> Vec<(String, MapEntry)> {
        parse_document(&doc)
    }

    #[test]
    fn exact_match_wins_over_wildcard() {
        let m = map(json!({"claude-sonnet-4-5": "gpt-5.1", "claude-*": "gpt-4o"}));
        let (model, extras) = resolve(&m, "claude-sonnet-4-5");
        assert_eq!(model, "gpt-5.1");
        assert_eq!(extras, json!({}));
    }

    #[test]
    fn most_specific_wildcard_wins() {
        let m = map(json!({
            "claude-*-4-5": {"model": "gpt-5.2-codex", "reasoning": {"effort": "low"}},
            "*": "gpt-4o-mini",
        }));
        let (model, extras) = resolve(&m, "claude-sonnet-4-5");
        assert_eq!(model, "gpt-5.2-codex");
        assert_eq!(extras, json!({"reasoning": {"effort": "low"}}));
    }

    #[test]
    fn catch_all_used_when_nothing_else_matches() {
        let m = map(json!({"claude-opus-*": "gpt-5.2", "*": "gpt-4o-mini"}));
        let (model, extras) = resolve(&m, "claude-haiku-3");
        assert_eq!(model, "gpt-4o-mini");
        assert_eq!(extras, json!({}));
    }

    #[test]
    fn no_match_passes_model_through() {
        let m = map(json!({"claude-opus-*": "gpt-5.2"}));
        let (model, extras) = resolve(&m, "claude-haiku-3");
        assert_eq!(model, "claude-haiku-3");
        assert_eq!(extras, json!({}));
    }

    #[test]
    fn model_map_key_unwraps_nesting() {
        let m = map(json!({"model_map": {"a": "b"}}));
        let (model, _) = resolve(&m, "a");
        assert_eq!(model, "b");
    }

    #[test]
    fn api_transformer_config_nesting_unwraps() {
        let m = map(json!({"api_transformer_config": {"model_map": {"a": "b"}}}));
        let (model, _) = resolve(&m, "a");
        assert_eq!(model, "b");
    }

    #[test]
    fn empty_string_and_empty_object_values_are_dropped() {
        let m = map(json!({"a": "", "b": {}, "c": "ok"}));
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].0, "c");
    }

    #[test]
    fn wildcard_question_mark_matches_single_char() {
        let m = map(json!({"claude-haiku-?": "gpt-4o-mini"}));
        let (model, _) = resolve(&m, "claude-haiku-3");
        assert_eq!(model, "gpt-4o-mini");
    }
}
