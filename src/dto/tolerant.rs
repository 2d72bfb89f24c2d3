//! Lenient JSON reading for hand-edited files: comments, trailing commas and key casing are
//! forgiven.

use serde_json::{Map, Value};

/// Parse text that may contain comments and trailing commas.
pub fn parse_value(text: &str) -> Result<Value, json5::Error> {
    json5::from_str::<Value>(text)
}

/// Rename the keys of a struct-shaped object onto their canonical spelling.
///
/// `vocabulary` pairs a lowercase spelling (canonical name or legacy alias) with the canonical
/// name. Unknown keys are kept untouched; the first occurrence wins when two spellings collide.
pub fn fold_keys(value: &mut Value, vocabulary: &[(&str, &str)]) {
    let Value::Object(map) = value else {
        return;
    };

    let mut folded = Map::with_capacity(map.len());
    for (key, item) in std::mem::take(map) {
        let lowered = key.to_ascii_lowercase();
        let canonical = vocabulary
            .iter()
            .find(|(spelling, _)| *spelling == lowered)
            .map(|(_, canonical)| (*canonical).to_owned())
            .unwrap_or(key);
        if !folded.contains_key(&canonical) {
            folded.insert(canonical, item);
        }
    }
    *map = folded;
}

/// Fold keys onto the spelling used by `template`, recursively.
///
/// Keys are matched case-insensitively against the template's keys; nested objects are folded
/// against the template's value for the same key. Keys unknown to the template are left alone.
pub fn fold_like(value: &mut Value, template: &Value) {
    let (Value::Object(map), Value::Object(shape)) = (value, template) else {
        return;
    };

    let mut folded = Map::with_capacity(map.len());
    for (key, mut item) in std::mem::take(map) {
        let canonical = shape
            .keys()
            .find(|known| known.eq_ignore_ascii_case(&key))
            .cloned()
            .unwrap_or(key);
        if let Some(child) = shape.get(&canonical) {
            fold_like(&mut item, child);
        }
        if !folded.contains_key(&canonical) {
            folded.insert(canonical, item);
        }
    }
    *map = folded;
}

/// Apply `f` to every value of a map-shaped object (keys are data, not field names).
pub fn for_each_entry(value: &mut Value, mut f: impl FnMut(&mut Value)) {
    if let Value::Object(map) = value {
        map.values_mut().for_each(|item| f(item));
    }
}

/// Mutable access to a field of an object, if both exist.
pub fn field_mut<'a>(value: &'a mut Value, name: &str) -> Option<&'a mut Value> {
    value.as_object_mut().and_then(|map| map.get_mut(name))
}
