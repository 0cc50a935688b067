#![forbid(unsafe_code)]

//! Partial records.
//!
//! A [`Patch`] holds only the fields an action changes, keyed by the
//! camelCase field name records serialize with. Merging is shallow: each
//! key present in the patch replaces the whole value of that field, so
//! container-valued fields (channel maps, sensor lists) must be supplied in
//! full.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name → value map describing part of a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Map<String, Value>);

impl Patch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Patch::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set one field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Field names in this patch, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the listed fields that are present.
    #[must_use]
    pub fn project<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> Patch {
        let mut out = Map::new();
        for field in fields {
            if let Some(value) = self.0.get(field) {
                out.insert(field.to_owned(), value.clone());
            }
        }
        Patch(out)
    }

    /// Overwrite `target`'s keys with this patch's keys.
    pub fn merge_into(&self, target: &mut Map<String, Value>) {
        for (field, value) in &self.0 {
            target.insert(field.clone(), value.clone());
        }
    }

    /// Overlay `other` on top of this patch.
    pub fn extend(&mut self, other: &Patch) {
        other.merge_into(&mut self.0);
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Patch {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Patch {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_shallow_per_field() {
        let mut record = json!({
            "rotationDegrees": 0,
            "name": "Zone 5",
            "sensorIds": ["a", "b"],
        })
        .as_object()
        .cloned()
        .unwrap();

        Patch::new()
            .with("rotationDegrees", 90)
            .with("sensorIds", json!(["c"]))
            .merge_into(&mut record);

        assert_eq!(record["rotationDegrees"], json!(90));
        assert_eq!(record["name"], json!("Zone 5"));
        // Containers are replaced, not merged.
        assert_eq!(record["sensorIds"], json!(["c"]));
    }

    #[test]
    fn project_keeps_only_present_fields() {
        let patch = Patch::new().with("a", 1).with("b", 2);
        let projected = patch.project(["b", "missing"]);
        assert_eq!(projected, Patch::new().with("b", 2));
    }

    #[test]
    fn extend_overrides_existing_keys() {
        let mut base = Patch::new().with("a", 1).with("b", 2);
        base.extend(&Patch::new().with("b", 3));
        assert_eq!(base.get("b"), Some(&json!(3)));
        assert_eq!(base.len(), 2);
    }
}
