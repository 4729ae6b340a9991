use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Query parameters for a single API request
///
/// Kept sorted so that two requests with the same parameters produce the same key,
/// which the response cache and the continuation loop rely on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Display) -> &mut Self {
        self.0.insert(name.into(), value.to_string());
        self
    }

    /// Insert the parameter only if it isn't already set
    pub fn insert_default(&mut self, name: impl Into<String>, value: impl Display) -> &mut Self {
        self.0
            .entry(name.into())
            .or_insert_with(|| value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Merge a `continue` object returned by the API into these parameters
    pub fn extend_from_json(&mut self, object: &serde_json::Map<String, Value>) -> &mut Self {
        for (name, value) in object {
            self.0.insert(name.clone(), json_to_param(value));
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = itertools::join(self.iter().map(|(k, v)| format!("{k}={v}")), "&");
        f.write_str(&joined)
    }
}

impl<K: Into<String>, V: Display> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

fn json_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
