use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A workload's pod-template labels.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Labels(Map);

pub type Map = BTreeMap<String, String>;

/// Flattened `key:value` selector strings.
pub type Selectors = BTreeSet<String>;

// === impl Labels ===

impl Labels {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Flattens the labels into `key:value` strings, the form services select on.
    pub fn selectors(&self) -> Selectors {
        flatten(&self.0)
    }
}

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(labels)
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        Self(labels.unwrap_or_default())
    }
}

impl From<Labels> for Map {
    #[inline]
    fn from(Labels(labels): Labels) -> Self {
        labels
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        &self.0
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Flattens a label map (or a service's selector map) into `key:value` strings.
pub fn flatten(map: &Map) -> Selectors {
    map.iter().map(|(k, v)| format!("{}:{}", k, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use std::iter::FromIterator;

    #[test]
    fn flattens_to_key_value_strings() {
        let labels = Labels::from(btreemap! {
            "app".to_string() => "cart".to_string(),
            "tier".to_string() => "backend".to_string(),
        });
        let selectors = labels.selectors();
        assert_eq!(selectors.len(), 2);
        assert!(selectors.contains("app:cart"));
        assert!(selectors.contains("tier:backend"));
    }

    #[test]
    fn missing_labels_are_empty() {
        let labels = Labels::from(None);
        assert!(labels.is_empty());
        assert!(labels.selectors().is_empty());
    }

    #[test]
    fn values_may_contain_colons() {
        let labels = Labels::from_iter(Some(("endpoint", "db:5432")));
        assert_eq!(labels.get("endpoint"), Some("db:5432"));
        assert!(labels.selectors().contains("endpoint:db:5432"));
    }
}
