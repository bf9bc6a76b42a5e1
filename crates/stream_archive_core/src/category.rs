use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Details,
    Locations,
    Fatalities,
    Others,
}

impl Category {
    /// Keyed categories in lookup priority order; `Others` is the fallback.
    pub const PRIORITY: [Category; 3] = [Self::Details, Self::Locations, Self::Fatalities];

    pub const ALL: [Category; 4] = [
        Self::Details,
        Self::Locations,
        Self::Fatalities,
        Self::Others,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Details => "details",
            Self::Locations => "locations",
            Self::Fatalities => "fatalities",
            Self::Others => "others",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the category of a deserialized object by key presence.
///
/// Only presence matters: a `details` key holding `null` still classifies
/// the object as `details`.
pub fn classify(object: &Map<String, Value>) -> Category {
    Category::PRIORITY
        .into_iter()
        .find(|category| object.contains_key(category.as_str()))
        .unwrap_or(Category::Others)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value
            .as_object()
            .cloned()
            .expect("test object should be an object")
    }

    #[test]
    fn classifies_by_single_matching_key() {
        assert_eq!(
            classify(&object(json!({"id": "1", "details": {}}))),
            Category::Details
        );
        assert_eq!(
            classify(&object(json!({"id": "1", "locations": []}))),
            Category::Locations
        );
        assert_eq!(
            classify(&object(json!({"id": "1", "fatalities": 3}))),
            Category::Fatalities
        );
    }

    #[test]
    fn details_wins_over_other_keys() {
        let all = object(json!({"fatalities": 1, "locations": [], "details": null}));
        assert_eq!(classify(&all), Category::Details);

        let no_details = object(json!({"fatalities": 1, "locations": []}));
        assert_eq!(classify(&no_details), Category::Locations);
    }

    #[test]
    fn falls_back_to_others() {
        assert_eq!(classify(&object(json!({}))), Category::Others);
        assert_eq!(
            classify(&object(json!({"id": "1", "hello": "world", "Details": 1}))),
            Category::Others
        );
    }

    #[test]
    fn ignores_nested_keys() {
        let nested = object(json!({"event": {"details": "nested"}}));
        assert_eq!(classify(&nested), Category::Others);
    }

    #[test]
    fn serializes_as_path_segment() {
        for category in Category::ALL {
            assert_eq!(
                serde_json::to_value(category).expect("category should serialize"),
                Value::from(category.as_str())
            );
        }
    }
}
