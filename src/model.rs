//! Typed records for behavioral-test JSON results.
//!
//! Only the fields the report uses are modeled. Anything else in the input is
//! ignored on parse, and `null` collections are read as empty.
use serde::{Deserialize, Deserializer, Serialize};

/// Top-level grouping of scenarios, identified by its source URI.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Feature {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub elements: Vec<Scenario>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<Tag>,
}

impl Feature {
    /// Identity used for tag dedup and file naming: `uri`, then `id`, then `name`.
    pub fn uri(&self) -> &str {
        [self.uri.as_deref(), self.id.as_deref(), Some(self.name.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or("unnamed")
    }

    /// Output page name: the URI with path separators replaced by `-`.
    pub fn file_name(&self) -> String {
        format!("{}.html", self.uri().replace(['/', '\\'], "-"))
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.elements.iter().flat_map(|scenario| scenario.steps.iter())
    }
}

/// One executable test case within a feature (an "element" in the input).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<Step>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub before: Vec<Hook>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub after: Vec<Hook>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<Tag>,
}

impl Scenario {
    pub fn is_background(&self) -> bool {
        self.kind.as_deref() == Some("background")
    }
}

/// Before/after hook run around a scenario. Shown on the feature page but
/// not counted as a step.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Hook {
    #[serde(default)]
    pub result: Option<StepResult>,
}

impl Hook {
    pub fn raw_status(&self) -> &str {
        self.result
            .as_ref()
            .map(|result| result.status.as_str())
            .unwrap_or("missing")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Step {
    #[serde(default, deserialize_with = "null_as_default")]
    pub keyword: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub result: Option<StepResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rows: Vec<Row>,
}

impl Step {
    /// Raw status string; a step without a result object is `missing`.
    pub fn raw_status(&self) -> &str {
        self.result
            .as_ref()
            .map(|result| result.status.as_str())
            .unwrap_or("missing")
    }

    pub fn duration_ns(&self) -> u64 {
        self.result
            .as_ref()
            .and_then(|result| result.duration)
            .unwrap_or(0)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|result| result.error_message.as_deref())
    }
}

/// Raw outcome of a step as written by the test runner.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StepResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Nanoseconds; pending steps commonly omit it.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Row {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Tag {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub line: Option<u64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_replaces_both_separator_kinds() {
        let feature = Feature {
            uri: Some("features/login\\basic.feature".to_string()),
            ..Feature::default()
        };
        assert_eq!(feature.file_name(), "features-login-basic.feature.html");
    }

    #[test]
    fn uri_falls_back_to_id_then_name() {
        let mut feature = Feature {
            name: "Checkout".to_string(),
            id: Some("checkout".to_string()),
            ..Feature::default()
        };
        assert_eq!(feature.uri(), "checkout");
        feature.id = None;
        assert_eq!(feature.uri(), "Checkout");
    }

    #[test]
    fn null_collections_and_missing_results_parse() {
        let json = r#"[{"name":"F","uri":"a.feature","tags":null,"elements":[
            {"name":"S","steps":[{"keyword":"Given ","name":"x","rows":null}]}
        ]}]"#;
        let features: Vec<Feature> = serde_json::from_str(json).expect("parse");
        let step = &features[0].elements[0].steps[0];
        assert!(features[0].tags.is_empty());
        assert_eq!(step.raw_status(), "missing");
        assert_eq!(step.duration_ns(), 0);
    }

    #[test]
    fn hooks_and_background_are_read() {
        let json = r#"[{"name":"F","elements":[
            {"name":"","type":"background","steps":[]},
            {"name":"S","type":"scenario","before":[{"result":{"status":"passed","duration":12}}],
             "after":[{}],"steps":[]}
        ]}]"#;
        let features: Vec<Feature> = serde_json::from_str(json).expect("parse");
        let elements = &features[0].elements;
        assert!(elements[0].is_background());
        assert!(!elements[1].is_background());
        assert_eq!(elements[1].before[0].raw_status(), "passed");
        assert_eq!(elements[1].after[0].raw_status(), "missing");
    }
}
