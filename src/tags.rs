//! Cross-feature index of scenarios grouped by tag.
//!
//! Tag names are keyed case-insensitively, ignoring a leading `@`. A
//! scenario is attached to a tag at most once per (feature URI, scenario
//! name), however many times the tag reaches it through the feature or the
//! scenario itself.
use crate::aggregate::{AggregateStats, ClassifiedFeature, ClassifiedScenario};
use crate::classify::Status;
use std::collections::BTreeMap;

/// A scenario paired with the URI of the feature that owns it.
#[derive(Debug, Clone)]
pub struct ScenarioTag<'r> {
    pub feature_uri: &'r str,
    pub feature_name: &'r str,
    pub scenario: &'r ClassifiedScenario<'r>,
}

impl ScenarioTag<'_> {
    fn same_scenario(&self, feature_uri: &str, scenario_name: &str) -> bool {
        self.feature_uri.to_lowercase() == feature_uri.to_lowercase()
            && self.scenario.scenario.name.to_lowercase() == scenario_name.to_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct TagObject<'r> {
    /// First spelling seen, trimmed.
    pub name: String,
    pub scenarios: Vec<ScenarioTag<'r>>,
}

impl<'r> TagObject<'r> {
    fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            scenarios: Vec::new(),
        }
    }

    /// Insert unless the (feature URI, scenario name) pair is already present.
    /// Returns whether the entry was added.
    pub fn add_scenario(&mut self, entry: ScenarioTag<'r>) -> bool {
        let duplicate = self
            .scenarios
            .iter()
            .any(|existing| existing.same_scenario(entry.feature_uri, &entry.scenario.scenario.name));
        if duplicate {
            return false;
        }
        self.scenarios.push(entry);
        true
    }

    pub fn stats(&self) -> AggregateStats {
        AggregateStats::from_statuses(
            self.scenarios
                .iter()
                .flat_map(|entry| entry.scenario.steps.iter())
                .map(|step| (step.outcome.final_status, step.step.duration_ns())),
        )
    }

    pub fn status(&self) -> Status {
        self.stats().status()
    }

    pub fn failed_scenarios(&self) -> usize {
        self.scenarios
            .iter()
            .filter(|entry| entry.scenario.status().is_failed())
            .count()
    }

    /// Page name: the tag without surrounding whitespace or a leading `@`.
    /// Path separators become `-` so the page stays inside `tags/`.
    pub fn file_name(&self) -> String {
        format!("{}.html", page_stem(&self.name))
    }
}

#[derive(Debug, Default)]
pub struct TagIndex<'r> {
    tags: BTreeMap<String, TagObject<'r>>,
}

impl<'r> TagIndex<'r> {
    pub fn get(&self, name: &str) -> Option<&TagObject<'r>> {
        self.tags.get(&tag_key(name))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags ordered by their case-folded name.
    pub fn iter(&self) -> impl Iterator<Item = &TagObject<'r>> {
        self.tags.values()
    }

    pub fn add(&mut self, tag_name: &str, entry: ScenarioTag<'r>) -> bool {
        let key = tag_key(tag_name);
        if key.is_empty() {
            return false;
        }
        self.tags
            .entry(key)
            .or_insert_with(|| TagObject::new(tag_name))
            .add_scenario(entry)
    }
}

/// `@smoke`, `smoke` and ` @Smoke ` all share one entry and one page.
fn tag_key(name: &str) -> String {
    page_stem(name).to_lowercase()
}

fn page_stem(tag_name: &str) -> String {
    let stripped = tag_name.trim();
    let stripped = stripped.strip_prefix('@').unwrap_or(stripped).trim();
    stripped.replace(['/', '\\'], "-")
}

/// Build the tag index from classified features, feature tags first.
pub fn build_tag_index<'r>(features: &'r [ClassifiedFeature<'r>]) -> TagIndex<'r> {
    let mut index = TagIndex::default();
    for classified in features {
        let feature = classified.feature;
        let entry = move |scenario: &'r ClassifiedScenario<'r>| ScenarioTag {
            feature_uri: feature.uri(),
            feature_name: feature.name.as_str(),
            scenario,
        };
        for tag in &feature.tags {
            for scenario in &classified.scenarios {
                index.add(&tag.name, entry(scenario));
            }
        }
        for scenario in &classified.scenarios {
            for tag in &scenario.scenario.tags {
                index.add(&tag.name, entry(scenario));
            }
        }
    }
    tracing::debug!(tags = index.len(), "built tag index");
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::classify_features;
    use crate::classify::EscalationPolicy;
    use crate::model::Feature;

    fn parse(json: &str) -> Vec<Feature> {
        crate::loader::parse_features(json.as_bytes()).expect("parse fixture")
    }

    const TAGGED: &str = r#"[
        {"name": "Login", "uri": "features/login.feature", "tags": [{"name": "@smoke"}],
         "elements": [
            {"name": "valid user", "tags": [{"name": "@smoke"}, {"name": "@Fast"}],
             "steps": [{"keyword": "Given ", "name": "a", "result": {"status": "passed", "duration": 5000000}}]},
            {"name": "locked user", "tags": [{"name": "@slow"}],
             "steps": [{"keyword": "Given ", "name": "b", "result": {"status": "failed", "duration": 1000000}}]}
         ]},
        {"name": "Search", "uri": "features/search.feature",
         "elements": [
            {"name": "find", "tags": [{"name": "@fast"}, {"name": " @FAST "}],
             "steps": [{"keyword": "When ", "name": "c", "result": {"status": "skipped"}}]}
         ]}
    ]"#;

    #[test]
    fn feature_and_scenario_tags_dedupe() {
        let features = parse(TAGGED);
        let classified =
            classify_features(&features, &EscalationPolicy::default()).expect("classify");
        let index = build_tag_index(&classified);

        let smoke = index.get("@smoke").expect("smoke tag");
        assert_eq!(smoke.scenarios.len(), 2);
        let names: Vec<_> = smoke
            .scenarios
            .iter()
            .map(|entry| entry.scenario.scenario.name.as_str())
            .collect();
        assert_eq!(names, vec!["valid user", "locked user"]);
        assert_eq!(smoke.status(), Status::Failed);
        assert_eq!(smoke.failed_scenarios(), 1);
        assert_eq!(smoke.stats().duration_ns, 6_000_000);
    }

    #[test]
    fn tag_lookup_ignores_case() {
        let features = parse(TAGGED);
        let classified =
            classify_features(&features, &EscalationPolicy::default()).expect("classify");
        let index = build_tag_index(&classified);

        let fast = index.get("@FaSt").expect("fast tag");
        assert_eq!(fast.name, "@Fast");
        assert_eq!(fast.scenarios.len(), 2);
        assert_eq!(fast.file_name(), "Fast.html");
        assert_eq!(fast.status(), Status::Passed);
        assert_eq!(fast.stats().skipped, 1);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn adding_the_same_pair_twice_is_idempotent() {
        let features = parse(TAGGED);
        let classified =
            classify_features(&features, &EscalationPolicy::default()).expect("classify");
        let scenario = &classified[0].scenarios[0];
        let mut index = TagIndex::default();
        let entry = ScenarioTag {
            feature_uri: "features/login.feature",
            feature_name: "Login",
            scenario,
        };
        assert!(index.add("@x", entry.clone()));
        assert!(!index.add("@X", entry.clone()));
        let shouting = ScenarioTag {
            feature_uri: "FEATURES/LOGIN.FEATURE",
            ..entry
        };
        assert!(!index.add("@x", shouting));
        assert_eq!(index.get("@x").expect("tag").scenarios.len(), 1);
    }

    #[test]
    fn file_name_strips_at_and_whitespace() {
        let tag = TagObject::new("  @release-1.2 ");
        assert_eq!(tag.file_name(), "release-1.2.html");
        assert_eq!(TagObject::new("@../etc/x").file_name(), "..-etc-x.html");
        assert!(TagIndex::default().get("anything").is_none());
    }

    #[test]
    fn spellings_sharing_a_page_share_a_tag() {
        let features = parse(
            r#"[{"name": "Login", "uri": "login.feature", "elements": [
                {"name": "a", "tags": [{"name": "@smoke"}],
                 "steps": [{"keyword": "Given ", "name": "a", "result": {"status": "passed"}}]},
                {"name": "b", "tags": [{"name": "smoke"}, {"name": "@team/web"}],
                 "steps": [{"keyword": "Given ", "name": "b", "result": {"status": "failed"}}]},
                {"name": "c", "tags": [{"name": "@team-web"}],
                 "steps": [{"keyword": "Given ", "name": "c", "result": {"status": "passed"}}]}
            ]}]"#,
        );
        let classified =
            classify_features(&features, &EscalationPolicy::default()).expect("classify");
        let index = build_tag_index(&classified);

        let pages: Vec<_> = index.iter().map(|tag| (tag.name.as_str(), tag.file_name())).collect();
        assert_eq!(
            pages,
            vec![
                ("@smoke", "smoke.html".to_string()),
                ("@team/web", "team-web.html".to_string()),
            ]
        );
        let smoke = index.get("smoke").expect("smoke tag");
        assert_eq!(smoke.scenarios.len(), 2);
        assert_eq!(smoke.status(), Status::Failed);
        assert_eq!(index.get("@Team-Web").expect("team tag").scenarios.len(), 2);
    }
}
