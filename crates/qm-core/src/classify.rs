//! Rule-based hierarchical categorization of events.
//!
//! A rule is `(pattern, category, parent)`. Rules are tried in listed order
//! against an event's `app`, `title` and `url` attributes and the first match
//! wins. Parent links form a forest; an event is tagged with its leaf category
//! and every ancestor up to the root.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::event::{CATEGORY_KEY, Event, TAGS_KEY};
use crate::types::CategoryName;

/// Category assigned to events no rule matches.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Attributes used as the match subject, in the order they are tested.
const MATCH_KEYS: [&str; 3] = ["app", "title", "url"];

const EXAMPLE_RULES: &str = include_str!("../categories.example.toml");

/// Classification errors.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A rule's pattern is not a valid regex.
    #[error("invalid pattern for category {category}: {source}")]
    InvalidPattern {
        category: String,
        #[source]
        source: regex::Error,
    },
    /// Following parent links from a category leads back to it.
    #[error("category {category} is its own ancestor")]
    Cycle { category: String },
    /// A categories file could not be read.
    #[error("failed to read categories from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// A categories file is not valid TOML.
    #[error("failed to parse categories: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One classification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Regex searched for in the event's attributes.
    pub pattern: String,
    /// Category assigned on match.
    #[serde(rename = "name")]
    pub category: CategoryName,
    /// Parent category, or none for a root category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CategoryName>,
}

impl CategoryRule {
    /// Convenience constructor for tests and built-in rules.
    pub fn new(
        pattern: &str,
        category: &str,
        parent: Option<&str>,
    ) -> Result<Self, crate::types::ValidationError> {
        Ok(Self {
            pattern: pattern.to_string(),
            category: CategoryName::new(category)?,
            parent: parent.map(CategoryName::new).transpose()?,
        })
    }
}

/// An ordered list of rules, as stored in a categories TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
}

impl RuleSet {
    /// Parses rules from TOML (`[[categories]]` tables).
    pub fn from_toml_str(s: &str) -> Result<Self, ClassifyError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads rules from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ClassifyError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ClassifyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// The bundled example rules.
    pub fn example() -> Self {
        // The bundled file is covered by tests, so an error here means it was edited badly.
        Self::from_toml_str(EXAMPLE_RULES).unwrap_or_else(|err| {
            tracing::error!(error = %err, "bundled example categories are invalid");
            Self::default()
        })
    }
}

#[derive(Debug)]
struct CompiledRule {
    regex: Regex,
    category: String,
}

/// Compiled rules plus the category forest.
#[derive(Debug)]
pub struct Classifier {
    rules: Vec<CompiledRule>,
    parents: HashMap<String, Option<String>>,
}

impl Classifier {
    /// Compiles rules, validating patterns and parent links.
    pub fn new(rules: &[CategoryRule]) -> Result<Self, ClassifyError> {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut parents: HashMap<String, Option<String>> = HashMap::new();

        for rule in rules {
            let regex = Regex::new(&rule.pattern).map_err(|source| ClassifyError::InvalidPattern {
                category: rule.category.to_string(),
                source,
            })?;
            compiled.push(CompiledRule {
                regex,
                category: rule.category.to_string(),
            });
            // The first rule naming a category decides its parent.
            parents
                .entry(rule.category.to_string())
                .or_insert_with(|| rule.parent.as_ref().map(ToString::to_string));
        }

        let classifier = Self {
            rules: compiled,
            parents,
        };
        for category in classifier.parents.keys() {
            classifier.ancestry(category)?;
        }
        Ok(classifier)
    }

    /// Builds a classifier from a rule set.
    pub fn from_rule_set(rules: &RuleSet) -> Result<Self, ClassifyError> {
        Self::new(&rules.categories)
    }

    /// `category` followed by its ancestors up to the root.
    fn ancestry(&self, category: &str) -> Result<Vec<String>, ClassifyError> {
        let mut chain = vec![category.to_string()];
        let mut seen: HashSet<&str> = HashSet::from([category]);
        let mut current = category;
        while let Some(Some(parent)) = self.parents.get(current) {
            if !seen.insert(parent.as_str()) {
                return Err(ClassifyError::Cycle {
                    category: category.to_string(),
                });
            }
            chain.push(parent.clone());
            current = parent.as_str();
        }
        Ok(chain)
    }

    /// Every category known to the classifier, including parents only named
    /// as parents and [`UNCATEGORIZED`], sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut all: HashSet<&str> = self.parents.keys().map(String::as_str).collect();
        all.extend(self.parents.values().filter_map(|p| p.as_deref()));
        all.insert(UNCATEGORIZED);
        let mut sorted: Vec<String> = all.into_iter().map(str::to_string).collect();
        sorted.sort();
        sorted
    }

    /// The leaf category of the first matching rule, if any.
    pub fn matching_category(&self, event: &Event) -> Option<&str> {
        let subjects: Vec<&str> = MATCH_KEYS
            .iter()
            .filter_map(|key| event.attr_str(key))
            .collect();
        if subjects.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| subjects.iter().any(|s| rule.regex.is_match(s)))
            .map(|rule| rule.category.as_str())
    }

    /// Tags for an event: matched leaf then ancestors, or `Uncategorized`.
    pub fn tags_for(&self, event: &Event) -> Vec<String> {
        self.matching_category(event)
            .and_then(|leaf| self.ancestry(leaf).ok())
            .unwrap_or_else(|| vec![UNCATEGORIZED.to_string()])
    }

    /// Sets `$category` and `$tags` on every event.
    pub fn classify(&self, events: &mut [Event]) {
        for event in events.iter_mut() {
            let tags = self.tags_for(event);
            event.set_attr(CATEGORY_KEY, tags[0].clone());
            event.set_attr(
                TAGS_KEY,
                Value::Array(tags.into_iter().map(Value::String).collect()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::{Map, json};

    fn event(data: Value) -> Event {
        Event::new(
            Utc::now(),
            Duration::seconds(10),
            data.as_object().cloned().unwrap_or_else(Map::new),
        )
        .unwrap()
    }

    fn rule(pattern: &str, category: &str, parent: Option<&str>) -> CategoryRule {
        CategoryRule::new(pattern, category, parent).unwrap()
    }

    #[test]
    fn first_matching_rule_wins() {
        let classifier = Classifier::new(&[
            rule("GitHub", "Programming", None),
            rule("Git", "Version Control", None),
        ])
        .unwrap();
        let e = event(json!({"title": "GitHub - pulls"}));
        assert_eq!(classifier.tags_for(&e), vec!["Programming"]);

        let reversed = Classifier::new(&[
            rule("Git", "Version Control", None),
            rule("GitHub", "Programming", None),
        ])
        .unwrap();
        assert_eq!(reversed.tags_for(&e), vec!["Version Control"]);
    }

    #[test]
    fn tags_include_all_ancestors() {
        let classifier = Classifier::new(&[
            rule("subcategory without matching", "Video", Some("Media")),
            rule("YouTube|youtube.com", "YouTube", Some("Video")),
        ])
        .unwrap();
        let e = event(json!({"app": "Firefox", "url": "https://youtube.com/watch"}));
        assert_eq!(classifier.tags_for(&e), vec!["YouTube", "Video", "Media"]);
    }

    #[test]
    fn unmatched_and_keyless_events_are_uncategorized() {
        let classifier = Classifier::new(&[rule("Spotify", "Music", None)]).unwrap();
        assert_eq!(
            classifier.tags_for(&event(json!({"title": "Terminal"}))),
            vec![UNCATEGORIZED]
        );
        assert_eq!(
            classifier.tags_for(&event(json!({"substance": "Caffeine"}))),
            vec![UNCATEGORIZED]
        );
        assert_eq!(classifier.tags_for(&event(json!({"title": 5}))), vec![UNCATEGORIZED]);
    }

    #[test]
    fn classify_sets_attributes_without_touching_interval() {
        let classifier = Classifier::new(&[rule("Spotify", "Music", Some("Media"))]).unwrap();
        let mut events = vec![event(json!({"app": "Spotify"}))];
        let before = (events[0].timestamp, events[0].duration);

        classifier.classify(&mut events);

        assert_eq!((events[0].timestamp, events[0].duration), before);
        assert_eq!(events[0].category(), Some("Music"));
        assert_eq!(events[0].tags(), vec!["Music", "Media"]);
    }

    #[test]
    fn first_declaration_decides_parent() {
        let classifier = Classifier::new(&[
            rule("Facebook", "Social Media", Some("Media")),
            rule("LinkedIn", "Social Media", Some("Work")),
        ])
        .unwrap();
        let e = event(json!({"title": "LinkedIn"}));
        assert_eq!(classifier.tags_for(&e), vec!["Social Media", "Media"]);
    }

    #[test]
    fn cyclic_parents_are_rejected() {
        let err = Classifier::new(&[rule("a", "A", Some("B")), rule("b", "B", Some("A"))])
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Cycle { .. }));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = Classifier::new(&[rule("(unclosed", "Broken", None)]).unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }

    #[test]
    fn example_rules_parse_and_classify() {
        let rules = RuleSet::example();
        assert!(!rules.categories.is_empty());
        let classifier = Classifier::from_rule_set(&rules).unwrap();

        let e = event(json!({"title": "FMAA01 - Analysis in One Variable"}));
        assert_eq!(classifier.tags_for(&e), vec!["Maths", "School", "Work"]);

        let categories = classifier.categories();
        assert!(categories.contains(&"Media".to_string()));
        assert!(categories.contains(&UNCATEGORIZED.to_string()));
    }

    #[test]
    fn rule_set_parses_toml() {
        let rules = RuleSet::from_toml_str(
            r#"
            [[categories]]
            name = "Chess"
            parent = "Games"
            pattern = "lichess"

            [[categories]]
            name = "Games"
            pattern = "Steam"
            "#,
        )
        .unwrap();
        assert_eq!(rules.categories.len(), 2);
        assert_eq!(rules.categories[0].category.as_str(), "Chess");
        assert!(rules.categories[1].parent.is_none());
    }

    #[test]
    fn rule_set_rejects_empty_names() {
        let result = RuleSet::from_toml_str(
            r#"
            [[categories]]
            name = ""
            pattern = "x"
            "#,
        );
        assert!(result.is_err());
    }
}
