//! Converter and validator configuration.
//!
//! All fields have named defaults so a partially specified config file is
//! still usable. Values are read-only once constructed and may be shared
//! across threads processing different files.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const DATE_HEADER: &str = "Date:";
pub const STATUS_HEADER: &str = "Status:";
pub const SLEEP_HEADER: &str = "Sleep:";
pub const GETUP_HEADER: &str = "Getup:";
pub const REMARK_HEADER: &str = "Remark:";

/// Default remark line prefix.
pub const DEFAULT_REMARK_PREFIX: &str = "r ";

/// Default wake keywords.
pub const DEFAULT_WAKE_KEYWORDS: [&str; 3] = ["起床", "醒", "wake"];

/// Activity name synthesized for the overnight interval between two days.
pub const SLEEP_NIGHT: &str = "sleep_night";

/// Substring marking an activity as study time.
pub const STUDY_MARKER: &str = "study";

/// A single duration bucket: activities shorter than `less_than_minutes`
/// are renamed to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRule {
    pub less_than_minutes: u32,
    pub value: String,
}

/// Duration buckets for one activity, kept sorted ascending by threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DurationRule>", into = "Vec<DurationRule>")]
pub struct DurationRules(Vec<DurationRule>);

impl DurationRules {
    /// Returns the replacement name of the first bucket whose threshold
    /// exceeds `minutes`.
    pub fn classify(&self, minutes: u32) -> Option<&str> {
        self.0
            .iter()
            .find(|rule| minutes < rule.less_than_minutes)
            .map(|rule| rule.value.as_str())
    }

    pub fn as_slice(&self) -> &[DurationRule] {
        &self.0
    }
}

impl From<Vec<DurationRule>> for DurationRules {
    fn from(mut rules: Vec<DurationRule>) -> Self {
        rules.sort_by_key(|rule| rule.less_than_minutes);
        Self(rules)
    }
}

impl From<DurationRules> for Vec<DurationRule> {
    fn from(rules: DurationRules) -> Self {
        rules.0
    }
}

/// Configuration shared by the source validator, converter, and output
/// validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Marks a free-text remark line in a source log.
    pub remark_prefix: String,

    /// Header lines of a converted day block, in order. The last header
    /// opens the activity section.
    pub header_order: Vec<String>,

    /// Event descriptions that record waking up rather than an activity.
    pub wake_keywords: BTreeSet<String>,

    /// Literal renames applied to raw event descriptions.
    pub text_mappings: BTreeMap<String, String>,

    /// Second rename stage, applied after `text_mappings`; the result is
    /// looked up in `duration_mappings`.
    pub text_duration_mappings: BTreeMap<String, String>,

    /// Duration-based renames keyed by activity name.
    pub duration_mappings: BTreeMap<String, DurationRules>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            remark_prefix: DEFAULT_REMARK_PREFIX.to_string(),
            header_order: [DATE_HEADER, STATUS_HEADER, SLEEP_HEADER, GETUP_HEADER, REMARK_HEADER]
                .into_iter()
                .map(String::from)
                .collect(),
            wake_keywords: DEFAULT_WAKE_KEYWORDS.into_iter().map(String::from).collect(),
            text_mappings: BTreeMap::new(),
            text_duration_mappings: BTreeMap::new(),
            duration_mappings: BTreeMap::new(),
        }
    }
}

impl ConverterConfig {
    pub fn is_wake_keyword(&self, description: &str) -> bool {
        self.wake_keywords.contains(description)
    }

    /// Returns the trimmed remark text if `line` is a remark line.
    ///
    /// A line consisting of only the prefix is not a remark.
    pub fn remark_text<'a>(&self, line: &'a str) -> Option<&'a str> {
        if self.remark_prefix.is_empty() {
            return None;
        }
        let text = line.strip_prefix(self.remark_prefix.as_str())?.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Normalizes a raw description into an activity name.
    ///
    /// Renames are applied once each, in order: literal text, then
    /// duration text, then duration buckets.
    pub fn activity_name(&self, description: &str, duration_minutes: u32) -> String {
        let mut name = self
            .text_mappings
            .get(description)
            .map_or(description, String::as_str);
        if let Some(mapped) = self.text_duration_mappings.get(name) {
            name = mapped.as_str();
        }
        if let Some(bucketed) = self
            .duration_mappings
            .get(name)
            .and_then(|rules| rules.classify(duration_minutes))
        {
            name = bucketed;
        }
        name.to_string()
    }
}

/// Parent category → leaf activity names considered valid.
///
/// An empty membership accepts every activity name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMembership(BTreeMap<String, BTreeSet<String>>);

impl CategoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `leaf` under `parent`.
    pub fn insert(&mut self, parent: impl Into<String>, leaf: impl Into<String>) {
        self.0.entry(parent.into()).or_default().insert(leaf.into());
    }

    /// Whether any membership data was provided.
    pub fn is_loaded(&self) -> bool {
        !self.0.is_empty()
    }

    /// Whether `name` is a leaf under some parent, or no data is loaded.
    pub fn is_known(&self, name: &str) -> bool {
        !self.is_loaded() || self.0.values().any(|leaves| leaves.contains(name))
    }
}

impl<P, L> FromIterator<(P, L)> for CategoryMembership
where
    P: Into<String>,
    L: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (P, L)>>(iter: T) -> Self {
        let mut membership = Self::new();
        for (parent, leaf) in iter {
            membership.insert(parent, leaf);
        }
        membership
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(less_than_minutes: u32, value: &str) -> DurationRule {
        DurationRule {
            less_than_minutes,
            value: value.to_string(),
        }
    }

    fn config_with_rules() -> ConverterConfig {
        let mut config = ConverterConfig::default();
        config
            .text_mappings
            .insert("单词".to_string(), "study_english_words".to_string());
        config
            .text_duration_mappings
            .insert("lunch".to_string(), "meal".to_string());
        config.duration_mappings.insert(
            "meal".to_string(),
            vec![rule(120, "meal_long"), rule(30, "meal_short")].into(),
        );
        config
    }

    #[test]
    fn duration_rules_sorted_on_construction() {
        let rules: DurationRules = vec![rule(60, "b"), rule(10, "a"), rule(30, "c")].into();
        let thresholds: Vec<_> = rules.as_slice().iter().map(|r| r.less_than_minutes).collect();
        assert_eq!(thresholds, vec![10, 30, 60]);
    }

    #[test]
    fn duration_rules_sorted_on_deserialize() {
        let json = r#"{"duration_mappings":{"meal":[
            {"less_than_minutes":120,"value":"meal_long"},
            {"less_than_minutes":30,"value":"meal_short"}
        ]}}"#;
        let config: ConverterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.duration_mappings["meal"].classify(10), Some("meal_short"));
        assert_eq!(config.remark_prefix, DEFAULT_REMARK_PREFIX);
    }

    #[test]
    fn first_matching_bucket_wins() {
        let config = config_with_rules();
        assert_eq!(config.activity_name("lunch", 20), "meal_short");
        assert_eq!(config.activity_name("lunch", 30), "meal_long");
        assert_eq!(config.activity_name("lunch", 119), "meal_long");
        assert_eq!(config.activity_name("lunch", 120), "meal");
    }

    #[test]
    fn text_mapping_applies_before_duration_mapping() {
        let config = config_with_rules();
        assert_eq!(config.activity_name("单词", 45), "study_english_words");
        assert_eq!(config.activity_name("unmapped", 45), "unmapped");
    }

    #[test]
    fn reclassified_names_are_not_remapped() {
        let config = config_with_rules();
        assert_eq!(config.activity_name("meal_short", 5), "meal_short");
        assert_eq!(config.activity_name("meal_long", 5), "meal_long");
    }

    #[test]
    fn remark_lines_need_content() {
        let config = ConverterConfig::default();
        assert_eq!(config.remark_text("r  went hiking "), Some("went hiking"));
        assert_eq!(config.remark_text("r   "), None);
        assert_eq!(config.remark_text("0800study"), None);

        let no_prefix = ConverterConfig {
            remark_prefix: String::new(),
            ..ConverterConfig::default()
        };
        assert_eq!(no_prefix.remark_text("anything"), None);
    }

    #[test]
    fn empty_membership_accepts_everything() {
        let membership = CategoryMembership::new();
        assert!(!membership.is_loaded());
        assert!(membership.is_known("anything_at_all"));
    }

    #[test]
    fn membership_checks_leaves_only() {
        let membership: CategoryMembership = [("study", "study_math"), ("sleep", "sleep_night")]
            .into_iter()
            .collect();
        assert!(membership.is_known("study_math"));
        assert!(membership.is_known("sleep_night"));
        assert!(!membership.is_known("study"));
    }
}
