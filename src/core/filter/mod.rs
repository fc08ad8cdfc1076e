use regex_automata::meta::{self, Regex};
use regex_syntax::hir::{Hir, Look};
use regex_syntax::ParserBuilder;
use serde::{Deserialize, Serialize};

use crate::core::feed::types::Entry;

/// Rule as written in configuration. Each field is a case-insensitive regular
/// expression that must match the whole field value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FilterRule {
    pub title: Option<String>,
    pub category: Option<String>,
    pub creator: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error(transparent)]
    Syntax(#[from] regex_syntax::Error),
    #[error(transparent)]
    Build(#[from] meta::BuildError),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid {field} pattern {pattern:?}: {source}")]
pub struct RuleError {
    pub field: &'static str,
    pub pattern: String,
    #[source]
    pub source: PatternError,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    title: Option<Regex>,
    category: Option<Regex>,
    creator: Option<Regex>,
}

impl CompiledRule {
    pub fn compile(rule: &FilterRule) -> Result<Self, RuleError> {
        Ok(Self {
            title: compile_pattern("title", rule.title.as_deref())?,
            category: compile_pattern("category", rule.category.as_deref())?,
            creator: compile_pattern("creator", rule.creator.as_deref())?,
        })
    }

    /// True if any configured field fully matches; for categories one match is enough.
    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(pattern) = &self.title {
            if pattern.is_match(&entry.title) {
                return true;
            }
        }
        if let Some(pattern) = &self.category {
            if entry
                .categories
                .iter()
                .any(|category| pattern.is_match(category))
            {
                return true;
            }
        }
        if let Some(pattern) = &self.creator {
            if pattern.is_match(&entry.creator) {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(rules: &[FilterRule]) -> Result<Self, RuleError> {
        let rules = rules
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        self.rules.iter().any(|rule| rule.matches(entry))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Returns true when the entry passes: excluded entries pass only if an
/// include rule matches as well.
pub fn classify(entry: &Entry, exclude: &RuleSet, include: &RuleSet) -> bool {
    !(exclude.matches(entry) && !include.matches(entry))
}

fn compile_pattern(field: &'static str, pattern: Option<&str>) -> Result<Option<Regex>, RuleError> {
    let Some(pattern) = pattern.filter(|pattern| !pattern.is_empty()) else {
        return Ok(None);
    };

    let rule_error = |source: PatternError| RuleError {
        field,
        pattern: pattern.to_string(),
        source,
    };

    // Anchor the parsed expression rather than the pattern text, so flags
    // and comments in the pattern cannot reach the anchors.
    let hir = ParserBuilder::new()
        .case_insensitive(true)
        .build()
        .parse(pattern)
        .map_err(|error| rule_error(error.into()))?;
    let anchored = Hir::concat(vec![Hir::look(Look::Start), hir, Hir::look(Look::End)]);
    meta::Builder::new()
        .build_from_hir(&anchored)
        .map(Some)
        .map_err(|error| rule_error(error.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(title: &str, categories: &[&str], creator: &str) -> Entry {
        Entry {
            title: title.to_string(),
            guid: "g1".to_string(),
            guid_permalink: None,
            link: "https://example.com/g1".to_string(),
            description: String::new(),
            pub_date: "Tue, 24 Feb 2026 10:00:00 GMT".to_string(),
            categories: categories.iter().map(ToString::to_string).collect(),
            creator: creator.to_string(),
        }
    }

    fn rule(title: Option<&str>, category: Option<&str>, creator: Option<&str>) -> FilterRule {
        FilterRule {
            title: title.map(ToString::to_string),
            category: category.map(ToString::to_string),
            creator: creator.map(ToString::to_string),
        }
    }

    fn rules(items: &[FilterRule]) -> RuleSet {
        RuleSet::compile(items).expect("rules must compile")
    }

    #[test]
    fn patterns_require_full_case_insensitive_match() {
        let set = rules(&[rule(None, Some("New"), None)]);
        assert!(!set.matches(&make_entry("t", &["News"], "c")));
        assert!(set.matches(&make_entry("t", &["Tips", "new"], "c")));

        let set = rules(&[rule(Some("rust.*"), None, None)]);
        assert!(set.matches(&make_entry("Rust 2026 edition", &[], "c")));
        assert!(!set.matches(&make_entry("Why Rust", &[], "c")));
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let set = rules(&[rule(None, None, Some("bot|spam"))]);
        assert!(set.matches(&make_entry("t", &[], "spam")));
        assert!(!set.matches(&make_entry("t", &[], "robot")));
        assert!(!set.matches(&make_entry("t", &[], "spammer")));
    }

    #[test]
    fn any_field_of_a_rule_is_enough() {
        let set = rules(&[rule(Some("nope"), Some("nope"), Some("alice"))]);
        assert!(set.matches(&make_entry("t", &["x"], "Alice")));
    }

    #[test]
    fn empty_and_missing_fields_never_match() {
        let set = rules(&[rule(Some(""), None, None), FilterRule::default()]);
        assert!(!set.matches(&make_entry("", &[], "")));
        assert!(!rules(&[]).matches(&make_entry("t", &["c"], "a")));
    }

    #[test]
    fn include_overrides_exclude() {
        let exclude = rules(&[rule(None, None, Some("spam.*"))]);
        let include = rules(&[rule(Some("Important.*"), None, None)]);

        assert!(classify(&make_entry("Important Update", &[], "spambot"), &exclude, &include));
        assert!(!classify(&make_entry("Buy now", &[], "spambot"), &exclude, &include));
        assert!(classify(&make_entry("Buy now", &[], "editor"), &exclude, &include));
        assert!(classify(&make_entry("Important Update", &[], "editor"), &exclude, &include));
    }

    #[test]
    fn invalid_pattern_names_field() {
        let error = CompiledRule::compile(&rule(None, Some("(unclosed"), None))
            .expect_err("pattern must be rejected");
        assert_eq!(error.field, "category");
        assert_eq!(error.pattern, "(unclosed");

        assert!(CompiledRule::compile(&rule(Some("a)|(b"), None, None)).is_err());
    }

    #[test]
    fn verbose_patterns_with_comments_compile() {
        let set = rules(&[rule(None, None, Some("(?x) spam .* # bots"))]);
        assert!(set.matches(&make_entry("t", &[], "SpamBot")));
        assert!(!set.matches(&make_entry("t", &[], "not spam")));

        let set = rules(&[rule(Some("(?x)\n  important \\s update  # release notes\n"), None, None)]);
        assert!(set.matches(&make_entry("Important Update", &[], "c")));
        assert!(!set.matches(&make_entry("Important Update!", &[], "c")));
    }

    #[test]
    fn match_must_reach_the_very_end() {
        let set = rules(&[rule(Some("done"), None, None)]);
        assert!(!set.matches(&make_entry("done\n", &[], "c")));
    }
}
