//! Course allow-list.
//!
//! Selectors are regular expressions matched (search semantics) against the
//! display name of every top-level entry. Selectors are tried in list order;
//! the first match decides the local top-level folder name.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One configured selector: either a bare pattern or a pattern with an
/// explicit local folder name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CourseSelector {
    Pattern(String),
    Aliased {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder: Option<String>,
    },
}

impl CourseSelector {
    pub fn pattern(&self) -> &str {
        match self {
            CourseSelector::Pattern(p) => p,
            CourseSelector::Aliased { pattern, .. } => pattern,
        }
    }

    /// Local folder name: the alias if given, otherwise the pattern text.
    pub fn folder(&self) -> &str {
        match self {
            CourseSelector::Aliased {
                folder: Some(folder),
                ..
            } => folder,
            other => other.pattern(),
        }
    }
}

impl From<&str> for CourseSelector {
    fn from(s: &str) -> Self {
        CourseSelector::Pattern(s.to_owned())
    }
}

/// Compiled allow-list, ordered as configured.
#[derive(Debug, Clone)]
pub struct CourseMatcher {
    rules: Vec<(Regex, String)>,
}

impl CourseMatcher {
    /// Compile every selector; the first invalid pattern aborts.
    pub fn compile(selectors: &[CourseSelector]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let regex =
                Regex::new(selector.pattern()).map_err(|source| ConfigError::InvalidPattern {
                    pattern: selector.pattern().to_string(),
                    source,
                })?;
            rules.push((regex, selector.folder().to_string()));
        }
        Ok(Self { rules })
    }

    /// Folder name of the first selector matching `display_name`.
    pub fn select(&self, display_name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(display_name))
            .map(|(_, folder)| folder.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(selectors: &[CourseSelector]) -> CourseMatcher {
        CourseMatcher::compile(selectors).expect("compile")
    }

    #[test]
    fn first_matching_selector_wins_in_list_order() {
        let m = matcher(&[
            CourseSelector::from("Statistik"),
            CourseSelector::from("Stat"),
        ]);
        assert_eq!(m.select("Statistik I (FSS 2019)"), Some("Statistik"));
        assert_eq!(m.select("Stat. Methoden"), Some("Stat"));
    }

    #[test]
    fn search_semantics_match_anywhere() {
        let m = matcher(&[CourseSelector::from("Algo")]);
        assert_eq!(m.select("Lineare Algebra"), None);
        assert_eq!(m.select("Datenstrukturen und Algorithmen"), Some("Algo"));
    }

    #[test]
    fn alias_overrides_folder_name() {
        let m = matcher(&[CourseSelector::Aliased {
            pattern: "^Stat.*I$".to_string(),
            folder: Some("Statistics".to_string()),
        }]);
        assert_eq!(m.select("Statistik I"), Some("Statistics"));
    }

    #[test]
    fn unmatched_name_is_not_selected() {
        let m = matcher(&[CourseSelector::from("Course")]);
        assert_eq!(m.select("Sports"), None);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = CourseMatcher::compile(&[CourseSelector::from("(unclosed")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn selectors_deserialize_from_plain_and_aliased_forms() {
        let yaml = "- Course\n- pattern: Stat\n  folder: Statistics\n";
        let parsed: Vec<CourseSelector> = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(parsed[0], CourseSelector::from("Course"));
        assert_eq!(parsed[1].folder(), "Statistics");
    }
}
