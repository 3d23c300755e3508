// URL path resolution
//
// Rewrites URLs before dispatch: either a single prefix prepended to
// relative URLs, or a map of search/replace fragments applied to every URL.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A path rewriting rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathRule {
    /// Prefix prepended to relative URLs
    Prefix(String),
    /// Search fragments replaced by their mapped values in every URL.
    ///
    /// The order in which replacements are applied is not guaranteed;
    /// rules must not rely on one replacement seeing another's output.
    Replacements(HashMap<String, String>),
}

/// Applies the configured path rule to URLs before dispatch
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    rule: Option<PathRule>,
}

impl PathResolver {
    /// Create a resolver with no rule; URLs pass through unchanged
    pub fn new() -> Self {
        Self { rule: None }
    }

    /// Set the rule, replacing any previous one
    pub fn set_rule(&mut self, rule: PathRule) {
        self.rule = Some(rule);
    }

    /// Remove the rule
    pub fn clear(&mut self) {
        self.rule = None;
    }

    /// Resolve a URL according to the current rule
    pub fn resolve(&self, url: &str) -> String {
        match &self.rule {
            None => url.to_string(),
            Some(PathRule::Prefix(prefix)) => {
                if is_absolute(url) {
                    url.to_string()
                } else {
                    format!("{}{}", prefix, url)
                }
            }
            Some(PathRule::Replacements(map)) => {
                let mut resolved = url.to_string();
                for (search, replace) in map {
                    resolved = resolved.replace(search, replace);
                }
                resolved
            }
        }
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with('/') || url.contains("://")
}
