// Dependency declarations and expansion
//
// Names decouple dependency relationships from concrete URLs. The graph
// holds two declaration maps: name to the names it depends on, and name to
// the URLs that implement it. Requiring a name expands it depth-first into
// a load order where every dependency precedes its dependents.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use lodestone_error::{LoaderError, LoaderResult};

/// Dependency and URL declarations for named resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// Name to the names it depends on, in declared order
    deps: HashMap<String, Vec<String>>,

    /// Name to the concrete URLs that implement it, in declared order
    urls: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Record declarations, replacing (never merging) the dependency and
    /// URL lists of every name present in the given maps
    pub fn declare(
        &mut self,
        deps: HashMap<String, Vec<String>>,
        urls: HashMap<String, Vec<String>>,
    ) {
        for (name, list) in deps {
            self.deps.insert(name, list);
        }
        for (name, list) in urls {
            self.urls.insert(name, list);
        }
    }

    /// Check whether any declaration mentions `name`
    pub fn declares(&self, name: &str) -> bool {
        self.deps.contains_key(name) || self.urls.contains_key(name)
    }

    /// The declared URLs for `name`, if any
    pub fn urls_for(&self, name: &str) -> Option<&[String]> {
        self.urls.get(name).map(|list| list.as_slice())
    }

    /// The declared dependencies of `name`; empty when undeclared
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.deps.get(name).map(|list| list.as_slice()).unwrap_or(&[])
    }

    /// Expand names into load order: every dependency before its dependents,
    /// sibling order as declared, deduplicated by first occurrence
    pub fn expansion(&self, names: &[String]) -> LoaderResult<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        for name in names {
            self.visit(name, &mut order, &mut visited, &mut visiting)?;
        }
        Ok(order)
    }

    /// Expand names into unload order: every dependent before the names it
    /// depends on (the reverse of [`expansion`](Self::expansion))
    pub fn unload_expansion(&self, names: &[String]) -> LoaderResult<Vec<String>> {
        let mut order = self.expansion(names)?;
        order.reverse();
        Ok(order)
    }

    /// Drop all declarations
    pub fn clear(&mut self) {
        self.deps.clear();
        self.urls.clear();
    }

    fn visit(
        &self,
        name: &str,
        order: &mut Vec<String>,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
    ) -> LoaderResult<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(LoaderError::CircularDependency(name.to_string()));
        }
        for dep in self.dependencies_of(name) {
            self.visit(dep, order, visited, visiting)?;
        }
        visiting.remove(name);
        visited.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn graph(deps: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        let deps = deps
            .iter()
            .map(|(name, list)| (name.to_string(), names(list)))
            .collect();
        graph.declare(deps, HashMap::new());
        graph
    }

    #[test]
    fn test_expansion_puts_dependencies_first() {
        let graph = graph(&[("main", &["util"])]);
        let order = graph.expansion(&names(&["main"])).unwrap();
        assert_eq!(order, names(&["util", "main"]));
    }

    #[test]
    fn test_expansion_preserves_sibling_order_and_dedupes() {
        // Both siblings pull in "base"; it appears once, at first use
        let graph = graph(&[("app", &["first", "second"]), ("first", &["base"]), ("second", &["base"])]);
        let order = graph.expansion(&names(&["app"])).unwrap();
        assert_eq!(order, names(&["base", "first", "second", "app"]));
    }

    #[test]
    fn test_expansion_detects_cycles() {
        let graph = graph(&[("a", &["b"]), ("b", &["a"])]);
        match graph.expansion(&names(&["a"])) {
            Err(LoaderError::CircularDependency(_)) => {}
            other => panic!("expected circular dependency error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = graph(&[("a", &["a"])]);
        assert!(graph.expansion(&names(&["a"])).is_err());
    }

    #[test]
    fn test_unload_expansion_is_reversed() {
        let graph = graph(&[("main", &["util"])]);
        let order = graph.unload_expansion(&names(&["main"])).unwrap();
        assert_eq!(order, names(&["main", "util"]));
    }

    #[test]
    fn test_declare_replaces_per_name() {
        let mut graph = graph(&[("main", &["old"])]);
        let mut update = HashMap::new();
        update.insert("main".to_string(), names(&["new"]));
        graph.declare(update, HashMap::new());

        assert_eq!(graph.dependencies_of("main"), names(&["new"]).as_slice());
        // Names absent from the update are untouched
        assert!(!graph.declares("old"));
    }

    #[test]
    fn test_url_declarations() {
        let mut graph = DependencyGraph::new();
        let mut urls = HashMap::new();
        urls.insert("util".to_string(), names(&["/u.js"]));
        graph.declare(HashMap::new(), urls);

        assert_eq!(graph.urls_for("util"), Some(names(&["/u.js"]).as_slice()));
        assert_eq!(graph.urls_for("unknown"), None);
        assert!(graph.declares("util"));
    }
}
