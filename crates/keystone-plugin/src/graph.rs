//! Dependency ordering over discovered plugins (Kahn's algorithm).

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use crate::discovery::DiscoveredPlugin;

/// Result of ordering a set of plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOrder {
    /// Plugin names, every one after all of its required dependencies.
    pub order: Vec<String>,
    /// Plugins left out because they sit on or behind a dependency cycle,
    /// in input order.
    pub cyclic: Vec<String>,
}

impl LoadOrder {
    /// Returns whether a cycle was found.
    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Orders `plugins` so required dependencies come first.
///
/// Only edges between discovered plugins count; optional dependencies and
/// dependencies outside the set are ignored here and checked at initialize
/// time. Ties resolve in input order, so the result is deterministic.
pub fn resolve_load_order(plugins: &[DiscoveredPlugin]) -> LoadOrder {
    let index: HashMap<&str, usize> = plugins
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; plugins.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); plugins.len()];

    for (i, plugin) in plugins.iter().enumerate() {
        let mut seen = HashSet::new();
        for dep in plugin.manifest.required_dependencies() {
            let Some(&j) = index.get(dep.name.as_str()) else {
                continue;
            };
            if seen.insert(j) {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..plugins.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(plugins.len());

    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                queue.push_back(d);
            }
        }
    }

    let cyclic: Vec<String> = if order.len() < plugins.len() {
        let placed: HashSet<usize> = order.iter().copied().collect();
        (0..plugins.len())
            .filter(|i| !placed.contains(i))
            .map(|i| plugins[i].name.clone())
            .collect()
    } else {
        Vec::new()
    };

    if !cyclic.is_empty() {
        warn!(plugins = ?cyclic, "Circular plugin dependencies, excluding from load order");
    }

    LoadOrder {
        order: order.into_iter().map(|i| plugins[i].name.clone()).collect(),
        cyclic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{PluginDependency, PluginManifest};

    fn plugin(name: &str, deps: &[&str]) -> DiscoveredPlugin {
        let manifest = deps.iter().fold(
            PluginManifest::new(name, "1.0.0", format!("builtin:{name}")),
            |m, d| m.with_dependency(PluginDependency::required(*d)),
        );
        DiscoveredPlugin::new(format!("/plugins/{name}"), manifest)
    }

    fn position(order: &LoadOrder, name: &str) -> usize {
        order.order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_dependency_before_dependent() {
        let result = resolve_load_order(&[plugin("A", &["B"]), plugin("B", &[])]);
        assert_eq!(result.order, vec!["B", "A"]);
        assert!(!result.has_cycle());
    }

    #[test]
    fn test_mutual_requirement_is_excluded() {
        let result = resolve_load_order(&[plugin("A", &["B"]), plugin("B", &["A"])]);
        assert!(result.order.is_empty());
        assert_eq!(result.cyclic, vec!["A", "B"]);
    }

    #[test]
    fn test_cycle_excluded_rest_still_ordered() {
        let result = resolve_load_order(&[
            plugin("app", &["db"]),
            plugin("x", &["y"]),
            plugin("y", &["x"]),
            plugin("db", &[]),
            plugin("z", &["x"]),
        ]);
        assert_eq!(result.order, vec!["db", "app"]);
        assert_eq!(result.cyclic, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let result = resolve_load_order(&[plugin("loop", &["loop"])]);
        assert!(result.order.is_empty());
        assert_eq!(result.cyclic, vec!["loop"]);
    }

    #[test]
    fn test_diamond_and_external_dependencies() {
        let result = resolve_load_order(&[
            plugin("top", &["left", "right"]),
            plugin("left", &["base", "outside"]),
            plugin("right", &["base"]),
            plugin("base", &[]),
        ]);
        assert_eq!(result.order.len(), 4);
        assert!(position(&result, "base") < position(&result, "left"));
        assert!(position(&result, "base") < position(&result, "right"));
        assert!(position(&result, "left") < position(&result, "top"));
        assert!(position(&result, "right") < position(&result, "top"));
    }

    #[test]
    fn test_optional_dependencies_do_not_order() {
        let manifest = PluginManifest::new("a", "1.0.0", "builtin:a")
            .with_dependency(PluginDependency::optional("b"));
        let result = resolve_load_order(&[
            DiscoveredPlugin::new("/p/a", manifest),
            plugin("b", &["a"]),
        ]);
        assert_eq!(result.order, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_edges_counted_once() {
        let result = resolve_load_order(&[plugin("a", &["b", "b"]), plugin("b", &[])]);
        assert_eq!(result.order, vec!["b", "a"]);
    }
}
