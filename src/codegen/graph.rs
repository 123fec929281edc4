//! The generation-time dependency graph and its cycle detection.

use std::collections::{HashMap, HashSet};

use crate::codegen::decl::ProviderDecl;
use crate::error::Cycle;

/// Directed graph of provider key → dependency keys, built once per
/// generation run and discarded afterwards.
///
/// Traversal and reporting follow declaration order, not alphabetical
/// order, so output is stable across runs for an unchanged source tree.
pub struct DependencyGraph {
    order: Vec<String>,
    edges: HashMap<String, Vec<(String, String)>>,
}

impl DependencyGraph {
    /// Builds the graph from discovered declarations.
    pub fn from_decls(decls: &[ProviderDecl]) -> Self {
        let order = decls.iter().map(|decl| decl.key.clone()).collect();
        let edges = decls
            .iter()
            .map(|decl| (decl.key.clone(), decl.dependencies.clone()))
            .collect();
        Self { order, edges }
    }

    /// Runs depth-first traversal from every declared key, maintaining the
    /// current-path stack and a globally-visited set.
    ///
    /// A key already on the stack records the cyclic slice from its first
    /// occurrence through the current key; a key already fully visited is
    /// pruned. Every distinct cycle is reported once.
    pub fn find_cycles(&self) -> Vec<Cycle> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for key in &self.order {
            self.visit(key, &mut stack, &mut visited, &mut cycles);
        }
        cycles
    }

    fn visit(
        &self,
        key: &str,
        stack: &mut Vec<String>,
        visited: &mut HashSet<String>,
        cycles: &mut Vec<Cycle>,
    ) {
        if let Some(first) = stack.iter().position(|on_path| on_path == key) {
            cycles.push(Cycle {
                path: stack[first..].to_vec(),
            });
            return;
        }
        if !visited.insert(key.to_owned()) {
            return;
        }
        stack.push(key.to_owned());
        if let Some(dependencies) = self.edges.get(key) {
            for (_name, dep_key) in dependencies {
                if self.edges.contains_key(dep_key) {
                    self.visit(dep_key, stack, visited, cycles);
                }
            }
        }
        stack.pop();
    }

    /// The first edge referencing a key no declaration provides, as
    /// `(declaring key, local name, missing key)`, in declaration order.
    pub fn first_unknown_dependency(&self) -> Option<(String, String, String)> {
        for key in &self.order {
            for (name, dep_key) in &self.edges[key] {
                if !self.edges.contains_key(dep_key) {
                    return Some((key.clone(), name.clone(), dep_key.clone()));
                }
            }
        }
        None
    }

    /// Renders the graph as Graphviz DOT, in declaration order.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph providers {\n");
        for key in &self.order {
            out.push_str(&format!("    \"{key}\";\n"));
        }
        for key in &self.order {
            for (name, dep_key) in &self.edges[key] {
                out.push_str(&format!("    \"{key}\" -> \"{dep_key}\" [label=\"{name}\"];\n"));
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(key: &str, deps: &[(&str, &str)]) -> ProviderDecl {
        let mut decl = ProviderDecl::new(key, format!("crate::{key}"));
        for (name, dep) in deps {
            decl = decl.with_dependency(*name, *dep);
        }
        decl
    }

    #[test]
    fn reports_a_three_node_cycle() {
        let graph = DependencyGraph::from_decls(&[
            decl("a", &[("b", "b")]),
            decl("b", &[("c", "c")]),
            decl("c", &[("a", "a")]),
        ]);
        let cycles = graph.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let graph = DependencyGraph::from_decls(&[
            decl("a", &[("b", "b"), ("c", "c")]),
            decl("b", &[("d", "d")]),
            decl("c", &[("d", "d")]),
            decl("d", &[]),
        ]);
        assert!(graph.find_cycles().is_empty());
        assert!(graph.first_unknown_dependency().is_none());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let graph = DependencyGraph::from_decls(&[decl("a", &[("me", "a")])]);
        let cycles = graph.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path, vec!["a"]);
        assert_eq!(cycles[0].to_string(), "'a' -> 'a'");
    }

    #[test]
    fn dangling_reference_is_reported_not_traversed() {
        let graph = DependencyGraph::from_decls(&[decl("a", &[("gone", "missing")])]);
        assert!(graph.find_cycles().is_empty());
        assert_eq!(
            graph.first_unknown_dependency(),
            Some(("a".into(), "gone".into(), "missing".into()))
        );
    }

    #[test]
    fn dot_output_is_deterministic() {
        let decls = [decl("b", &[("a", "a")]), decl("a", &[])];
        let first = DependencyGraph::from_decls(&decls).to_dot();
        let second = DependencyGraph::from_decls(&decls).to_dot();
        assert_eq!(first, second);
        assert!(first.starts_with("digraph providers {"));
        assert!(first.contains("\"b\" -> \"a\" [label=\"a\"];"));
    }
}
