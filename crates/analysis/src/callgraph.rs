/// Module for building method call graphs over a fixed universe of methods.
///
/// Vertices are `MethodKey`s, inserted in sorted order so node indices are stable across runs.
/// An edge `a -> b` exists when `a`'s body contains at least one invoke of `b` and both are in
/// the universe; its weight is the number of call sites. Recursive calls keep their self-edge.
///
/// # Usage
/// ```rust,ignore
/// let graph = CallGraph::extract(&artifact, &live);
/// for callee in graph.callees(&key) { println!("{callee}"); }
/// std::fs::write("calls.dot", graph.to_dot())?;
/// ```
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use remora_core::{Artifact, MethodKey};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Directed call graph restricted to a method universe.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    /// Edge weight counts the call sites between the two methods
    graph: DiGraph<MethodKey, usize>,
    index: BTreeMap<MethodKey, NodeIndex>,
}

impl CallGraph {
    /// Builds the graph of calls between methods of `universe`.
    pub fn extract(artifact: &Artifact, universe: &BTreeSet<MethodKey>) -> Self {
        let mut cg = Self::default();
        for key in universe {
            cg.add_node(key.clone());
        }
        for key in universe {
            let Some(method) = artifact.method(key) else {
                continue;
            };
            let from = cg.index[key];
            for callee in method.call_sites() {
                if let Some(&to) = cg.index.get(&callee) {
                    cg.add_call(from, to);
                }
            }
        }
        debug!(
            "call graph: {} methods, {} edges",
            cg.graph.node_count(),
            cg.graph.edge_count()
        );
        cg
    }

    fn add_node(&mut self, key: MethodKey) -> NodeIndex {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(key.clone());
        self.index.insert(key, idx);
        idx
    }

    fn add_call(&mut self, from: NodeIndex, to: NodeIndex) {
        match self.graph.find_edge(from, to) {
            Some(edge) => self.graph[edge] += 1,
            None => {
                self.graph.add_edge(from, to, 1);
            }
        }
    }

    fn adjacent(&self, key: &MethodKey, dir: Direction) -> BTreeSet<&MethodKey> {
        let Some(&idx) = self.index.get(key) else {
            return BTreeSet::new();
        };
        self.graph
            .neighbors_directed(idx, dir)
            .map(|n| &self.graph[n])
            .collect()
    }

    /// Methods called by `key`.
    pub fn callees(&self, key: &MethodKey) -> BTreeSet<&MethodKey> {
        self.adjacent(key, Direction::Outgoing)
    }

    /// Methods calling `key`.
    pub fn callers(&self, key: &MethodKey) -> BTreeSet<&MethodKey> {
        self.adjacent(key, Direction::Incoming)
    }

    /// Callers and callees of `key`.
    pub fn neighbors(&self, key: &MethodKey) -> BTreeSet<&MethodKey> {
        let mut all = self.callees(key);
        all.extend(self.callers(key));
        all
    }

    /// The same graph with every edge reversed.
    pub fn invert(&self) -> Self {
        let mut graph = DiGraph::with_capacity(self.graph.node_count(), self.graph.edge_count());
        for key in self.graph.node_weights() {
            graph.add_node(key.clone());
        }
        for edge in self.graph.edge_references() {
            graph.add_edge(edge.target(), edge.source(), *edge.weight());
        }
        Self {
            graph,
            index: self.index.clone(),
        }
    }

    /// Number of call sites from `from` to `to`.
    pub fn call_count(&self, from: &MethodKey, to: &MethodKey) -> usize {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self
                .graph
                .find_edge(a, b)
                .map(|e| self.graph[e])
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn contains(&self, key: &MethodKey) -> bool {
        self.index.contains_key(key)
    }

    /// Vertices in key order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodKey> + '_ {
        self.index.keys()
    }

    pub fn method_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Graphviz rendering with one labelled node per method.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[Config::EdgeNoLabel]))
    }
}
