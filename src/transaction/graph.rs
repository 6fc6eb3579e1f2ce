// src/transaction/graph.rs

//! Ordering graph over plan operations
//!
//! Nodes are operation indices; an edge `a -> b` means operation `a` must be
//! applied before operation `b`. Strongly connected components are found with
//! Tarjan's algorithm and ordered with Kahn's algorithm over the condensed
//! graph, breaking ties by a caller-supplied priority.

use std::collections::{BTreeSet, HashSet};

/// Why one operation must precede another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EdgeKind {
    /// The source installs a provider the target's unit needs
    Provider,
    /// The source installs a replacement for a capability the target removes
    Replacement,
    /// The source uninstalls a singleton the target installs another version of
    Exclusion,
}

impl EdgeKind {
    /// Edges that may not be satisfied by applying both ends as one batch
    pub(crate) fn is_exclusive(self) -> bool {
        matches!(self, EdgeKind::Exclusion)
    }
}

#[derive(Debug, Default)]
pub(crate) struct OperationGraph {
    edges: Vec<Vec<(usize, EdgeKind)>>,
    seen: HashSet<(usize, usize, EdgeKind)>,
}

impl OperationGraph {
    pub(crate) fn new(nodes: usize) -> Self {
        Self {
            edges: vec![Vec::new(); nodes],
            seen: HashSet::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.edges.len()
    }

    /// Add an ordering edge; self edges and duplicates are ignored
    pub(crate) fn add_edge(&mut self, from: usize, to: usize, kind: EdgeKind) {
        if from == to || !self.seen.insert((from, to, kind)) {
            return;
        }
        self.edges[from].push((to, kind));
    }

    /// Does an exclusive edge run between two members of `component`?
    pub(crate) fn has_exclusive_edge_within(&self, component: &[usize]) -> bool {
        let members: HashSet<usize> = component.iter().copied().collect();
        component.iter().any(|&from| {
            self.edges[from]
                .iter()
                .any(|&(to, kind)| kind.is_exclusive() && members.contains(&to))
        })
    }

    /// Strongly connected components, each sorted by node index
    pub(crate) fn strongly_connected_components(&self) -> Vec<Vec<usize>> {
        let mut tarjan = Tarjan::new(self);
        for node in 0..self.len() {
            if tarjan.indices[node].is_none() {
                tarjan.visit(node);
            }
        }
        tarjan.components
    }

    /// Order components so every edge points forward
    ///
    /// Among components that are ready at the same time, the one with the
    /// smallest `priority` (minimum over its members) goes first.
    pub(crate) fn order_components<K, F>(&self, components: &[Vec<usize>], priority: F) -> Vec<usize>
    where
        K: Ord + Clone,
        F: Fn(usize) -> K,
    {
        let mut component_of = vec![0; self.len()];
        for (c, members) in components.iter().enumerate() {
            for &node in members {
                component_of[node] = c;
            }
        }

        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
        for (from, edges) in self.edges.iter().enumerate() {
            for &(to, _) in edges {
                let (a, b) = (component_of[from], component_of[to]);
                if a != b {
                    successors[a].insert(b);
                }
            }
        }

        let mut in_degree = vec![0usize; components.len()];
        for targets in &successors {
            for &b in targets {
                in_degree[b] += 1;
            }
        }

        let keys: Vec<Option<K>> = components
            .iter()
            .map(|members| members.iter().map(|&node| priority(node)).min())
            .collect();

        let mut ready: BTreeSet<(Option<K>, usize)> = BTreeSet::new();
        for (c, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                ready.insert((keys[c].clone(), c));
            }
        }

        let mut order = Vec::with_capacity(components.len());
        while let Some(entry) = ready.pop_first() {
            let c = entry.1;
            order.push(c);
            for &next in &successors[c] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert((keys[next].clone(), next));
                }
            }
        }

        // The condensation is acyclic, so every component is emitted
        debug_assert_eq!(order.len(), components.len());
        order
    }
}

struct Tarjan<'g> {
    graph: &'g OperationGraph,
    next_index: usize,
    indices: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g OperationGraph) -> Self {
        let n = graph.len();
        Self {
            graph,
            next_index: 0,
            indices: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    fn visit(&mut self, node: usize) {
        self.indices[node] = Some(self.next_index);
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        let graph = self.graph;
        for &(next, _) in &graph.edges[node] {
            match self.indices[next] {
                None => {
                    self.visit(next);
                    self.lowlink[node] = self.lowlink[node].min(self.lowlink[next]);
                }
                Some(index) if self.on_stack[next] => {
                    self.lowlink[node] = self.lowlink[node].min(index);
                }
                Some(_) => {}
            }
        }

        if self.indices[node] == Some(self.lowlink[node]) {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            component.sort_unstable();
            self.components.push(component);
        }
    }
}
