//! Topological sorting with cycle detection
//!
//! Uses Tarjan's strongly connected components algorithm, which yields the
//! components in dependency-first order as a side effect. A component with
//! more than one member, or a node depending on itself, is a cycle: it is
//! reported but its members are still placed in the order (sorted by id) so
//! they get a best-effort attempt.

use std::collections::HashMap;

use super::TopologicallySortable;

/// A dependency cycle between the named node ids
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Dependency cycle detected between: {}", .members.join(", "))]
pub struct CycleError {
    /// Ids of the nodes in the cycle, sorted
    pub members: Vec<String>,
}

/// Result of a topological sort
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOutcome {
    /// Indices into the sorted slice, dependencies first
    pub order: Vec<usize>,
    /// Cycles found in the graph
    pub cycles: Vec<CycleError>,
}

impl SortOutcome {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Orders [`TopologicallySortable`] nodes dependencies first
pub struct TopologicalSorter;

impl TopologicalSorter {
    /// Sort `nodes` so that every node comes after the nodes it depends on
    ///
    /// Dependency ids that match no node are ignored. Independent nodes keep
    /// their input order, which makes the result deterministic.
    pub fn sort<N: TopologicallySortable>(nodes: &[N]) -> SortOutcome {
        let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index_of.entry(node.id()).or_insert(i);
        }
        let edges: Vec<Vec<usize>> = nodes
            .iter()
            .map(|node| {
                node.dependency_ids()
                    .iter()
                    .filter_map(|id| index_of.get(id.as_str()).copied())
                    .collect()
            })
            .collect();

        let mut tarjan = Tarjan::new(nodes.len());
        for start in 0..nodes.len() {
            if tarjan.index[start].is_none() {
                tarjan.visit(start, &edges);
            }
        }

        let mut outcome = SortOutcome::default();
        for mut component in tarjan.components {
            let cyclic = component.len() > 1 || edges[component[0]].contains(&component[0]);
            if cyclic {
                component.sort_by(|a, b| nodes[*a].id().cmp(nodes[*b].id()));
                let cycle = CycleError {
                    members: component.iter().map(|&i| nodes[i].id().to_string()).collect(),
                };
                tracing::warn!(%cycle, "Dependency cycle");
                outcome.cycles.push(cycle);
            }
            outcome.order.extend(component);
        }
        outcome
    }
}

/// Iterative Tarjan state
struct Tarjan {
    next_index: usize,
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Tarjan {
    fn new(size: usize) -> Self {
        Self {
            next_index: 0,
            index: vec![None; size],
            lowlink: vec![0; size],
            on_stack: vec![false; size],
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    fn enter(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    fn visit(&mut self, start: usize, edges: &[Vec<usize>]) {
        // (node, position of the next edge to follow)
        let mut frames: Vec<(usize, usize)> = vec![(start, 0)];
        self.enter(start);

        while let Some(frame) = frames.last_mut() {
            let (v, position) = *frame;
            if let Some(&w) = edges[v].get(position) {
                frame.1 += 1;
                match self.index[w] {
                    None => {
                        self.enter(w);
                        frames.push((w, 0));
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if self.index[v] == Some(self.lowlink[v]) {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }
}
