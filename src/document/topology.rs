//! Orderings over a dependency graph: evaluation order for a whole document
//! and for the subset an edit touches.
use super::graph::{GraphKey, KeyedGraph};
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Depth-first post-order over dependency edges: every key appears after
/// the keys it depends on.
///
/// Cycles (a definition that refers to itself through other definitions) are
/// tolerated: the back edge is skipped and the evaluator reports the cycle.
/// Roots are visited in key order so the result is deterministic.
pub fn overall_order(graph: &KeyedGraph) -> Vec<GraphKey> {
    let mut keys: Vec<&GraphKey> = graph.keys().collect();
    keys.sort();
    let mut state = HashMap::with_capacity(keys.len());
    let mut order = Vec::with_capacity(keys.len());
    for key in keys {
        visit(graph, key, &mut state, &mut order);
    }
    order
}

fn visit(graph: &KeyedGraph, root: &GraphKey, state: &mut HashMap<GraphKey, VisitState>, order: &mut Vec<GraphKey>) {
    if state.contains_key(root) {
        return;
    }
    state.insert(root.clone(), VisitState::Visiting);
    let mut stack = vec![(root.clone(), graph.outgoing(root, &[]).into_iter())];
    loop {
        let next = match stack.last_mut() {
            Some((_, dependencies)) => dependencies.next(),
            None => break,
        };
        match next {
            // Unvisited dependencies only: a `Visiting` one is a back edge.
            Some(dependency) if !state.contains_key(&dependency) => {
                state.insert(dependency.clone(), VisitState::Visiting);
                let dependencies = graph.outgoing(&dependency, &[]).into_iter();
                stack.push((dependency, dependencies));
            }
            Some(_) => {}
            None => {
                if let Some((key, _)) = stack.pop() {
                    state.insert(key.clone(), VisitState::Visited);
                    order.push(key);
                }
            }
        }
    }
}

/// `start` plus everything that transitively depends on it.
pub fn dependents_of(graph: &KeyedGraph, start: &[GraphKey]) -> BTreeSet<GraphKey> {
    let mut visited = BTreeSet::new();
    let mut queue: VecDeque<GraphKey> = start.iter().filter(|k| graph.contains(k)).cloned().collect();
    while let Some(key) = queue.pop_front() {
        if visited.insert(key.clone()) {
            queue.extend(graph.incoming(&key, &[]));
        }
    }
    visited
}

/// `subset` in evaluation order. Keys absent from the graph go last, sorted.
pub fn order_of(graph: &KeyedGraph, subset: &BTreeSet<GraphKey>) -> Vec<GraphKey> {
    let mut order: Vec<GraphKey> = overall_order(graph).into_iter().filter(|k| subset.contains(k)).collect();
    order.extend(subset.iter().filter(|k| !graph.contains(k)).cloned());
    order
}
