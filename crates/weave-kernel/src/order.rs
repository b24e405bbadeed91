//! Topological ordering of a dependency graph.
//!
//! Kahn's algorithm with a declaration-order tie-break: among the nodes with
//! no remaining incoming edges, the one declared first is emitted next. The
//! emitted sequence is the call chain from outermost to innermost, so for
//! every edge `A -> B`, `A` comes before `B`.
//!
//! When nodes remain but none is free, the remainder contains a cycle. The
//! shortest cycle through the remaining nodes is reported, rotated to start
//! at its earliest-declared member, and no partial order is returned.

use crate::error::ResolutionError;
use crate::graph::DependencyGraph;
use crate::identity::{TargetDescriptor, TypeRef};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

/// A dependency cycle: each mixin depends on the next, the last on the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixinCycle {
    pub target: TargetDescriptor,
    pub cycle: Vec<TypeRef>,
}

impl From<MixinCycle> for ResolutionError {
    fn from(cycle: MixinCycle) -> Self {
        ResolutionError::CyclicMixinDependency {
            target: cycle.target,
            cycle: cycle.cycle,
        }
    }
}

/// Order the graph's mixins outermost first.
pub fn resolve_order(graph: &DependencyGraph) -> Result<Vec<TypeRef>, MixinCycle> {
    let count = graph.len();
    let mut in_degree = vec![0usize; count];
    for node in 0..count {
        for &next in graph.successors(node) {
            in_degree[next] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
        .filter(|&node| in_degree[node] == 0)
        .map(Reverse)
        .collect();
    let mut emitted = Vec::with_capacity(count);

    while let Some(Reverse(node)) = ready.pop() {
        emitted.push(node);
        for &next in graph.successors(node) {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if emitted.len() == count {
        return Ok(emitted
            .into_iter()
            .map(|node| graph.nodes()[node].clone())
            .collect());
    }

    let remaining: Vec<bool> = in_degree.iter().map(|&degree| degree > 0).collect();
    let cycle = shortest_cycle(graph, &remaining);
    Err(MixinCycle {
        target: graph.target().clone(),
        cycle: cycle
            .into_iter()
            .map(|node| graph.nodes()[node].clone())
            .collect(),
    })
}

/// Shortest cycle among `remaining` nodes, rotated to its lowest position.
///
/// Starts a breadth-first search from each remaining node in declaration
/// order; ties in length keep the first found.
fn shortest_cycle(graph: &DependencyGraph, remaining: &[bool]) -> Vec<usize> {
    let mut best: Option<Vec<usize>> = None;

    for start in (0..graph.len()).filter(|&node| remaining[node]) {
        let Some(path) = cycle_through(graph, remaining, start) else {
            continue;
        };
        if best.as_ref().is_none_or(|found| path.len() < found.len()) {
            best = Some(path);
        }
    }

    let mut cycle = best.unwrap_or_default();
    if let Some(lowest) = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, node)| *node)
        .map(|(position, _)| position)
    {
        cycle.rotate_left(lowest);
    }
    cycle
}

/// Shortest path from `start` back to itself, staying inside `remaining`.
fn cycle_through(graph: &DependencyGraph, remaining: &[bool], start: usize) -> Option<Vec<usize>> {
    let mut parent: Vec<Option<usize>> = vec![None; graph.len()];
    let mut visited = vec![false; graph.len()];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;

    while let Some(node) = queue.pop_front() {
        for &next in graph.successors(node) {
            if !remaining[next] {
                continue;
            }
            if next == start {
                let mut path = vec![node];
                let mut cursor = node;
                while let Some(prev) = parent[cursor] {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            if !visited[next] {
                visited[next] = true;
                parent[next] = Some(node);
                queue.push_back(next);
            }
        }
    }
    None
}
