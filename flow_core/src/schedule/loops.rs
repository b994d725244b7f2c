//! Loop region discovery.
//!
//! A loop-start S is closed by the single loop-end E reachable from S
//! without passing through another loop-end. The body is every node that
//! lies on a path `S -> ... -> E`. When the `E -> S` back edge is present
//! this is exactly the SCC of S minus its two anchors; without it the
//! region is still repeated, it just isn't a cycle.
//!
//! Nodes fed by the body that never lead to E are side branches. They are
//! not part of the region and run once, after the loop.

use crate::analysis::Component;
use crate::error::FlowError;
use crate::graph::{Activity, Graph};
use crate::types::{EdgeId, NodeId, NodeKindTag};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// A loop-start/loop-end pair and the body between them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopRegion {
    /// The loop-start node
    pub start: NodeId,
    /// The matching loop-end node
    pub end: NodeId,
    /// Body nodes, topologically ordered with the back edge removed
    pub body: Vec<NodeId>,
    /// Number of passes over the body
    pub iterations: u32,
    /// Name bound to the 0-based pass index
    pub variable: String,
    /// `end -> start` edges
    pub back_edges: Vec<EdgeId>,
}

impl LoopRegion {
    /// Returns true if `id` is the start, the end, or a body node.
    pub fn contains(&self, id: &NodeId) -> bool {
        &self.start == id || &self.end == id || self.body.contains(id)
    }
}

/// Finds every loop region among the active nodes.
///
/// Body nodes come back unordered; the scheduler orders them.
///
/// # Arguments
///
/// * `graph` - The workflow graph
/// * `activity` - Effective activity
/// * `components` - SCCs of the active subgraph, used to reject cycles
///   that leave the region through a side branch
///
/// # Returns
///
/// - `Ok(regions)` in loop-start insertion order
/// - `Err(errors)` with every problem found, so validation can report all
///   of them at once
pub(crate) fn find_loops(
    graph: &Graph,
    activity: &Activity,
    components: &[Component],
) -> std::result::Result<Vec<LoopRegion>, Vec<FlowError>> {
    let mut errors = Vec::new();
    let mut regions = Vec::new();
    // node -> loop-start that claimed it
    let mut claimed: IndexMap<NodeId, NodeId> = IndexMap::new();

    let starts = graph
        .nodes()
        .filter(|n| activity.is_active(&n.id))
        .filter_map(|n| Some((&n.id, n.kind.loop_settings()?)));

    for (start, settings) in starts {
        let iterations = match u32::try_from(settings.iterations) {
            Ok(n) if n >= 1 => Some(n),
            _ => {
                errors.push(FlowError::InvalidIterations {
                    node: start.clone(),
                    value: settings.iterations,
                });
                None
            }
        };

        // Forward sweep; loop-ends and other loop-starts are not expanded
        let mut reach: IndexSet<NodeId> = IndexSet::new();
        let mut ends: IndexSet<NodeId> = IndexSet::new();
        let mut entered: IndexSet<NodeId> = IndexSet::new();
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(current) = queue.pop_front() {
            for edge in graph.outgoing(&current) {
                let target = &edge.target;
                if !activity.is_active(target) {
                    continue;
                }
                match graph.node(target).map(|n| n.tag()) {
                    Some(NodeKindTag::LoopEnd) => {
                        ends.insert(target.clone());
                    }
                    Some(NodeKindTag::LoopStart) if target == start => {
                        errors.push(FlowError::MalformedCycle(vec![
                            current.clone(),
                            start.clone(),
                        ]));
                    }
                    Some(NodeKindTag::LoopStart) => {
                        entered.insert(target.clone());
                    }
                    Some(_) => {
                        if reach.insert(target.clone()) {
                            queue.push_back(target.clone());
                        }
                    }
                    None => {}
                }
            }
        }

        let end = match ends.len() {
            0 => {
                match entered.first() {
                    // Another loop sits between this start and any end
                    Some(inner) => errors.push(FlowError::NestedLoop {
                        outer: start.clone(),
                        inner: inner.clone(),
                    }),
                    None => errors.push(FlowError::UnterminatedLoop(start.clone())),
                }
                continue;
            }
            1 => ends[0].clone(),
            _ => {
                errors.push(FlowError::AmbiguousLoopEnd {
                    start: start.clone(),
                    ends: ends.into_iter().collect(),
                });
                continue;
            }
        };

        let feeding = upstream_of(graph, activity, &end, start);
        for inner in entered.iter().filter(|id| feeding.contains(*id)) {
            errors.push(FlowError::NestedLoop {
                outer: start.clone(),
                inner: inner.clone(),
            });
        }
        let body: IndexSet<NodeId> = reach
            .into_iter()
            .filter(|id| feeding.contains(id))
            .collect();

        for member in body.iter().chain(std::iter::once(&end)) {
            if let Some(first) = claimed.get(member) {
                errors.push(FlowError::OverlappingLoops {
                    node: member.clone(),
                    first: first.clone(),
                    second: start.clone(),
                });
            } else {
                claimed.insert(member.clone(), start.clone());
            }
        }

        let mut back_edges = Vec::new();
        for edge in graph.outgoing(&end) {
            if &edge.target == start {
                back_edges.push(edge.id.clone());
            } else if body.contains(&edge.target) {
                // Re-entering the body skips the loop-start
                errors.push(FlowError::MalformedCycle(vec![
                    end.clone(),
                    edge.target.clone(),
                ]));
            }
        }

        if !back_edges.is_empty() {
            // Any other member of the SCC closes a cycle outside the region
            let stray = components.iter().find(|c| c.contains(start)).filter(|c| {
                c.nodes
                    .iter()
                    .any(|id| id != start && id != &end && !body.contains(id))
            });
            if let Some(component) = stray {
                let malformed = FlowError::MalformedCycle(component.nodes.clone());
                if !errors.contains(&malformed) {
                    errors.push(malformed);
                }
            }
        }

        // The region is still claimed so its end is not reported as unmatched
        if let Some(iterations) = iterations {
            regions.push(LoopRegion {
                start: start.clone(),
                end,
                body: body.into_iter().collect(),
                iterations,
                variable: settings.loop_variable.clone(),
                back_edges,
            });
        }
    }

    for node in graph.nodes() {
        if node.tag() == NodeKindTag::LoopEnd
            && activity.is_active(&node.id)
            && !claimed.contains_key(&node.id)
            && !errors.iter().any(|e| e.nodes().contains(&node.id))
        {
            errors.push(FlowError::UnmatchedLoopEnd(node.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(regions)
    } else {
        Err(errors)
    }
}

/// Active nodes with a path to `end`, not walking back past `start`.
fn upstream_of(graph: &Graph, activity: &Activity, end: &NodeId, start: &NodeId) -> IndexSet<NodeId> {
    let mut seen = IndexSet::new();
    let mut queue = VecDeque::from([end.clone()]);
    while let Some(current) = queue.pop_front() {
        for edge in graph.incoming(&current) {
            let source = &edge.source;
            if source == start || source == end || !activity.is_active(source) {
                continue;
            }
            if seen.insert(source.clone()) {
                queue.push_back(source.clone());
            }
        }
    }
    seen
}
