//! Deterministic topological scheduling with loop expansion.
//!
//! Scheduling runs in four passes over the effectively active subgraph:
//!
//! 1. Inactive-node propagation ([`Activity`]).
//! 2. Cycle analysis: every non-trivial SCC must be an anchored loop.
//! 3. Loop discovery: each loop-start and its body are condensed into one
//!    unit placed where the loop-start sits.
//! 4. Kahn's algorithm over the units with a stable tie-break: ready nodes
//!    are seeded by their earliest outgoing edge, then by node insertion
//!    order, and neighbours are released in edge insertion order.
//!
//! The resulting [`ExecutionPlan`] carries both the single-pass order and
//! the expanded step sequence where each loop body is repeated
//! `iterations` times.

mod key;
mod loops;

pub use key::ContentKey;
pub use loops::LoopRegion;

use crate::analysis;
use crate::cache::MemoCache;
use crate::error::{FlowError, Result};
use crate::graph::{Activity, Graph};
use crate::types::{EdgeId, NodeId};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of memoized plans.
pub const DEFAULT_PLAN_CACHE_SIZE: usize = 64;

/// Loop binding attached to a step inside a loop body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopFrame {
    /// The enclosing loop-start
    pub loop_start: NodeId,
    /// Name of the loop variable
    pub variable: String,
    /// 0-based pass index
    pub index: u32,
    /// Total passes
    pub iterations: u32,
}

/// One dispatch in the expanded sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    /// Node to dispatch
    pub node: NodeId,
    /// Present for loop body steps
    pub frame: Option<LoopFrame>,
}

impl Step {
    fn plain(node: NodeId) -> Self {
        Self { node, frame: None }
    }
}

/// Output of the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionPlan {
    order: Vec<NodeId>,
    steps: Vec<Step>,
    loops: Vec<LoopRegion>,
    back_edges: IndexSet<EdgeId>,
    inactive: Vec<NodeId>,
    key: ContentKey,
}

impl ExecutionPlan {
    /// Every active node once, loop bodies included once.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// The expanded dispatch sequence.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Loop regions, in loop-start insertion order.
    pub fn loops(&self) -> &[LoopRegion] {
        &self.loops
    }

    /// Returns true if the edge closes a loop.
    pub fn is_back_edge(&self, id: &EdgeId) -> bool {
        self.back_edges.contains(id)
    }

    /// Nodes excluded by inactivity propagation.
    pub fn inactive(&self) -> &[NodeId] {
        &self.inactive
    }

    /// Content key of the graph this plan was computed from.
    pub fn key(&self) -> ContentKey {
        self.key
    }

    /// Returns true if nothing will be dispatched.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Schedules a graph without memoization.
///
/// # Returns
///
/// - `Ok(plan)` for graphs whose only cycles are anchored loops
/// - `Err` with the first structural error found; use [`diagnose`] for
///   all of them
pub fn schedule(graph: &Graph) -> Result<ExecutionPlan> {
    build_plan(graph).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| FlowError::MalformedCycle(Vec::new()))
    })
}

/// Returns every structural error that prevents scheduling.
pub fn diagnose(graph: &Graph) -> Vec<FlowError> {
    build_plan(graph).err().unwrap_or_default()
}

/// Memoizing scheduler.
///
/// Plans are cached by [`ContentKey`]; graphs with equal structure share a
/// plan regardless of titles, content or layout.
///
/// # Example
///
/// ```ignore
/// let scheduler = Scheduler::new(64);
/// let plan = scheduler.plan(&graph)?;
/// for step in plan.steps() {
///     println!("{}", step.node);
/// }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    cache: MemoCache<ContentKey, Arc<ExecutionPlan>>,
}

impl Scheduler {
    /// Creates a scheduler caching up to `cache_size` plans.
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: MemoCache::new(cache_size),
        }
    }

    /// Returns the plan for `graph`, computing it on a cache miss.
    pub fn plan(&self, graph: &Graph) -> Result<Arc<ExecutionPlan>> {
        let key = ContentKey::of(graph);
        if let Some(plan) = self.cache.get(&key) {
            tracing::trace!(%key, "schedule cache hit");
            return Ok(plan);
        }

        let plan = Arc::new(schedule(graph)?);
        self.cache.insert(key, Arc::clone(&plan));
        Ok(plan)
    }

    /// Number of cached plans.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached plan.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PLAN_CACHE_SIZE)
    }
}

fn build_plan(graph: &Graph) -> std::result::Result<ExecutionPlan, Vec<FlowError>> {
    let activity = Activity::compute(graph);

    let components = analysis::strongly_connected(graph, &activity);
    let mut errors = analysis::check_anchors(graph, &components);

    let mut regions = match loops::find_loops(graph, &activity, &components) {
        Ok(regions) => regions,
        Err(loop_errors) => {
            for e in loop_errors {
                if !errors.contains(&e) {
                    errors.push(e);
                }
            }
            return Err(errors);
        }
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    // Unit index per active node; a loop region is one unit
    let mut units: IndexMap<NodeId, usize> = IndexMap::new();
    let mut unit_nodes: Vec<NodeId> = Vec::new();
    let mut unit_region: Vec<Option<usize>> = Vec::new();
    let mut region_of: IndexMap<&NodeId, usize> = IndexMap::new();
    for (r, region) in regions.iter().enumerate() {
        region_of.insert(&region.start, r);
        region_of.insert(&region.end, r);
        for member in &region.body {
            region_of.insert(member, r);
        }
    }

    let mut region_unit: Vec<Option<usize>> = vec![None; regions.len()];
    for id in activity.active_ids(graph) {
        let unit = match region_of.get(id) {
            Some(&r) => match region_unit[r] {
                Some(u) => u,
                None => {
                    let u = unit_nodes.len();
                    unit_nodes.push(regions[r].start.clone());
                    unit_region.push(Some(r));
                    region_unit[r] = Some(u);
                    u
                }
            },
            None => {
                let u = unit_nodes.len();
                unit_nodes.push(id.clone());
                unit_region.push(None);
                u
            }
        };
        units.insert(id.clone(), unit);
    }

    let positions: Vec<usize> = unit_nodes
        .iter()
        .map(|id| graph.position_of(id).unwrap_or(usize::MAX))
        .collect();
    let reduced: Vec<(usize, usize)> = graph
        .edges()
        .iter()
        .filter_map(|e| Some((*units.get(&e.source)?, *units.get(&e.target)?)))
        .filter(|(from, to)| from != to)
        .collect();

    let unit_order = kahn(&positions, &reduced).map_err(|stuck| {
        let mut nodes: Vec<NodeId> = units
            .iter()
            .filter(|(_, u)| stuck.contains(u))
            .map(|(id, _)| id.clone())
            .collect();
        nodes.sort_by_key(|id| graph.position_of(id));
        vec![FlowError::MalformedCycle(nodes)]
    })?;

    for region in &mut regions {
        region.body = order_body(graph, region)?;
    }

    let mut order = Vec::new();
    let mut steps = Vec::new();
    for u in unit_order {
        match unit_region[u] {
            None => {
                order.push(unit_nodes[u].clone());
                steps.push(Step::plain(unit_nodes[u].clone()));
            }
            Some(r) => {
                let region = &regions[r];
                order.push(region.start.clone());
                order.extend(region.body.iter().cloned());
                order.push(region.end.clone());

                steps.push(Step::plain(region.start.clone()));
                for index in 0..region.iterations {
                    for node in &region.body {
                        steps.push(Step {
                            node: node.clone(),
                            frame: Some(LoopFrame {
                                loop_start: region.start.clone(),
                                variable: region.variable.clone(),
                                index,
                                iterations: region.iterations,
                            }),
                        });
                    }
                }
                steps.push(Step::plain(region.end.clone()));
            }
        }
    }

    let back_edges = regions
        .iter()
        .flat_map(|r| r.back_edges.iter().cloned())
        .collect();

    tracing::debug!(
        nodes = order.len(),
        steps = steps.len(),
        loops = regions.len(),
        "workflow scheduled"
    );

    Ok(ExecutionPlan {
        order,
        steps,
        loops: regions,
        back_edges,
        inactive: activity.deactivated().iter().cloned().collect(),
        key: ContentKey::of(graph),
    })
}

/// Orders a loop body on its induced subgraph.
///
/// Only edges between body nodes count, so the back edge and the edges
/// from the loop-start drop out.
fn order_body(graph: &Graph, region: &LoopRegion) -> std::result::Result<Vec<NodeId>, Vec<FlowError>> {
    let index: IndexMap<&NodeId, usize> = region
        .body
        .iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();
    let positions: Vec<usize> = region
        .body
        .iter()
        .map(|id| graph.position_of(id).unwrap_or(usize::MAX))
        .collect();
    let edges: Vec<(usize, usize)> = graph
        .edges()
        .iter()
        .filter_map(|e| Some((*index.get(&e.source)?, *index.get(&e.target)?)))
        .collect();

    let resolve = |vertices: Vec<usize>| -> Vec<NodeId> {
        vertices
            .into_iter()
            .map(|i| region.body[i].clone())
            .collect()
    };
    kahn(&positions, &edges)
        .map(resolve)
        .map_err(|stuck| vec![FlowError::MalformedCycle(resolve(stuck))])
}

/// Kahn's algorithm with the stable tie-break.
///
/// `positions[i]` is the insertion index of vertex `i`; `edges` must be in
/// edge insertion order.
///
/// # Returns
///
/// The vertex order, or the vertices left on a cycle.
fn kahn(positions: &[usize], edges: &[(usize, usize)]) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let n = positions.len();
    let mut in_degree = vec![0usize; n];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut first_out: Vec<usize> = vec![usize::MAX; n];

    for (seq, &(from, to)) in edges.iter().enumerate() {
        in_degree[to] += 1;
        adjacency[from].push(to);
        first_out[from] = first_out[from].min(seq);
    }

    let mut seeds: Vec<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
    seeds.sort_by_key(|&v| (first_out[v], positions[v]));
    let mut ready: VecDeque<usize> = seeds.into();

    let mut order = Vec::with_capacity(n);
    while let Some(v) = ready.pop_front() {
        order.push(v);
        for &next in &adjacency[v] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() == n {
        Ok(order)
    } else {
        let mut stuck: Vec<usize> = (0..n).filter(|&v| in_degree[v] > 0).collect();
        stuck.sort_by_key(|&v| positions[v]);
        Err(stuck)
    }
}
