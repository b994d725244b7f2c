//! Content-derived cache keys for schedules.

use crate::graph::Graph;
use crate::types::NodeKind;
use std::fmt;

/// BLAKE3 digest of everything that can influence a schedule.
///
/// Covers node ids in insertion order with their kind, active flag and
/// loop settings, plus every edge (id, endpoints, handle) in insertion
/// order. Titles, content and visual fields are left out: editing a prompt
/// does not change the execution order.
///
/// Fields are length-prefixed, so ids containing separator characters
/// cannot collide.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    /// Computes the key for a graph.
    pub fn of(graph: &Graph) -> Self {
        let mut hasher = KeyHasher::default();

        hasher.count(graph.node_count());
        for node in graph.nodes() {
            hasher.str(node.id.as_str());
            hasher.str(node.tag().as_str());
            hasher.bool(node.active);
            if let NodeKind::LoopStart(settings) = &node.kind {
                hasher.i64(settings.iterations);
                hasher.str(&settings.loop_variable);
            }
        }

        hasher.count(graph.edge_count());
        for edge in graph.edges() {
            hasher.str(edge.id.as_str());
            hasher.str(edge.source.as_str());
            hasher.str(edge.target.as_str());
            match &edge.source_handle {
                Some(handle) => {
                    hasher.bool(true);
                    hasher.str(handle);
                }
                None => hasher.bool(false),
            }
        }

        Self(*hasher.inner.finalize().as_bytes())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct KeyHasher {
    inner: blake3::Hasher,
}

impl KeyHasher {
    fn count(&mut self, n: usize) {
        self.inner.update(&(n as u64).to_le_bytes());
    }

    fn str(&mut self, s: &str) {
        self.count(s.len());
        self.inner.update(s.as_bytes());
    }

    fn bool(&mut self, b: bool) {
        self.inner.update(&[u8::from(b)]);
    }

    fn i64(&mut self, v: i64) {
        self.inner.update(&v.to_le_bytes());
    }
}
