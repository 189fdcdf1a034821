//! Overlap resolution
//!
//! Candidate spans are grouped into connected components of the overlap
//! relation and exactly one span survives per component. The winner is
//! chosen by a total order, so the output never depends on input order.

use crate::anonymization::models::{EntityType, Span};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Entity type priorities; higher wins, unknown types get 0
#[derive(Debug, Clone, Default)]
pub struct PriorityTable {
    priorities: HashMap<EntityType, i32>,
}

impl PriorityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from catalog entries
    pub fn from_definitions(definitions: &HashMap<String, i32>) -> Self {
        Self::new().with_overrides(definitions)
    }

    /// Apply overrides on top of the current table
    pub fn with_overrides(mut self, overrides: &HashMap<String, i32>) -> Self {
        for (name, priority) in overrides {
            self.priorities.insert(EntityType::new(name), *priority);
        }
        self
    }

    /// Set the priority of one entity type
    pub fn set(&mut self, entity_type: EntityType, priority: i32) {
        self.priorities.insert(entity_type, priority);
    }

    /// Priority of an entity type
    pub fn priority(&self, entity_type: &EntityType) -> i32 {
        self.priorities.get(entity_type).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }
}

/// Selects one winner per overlap cluster
#[derive(Debug, Clone)]
pub struct OverlapResolver {
    priorities: Arc<PriorityTable>,
}

impl OverlapResolver {
    pub fn new(priorities: Arc<PriorityTable>) -> Self {
        Self { priorities }
    }

    pub fn priorities(&self) -> &PriorityTable {
        &self.priorities
    }

    /// Resolve candidates into a non-overlapping set sorted by start
    pub fn resolve(&self, mut spans: Vec<Span>) -> Vec<Span> {
        if spans.is_empty() {
            return spans;
        }
        let candidates = spans.len();

        // Identical (start, end, type) spans collapse onto the highest score
        spans.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.end.cmp(&b.end))
                .then_with(|| a.entity_type.cmp(&b.entity_type))
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.source.cmp(&b.source))
        });
        spans.dedup_by(|later, kept| {
            later.start == kept.start
                && later.end == kept.end
                && later.entity_type == kept.entity_type
        });

        let mut resolved = Vec::new();
        let mut cluster: Vec<Span> = Vec::new();
        let mut cluster_end = 0;

        for span in spans {
            if !cluster.is_empty() && span.start >= cluster_end {
                resolved.extend(self.pick_winner(std::mem::take(&mut cluster)));
            }
            cluster_end = if cluster.is_empty() {
                span.end
            } else {
                cluster_end.max(span.end)
            };
            cluster.push(span);
        }
        resolved.extend(self.pick_winner(cluster));

        tracing::trace!(
            candidates,
            resolved = resolved.len(),
            "Overlap resolution complete"
        );
        resolved
    }

    fn pick_winner(&self, cluster: Vec<Span>) -> Option<Span> {
        cluster.into_iter().max_by(|a, b| self.rank(a, b))
    }

    /// Ordering where the greater span wins
    ///
    /// Priority, then score, then length, then earlier start, then the
    /// lexically smaller entity type and source.
    pub fn rank(&self, a: &Span, b: &Span) -> Ordering {
        self.priorities
            .priority(&a.entity_type)
            .cmp(&self.priorities.priority(&b.entity_type))
            .then_with(|| a.score.total_cmp(&b.score))
            .then_with(|| a.len().cmp(&b.len()))
            .then_with(|| b.start.cmp(&a.start))
            .then_with(|| b.entity_type.cmp(&a.entity_type))
            .then_with(|| b.source.cmp(&a.source))
    }
}

/// Check that spans are sorted, non-empty and pairwise non-overlapping
pub fn is_resolved(spans: &[Span]) -> bool {
    spans.iter().all(|s| s.start < s.end)
        && spans.windows(2).all(|pair| pair[0].end <= pair[1].start)
}
