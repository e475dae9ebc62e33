use crate::types::CorrelationEdge;
use serde::Serialize;
use std::cmp::Ordering;

/// One side of an edge, seen from a given entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub entity: String,
    pub coefficient: f64,
    pub sample_size: usize,
}

/// Strongest first: |r| descending, then positive before negative, then key.
fn by_strength(a_key: &str, a_r: f64, b_key: &str, b_r: f64) -> Ordering {
    b_r.abs()
        .total_cmp(&a_r.abs())
        .then_with(|| b_r.total_cmp(&a_r))
        .then_with(|| a_key.cmp(b_key))
}

/// Every entity correlated with `entity`, ranked by strength.
/// Edges are matched in either orientation.
pub fn correlations_for(edges: &[CorrelationEdge], entity: &str) -> Vec<Neighbor> {
    let mut out: Vec<Neighbor> = edges
        .iter()
        .filter(|e| e.coefficient.is_finite())
        .filter_map(|e| {
            e.other(entity).map(|other| Neighbor {
                entity: other.to_string(),
                coefficient: e.coefficient,
                sample_size: e.sample_size,
            })
        })
        .collect();
    out.sort_by(|a, b| by_strength(&a.entity, a.coefficient, &b.entity, b.coefficient));
    out
}

/// The `n` strongest edges of the whole graph.
pub fn strongest(edges: &[CorrelationEdge], n: usize) -> Vec<CorrelationEdge> {
    let mut ranked = finite(edges);
    ranked.sort_by(|a, b| {
        b.coefficient
            .abs()
            .total_cmp(&a.coefficient.abs())
            .then_with(|| b.coefficient.total_cmp(&a.coefficient))
            .then_with(|| (&a.entity_a, &a.entity_b).cmp(&(&b.entity_a, &b.entity_b)))
    });
    ranked.into_iter().take(n).cloned().collect()
}

/// The `n` most negative edges, lowest coefficient first, ties by pair.
pub fn most_negative(edges: &[CorrelationEdge], n: usize) -> Vec<CorrelationEdge> {
    let mut ranked = finite(edges);
    ranked.sort_by(|a, b| {
        a.coefficient
            .total_cmp(&b.coefficient)
            .then_with(|| (&a.entity_a, &a.entity_b).cmp(&(&b.entity_a, &b.entity_b)))
    });
    ranked.into_iter().take(n).cloned().collect()
}

fn finite(edges: &[CorrelationEdge]) -> Vec<&CorrelationEdge> {
    edges.iter().filter(|e| e.coefficient.is_finite()).collect()
}
