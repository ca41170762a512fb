//! Decision edges: the directed graph linking decisions (`LINK_DECISIONS`,
//! `FORK`), and the lineage views built over it.

use serde::{Deserialize, Serialize};

use crate::canonical::sha256_hex;
use crate::reducer::PendingEdge;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEdge {
    pub from_decision_id: String,
    pub to_decision_id: String,
    pub relation: String,
    pub via_event_seq: u64,
    pub edge_hash: String,
    pub note: Option<String>,
    pub confidence: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl DecisionEdge {
    pub fn from_pending(pending: &PendingEdge, now: chrono::DateTime<chrono::Utc>) -> Self {
        let edge_hash = sha256_hex(
            format!(
                "{}:{}:{}:{}",
                pending.from_decision_id, pending.to_decision_id, pending.relation, pending.via_event_seq
            )
            .as_bytes(),
        );
        Self {
            from_decision_id: pending.from_decision_id.clone(),
            to_decision_id: pending.to_decision_id.clone(),
            relation: pending.relation.clone(),
            via_event_seq: pending.via_event_seq,
            edge_hash,
            note: pending.note.clone(),
            confidence: pending.confidence,
            created_at: now,
        }
    }

    /// Unique identity per §3: `(from, to, relation, via_event_seq)`.
    pub fn identity_key(&self) -> (String, String, String, u64) {
        (self.from_decision_id.clone(), self.to_decision_id.clone(), self.relation.clone(), self.via_event_seq)
    }
}

/// Build a `petgraph` directed graph over a set of edges, for lineage
/// queries (ancestors/descendants of a decision) over the read side.
pub fn build_graph(edges: &[DecisionEdge]) -> petgraph::graphmap::DiGraphMap<&str, &str> {
    let mut g = petgraph::graphmap::DiGraphMap::new();
    for e in edges {
        g.add_edge(e.from_decision_id.as_str(), e.to_decision_id.as_str(), e.relation.as_str());
    }
    g
}

/// All decisions reachable from `start` following edges forward.
pub fn descendants(edges: &[DecisionEdge], start: &str) -> Vec<String> {
    let g = build_graph(edges);
    if !g.contains_node(start) {
        return Vec::new();
    }
    let mut visited = std::collections::HashSet::new();
    let mut stack = vec![start];
    let mut out = Vec::new();
    while let Some(n) = stack.pop() {
        for (_, to, _) in g.edges(n) {
            if visited.insert(to.to_string()) {
                out.push(to.to_string());
                stack.push(to);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: &str, to: &str, rel: &str, seq: u64) -> DecisionEdge {
        DecisionEdge::from_pending(
            &PendingEdge { from_decision_id: from.into(), to_decision_id: to.into(), relation: rel.into(), via_event_seq: seq, note: None, confidence: None },
            chrono::Utc::now(),
        )
    }

    #[test]
    fn edge_identity_is_stable() {
        let e1 = edge("a", "b", "supersedes", 3);
        let e2 = edge("a", "b", "supersedes", 3);
        assert_eq!(e1.edge_hash, e2.edge_hash);
        assert_eq!(e1.identity_key(), e2.identity_key());
    }

    #[test]
    fn descendants_follow_chain() {
        let edges = vec![edge("a", "b", "forks_to", 1), edge("b", "c", "forks_to", 1)];
        let d = descendants(&edges, "a");
        assert_eq!(d.len(), 2);
        assert!(d.contains(&"b".to_string()));
        assert!(d.contains(&"c".to_string()));
    }
}
