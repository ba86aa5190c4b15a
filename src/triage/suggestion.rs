//! Routing suggestion from nearest-neighbour tickets.
//!
//! Departments are scored by the summed similarity of the neighbours they
//! handled. The best department `D` becomes the sub-department when it has a
//! parent, and its root ancestor becomes the department. The assignee is the
//! person with the highest summed similarity among `D`'s neighbours.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::helpdesk::hierarchy::DepartmentGraph;

pub const RELATED_TICKET_LIMIT: usize = 5;
pub const HIGH_CONFIDENCE: f32 = 0.8;
pub const MEDIUM_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeTicketRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
}

impl AnalyzeTicketRequest {
    pub fn embedding_text(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => format!("{title}\n\n{}", self.description.trim()),
            _ => self.description.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub ticket_id: Uuid,
    pub ticket_number: String,
    pub title: String,
    pub department_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTicket {
    pub id: Uuid,
    pub ticket_number: String,
    pub title: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedDoc {
    pub id: Uuid,
    pub title: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            Self::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Badge colour shown next to the suggestion.
    pub fn color(&self) -> &'static str {
        match self {
            Self::High => "green",
            Self::Medium => "yellow",
            Self::Low => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingSuggestion {
    pub department_id: Option<Uuid>,
    pub sub_department_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub confidence: f32,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_tickets: Option<Vec<RelatedTicket>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_docs: Option<Vec<RelatedDoc>>,
}

impl RoutingSuggestion {
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }

    fn empty(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
            ..Self::default()
        }
    }
}

/// Sums `score` per key, keeping first-seen order so ties go to the
/// closer neighbour.
fn tally<K: Copy + PartialEq>(items: impl Iterator<Item = (K, f32)>) -> Vec<(K, f32)> {
    let mut totals: Vec<(K, f32)> = Vec::new();
    for (key, score) in items {
        match totals.iter_mut().find(|(k, _)| *k == key) {
            Some((_, total)) => *total += score,
            None => totals.push((key, score)),
        }
    }
    totals
}

fn best<K: Copy>(totals: &[(K, f32)]) -> Option<(K, f32)> {
    totals.iter().copied().fold(None, |acc, (k, s)| match acc {
        Some((_, best)) if best >= s => acc,
        _ => Some((k, s)),
    })
}

/// `neighbors` should arrive ordered by similarity, closest first.
pub fn suggest_routing(
    neighbors: &[Neighbor],
    graph: &DepartmentGraph,
    department_names: &HashMap<Uuid, String>,
) -> RoutingSuggestion {
    let scored: Vec<&Neighbor> = neighbors.iter().filter(|n| n.similarity > 0.0).collect();
    if scored.is_empty() {
        return RoutingSuggestion::empty("No similar tickets found");
    }

    let departments = tally(scored.iter().map(|n| (n.department_id, n.similarity)));
    let total: f32 = departments.iter().map(|(_, s)| s).sum();
    let Some((top, top_score)) = best(&departments) else {
        return RoutingSuggestion::empty("No similar tickets found");
    };

    let in_top: Vec<&&Neighbor> = scored.iter().filter(|n| n.department_id == top).collect();
    let best_similarity = in_top.iter().map(|n| n.similarity).fold(0.0_f32, f32::max);
    let assignee = best(&tally(
        in_top.iter().filter_map(|n| n.assignee_id.map(|a| (a, n.similarity))),
    ))
    .map(|(a, _)| a);

    let root = graph.root_ancestor(top);
    let confidence = if total > 0.0 {
        (top_score / total * best_similarity).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let name = department_names
        .get(&top)
        .cloned()
        .unwrap_or_else(|| top.to_string());
    let reason = format!(
        "{} of {} similar tickets were handled by {} (closest match {:.0}%)",
        in_top.len(),
        scored.len(),
        name,
        best_similarity * 100.0
    );

    let related = neighbors
        .iter()
        .take(RELATED_TICKET_LIMIT)
        .map(|n| RelatedTicket {
            id: n.ticket_id,
            ticket_number: n.ticket_number.clone(),
            title: n.title.clone(),
            similarity: n.similarity,
        })
        .collect();

    RoutingSuggestion {
        department_id: Some(root),
        sub_department_id: (root != top).then_some(top),
        assignee_id: assignee,
        confidence,
        reason,
        related_tickets: Some(related),
        related_docs: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(department: Uuid, assignee: Option<Uuid>, similarity: f32) -> Neighbor {
        Neighbor {
            ticket_id: Uuid::new_v4(),
            ticket_number: "TKT-000001".to_string(),
            title: "VPN".to_string(),
            department_id: department,
            assignee_id: assignee,
            similarity,
        }
    }

    #[test]
    fn test_tiers() {
        assert_eq!(ConfidenceTier::from_confidence(0.8), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_confidence(0.79), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_confidence(0.5), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_confidence(0.49), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::Low.color(), "red");
    }

    #[test]
    fn test_no_neighbors() {
        let s = suggest_routing(&[], &DepartmentGraph::default(), &HashMap::new());
        assert_eq!(s.department_id, None);
        assert_eq!(s.confidence, 0.0);
        assert_eq!(s.tier(), ConfidenceTier::Low);
    }

    #[test]
    fn test_sub_department_resolves_to_root() {
        let it = Uuid::new_v4();
        let network = Uuid::new_v4();
        let hr = Uuid::new_v4();
        let mut graph = DepartmentGraph::default();
        graph.add_edge(it, network).unwrap();

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let neighbors = vec![
            neighbor(network, Some(alice), 0.9),
            neighbor(network, Some(bob), 0.6),
            neighbor(network, Some(bob), 0.5),
            neighbor(hr, None, 0.4),
        ];
        let names = HashMap::from([(network, "Network".to_string())]);
        let s = suggest_routing(&neighbors, &graph, &names);

        assert_eq!(s.department_id, Some(it));
        assert_eq!(s.sub_department_id, Some(network));
        // bob 1.1 beats alice 0.9
        assert_eq!(s.assignee_id, Some(bob));
        // share 2.0 / 2.4, best similarity 0.9
        assert!((s.confidence - 0.75).abs() < 1e-5);
        assert!(s.reason.contains("3 of 4"));
        assert!(s.reason.contains("Network"));
        assert_eq!(s.related_tickets.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn test_root_department_has_no_sub_department() {
        let hr = Uuid::new_v4();
        let neighbors = vec![neighbor(hr, None, 0.95)];
        let s = suggest_routing(&neighbors, &DepartmentGraph::default(), &HashMap::new());
        assert_eq!(s.department_id, Some(hr));
        assert_eq!(s.sub_department_id, None);
        assert_eq!(s.assignee_id, None);
        assert!((s.confidence - 0.95).abs() < 1e-6);
        assert_eq!(s.tier(), ConfidenceTier::High);
    }

    #[test]
    fn test_related_tickets_capped() {
        let d = Uuid::new_v4();
        let neighbors: Vec<Neighbor> = (0..8).map(|i| neighbor(d, None, 0.9 - i as f32 * 0.05)).collect();
        let s = suggest_routing(&neighbors, &DepartmentGraph::default(), &HashMap::new());
        assert_eq!(s.related_tickets.map(|r| r.len()), Some(RELATED_TICKET_LIMIT));
    }

    #[test]
    fn test_json_shape() {
        let s = RoutingSuggestion::empty("none");
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("departmentId").is_some());
        assert!(json.get("relatedTickets").is_none());
    }
}
