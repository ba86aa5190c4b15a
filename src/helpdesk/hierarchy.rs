//! Department hierarchy as a directed graph.
//!
//! The stored edges form a DAG: a department may sit under several parents.
//! Inserting an edge that would close a cycle is rejected.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use super::types::{Department, HierarchyEdge};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("a department cannot be its own parent")]
    SelfLoop,
    #[error("linking {parent} -> {child} would create a cycle")]
    Cycle { parent: Uuid, child: Uuid },
}

#[derive(Debug, Clone, Default)]
pub struct DepartmentGraph {
    children: HashMap<Uuid, Vec<Uuid>>,
    parents: HashMap<Uuid, Vec<Uuid>>,
}

impl DepartmentGraph {
    pub fn from_edges(edges: &[HierarchyEdge]) -> Self {
        let mut graph = Self::default();
        for edge in edges {
            if let Some(parent) = edge.parent_department_id {
                graph.link(parent, edge.child_department_id);
            }
        }
        graph
    }

    fn link(&mut self, parent: Uuid, child: Uuid) {
        self.children.entry(parent).or_default().push(child);
        self.parents.entry(child).or_default().push(parent);
    }

    pub fn children_of(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parents_of(&self, id: Uuid) -> &[Uuid] {
        self.parents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when `to` is reachable from `from` following parent to child links.
    pub fn has_path(&self, from: Uuid, to: Uuid) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            if node == to {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            queue.extend(self.children_of(node).iter().copied());
        }
        false
    }

    pub fn check_edge(&self, parent: Uuid, child: Uuid) -> Result<(), HierarchyError> {
        if parent == child {
            return Err(HierarchyError::SelfLoop);
        }
        if self.has_path(child, parent) {
            return Err(HierarchyError::Cycle { parent, child });
        }
        Ok(())
    }

    pub fn add_edge(&mut self, parent: Uuid, child: Uuid) -> Result<(), HierarchyError> {
        self.check_edge(parent, child)?;
        self.link(parent, child);
        Ok(())
    }

    /// Walks first-parent links up to a department with no parent.
    pub fn root_ancestor(&self, id: Uuid) -> Uuid {
        let mut current = id;
        let mut seen = HashSet::from([id]);
        while let Some(&parent) = self.parents_of(current).first() {
            if !seen.insert(parent) {
                break;
            }
            current = parent;
        }
        current
    }

    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<Uuid> = self.children_of(id).iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            out.push(node);
            queue.extend(self.children_of(node).iter().copied());
        }
        out
    }
}

/// Departments that never appear as the child of any edge, in input order.
///
/// An edge with a `None` parent still marks its child as non-root.
pub fn root_departments<'a>(
    departments: &'a [Department],
    edges: &[HierarchyEdge],
) -> Vec<&'a Department> {
    let child_ids: HashSet<Uuid> = edges.iter().map(|e| e.child_department_id).collect();
    departments
        .iter()
        .filter(|d| !child_ids.contains(&d.id))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentNode {
    pub department: Department,
    pub children: Vec<DepartmentNode>,
}

/// Nested view for navigation. A department with several parents shows up
/// under each of them.
pub fn build_tree(departments: &[Department], edges: &[HierarchyEdge]) -> Vec<DepartmentNode> {
    let graph = DepartmentGraph::from_edges(edges);
    let by_id: HashMap<Uuid, &Department> = departments.iter().map(|d| (d.id, d)).collect();

    fn expand(
        dept: &Department,
        graph: &DepartmentGraph,
        by_id: &HashMap<Uuid, &Department>,
        path: &mut Vec<Uuid>,
    ) -> DepartmentNode {
        path.push(dept.id);
        let kids: Vec<&Department> = graph
            .children_of(dept.id)
            .iter()
            .filter(|c| !path.contains(c))
            .filter_map(|c| by_id.get(c).copied())
            .collect();
        let children = kids
            .into_iter()
            .map(|child| expand(child, graph, by_id, path))
            .collect();
        path.pop();
        DepartmentNode {
            department: dept.clone(),
            children,
        }
    }

    root_departments(departments, edges)
        .into_iter()
        .chain(
            // departments whose only incoming edge has no parent
            departments.iter().filter(|d| {
                graph.parents_of(d.id).is_empty()
                    && edges.iter().any(|e| e.child_department_id == d.id)
            }),
        )
        .map(|d| expand(d, &graph, &by_id, &mut Vec::new()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dept(name: &str) -> Department {
        Department {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: name.to_string(),
            description: None,
            color: None,
            head_user_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn edge(parent: Option<Uuid>, child: Uuid) -> HierarchyEdge {
        HierarchyEdge {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            parent_department_id: parent,
            child_department_id: child,
            relation_type: "subdivision".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_null_parent_edge_still_excludes_child_from_roots() {
        let a = dept("A");
        let b = dept("B");
        let edges = vec![edge(None, a.id)];
        let departments = vec![a, b.clone()];

        let roots = root_departments(&departments, &edges);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, b.id);
    }

    #[test]
    fn test_roots_keep_input_order() {
        let it = dept("IT");
        let hr = dept("HR");
        let net = dept("Network");
        let edges = vec![edge(Some(it.id), net.id)];
        let departments = vec![it.clone(), net, hr.clone()];

        let roots: Vec<Uuid> = root_departments(&departments, &edges).iter().map(|d| d.id).collect();
        assert_eq!(roots, vec![it.id, hr.id]);
    }

    #[test]
    fn test_cycle_rejected() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = DepartmentGraph::default();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        assert_eq!(graph.add_edge(c, a), Err(HierarchyError::Cycle { parent: c, child: a }));
        assert_eq!(graph.add_edge(a, a), Err(HierarchyError::SelfLoop));
        // a second parent is fine, the graph is a DAG
        let d = Uuid::new_v4();
        assert!(graph.add_edge(d, c).is_ok());
        assert_eq!(graph.parents_of(c).len(), 2);
    }

    #[test]
    fn test_root_ancestor_and_descendants() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = DepartmentGraph::default();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        assert_eq!(graph.root_ancestor(c), a);
        assert_eq!(graph.root_ancestor(a), a);
        assert_eq!(graph.descendants(a), vec![b, c]);
        assert!(graph.descendants(c).is_empty());
    }

    #[test]
    fn test_tree_nests_children() {
        let it = dept("IT");
        let net = dept("Network");
        let desk = dept("Service Desk");
        let edges = vec![edge(Some(it.id), net.id), edge(Some(it.id), desk.id)];
        let departments = vec![it.clone(), net, desk];

        let tree = build_tree(&departments, &edges);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].department.id, it.id);
        assert_eq!(tree[0].children.len(), 2);
    }

    #[test]
    fn test_tree_repeats_shared_child_under_each_parent() {
        let it = dept("IT");
        let net = dept("Network");
        let sec = dept("Security");
        let vpn = dept("VPN");
        let edges = vec![
            edge(Some(it.id), net.id),
            edge(Some(it.id), sec.id),
            edge(Some(net.id), vpn.id),
            edge(Some(sec.id), vpn.id),
        ];
        let departments = vec![it.clone(), net, sec, vpn.clone()];

        let tree = build_tree(&departments, &edges);
        assert_eq!(tree.len(), 1);
        let grandchildren: Vec<Uuid> = tree[0]
            .children
            .iter()
            .flat_map(|c| c.children.iter().map(|g| g.department.id))
            .collect();
        assert_eq!(grandchildren, vec![vpn.id, vpn.id]);
        assert!(tree[0].children.iter().all(|c| c.children[0].children.is_empty()));
    }
}
