//! Department nesting and drop-zone resolution.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{Department, Employee};
use crate::store::Snapshot;

/// Where an employee sits: a top-level department and optionally one of
/// its sub-departments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Container {
    pub department_id: i32,
    pub sub_department_id: Option<i32>,
}

impl Container {
    /// Container currently holding the employee, if assigned.
    pub fn of(employee: &Employee) -> Option<Self> {
        employee.department_id.map(|department_id| Self {
            department_id,
            sub_department_id: employee.sub_department_id,
        })
    }

    /// Drop-zone id this container is rendered under.
    pub fn zone_id(&self) -> i32 {
        self.sub_department_id.unwrap_or(self.department_id)
    }

    /// Whether an employee placed here is a member of `department_id`.
    pub fn contains(&self, department_id: i32) -> bool {
        self.department_id == department_id || self.sub_department_id == Some(department_id)
    }
}

/// Walk `parent_id` links up to the top-level ancestor.
///
/// Returns `None` for unknown ids and for parent cycles.
fn root_of(departments: &[Department], id: i32) -> Option<i32> {
    let mut seen = HashSet::new();
    let mut current = departments.iter().find(|d| d.id == id)?;

    while let Some(parent_id) = current.parent_id {
        if !seen.insert(current.id) {
            return None;
        }
        match departments.iter().find(|d| d.id == parent_id) {
            Some(parent) => current = parent,
            // Dangling parent: treat the last known department as the root.
            None => break,
        }
    }
    Some(current.id)
}

/// Container for a department id regardless of its active flag.
pub fn container_for(departments: &[Department], department_id: i32) -> Option<Container> {
    let root = root_of(departments, department_id)?;
    Some(if root == department_id {
        Container {
            department_id,
            sub_department_id: None,
        }
    } else {
        Container {
            department_id: root,
            sub_department_id: Some(department_id),
        }
    })
}

/// Resolve a drop-zone id to a container. Inactive departments do not
/// accept drops.
pub fn resolve_drop_zone(departments: &[Department], zone_id: i32) -> Option<Container> {
    let dept = departments.iter().find(|d| d.id == zone_id)?;
    if !dept.is_active {
        return None;
    }
    container_for(departments, zone_id)
}

/// True when `candidate` is `ancestor` or nested anywhere below it.
pub fn is_within(departments: &[Department], ancestor: i32, candidate: i32) -> bool {
    let mut seen = HashSet::new();
    let mut current = Some(candidate);

    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = departments.iter().find(|d| d.id == id).and_then(|d| d.parent_id);
    }
    false
}

/// A department with the employees placed directly in it.
#[derive(Debug, Clone)]
pub struct OrgNode {
    pub department: Department,
    pub members: Vec<Employee>,
    pub children: Vec<OrgNode>,
}

impl OrgNode {
    /// Employees in this node and all nested nodes.
    pub fn head_count(&self) -> usize {
        self.members.len() + self.children.iter().map(OrgNode::head_count).sum::<usize>()
    }
}

/// Nested view of the org chart.
#[derive(Debug, Clone, Default)]
pub struct OrgTree {
    pub roots: Vec<OrgNode>,
    /// Employees whose container is missing or hidden.
    pub unassigned: Vec<Employee>,
}

impl OrgTree {
    /// Build the tree from a snapshot, ordered by `display_order` then name.
    pub fn build(snapshot: &Snapshot, include_inactive: bool) -> Self {
        let mut departments: Vec<&Department> = snapshot
            .departments
            .iter()
            .filter(|d| include_inactive || d.is_active)
            .collect();
        departments.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.name.cmp(&b.name)));

        let visible: HashSet<i32> = departments.iter().map(|d| d.id).collect();
        let mut placed = HashSet::new();

        let roots: Vec<OrgNode> = departments
            .iter()
            .filter(|d| d.parent_id.is_none_or(|p| !visible.contains(&p)))
            .map(|d| build_node(d, &departments, snapshot, include_inactive, &mut placed, &mut HashSet::new()))
            .collect();

        let unassigned = snapshot
            .employees
            .iter()
            .filter(|e| include_inactive || e.is_active)
            .filter(|e| !placed.contains(&e.id))
            .cloned()
            .collect();

        Self { roots, unassigned }
    }

    /// Depth-first list of every node.
    pub fn nodes(&self) -> Vec<&OrgNode> {
        fn walk<'a>(node: &'a OrgNode, out: &mut Vec<&'a OrgNode>) {
            out.push(node);
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, &mut out);
        }
        out
    }
}

fn build_node(
    department: &Department,
    departments: &[&Department],
    snapshot: &Snapshot,
    include_inactive: bool,
    placed: &mut HashSet<i32>,
    path: &mut HashSet<i32>,
) -> OrgNode {
    path.insert(department.id);

    let members: Vec<Employee> = snapshot
        .employees
        .iter()
        .filter(|e| include_inactive || e.is_active)
        .filter(|e| Container::of(e).is_some_and(|c| c.zone_id() == department.id))
        .cloned()
        .collect();
    placed.extend(members.iter().map(|e| e.id));

    let child_departments: Vec<&Department> = departments
        .iter()
        .copied()
        .filter(|d| d.parent_id == Some(department.id) && !path.contains(&d.id))
        .collect();
    let mut children = Vec::with_capacity(child_departments.len());
    for child in child_departments {
        children.push(build_node(child, departments, snapshot, include_inactive, placed, path));
    }

    path.remove(&department.id);

    OrgNode {
        department: department.clone(),
        members,
        children,
    }
}
