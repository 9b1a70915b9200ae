//! Departments that need attention in the org chart.

use std::fmt;

use crate::store::Snapshot;

/// What is wrong with a department's leadership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issue {
    NoManager,
    /// Manager id points at nobody.
    ManagerMissing(i32),
    /// Manager exists but sits in another department.
    ManagerNotMember(i32),
    DeputyNotMember(i32),
}

/// Warning shown as a banner in the org chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentWarning {
    pub department_id: i32,
    pub department_name: String,
    pub issue: Issue,
}

impl fmt::Display for DepartmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.issue {
            Issue::NoManager => write!(f, "{} has no manager", self.department_name),
            Issue::ManagerMissing(id) => {
                write!(f, "{} lists manager #{id}, who no longer exists", self.department_name)
            }
            Issue::ManagerNotMember(id) => {
                write!(f, "{} lists manager #{id}, who works elsewhere", self.department_name)
            }
            Issue::DeputyNotMember(id) => {
                write!(f, "{} lists deputy #{id}, who works elsewhere", self.department_name)
            }
        }
    }
}

/// Warnings for every active department.
pub fn check(snapshot: &Snapshot) -> Vec<DepartmentWarning> {
    let mut warnings = Vec::new();

    for dept in snapshot.departments.iter().filter(|d| d.is_active) {
        let issue = match dept.manager_id {
            None => Some(Issue::NoManager),
            Some(id) => match snapshot.employee(id) {
                None => Some(Issue::ManagerMissing(id)),
                Some(e) if !e.is_member_of(dept.id) => Some(Issue::ManagerNotMember(id)),
                Some(_) => dept
                    .deputy_manager_id
                    .filter(|d| snapshot.employee(*d).is_none_or(|e| !e.is_member_of(dept.id)))
                    .map(Issue::DeputyNotMember),
            },
        };

        if let Some(issue) = issue {
            warnings.push(DepartmentWarning {
                department_id: dept.id,
                department_name: dept.name.clone(),
                issue,
            });
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};

    #[tokio::test]
    async fn test_sample_org_flags_only_hr() {
        let snapshot = MemoryStore::sample().snapshot().await.unwrap();
        let warnings = check(&snapshot);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].issue, Issue::NoManager);
        assert_eq!(warnings[0].to_string(), "Human Resources has no manager");
    }
}
