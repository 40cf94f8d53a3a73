use crate::domain::rule::Rule;
use crate::domain::user::{User, UserId};

/// Read access to the people an approval rule can point at.
pub trait UserDirectory {
    fn user(&self, id: &UserId) -> Option<&User>;

    fn manager_id(&self, id: &UserId) -> Option<&UserId> {
        self.user(id).and_then(|user| user.manager_id.as_ref())
    }

    /// True when at least one user reports to `id`.
    fn manages_anyone(&self, id: &UserId) -> bool;
}

impl UserDirectory for [User] {
    fn user(&self, id: &UserId) -> Option<&User> {
        self.iter().find(|user| &user.id == id)
    }

    fn manages_anyone(&self, id: &UserId) -> bool {
        self.iter().any(|user| user.manager_id.as_ref() == Some(id))
    }
}

/// Approvers for an expense owned by `owner_id`: the owner's manager first when the rule
/// includes managers, then the rule's specific approvers in listed order, without repeats.
/// An empty result means the expense needs no approval.
pub fn resolve_approvers<D>(rule: &Rule, owner_id: &UserId, directory: &D) -> Vec<UserId>
where
    D: UserDirectory + ?Sized,
{
    let mut approvers: Vec<UserId> = Vec::new();

    if rule.include_manager {
        if let Some(manager_id) = directory.manager_id(owner_id) {
            approvers.push(manager_id.clone());
        }
    }

    for approver_id in &rule.specific_approver_ids {
        if !approvers.contains(approver_id) {
            approvers.push(approver_id.clone());
        }
    }

    approvers
}

#[cfg(test)]
mod tests {
    use crate::domain::rule::Rule;
    use crate::domain::user::{Role, User, UserId};

    use super::{resolve_approvers, UserDirectory};

    fn id(value: &str) -> UserId {
        UserId(value.to_string())
    }

    fn user(user_id: &str, role: Role, manager_id: Option<&str>) -> User {
        User {
            id: id(user_id),
            name: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            role,
            manager_id: manager_id.map(id),
        }
    }

    fn directory() -> Vec<User> {
        vec![
            user("u-emp", Role::Employee, Some("u-mgr")),
            user("u-solo", Role::Employee, None),
            user("u-mgr", Role::Manager, None),
            user("u-fin", Role::Manager, None),
            user("u-cfo", Role::Admin, None),
        ]
    }

    #[test]
    fn manager_comes_first_then_specific_approvers_in_order() {
        let rule = Rule {
            include_manager: true,
            specific_approver_ids: vec![id("u-cfo"), id("u-fin")],
            ..Rule::default()
        };

        let approvers = resolve_approvers(&rule, &id("u-emp"), directory().as_slice());
        assert_eq!(approvers, vec![id("u-mgr"), id("u-cfo"), id("u-fin")]);
    }

    #[test]
    fn manager_listed_as_specific_approver_appears_once() {
        let rule = Rule {
            include_manager: true,
            specific_approver_ids: vec![id("u-fin"), id("u-mgr")],
            ..Rule::default()
        };

        let approvers = resolve_approvers(&rule, &id("u-emp"), directory().as_slice());
        assert_eq!(approvers, vec![id("u-mgr"), id("u-fin")]);
    }

    #[test]
    fn missing_manager_is_skipped() {
        let rule = Rule { include_manager: true, ..Rule::default() };
        assert!(resolve_approvers(&rule, &id("u-solo"), directory().as_slice()).is_empty());
        assert!(resolve_approvers(&rule, &id("u-unknown"), directory().as_slice()).is_empty());
    }

    #[test]
    fn manager_is_ignored_when_rule_excludes_it() {
        let rule = Rule {
            include_manager: false,
            specific_approver_ids: vec![id("u-fin")],
            ..Rule::default()
        };

        let approvers = resolve_approvers(&rule, &id("u-emp"), directory().as_slice());
        assert_eq!(approvers, vec![id("u-fin")]);
    }

    #[test]
    fn directory_reports_managers() {
        let users = directory();
        assert!(users.as_slice().manages_anyone(&id("u-mgr")));
        assert!(!users.as_slice().manages_anyone(&id("u-fin")));
        assert_eq!(users.as_slice().manager_id(&id("u-emp")), Some(&id("u-mgr")));
    }
}
