use serde::Serialize;
use tracing::info;

use expensa_core::domain::user::{NewUser, Role, User};
use expensa_core::errors::ApplicationError;
use expensa_core::store::{ExpenseStore, StateStore};

/// Manager accounts a fresh demo tenant starts with.
pub const DEMO_MANAGERS: &[&str] = &[
    "Aarav Sharma",
    "Vivaan Gupta",
    "Aditya Verma",
    "Krishna Iyer",
    "Rohan Mehta",
    "Ishaan Nair",
    "Arjun Malhotra",
    "Rahul Kapoor",
    "Siddharth Rao",
    "Vikram Singh",
    "Karan Patel",
    "Manish Joshi",
];

const DEMO_EMAIL_DOMAIN: &str = "example.com";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: Vec<User>,
    pub skipped: usize,
}

/// `Aarav Sharma` -> `aarav.sharma@example.com`
pub fn demo_email(name: &str) -> String {
    let local = name.split_whitespace().collect::<Vec<_>>().join(".").to_ascii_lowercase();
    format!("{local}@{DEMO_EMAIL_DOMAIN}")
}

/// Adds every demo manager whose email is not registered yet. Safe to run repeatedly.
pub async fn seed_demo_managers<S>(store: &ExpenseStore<S>) -> Result<SeedReport, ApplicationError>
where
    S: StateStore,
{
    let existing = store.users().await?;
    let mut report = SeedReport::default();

    for name in DEMO_MANAGERS {
        let email = demo_email(name);
        if existing.iter().any(|user| user.email.eq_ignore_ascii_case(&email)) {
            report.skipped += 1;
            continue;
        }

        let user = store
            .add_user(NewUser {
                name: (*name).to_string(),
                email,
                role: Role::Manager,
                manager_id: None,
            })
            .await?;
        report.created.push(user);
    }

    info!(
        event_name = "fixtures.demo_managers_seeded",
        created = report.created.len(),
        skipped = report.skipped,
        "demo managers seeded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use expensa_core::domain::user::Role;
    use expensa_core::store::ExpenseStore;

    use super::{demo_email, seed_demo_managers, DEMO_MANAGERS};
    use crate::repositories::InMemoryStateStore;

    #[test]
    fn demo_emails_are_dotted_lowercase_names() {
        assert_eq!(demo_email("Aarav Sharma"), "aarav.sharma@example.com");
        assert_eq!(demo_email("Krishna  Iyer"), "krishna.iyer@example.com");
    }

    #[tokio::test]
    async fn seeding_twice_adds_managers_once() {
        let store = ExpenseStore::new(InMemoryStateStore::default());

        let first = seed_demo_managers(&store).await.expect("first seed");
        assert_eq!(first.created.len(), DEMO_MANAGERS.len());
        assert!(first.created.iter().all(|user| user.role == Role::Manager));

        let second = seed_demo_managers(&store).await.expect("second seed");
        assert!(second.created.is_empty());
        assert_eq!(second.skipped, DEMO_MANAGERS.len());
        assert_eq!(store.users().await.expect("users").len(), DEMO_MANAGERS.len());
    }
}
