use crate::commands::{with_store, CommandResult};
use expensa_db::seed_demo_managers;

/// Adds the demo manager accounts that are not registered yet.
pub fn run() -> CommandResult {
    with_store("seed", |store| async move {
        let report = seed_demo_managers(&store).await?;
        let message = format!(
            "seeded {} demo managers ({} already present)",
            report.created.len(),
            report.skipped
        );
        Ok((message, report))
    })
}
