pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, DbPool};
pub use fixtures::{seed_demo_managers, SeedReport, DEMO_MANAGERS};
pub use repositories::{InMemoryStateStore, RepositoryError, SqlStateStore, STATE_KEY};
