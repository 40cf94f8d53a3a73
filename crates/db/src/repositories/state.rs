use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use expensa_core::domain::state::AggregateState;
use expensa_core::errors::ApplicationError;
use expensa_core::store::StateStore;

use super::RepositoryError;
use crate::DbPool;

/// Row key the aggregate is stored under. Bump the suffix when the payload shape breaks.
pub const STATE_KEY: &str = "expensa-state-v1";

/// Keeps the whole aggregate as one JSON document in `app_state`.
pub struct SqlStateStore {
    pool: DbPool,
    key: String,
}

impl SqlStateStore {
    pub fn new(pool: DbPool) -> Self {
        Self::with_key(pool, STATE_KEY)
    }

    pub fn with_key(pool: DbPool, key: impl Into<String>) -> Self {
        Self { pool, key: key.into() }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// A missing row is an empty tenant. A row that fails to decode is an error, never a reset.
    pub async fn load(&self) -> Result<AggregateState, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM app_state WHERE key = ?")
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(AggregateState::default());
        };

        let payload: String =
            row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        serde_json::from_str(&payload).map_err(|e| {
            RepositoryError::Decode(format!("state `{}` is not a valid payload: {e}", self.key))
        })
    }

    pub async fn save(&self, state: &AggregateState) -> Result<(), RepositoryError> {
        let payload =
            serde_json::to_string(state).map_err(|e| RepositoryError::Encode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO app_state (key, payload, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
        )
        .bind(&self.key)
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(
            event_name = "state.saved",
            key = %self.key,
            users = state.users.len(),
            expenses = state.expenses.len(),
            bytes = payload.len(),
            "aggregate state saved"
        );
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqlStateStore {
    async fn load_state(&self) -> Result<AggregateState, ApplicationError> {
        Ok(self.load().await?)
    }

    async fn save_state(&self, state: &AggregateState) -> Result<(), ApplicationError> {
        Ok(self.save(state).await?)
    }
}

#[cfg(test)]
mod tests {
    use expensa_core::domain::rule::Rule;
    use expensa_core::domain::state::AggregateState;

    use super::{SqlStateStore, STATE_KEY};
    use crate::repositories::RepositoryError;
    use crate::{connect_with_settings, migrations::run_pending};

    async fn store() -> SqlStateStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        SqlStateStore::new(pool)
    }

    #[tokio::test]
    async fn missing_row_loads_default_state() {
        let store = store().await;
        assert_eq!(store.load().await.expect("load"), AggregateState::default());
    }

    #[tokio::test]
    async fn saved_state_is_loaded_back() {
        let store = store().await;
        let state = AggregateState {
            rule: Rule { name: "Strict".to_string(), min_percent: 100, ..Rule::default() },
            ..AggregateState::default()
        };

        store.save(&state).await.expect("first save");
        store.save(&state).await.expect("second save overwrites");

        assert_eq!(store.load().await.expect("load"), state);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_state")
            .fetch_one(store.pool())
            .await
            .expect("count");
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn corrupt_payload_is_a_decode_error() {
        let store = store().await;
        sqlx::query("INSERT INTO app_state (key, payload, updated_at) VALUES (?, ?, ?)")
            .bind(STATE_KEY)
            .bind("{not json")
            .bind("2026-10-01T00:00:00Z")
            .execute(store.pool())
            .await
            .expect("insert corrupt row");

        let error = store.load().await.expect_err("corrupt row");
        assert!(matches!(error, RepositoryError::Decode(_)));
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let first = store().await;
        let second = SqlStateStore::with_key(first.pool().clone(), "other-tenant");
        let state = AggregateState {
            rule: Rule { name: "Tenant A".to_string(), ..Rule::default() },
            ..AggregateState::default()
        };

        first.save(&state).await.expect("save");
        assert_eq!(second.load().await.expect("load"), AggregateState::default());
    }
}
