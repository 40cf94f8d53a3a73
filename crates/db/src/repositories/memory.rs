use tokio::sync::RwLock;

use expensa_core::domain::state::AggregateState;
use expensa_core::errors::ApplicationError;
use expensa_core::store::StateStore;

/// Process-local store for tests and throwaway runs. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStateStore {
    state: RwLock<AggregateState>,
}

impl InMemoryStateStore {
    pub fn new(state: AggregateState) -> Self {
        Self { state: RwLock::new(state) }
    }

    pub async fn snapshot(&self) -> AggregateState {
        self.state.read().await.clone()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn load_state(&self) -> Result<AggregateState, ApplicationError> {
        let state = self.state.read().await;
        Ok(state.clone())
    }

    async fn save_state(&self, state: &AggregateState) -> Result<(), ApplicationError> {
        let mut current = self.state.write().await;
        *current = state.clone();
        Ok(())
    }
}
