use crate::core::config::Args;
use crate::core::error::ConfigError;
use crate::store::handoff::HandoffStore;

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    pub(crate) store: HandoffStore,
}

impl AppState {
    pub(crate) fn new(config: &Args) -> Result<Self, ConfigError> {
        Ok(AppState {
            store: HandoffStore::new(config)?,
        })
    }
}
