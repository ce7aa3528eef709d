//! Shared application state.

use crate::config::Config;
use rollstats_core::{RelayHandle, RollStore, SheetStore};
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<RollStore>,
    pub sheets: SheetStore,
    /// `None` when the relay is disabled.
    pub relay: Option<RelayHandle>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, relay: Option<RelayHandle>) -> rollstats_core::Result<Self> {
        let campaigns_dir = config.campaigns_path();
        std::fs::create_dir_all(&campaigns_dir)?;

        let store = Arc::new(RollStore::open(&config.database_path())?);
        let sheets = SheetStore::new(campaigns_dir);

        Ok(Self {
            store,
            sheets,
            relay,
            config,
        })
    }
}
