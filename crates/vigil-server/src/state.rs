use std::sync::Arc;

use vigil_config::VigilConfig;
use vigil_db::service::VigilService;

use crate::broadcast::ActivityBroadcaster;

/// Shared handler state. Cloned per request; everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<VigilService>,
    pub broadcaster: Arc<ActivityBroadcaster>,
    pub cookie_name: Arc<str>,
}

impl AppState {
    /// Open the database named in `config` and wire the broadcaster into the
    /// service as its activity sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn from_config(config: &VigilConfig) -> anyhow::Result<Self> {
        let broadcaster = Arc::new(ActivityBroadcaster::new(
            config.general.broadcast_capacity,
        ));
        let svc = VigilService::from_config(&config.database, &config.general)
            .await?
            .with_activity_sink(broadcaster.clone());
        Ok(Self {
            svc: Arc::new(svc),
            broadcaster,
            cookie_name: config.auth.cookie_name.as_str().into(),
        })
    }
}
