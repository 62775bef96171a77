/* Periodic catalog refresh
 *
 * One background task owns catalog publication. Each tick fetches both
 * metadata uploads on the blocking pool, parses them, and swaps in a new
 * snapshot. A failed cycle is logged and the previous snapshot stays live. */

use crate::catalog::{fetch_catalogs, Catalog, CatalogStore};
use crate::config::RefresherConfig;
use crate::errors::RefreshError;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct CatalogRefresher {
    transport: Arc<dyn Transport>,
    store: CatalogStore,
    config: RefresherConfig,
}

impl CatalogRefresher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CatalogStore,
        config: RefresherConfig,
    ) -> Self {
        Self {
            transport,
            store,
            config,
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Run one refresh cycle on the calling thread.
    pub fn refresh_once(&self) -> Result<Arc<Catalog>, RefreshError> {
        let (types, symbols) = fetch_catalogs(self.transport.as_ref())?;
        let catalog = self.store.publish(types, symbols);
        info!(
            generation = catalog.generation,
            types = catalog.types.len(),
            symbols = catalog.symbols.len(),
            "published catalog snapshot"
        );
        Ok(catalog)
    }

    /// Start the periodic task. The first cycle runs immediately.
    pub fn spawn(self) -> RefresherHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let period = self.config.interval();

        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = period.as_millis() as u64, "catalog refresher started");

            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                debug!(generation = self.store.generation(), "catalog refresh tick");
                let cycle = self.clone();
                match tokio::task::spawn_blocking(move || cycle.refresh_once()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => warn!(
                        code = err.code(),
                        "catalog refresh failed, keeping previous snapshot: {}",
                        err
                    ),
                    Err(err) => warn!("catalog refresh task aborted: {}", err),
                }
            }

            info!("catalog refresher stopped");
        });

        RefresherHandle { shutdown, task }
    }
}

/// Owner of a running refresher task.
pub struct RefresherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signal the task to stop and wait for it. A cycle already in flight
    /// finishes first.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(true);
        self.task.await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
