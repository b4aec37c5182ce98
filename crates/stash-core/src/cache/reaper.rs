//! Background removal of expired items

use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::Shared;
use crate::error::CacheError;

/// Handle to the periodic cleanup task of one cache.
///
/// The task only holds a weak reference to the cache state, so it exits on
/// its own once the cache is gone even if nobody cancels it.
pub(crate) struct Reaper {
    interval: Duration,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Spawn the cleanup task on the current tokio runtime
    pub(crate) fn spawn<V>(shared: Weak<Shared<V>>, every: Duration) -> Result<Self, CacheError>
    where
        V: Clone + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        let token = CancellationToken::new();

        info!("Starting background cache cleanup task (interval: {:?})", every);
        let handle = runtime.spawn(run(shared, every, token.clone()));

        Ok(Self {
            interval: every,
            token,
            handle,
        })
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Signal the task to stop without waiting for it
    pub(crate) fn stop(&self) {
        self.token.cancel();
    }

    /// Signal the task and wait until it has exited
    pub(crate) async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("Cache cleanup task ended abnormally: {}", e);
        }
    }
}

async fn run<V>(shared: Weak<Shared<V>>, every: Duration, token: CancellationToken)
where
    V: Clone + Send + Sync + 'static,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Skip the first tick (which fires immediately)
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(shared) = shared.upgrade() else {
                    debug!("Cache dropped, cleanup task exiting");
                    break;
                };
                shared.delete_expired();
            }
        }
    }

    info!("Background cache cleanup task stopped");
}
