use std::time::Duration;

use async_trait::async_trait;
use postbox_common::{Signal, internal};
use postbox_spool::{DirectoryWatcher, MessageStore, WatchHandler};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::{error::Result, service::SmtpDeliveryService};

const fn default_debounce() -> u64 {
    3
}

/// Watcher tuning for the delivery driver.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct WatchConfig {
    /// Seconds to wait after the first arrival before starting a pass
    #[serde(default = "default_debounce")]
    pub debounce_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce(),
        }
    }
}

/// Couples a message store, a delivery service, and a directory watcher
/// into one serveable unit.
pub struct DeliveryDriver {
    store: MessageStore,
    delivery: SmtpDeliveryService,
    watch: WatchConfig,
}

impl DeliveryDriver {
    #[must_use]
    pub const fn new(
        store: MessageStore,
        delivery: SmtpDeliveryService,
        watch: WatchConfig,
    ) -> Self {
        Self {
            store,
            delivery,
            watch,
        }
    }

    /// Serves delivery until shutdown: one catch-up pass at startup, then
    /// a debounced pass for every burst of arrivals in the outbox.
    ///
    /// # Errors
    ///
    /// Returns an error when the pending directory cannot be watched.
    /// Failed passes are logged and retried on the next trigger instead.
    pub async fn serve(self, shutdown: broadcast::Receiver<Signal>) -> Result<()> {
        internal!("Delivery driver starting");

        // Anything spooled before startup gets drained right away; the
        // watcher only reports arrivals from here on.
        drain(&self.delivery, &self.store).await;

        let watcher = DirectoryWatcher::new(
            self.store.pending_dir(),
            Duration::from_secs(self.watch.debounce_secs),
        );

        watcher
            .run(
                shutdown,
                DrainOnTrigger {
                    delivery: &self.delivery,
                    store: &self.store,
                },
            )
            .await?;

        internal!("Delivery driver shutdown complete");

        Ok(())
    }
}

struct DrainOnTrigger<'a> {
    delivery: &'a SmtpDeliveryService,
    store: &'a MessageStore,
}

#[async_trait]
impl WatchHandler for DrainOnTrigger<'_> {
    async fn trigger(&mut self) {
        drain(self.delivery, self.store).await;
    }
}

async fn drain(delivery: &SmtpDeliveryService, store: &MessageStore) {
    if let Err(error) = delivery.deliver_pending(store).await {
        tracing::error!("Delivery pass failed: {error}");
    }
}

#[cfg(test)]
mod test {
    use super::WatchConfig;

    #[test]
    fn test_debounce_defaults_to_three_seconds() {
        assert_eq!(WatchConfig::default().debounce_secs, 3);
    }

    #[test]
    fn test_empty_watch_config_deserializes_with_defaults() {
        let config: WatchConfig = ron::from_str("()").expect("should deserialize");
        assert_eq!(config.debounce_secs, 3);
    }
}
