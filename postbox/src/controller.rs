use std::sync::LazyLock;

use postbox_common::{Signal, internal, logging, tracing};
use postbox_delivery::{DeliveryDriver, SmtpDeliveryService, WatchConfig};
use postbox_spool::MessageStore;
use serde::Deserialize;
use tokio::sync::broadcast;

#[derive(Deserialize)]
pub struct Postbox {
    spool: MessageStore,
    delivery: SmtpDeliveryService,
    #[serde(default)]
    watch: WatchConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

impl Postbox {
    /// Run the outbox until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// This function will return an error if the spool directories cannot
    /// be prepared, or if the outbox watcher cannot be established.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        self.spool.init()?;

        internal!("Controller running");

        let driver = DeliveryDriver::new(self.spool, self.delivery, self.watch);

        let ret = tokio::select! {
            r = driver.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                let _ = SHUTDOWN_BROADCAST.send(Signal::Finalised);
                r.map_err(Into::into)
            }
            r = shutdown() => {
                r
            }
        };

        internal!("Shutting down...");

        ret
    }
}
