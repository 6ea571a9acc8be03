//! Transport bridge feeding inbound events into the service.

use anyhow::{Result, bail};
use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use plait_protocol::AgentEvent;

use crate::service::AgentStreamService;

/// Connects a transport adapter's event stream to an [`AgentStreamService`].
pub struct StreamBridge;

impl StreamBridge {
    /// Start draining `receiver` into the service.
    ///
    /// A service accepts exactly one bridge per application run; a second
    /// attach fails. The returned handle owns the subscription and tears it
    /// down on [`shutdown`](BridgeHandle::shutdown) or drop.
    pub fn attach(
        service: AgentStreamService,
        mut receiver: mpsc::Receiver<AgentEvent>,
    ) -> Result<BridgeHandle> {
        if !service.claim_bridge() {
            bail!("a stream bridge is already attached to this service");
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            info!("stream bridge attached");
            loop {
                // Buffered events drain before cancellation is observed.
                tokio::select! {
                    biased;
                    event = receiver.recv() => {
                        match event {
                            Some(event) => service.handle_event(event),
                            None => {
                                debug!("stream bridge channel closed");
                                break;
                            }
                        }
                    }
                    _ = token.cancelled() => {
                        debug!("stream bridge cancelled");
                        break;
                    }
                }
            }
            info!("stream bridge stopped");
        });

        Ok(BridgeHandle {
            cancel,
            task: Some(task),
        })
    }
}

/// Owned handle to an attached bridge. Dropping it cancels the drain task.
pub struct BridgeHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BridgeHandle {
    /// Stop the bridge and wait for the drain task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
