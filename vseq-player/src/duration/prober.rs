//! Duration prober
//!
//! Constructs a throwaway playback handle solely to read its duration once
//! the source reports ready. The handle's event channel is the listener:
//! it lives for one settlement and is dropped with the handle on every path
//! (success, error, timeout, or cancellation of the probe future).

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::media::{EventSink, HandleEvent, HandleId, MediaBackend, OwnedHandle};
use crate::resolver::AssetResolver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub struct DurationProber {
    resolver: Arc<AssetResolver>,
    backend: Arc<dyn MediaBackend>,
    timeout: Duration,
}

impl DurationProber {
    pub fn new(
        resolver: Arc<AssetResolver>,
        backend: Arc<dyn MediaBackend>,
        config: &PlayerConfig,
    ) -> Self {
        Self {
            resolver,
            backend,
            timeout: config.probe_timeout(),
        }
    }

    /// Measure the playback duration of `id` in seconds
    pub async fn probe(&self, id: &str) -> Result<f64> {
        let source = self.resolver.resolve(id).await.map_err(|e| Error::Probe {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle_id = HandleId::next();
        let mut handle = OwnedHandle::new(
            self.backend
                .create(&source, EventSink::new(handle_id, tx))
                .map_err(|e| Error::Probe {
                    id: id.to_string(),
                    reason: e.to_string(),
                })?,
        );
        handle.set_muted(true);
        debug!(segment_id = %id, handle = %handle_id, "Probing duration");

        let settled = tokio::time::timeout(self.timeout, async {
            while let Some(message) = rx.recv().await {
                match message.event {
                    HandleEvent::Ready { duration } if duration.is_finite() && duration > 0.0 => {
                        return Ok(duration);
                    }
                    HandleEvent::Ready { duration } => {
                        return Err(format!("source reported unusable duration {}", duration));
                    }
                    HandleEvent::Error(reason) => return Err(reason),
                    _ => {}
                }
            }
            Err("handle dropped its event listener".to_string())
        })
        .await;

        // Detach the listener before tearing down the handle
        drop(rx);
        handle.release();

        match settled {
            Ok(Ok(duration)) => {
                debug!(segment_id = %id, duration_s = duration, "Probed duration");
                Ok(duration)
            }
            Ok(Err(reason)) => Err(Error::Probe {
                id: id.to_string(),
                reason,
            }),
            Err(_) => Err(Error::Timeout {
                operation: "probe",
                id: id.to_string(),
                after_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

impl std::fmt::Debug for DurationProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurationProber")
            .field("timeout", &self.timeout)
            .finish()
    }
}
