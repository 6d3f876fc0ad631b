//! Rendezvous announcement.
//!
//! Each service key is announced once at startup, strictly one after the
//! other, then re-announced forever on its own timer. A failed announcement
//! is logged and left for the next tick.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use cairn_core::config::DEFAULT_TICK_INTERVAL_MS;

pub mod link;

pub use link::{DiscoveryLink, GrapeLink, LinkError};

/// Used when the configured period is zero.
const DEFAULT_PERIOD: Duration = Duration::from_millis(DEFAULT_TICK_INTERVAL_MS);

pub struct Announcer {
    link: Arc<dyn DiscoveryLink>,
    period: Duration,
}

impl Announcer {
    pub fn new(link: Arc<dyn DiscoveryLink>, period: Duration) -> Self {
        Self {
            link,
            period: if period.is_zero() { DEFAULT_PERIOD } else { period },
        }
    }

    /// Announce every key once, in order, and leave a repeating timer
    /// behind for each. Returns once the last initial announcement has
    /// finished, whether it succeeded or not.
    ///
    /// Timers already spawned are owned by the handle from the start, so
    /// dropping this future part-way cancels them.
    pub async fn start(&self, keys: &[String], port: u16) -> AnnounceHandle {
        let mut handle = AnnounceHandle {
            tasks: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            handle.tasks.push(self.spawn_repeater(key.clone(), port));
            announce_once(self.link.as_ref(), key, port).await;
        }
        tracing::info!(keys = ?keys, port, period_ms = self.period.as_millis() as u64, "announced");
        handle
    }

    fn spawn_repeater(&self, key: String, port: u16) -> JoinHandle<()> {
        let link = self.link.clone();
        let period = self.period;
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                announce_once(link.as_ref(), &key, port).await;
            }
        })
    }
}

async fn announce_once(link: &dyn DiscoveryLink, key: &str, port: u16) -> bool {
    let meta: Value = json!({});
    match link.announce(key, port, &meta).await {
        Ok(()) => {
            tracing::debug!(key, port, "announce ok");
            true
        }
        Err(e) => {
            tracing::warn!(key, port, error = %e, "announce failed");
            false
        }
    }
}

/// Owns the repeating announcement timers. Stopping (or dropping) the
/// handle cancels all of them.
pub struct AnnounceHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl AnnounceHandle {
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for AnnounceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
