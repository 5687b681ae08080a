use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tracing::{info, warn};

/// Graceful shutdown coordinator
///
/// Listeners subscribe to the broadcast channel and stop accepting once it
/// fires; the supervisor then waits on the [`RequestTracker`] for in-flight
/// work to drain.
#[derive(Clone)]
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<()>,
    tracker: RequestTracker,
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            tracker: RequestTracker::default(),
        }
    }

    /// Get a shutdown receiver for components to listen on
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn tracker(&self) -> RequestTracker {
        self.tracker.clone()
    }

    /// Signal every subscriber to stop accepting new requests
    pub fn trigger(&self) {
        info!("Initiating graceful shutdown...");
        if self.shutdown_tx.send(()).is_err() {
            warn!("No listeners were subscribed to the shutdown signal");
        }
    }

    /// Wait until in-flight requests finish or `grace` elapses.
    /// Returns false when requests were still running at the deadline.
    pub async fn drain(&self, grace: Duration) -> bool {
        info!(
            "Waiting for {} in-flight requests to complete...",
            self.tracker.in_flight()
        );
        let drained = self.tracker.wait_idle(grace).await;
        if drained {
            info!("Graceful shutdown completed");
        } else {
            warn!(
                "Shutdown grace period elapsed with {} requests in flight",
                self.tracker.in_flight()
            );
        }
        drained
    }

    /// Block until SIGINT or SIGTERM, logging request stats on SIGUSR1
    #[cfg(unix)]
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut user1 = signal(SignalKind::user_defined1())?;

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Received SIGINT");
                    return Ok(());
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM");
                    return Ok(());
                }
                _ = user1.recv() => {
                    info!(
                        "Requests in flight: {}, handled since start: {}",
                        self.tracker.in_flight(),
                        self.tracker.total()
                    );
                }
            }
        }
    }

    #[cfg(not(unix))]
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl-C");
        Ok(())
    }
}

/// Counts requests currently being handled
#[derive(Clone, Default)]
pub struct RequestTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    in_flight: AtomicUsize,
    total: AtomicUsize,
    idle: Notify,
}

/// Marks one request as in flight until dropped
pub struct RequestGuard {
    inner: Arc<TrackerInner>,
}

impl RequestTracker {
    pub fn start(&self) -> RequestGuard {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.inner.total.fetch_add(1, Ordering::Relaxed);
        RequestGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.inner.total.load(Ordering::Relaxed)
    }

    /// True once nothing is in flight, false if `timeout` passes first
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.inner.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracker_counts_and_drains() {
        let tracker = RequestTracker::default();
        assert!(tracker.wait_idle(Duration::from_millis(10)).await);

        let guard = tracker.start();
        let second = tracker.start();
        assert_eq!(tracker.in_flight(), 2);
        drop(second);
        assert!(!tracker.wait_idle(Duration::from_millis(20)).await);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert!(waiter.await.unwrap());
        assert_eq!(tracker.total(), 2);
    }

    #[tokio::test]
    async fn trigger_reaches_subscribers() {
        let shutdown = GracefulShutdown::new();
        let mut rx = shutdown.subscribe();
        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }
}
