//! Shutdown coordination for the service.

use std::future::Future;

use tokio::sync::broadcast;

/// Fans one shutdown trigger out to every server waiting on it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Future that completes once [`trigger`](Self::trigger) is called.
    ///
    /// Registration happens when this is called, not when the future is
    /// first polled, so a trigger in between is not missed.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }

    pub fn trigger(&self) {
        let waiting = self.tx.send(()).unwrap_or(0);
        tracing::info!(waiting, "Shutdown triggered");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_every_waiter() {
        let shutdown = Shutdown::new();
        let first = tokio::spawn(shutdown.signalled());
        let second = tokio::spawn(shutdown.clone().signalled());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), async {
            first.await.unwrap();
            second.await.unwrap();
        })
        .await
        .expect("waiters were not released");
    }

    #[tokio::test]
    async fn test_trigger_before_first_poll_is_seen() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.signalled();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("trigger was missed");
    }

    #[tokio::test]
    async fn test_no_trigger_keeps_waiting() {
        let shutdown = Shutdown::default();
        let waiter = shutdown.signalled();
        assert!(tokio::time::timeout(Duration::from_millis(20), waiter).await.is_err());
    }
}
