//! Connection lifecycle signal
//!
//! The server creates one guard/signal pair per accepted connection and
//! attaches the signal to every request served on it. The guard fires when
//! hyper finishes the connection, i.e. after the last response has been
//! written and the connection is closed. Dropping the guard fires it too.

use tokio::sync::watch;

pub struct ConnectionGuard {
    tx: watch::Sender<bool>,
}

/// Cloneable view of a connection's state, available to handlers through
/// `Extension<ConnectionSignal>`.
#[derive(Debug, Clone)]
pub struct ConnectionSignal {
    rx: watch::Receiver<bool>,
}

pub fn connection_pair() -> (ConnectionGuard, ConnectionSignal) {
    let (tx, rx) = watch::channel(false);
    (ConnectionGuard { tx }, ConnectionSignal { rx })
}

impl ConnectionGuard {
    /// Mark the connection closed
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(true);
    }
}

impl ConnectionSignal {
    /// Resolve once the connection has closed
    pub async fn closed(&self) {
        let mut rx = self.rx.clone();
        // An error means the guard is gone, which also means closed
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_fires_on_close() {
        let (guard, signal) = connection_pair();
        assert!(!signal.is_closed());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.closed().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        guard.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("signal did not fire")
            .unwrap();
        assert!(signal.is_closed());
    }

    #[tokio::test]
    async fn test_closed_after_the_fact() {
        let (guard, signal) = connection_pair();
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), signal.closed())
            .await
            .expect("late waiter never resolved");
    }
}
