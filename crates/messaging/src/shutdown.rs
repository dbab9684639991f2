//! Cooperative shutdown signal shared by the workers.

use tokio::sync::watch;

/// Receiving side of the shutdown signal; workers select on it.
pub type Shutdown = watch::Receiver<bool>;

/// Sending side of the shutdown signal, held by the process entry point.
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    /// Creates a signal and a receiver that can be cloned per worker.
    pub fn new() -> (Self, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    /// Asks every worker to stop.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_flips_the_flag_and_wakes_waiters() {
        let (signal, mut rx) = ShutdownSignal::new();
        assert!(!*rx.borrow());

        let waiter = tokio::spawn(async move {
            rx.changed().await.unwrap();
            *rx.borrow()
        });
        signal.trigger();
        assert!(waiter.await.unwrap());
    }
}
