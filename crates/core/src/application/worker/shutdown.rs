// Worker Shutdown Token

use std::time::Duration;
use tokio::sync::watch;

/// Shutdown signal shared read-only by every worker
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal
    ///
    /// Returns immediately if shutdown was already requested. A dropped
    /// sender never fires.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless shutdown arrives first
    ///
    /// Returns `true` if the full duration elapsed, `false` if interrupted.
    pub async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.wait() => false,
        }
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to all workers
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Hand out another token for a new worker
    pub fn subscribe(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_shutdown() {
        let (_tx, mut token) = shutdown_channel();
        assert!(token.sleep_or_shutdown(Duration::from_millis(500)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_shutdown() {
        let (tx, mut token) = shutdown_channel();
        let sleeper = tokio::spawn(async move { token.sleep_or_shutdown(Duration::from_secs(60)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.shutdown();
        assert!(!sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_returns_when_already_shut_down() {
        let (tx, mut token) = shutdown_channel();
        tx.shutdown();
        token.wait().await;
        assert!(token.is_shutdown());
    }

    #[test]
    fn test_subscribed_tokens_see_shutdown() {
        let (tx, token) = shutdown_channel();
        let late = tx.subscribe();
        assert!(!late.is_shutdown());

        tx.shutdown();
        assert!(token.is_shutdown());
        assert!(late.is_shutdown());
        assert!(tx.is_shutdown());
    }
}
