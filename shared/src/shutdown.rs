//! Shutdown signalling between the signal handler and the polling loop.

use tokio::sync::watch;

/// Receiving side. Cloneable, every clone observes the same signal.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending side, owned by whoever listens for termination signals.
#[derive(Debug)]
pub struct ShutdownControl {
    tx: watch::Sender<bool>,
}

/// Create a new connected control / receiver pair.
pub fn new() -> (Shutdown, ShutdownControl) {
    let (tx, rx) = watch::channel(false);

    (Shutdown { rx }, ShutdownControl { tx })
}

impl Shutdown {
    /// Waits until shutdown is requested. Returns immediately if it already was.
    ///
    /// A dropped [ShutdownControl] counts as a request.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|requested| *requested).await;
    }
}

impl ShutdownControl {
    /// Signals all [Shutdown] handles
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn shutdown() {
        let (mut s, sc) = new();
        assert!(!*s.rx.borrow());

        let mut s2 = s.clone();
        let task = tokio::spawn(async move {
            s2.wait().await;
        });

        sc.shutdown();

        tokio::select! {
            _ = sleep(Duration::from_secs(1)) => { panic!("Timeout hit"); }
            _ = task => {}
        }

        assert!(*s.rx.borrow());
        // Must not block once requested
        s.wait().await;
    }

    #[tokio::test]
    async fn dropped_control() {
        let (mut s, sc) = new();
        drop(sc);

        tokio::select! {
            _ = sleep(Duration::from_secs(1)) => { panic!("Timeout hit"); }
            _ = s.wait() => {}
        }
    }
}
