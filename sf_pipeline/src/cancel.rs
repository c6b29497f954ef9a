use tokio::sync::watch;

/// Triggers a [`Cancellation`]; safe to call from any thread, including signal handlers
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> Cancellation {
        Cancellation { rx: self.tx.subscribe() }
    }
}

/// Observed by a running batch; once cancelled it stays cancelled
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn pair() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Cancellation { rx })
    }

    /// A token that never fires
    pub fn never() -> Cancellation {
        Self::pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is gone without cancelling
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|&cancelled| cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
