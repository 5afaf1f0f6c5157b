// Consumer Stop Signal

use tokio::sync::watch;

/// Receiving side, held by a consumer loop
#[derive(Clone)]
pub(crate) struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub(crate) fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `StopSignal::stop` was called (or the signal dropped)
    pub(crate) async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Sending side, held by the queue
pub(crate) struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub(crate) fn token(&self) -> StopToken {
        StopToken {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn stop(&self) {
        self.tx.send_replace(true);
    }
}
