use crate::adapters::database::Snapshot;
use crate::error::Result;
use std::future::Future;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Live result set of a query. Cancelled explicitly or when dropped; no
/// snapshot is delivered after cancellation.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Vec<Snapshot>>,
    token: CancellationToken,
}

impl Subscription {
    /// Waits for the next snapshot. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Vec<Snapshot>> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            snapshot = self.rx.recv() => snapshot,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Re-runs `fetch` whenever `collection` changes and forwards distinct results.
pub(crate) fn spawn_snapshot_pump<F, Fut>(
    collection: String,
    mut changes: broadcast::Receiver<String>,
    capacity: usize,
    fetch: F,
) -> Subscription
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<Snapshot>>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let token = CancellationToken::new();
    let task_token = token.clone();
    let span = tracing::debug_span!("snapshot_pump", collection = %collection);

    tokio::spawn(
        async move {
            let mut last: Option<Vec<Snapshot>> = None;
            let mut dirty = true;

            loop {
                if dirty {
                    match fetch().await {
                        Ok(snapshot) if last.as_ref() != Some(&snapshot) => {
                            tokio::select! {
                                () = task_token.cancelled() => break,
                                sent = tx.send(snapshot.clone()) => {
                                    if sent.is_err() {
                                        break;
                                    }
                                }
                            }
                            last = Some(snapshot);
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "Failed to refresh subscription"),
                    }
                }

                tokio::select! {
                    () = task_token.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(changed) => dirty = changed == collection,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::debug!(missed, "Change feed lagged, refreshing");
                            dirty = true;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("Subscription ended");
        }
        .instrument(span),
    );

    Subscription { rx, token }
}
