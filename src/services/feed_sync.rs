use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::Entry;
use crate::services::reconciler::FeedReconciler;
use crate::services::store::{EntrySource, SnapshotScope};

pub type SnapshotEvent = Result<Vec<Entry>>;

const CHANNEL_CAPACITY: usize = 8;

/// Poll `source` every `every` until the receiver is dropped.
pub fn spawn_feed_sync(
    source: Arc<dyn EntrySource>,
    scope: SnapshotScope,
    every: Duration,
) -> (mpsc::Receiver<SnapshotEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let event = source.fetch_snapshot(scope).await;
            match &event {
                Ok(entries) => log::debug!("[FeedSync] Snapshot with {} entries", entries.len()),
                Err(e) => log::warn!("[FeedSync] Snapshot failed: {}", e),
            }
            if tx.send(event).await.is_err() {
                log::info!("[FeedSync] Receiver dropped, stopping");
                break;
            }
        }
    });

    (rx, handle)
}

/// Apply every event to the shared reconciler until the channel closes.
pub async fn apply_events(
    mut rx: mpsc::Receiver<SnapshotEvent>,
    reconciler: Arc<Mutex<FeedReconciler>>,
) {
    while let Some(event) = rx.recv().await {
        let mut feed = reconciler.lock().await;
        match event {
            Ok(entries) => feed.apply_snapshot(entries),
            Err(e) => feed.apply_source_error(&e),
        }
    }
}

/// One fetch applied immediately, for explicit refreshes.
pub async fn refresh_once(
    source: &dyn EntrySource,
    reconciler: &Mutex<FeedReconciler>,
    scope: SnapshotScope,
) -> Result<usize> {
    let event = source.fetch_snapshot(scope).await;
    let mut feed = reconciler.lock().await;
    match event {
        Ok(entries) => {
            let count = entries.len();
            feed.apply_snapshot(entries);
            Ok(count)
        }
        Err(e) => {
            feed.apply_source_error(&e);
            Err(e)
        }
    }
}
