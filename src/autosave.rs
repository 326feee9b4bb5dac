use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::warn;
use uuid::Uuid;

/// The full response document a debounced save will write. Autosaves always
/// overwrite the whole document, same as manual saves.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePayload {
    pub tasting_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub ratings: Vec<Option<u8>>,
    pub notes: Vec<String>,
}

pub type SaveSink =
    Arc<dyn Fn(SavePayload) -> BoxFuture<'static, Result<(), sqlx::Error>> + Send + Sync>;

struct Pending {
    payload: SavePayload,
    generation: u64,
    timer: JoinHandle<()>,
}

struct Inner {
    next_generation: u64,
    pending: HashMap<(Uuid, Uuid), Pending>,
}

/// Debounces response saves per (tasting, participant). Scheduling stores
/// the payload and starts a quiet-period timer; scheduling again before the
/// timer fires replaces the payload and restarts the timer, so a burst of
/// edits produces exactly one write.
///
/// Explicit teardown contract: `flush_tasting` writes pending saves now
/// (used before close and on shutdown), `cancel`/`cancel_tasting` drop them
/// (used when the document is going away). Timers are generation-checked so
/// a stale timer never writes over a newer payload.
#[derive(Clone)]
pub struct ResponseAutosaver {
    quiet: Duration,
    sink: SaveSink,
    inner: Arc<Mutex<Inner>>,
}

impl ResponseAutosaver {
    pub fn new(quiet: Duration, sink: SaveSink) -> Self {
        ResponseAutosaver {
            quiet,
            sink,
            inner: Arc::new(Mutex::new(Inner {
                next_generation: 0,
                pending: HashMap::new(),
            })),
        }
    }

    pub async fn schedule(&self, payload: SavePayload) {
        let key = (payload.tasting_id, payload.user_id);
        let mut inner = self.inner.lock().await;

        inner.next_generation += 1;
        let generation = inner.next_generation;

        if let Some(previous) = inner.pending.remove(&key) {
            previous.timer.abort();
        }

        let saver = self.clone();
        let timer = tokio::spawn(async move {
            sleep(saver.quiet).await;
            saver.fire(key, generation).await;
        });

        inner.pending.insert(
            key,
            Pending {
                payload,
                generation,
                timer,
            },
        );
    }

    async fn fire(&self, key: (Uuid, Uuid), generation: u64) {
        let payload = {
            let mut inner = self.inner.lock().await;
            match inner.pending.get(&key).map(|p| p.generation) {
                Some(current) if current == generation => {
                    inner.pending.remove(&key).map(|p| p.payload)
                }
                _ => None,
            }
        };

        if let Some(payload) = payload {
            // The client already got its accepted response; a failed
            // autosave is logged and the next save retries the document.
            if let Err(e) = (self.sink)(payload).await {
                warn!("Debounced response save failed: {e}");
            }
        }
    }

    /// Drops a participant's pending autosave without writing it. A direct
    /// save that follows supersedes whatever was pending.
    pub async fn cancel(&self, tasting_id: Uuid, user_id: Uuid) {
        let mut inner = self.inner.lock().await;
        if let Some(pending) = inner.pending.remove(&(tasting_id, user_id)) {
            pending.timer.abort();
        }
    }

    /// Drops every pending autosave for a tasting. Used when the tasting is
    /// deleted and the writes would only resurrect rows.
    pub async fn cancel_tasting(&self, tasting_id: Uuid) {
        let mut inner = self.inner.lock().await;
        let keys: Vec<(Uuid, Uuid)> = inner
            .pending
            .keys()
            .filter(|(t, _)| *t == tasting_id)
            .copied()
            .collect();
        for key in keys {
            if let Some(pending) = inner.pending.remove(&key) {
                pending.timer.abort();
            }
        }
    }

    /// Writes every pending autosave for a tasting immediately. Errors are
    /// propagated so the caller (closing the tasting) can surface them.
    pub async fn flush_tasting(&self, tasting_id: Uuid) -> Result<(), sqlx::Error> {
        let drained = self.drain(Some(tasting_id)).await;
        for payload in drained {
            (self.sink)(payload).await?;
        }
        Ok(())
    }

    /// Writes everything still pending. Shutdown path; failures are logged
    /// because there is nobody left to surface them to.
    pub async fn flush_all(&self) {
        let drained = self.drain(None).await;
        for payload in drained {
            if let Err(e) = (self.sink)(payload).await {
                warn!("Response save lost during shutdown flush: {e}");
            }
        }
    }

    async fn drain(&self, tasting_id: Option<Uuid>) -> Vec<SavePayload> {
        let mut inner = self.inner.lock().await;
        let keys: Vec<(Uuid, Uuid)> = inner
            .pending
            .keys()
            .filter(|(t, _)| tasting_id.is_none_or(|id| *t == id))
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|key| {
                inner.pending.remove(&key).map(|pending| {
                    pending.timer.abort();
                    pending.payload
                })
            })
            .collect()
    }

    #[cfg(test)]
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(tasting_id: Uuid, user_id: Uuid, note: &str) -> SavePayload {
        SavePayload {
            tasting_id,
            user_id,
            display_name: "Taster".to_string(),
            ratings: vec![Some(4), None],
            notes: vec![note.to_string(), String::new()],
        }
    }

    fn recording_sink() -> (SaveSink, Arc<Mutex<Vec<SavePayload>>>) {
        let log: Arc<Mutex<Vec<SavePayload>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_log = log.clone();
        let sink: SaveSink = Arc::new(
            move |save: SavePayload| -> BoxFuture<'static, Result<(), sqlx::Error>> {
                let sink_log = sink_log.clone();
                Box::pin(async move {
                    sink_log.lock().await.push(save);
                    Ok(())
                })
            },
        );
        (sink, log)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_the_quiet_period() {
        let (sink, log) = recording_sink();
        let saver = ResponseAutosaver::new(Duration::from_millis(500), sink);
        let tasting = Uuid::new_v4();
        let user = Uuid::new_v4();

        saver.schedule(payload(tasting, user, "first")).await;

        sleep(Duration::from_millis(400)).await;
        assert!(log.lock().await.is_empty());

        sleep(Duration::from_millis(200)).await;
        let written = log.lock().await;
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].notes[0], "first");
        drop(written);
        assert_eq!(saver.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn a_newer_edit_replaces_the_pending_save() {
        let (sink, log) = recording_sink();
        let saver = ResponseAutosaver::new(Duration::from_millis(500), sink);
        let tasting = Uuid::new_v4();
        let user = Uuid::new_v4();

        saver.schedule(payload(tasting, user, "stale")).await;
        sleep(Duration::from_millis(400)).await;
        saver.schedule(payload(tasting, user, "fresh")).await;

        // The original deadline passes without a write.
        sleep(Duration::from_millis(200)).await;
        assert!(log.lock().await.is_empty());

        sleep(Duration::from_millis(400)).await;
        let written = log.lock().await;
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].notes[0], "fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn different_participants_debounce_independently() {
        let (sink, log) = recording_sink();
        let saver = ResponseAutosaver::new(Duration::from_millis(500), sink);
        let tasting = Uuid::new_v4();

        saver.schedule(payload(tasting, Uuid::new_v4(), "a")).await;
        saver.schedule(payload(tasting, Uuid::new_v4(), "b")).await;

        sleep(Duration::from_millis(600)).await;
        assert_eq!(log.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_pending_saves_immediately() {
        let (sink, log) = recording_sink();
        let saver = ResponseAutosaver::new(Duration::from_millis(500), sink);
        let tasting = Uuid::new_v4();

        saver.schedule(payload(tasting, Uuid::new_v4(), "pending")).await;
        saver.flush_tasting(tasting).await.unwrap();

        assert_eq!(log.lock().await.len(), 1);
        assert_eq!(saver.pending_count().await, 0);

        // The aborted timer must not produce a second write.
        sleep(Duration::from_millis(600)).await;
        assert_eq!(log.lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_save() {
        let (sink, log) = recording_sink();
        let saver = ResponseAutosaver::new(Duration::from_millis(500), sink);
        let tasting = Uuid::new_v4();
        let user = Uuid::new_v4();

        saver.schedule(payload(tasting, user, "doomed")).await;
        saver.cancel(tasting, user).await;

        sleep(Duration::from_millis(600)).await;
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_only_touches_the_requested_tasting() {
        let (sink, log) = recording_sink();
        let saver = ResponseAutosaver::new(Duration::from_millis(500), sink);
        let flushed = Uuid::new_v4();
        let untouched = Uuid::new_v4();

        saver.schedule(payload(flushed, Uuid::new_v4(), "now")).await;
        saver.schedule(payload(untouched, Uuid::new_v4(), "later")).await;

        saver.flush_tasting(flushed).await.unwrap();
        assert_eq!(log.lock().await.len(), 1);
        assert_eq!(saver.pending_count().await, 1);

        sleep(Duration::from_millis(600)).await;
        assert_eq!(log.lock().await.len(), 2);
    }
}
