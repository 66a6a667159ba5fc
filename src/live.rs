//! Live diary queries.
//!
//! The diary store publishes the dates touched by each committed write to a
//! [`DiaryHub`]. Commits made through other connections, including other
//! processes sharing the database file, are picked up by polling SQLite's
//! `data_version`. A [`DiarySubscription`] watches one date: it delivers the
//! current entries for that date, then a fresh full snapshot whenever they
//! change.

use chrono::NaiveDate;
use futures::Stream;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::ConnectOptions;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::DiaryRepository;
use crate::error::DiaryError;
use crate::models::DiaryEntry;

/// Buffered notifications per date before slow subscribers lag.
const CHANNEL_CAPACITY: usize = 16;

/// Snapshots queued for a subscriber that has not consumed them yet.
const SNAPSHOT_BUFFER: usize = 4;

/// How often the database is checked for commits made elsewhere.
const COMMIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What happened to a date's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiaryChange {
    Created,
    Deleted,
    /// Another connection committed to the database. The dates it touched
    /// are unknown, so every date is told.
    External,
}

/// A snapshot delivered to a subscriber.
pub type DiarySnapshot = Result<Vec<DiaryEntry>, DiaryError>;

/// Notification channels keyed by diary date.
pub struct DiaryHub {
    channels: RwLock<HashMap<NaiveDate, broadcast::Sender<DiaryChange>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl DiaryHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Subscribes to changes for a date. Channels left without subscribers
    /// are dropped on the way.
    pub async fn subscribe(&self, date: NaiveDate) -> broadcast::Receiver<DiaryChange> {
        let mut channels = self.channels.write().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);

        if let Some(sender) = channels.get(&date) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(date, sender);
            receiver
        }
    }

    /// Notifies every subscriber of `date`. Channels whose subscribers are
    /// all gone are dropped.
    pub async fn publish(&self, date: NaiveDate, change: DiaryChange) {
        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(&date) {
                Some(sender) => sender.send(change).is_ok(),
                None => return,
            }
        };

        if delivered {
            tracing::debug!("Published {:?} for {}", change, date);
            return;
        }

        self.prune(date).await;
    }

    /// Notifies the subscribers of every date.
    pub async fn publish_all(&self, change: DiaryChange) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, sender| sender.send(change).is_ok());
        tracing::debug!("Published {:?} to {} date(s)", change, channels.len());
    }

    /// Number of dates with at least one channel open.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Drops the channel for `date` if nobody listens anymore.
    async fn prune(&self, date: NaiveDate) {
        let mut channels = self.channels.write().await;
        if channels
            .get(&date)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&date);
        }
    }

    /// Called by a subscriber that still holds its receiver and is about to
    /// drop it. When the lock is busy the channel is left for the next
    /// `subscribe` or `publish` to prune.
    fn release(&self, date: NaiveDate) {
        if let Ok(mut channels) = self.channels.try_write() {
            if channels
                .get(&date)
                .is_some_and(|sender| sender.receiver_count() <= 1)
            {
                channels.remove(&date);
            }
        }
    }

    /// Starts polling `pool`'s database for commits made through other
    /// connections, once per hub. The baseline is read before returning so
    /// a snapshot taken afterwards cannot miss a commit.
    pub(crate) async fn watch_commits(self: &Arc<Self>, pool: &SqlitePool) {
        let mut watcher = self.watcher.lock().await;
        if watcher.is_some() {
            return;
        }

        let mut conn = match pool.connect_options().connect().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Cannot watch the diary for outside commits: {}", e);
                return;
            }
        };
        let version = match data_version(&mut conn).await {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!("Cannot watch the diary for outside commits: {}", e);
                return;
            }
        };

        *watcher = Some(tokio::spawn(poll_commits(
            Arc::downgrade(self),
            conn,
            version,
        )));
    }
}

impl Default for DiaryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DiaryHub {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.get_mut().take() {
            watcher.abort();
        }
    }
}

/// Changes whenever any other connection commits to the database.
async fn data_version(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("PRAGMA data_version")
        .fetch_one(&mut *conn)
        .await
}

async fn poll_commits(hub: Weak<DiaryHub>, mut conn: SqliteConnection, mut version: i64) {
    let mut ticker = tokio::time::interval(COMMIT_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(hub) = hub.upgrade() else {
            break;
        };

        match data_version(&mut conn).await {
            Ok(current) if current != version => {
                version = current;
                hub.publish_all(DiaryChange::External).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to check the diary for outside commits: {}", e),
        }
    }
}

/// The forwarding task's end of a date channel. Dropping it releases the
/// channel when no other subscription shares it.
struct DateFeed {
    hub: Arc<DiaryHub>,
    date: NaiveDate,
    changes: broadcast::Receiver<DiaryChange>,
}

impl Drop for DateFeed {
    fn drop(&mut self) {
        self.hub.release(self.date);
    }
}

/// A live query over the entries of one date.
///
/// Dropping the subscription (or calling [`cancel`](Self::cancel)) stops
/// delivery. It never touches stored data.
pub struct DiarySubscription {
    date: NaiveDate,
    hub: Arc<DiaryHub>,
    snapshots: mpsc::Receiver<DiarySnapshot>,
    task: JoinHandle<()>,
}

impl DiarySubscription {
    /// Starts watching `date`. The first snapshot is the current state.
    /// Later snapshots equal to the last one delivered are skipped.
    pub(crate) async fn start(repo: DiaryRepository, date: NaiveDate) -> Self {
        let hub = repo.hub().clone();

        // Subscribe and take the commit baseline before the first read so no
        // commit falls in between.
        let mut feed = DateFeed {
            hub: hub.clone(),
            date,
            changes: hub.subscribe(date).await,
        };
        hub.watch_commits(repo.pool()).await;
        let (tx, snapshots) = mpsc::channel(SNAPSHOT_BUFFER);

        let task = tokio::spawn(async move {
            let first = repo.list_for_date(date).await;
            let mut delivered = first.as_ref().ok().cloned();
            if tx.send(first).await.is_err() {
                return;
            }

            loop {
                match feed.changes.recv().await {
                    Ok(change) => tracing::debug!("Refreshing {} after {:?}", date, change),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Refreshing {} after {} missed changes", date, skipped)
                    }
                    Err(RecvError::Closed) => break,
                }

                // Changes that arrived meanwhile are covered by the same re-query.
                loop {
                    match feed.changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                    }
                }

                let snapshot = repo.list_for_date(date).await;
                match &snapshot {
                    Ok(entries) if delivered.as_ref() == Some(entries) => continue,
                    Ok(entries) => delivered = Some(entries.clone()),
                    Err(e) => {
                        tracing::warn!("Failed to refresh diary for {}: {}", date, e);
                        delivered = None;
                    }
                }
                if tx.send(snapshot).await.is_err() {
                    break;
                }
            }
        });

        Self {
            date,
            hub,
            snapshots,
            task,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Waits for the next snapshot. Returns `None` once the subscription has
    /// ended.
    pub async fn next(&mut self) -> Option<DiarySnapshot> {
        self.snapshots.recv().await
    }

    /// Stops delivery and waits for the forwarding task to finish, so the
    /// date's channel is gone once this returns unless another subscription
    /// still uses it.
    pub async fn cancel(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        self.hub.prune(self.date).await;
    }
}

impl Drop for DiarySubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Stream for DiarySubscription {
    type Item = DiarySnapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().snapshots.poll_recv(cx)
    }
}
