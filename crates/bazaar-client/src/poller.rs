use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use bazaar_types::api::MessageResponse;

use crate::client::ApiClient;
use crate::inbox::InboxSnapshot;

/// Refresh period of an open conversation.
pub const MESSAGE_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Refresh period of the notification inbox.
pub const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    /// No fetch has completed yet.
    Loading,
    Ready(T),
    /// Every fetch so far has failed. Once a fetch succeeds this is never
    /// published again; later failures keep the last `Ready` value.
    Failed(String),
}

impl<T> PollState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Owner of a running poller. Dropping it stops the poller.
pub struct PollHandle<T> {
    state: watch::Receiver<PollState<T>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T> PollHandle<T> {
    /// A receiver that wakes on every published state.
    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.state.clone()
    }

    pub fn latest(&self) -> PollState<T>
    where
        T: Clone,
    {
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Cancel the poller and wait for its task to exit. An in-flight fetch
    /// is abandoned and its result never published.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("poller task ended abnormally: {}", e);
            }
        }
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `fetch` immediately and then every `interval` until `cancel` fires
/// or the returned handle is dropped.
///
/// Ticks missed while a slow fetch is running are delayed rather than
/// replayed, so fetches never overlap or burst.
pub fn spawn_poller<T, E, F, Fut>(
    interval: Duration,
    cancel: CancellationToken,
    mut fetch: F,
) -> PollHandle<T>
where
    T: Send + Sync + 'static,
    E: Display,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send,
{
    let (tx, rx) = watch::channel(PollState::Loading);
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut loaded = false;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = fetch() => result,
            };

            match result {
                Ok(value) => {
                    loaded = true;
                    tx.send_replace(PollState::Ready(value));
                }
                Err(e) if !loaded => {
                    warn!("initial poll failed: {}", e);
                    tx.send_replace(PollState::Failed(e.to_string()));
                }
                Err(e) => warn!("poll failed, keeping previous data: {}", e),
            }
        }

        debug!("poller stopped");
    });

    PollHandle {
        state: rx,
        cancel,
        task: Some(task),
    }
}

/// Keep one conversation's message list fresh while it is open.
pub fn poll_messages(
    client: &ApiClient,
    conversation_id: i64,
    cancel: CancellationToken,
) -> PollHandle<Vec<MessageResponse>> {
    let client = client.clone();
    spawn_poller(MESSAGE_POLL_INTERVAL, cancel, move || {
        let client = client.clone();
        async move { client.messages(conversation_id).await }
    })
}

/// Keep the caller's notification inbox and unread badge fresh.
pub fn poll_notifications(client: &ApiClient, cancel: CancellationToken) -> PollHandle<InboxSnapshot> {
    let client = client.clone();
    spawn_poller(NOTIFICATION_POLL_INTERVAL, cancel, move || {
        let client = client.clone();
        async move { client.notifications().await.map(InboxSnapshot::new) }
    })
}
