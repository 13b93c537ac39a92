use anyhow::Context;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bazaar_client::inbox::{InboxSnapshot, NotificationTarget};
use bazaar_client::poller::{poll_messages, poll_notifications};
use bazaar_client::{ApiClient, PollState};
use bazaar_types::api::MessageResponse;

/// What the inbox report has already printed.
#[derive(Default)]
struct InboxSeen {
    unread: Option<usize>,
    last_id: i64,
}

enum Event {
    Stop,
    Inbox,
    Messages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_watch=info,bazaar_client=info".into()),
        )
        .init();

    let base_url = std::env::var("BAZAAR_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".into());
    let token = std::env::var("BAZAAR_TOKEN").context("BAZAAR_TOKEN must be set")?;
    let conversation_id = match std::env::var("BAZAAR_CONVERSATION_ID") {
        Ok(raw) => Some(
            raw.parse::<i64>()
                .context("BAZAAR_CONVERSATION_ID must be a conversation id")?,
        ),
        Err(_) => None,
    };

    let client = ApiClient::new(base_url, token);
    let cancel = CancellationToken::new();

    let inbox = poll_notifications(&client, cancel.child_token());
    let mut inbox_rx = inbox.subscribe();
    let messages = conversation_id.map(|id| poll_messages(&client, id, cancel.child_token()));
    let mut messages_rx = messages.as_ref().map(|handle| handle.subscribe());

    info!("Watching {}", conversation_id.map_or("the inbox".to_string(), |id| format!("the inbox and conversation {}", id)));

    let mut inbox_seen = InboxSeen::default();
    let mut last_message_id = 0;

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => Event::Stop,
            changed = inbox_rx.changed() => if changed.is_ok() { Event::Inbox } else { Event::Stop },
            changed = next_change(messages_rx.as_mut()) => if changed.is_ok() { Event::Messages } else { Event::Stop },
        };

        match event {
            Event::Stop => break,
            Event::Inbox => report_inbox(&inbox_rx.borrow_and_update(), &mut inbox_seen),
            Event::Messages => {
                if let Some(rx) = messages_rx.as_mut() {
                    report_messages(&rx.borrow_and_update(), &mut last_message_id);
                }
            }
        }
    }

    info!("Shutting down");
    cancel.cancel();
    inbox.stop().await;
    if let Some(handle) = messages {
        handle.stop().await;
    }

    Ok(())
}

async fn next_change<T>(rx: Option<&mut watch::Receiver<T>>) -> Result<(), watch::error::RecvError> {
    match rx {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}

fn report_inbox(state: &PollState<InboxSnapshot>, seen: &mut InboxSeen) {
    match state {
        PollState::Loading => {}
        PollState::Failed(e) => warn!("Could not load notifications: {}", e),
        PollState::Ready(inbox) => {
            if seen.unread != Some(inbox.unread_count) {
                seen.unread = Some(inbox.unread_count);
                info!("{} unread notification(s)", inbox.unread_count);
            }
            for n in inbox.unread_since(seen.last_id) {
                let target = NotificationTarget::of(n).map(|t| t.path()).unwrap_or_default();
                info!("  #{} {} {}", n.id, n.content, target);
            }
            if let Some(newest) = inbox.newest_id() {
                seen.last_id = seen.last_id.max(newest);
            }
        }
    }
}

fn report_messages(state: &PollState<Vec<MessageResponse>>, last_message_id: &mut i64) {
    match state {
        PollState::Loading => {}
        PollState::Failed(e) => warn!("Could not load messages: {}", e),
        PollState::Ready(messages) => {
            for m in messages.iter().filter(|m| m.id > *last_message_id) {
                info!("[{}] {}: {}", m.created_at.format("%H:%M"), m.sender_username, m.content);
            }
            if let Some(last) = messages.last() {
                *last_message_id = (*last_message_id).max(last.id);
            }
        }
    }
}
