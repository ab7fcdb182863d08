//! Correlation cache for gateway messages and protocol activities.
//!
//! Later gateway events — edits, deletes, reactions — arrive carrying only a
//! message id. The [`CorrelationCache`] keeps enough recent context to
//! reconstruct full activities from those ids: direct messages seen on the
//! wire, activities handed to the engine, and activities sent on its behalf.
//!
//! All three maps are safe under arbitrary concurrent callers. Gateway
//! messages age out via an opportunistic purge; activities are only removed
//! by the per-user clear.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::activity::Activity;
use crate::gateway::{GatewayMessage, GatewayUser};

/// A direct message retained for later correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedGatewayMessage {
    /// Gateway message id.
    pub id: u64,
    /// Channel the message was seen in.
    pub channel_id: u64,
    /// Author identity, kept for attribution on delete and clear.
    pub author: GatewayUser,
    /// The direct-channel peer's user id.
    pub recipient_id: Option<u64>,
    /// Message text at the time it was observed.
    pub content: String,
    /// Platform timestamp, used by the purge scan.
    pub timestamp: DateTime<Utc>,
}

impl CachedGatewayMessage {
    fn from_message(message: &GatewayMessage) -> Self {
        Self {
            id: message.id,
            channel_id: message.channel_id,
            author: message.author.clone(),
            recipient_id: message.recipient.as_ref().map(|u| u.id),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }

    fn belongs_to(&self, user_id: u64) -> bool {
        self.author.id == user_id || self.recipient_id == Some(user_id)
    }
}

type MessageMap = Arc<Mutex<HashMap<u64, CachedGatewayMessage>>>;
type ActivityMap = Arc<Mutex<HashMap<String, Activity>>>;

/// Bounded-retention store correlating gateway ids with protocol activities.
#[derive(Debug)]
pub struct CorrelationCache {
    /// Direct messages seen on the wire, keyed by gateway message id.
    messages: MessageMap,
    /// Activities sent to the user on the engine's behalf, keyed by id.
    sent: ActivityMap,
    /// Activities handed to the engine, keyed by id.
    received: ActivityMap,
    /// When the last purge scan was started.
    last_purge: Mutex<Instant>,
    /// Messages older than this are dropped by the purge scan.
    retention: Duration,
}

impl CorrelationCache {
    /// Empty cache with the given message retention window.
    pub fn new(retention: Duration) -> Self {
        Self {
            messages: Arc::new(Mutex::new(HashMap::new())),
            sent: Arc::new(Mutex::new(HashMap::new())),
            received: Arc::new(Mutex::new(HashMap::new())),
            last_purge: Mutex::new(Instant::now()),
            retention,
        }
    }

    /// Observe a message arriving on the gateway delivery path.
    ///
    /// Caches user-authored direct messages and runs the opportunistic purge
    /// check. Bot messages are cached explicitly by the outbound path via
    /// [`Self::insert_bot_message`]; everything else is ignored.
    pub fn observe_message(&self, message: &GatewayMessage) {
        if message.is_direct() && !message.author.is_bot {
            self.insert_message(message);
        }
        self.maybe_purge();
    }

    /// Cache a direct message sent by the bot itself.
    pub fn insert_bot_message(&self, message: &GatewayMessage) {
        if message.is_direct() {
            self.insert_message(message);
        }
    }

    fn insert_message(&self, message: &GatewayMessage) {
        if let Ok(mut map) = self.messages.lock() {
            map.insert(message.id, CachedGatewayMessage::from_message(message));
            debug!(message_id = message.id, "cached gateway message");
        }
    }

    /// Look up a cached gateway message by id.
    pub fn gateway_message(&self, message_id: u64) -> Option<CachedGatewayMessage> {
        let found = self
            .messages
            .lock()
            .ok()
            .and_then(|map| map.get(&message_id).cloned());
        if found.is_none() {
            debug!(message_id, "gateway message not in cache");
        }
        found
    }

    /// Cache an activity sent to the user. Activities without an id are
    /// dropped since they can never be referenced again.
    pub fn insert_sent_activity(&self, activity: Activity) {
        let Some(id) = activity.id.clone() else {
            return;
        };
        if let Ok(mut map) = self.sent.lock() {
            debug!(activity_id = %id, "cached sent activity");
            map.insert(id, activity);
        }
    }

    /// Cache an activity handed to the engine. Activities without an id are
    /// dropped.
    pub fn insert_received_activity(&self, activity: Activity) {
        let Some(id) = activity.id.clone() else {
            return;
        };
        if let Ok(mut map) = self.received.lock() {
            debug!(activity_id = %id, "cached received activity");
            map.insert(id, activity);
        }
    }

    /// Look up a cached sent activity by id.
    pub fn sent_activity(&self, activity_id: &str) -> Option<Activity> {
        self.sent
            .lock()
            .ok()
            .and_then(|map| map.get(activity_id).cloned())
    }

    /// Look up a cached received activity by id.
    pub fn received_activity(&self, activity_id: &str) -> Option<Activity> {
        self.received
            .lock()
            .ok()
            .and_then(|map| map.get(activity_id).cloned())
    }

    /// Start a purge scan if one is due.
    ///
    /// Inside a tokio runtime the scan runs detached so the gateway delivery
    /// path that triggered it is never blocked; without one it runs inline.
    fn maybe_purge(&self) {
        let due = self
            .last_purge
            .lock()
            .map(|mut last| {
                if last.elapsed() > self.retention {
                    *last = Instant::now();
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if !due {
            return;
        }

        let Some(cutoff) = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            return;
        };

        let messages = Arc::clone(&self.messages);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                purge_messages(&messages, cutoff);
            });
        } else {
            purge_messages(&messages, cutoff);
        }
    }

    /// Remove cached gateway messages strictly older than `cutoff`.
    ///
    /// Exposed so hosts can force a scan; the adapter itself relies on the
    /// opportunistic trigger in [`Self::observe_message`].
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) {
        purge_messages(&self.messages, cutoff);
    }

    /// Remove every entry attributable to `user_id` from all three maps.
    ///
    /// The three scans run concurrently but the call returns only once all
    /// of them have finished, so callers observe either the full previous
    /// state or a complete clear — never a partial one.
    pub async fn clear_for_user(&self, user_id: u64) {
        let messages = Arc::clone(&self.messages);
        let sent = Arc::clone(&self.sent);
        let received = Arc::clone(&self.received);
        let conversation_id = user_id.to_string();

        let scan_messages = tokio::spawn(async move {
            if let Ok(mut map) = messages.lock() {
                let before = map.len();
                map.retain(|_, m| !m.belongs_to(user_id));
                debug!(
                    user_id,
                    removed = before.saturating_sub(map.len()),
                    "cleared cached messages"
                );
            }
        });

        let sent_conversation = conversation_id.clone();
        let scan_sent = tokio::spawn(async move {
            remove_conversation_activities(&sent, &sent_conversation, "sent");
        });
        let scan_received = tokio::spawn(async move {
            remove_conversation_activities(&received, &conversation_id, "received");
        });

        let (m, s, r) = tokio::join!(scan_messages, scan_sent, scan_received);
        for result in [m, s, r] {
            if let Err(e) = result {
                warn!(error = %e, user_id, "cache clear scan panicked");
            }
        }
    }
}

fn purge_messages(messages: &Mutex<HashMap<u64, CachedGatewayMessage>>, cutoff: DateTime<Utc>) {
    if let Ok(mut map) = messages.lock() {
        let before = map.len();
        map.retain(|_, m| m.timestamp >= cutoff);
        debug!(
            removed = before.saturating_sub(map.len()),
            "purged expired gateway messages"
        );
    }
}

fn remove_conversation_activities(
    activities: &Mutex<HashMap<String, Activity>>,
    conversation_id: &str,
    which: &str,
) {
    if let Ok(mut map) = activities.lock() {
        let before = map.len();
        map.retain(|_, a| {
            a.conversation
                .as_ref()
                .map(|c| c.id != conversation_id)
                .unwrap_or(true)
        });
        debug!(
            conversation_id,
            removed = before.saturating_sub(map.len()),
            "cleared cached {which} activities"
        );
    }
}
