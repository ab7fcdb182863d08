//! Per-user conversation references.
//!
//! The gateway event stream is stateless; the registry is what turns it back
//! into per-user conversations. A reference is created only as a side effect
//! of the first successful outbound send — until the bot has actually spoken,
//! no conversation exists — and removed on end-of-conversation.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::activity::{Activity, ChannelAccount, ConversationAccount};

/// Durable correlation between a platform user and an engine conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReference {
    /// Platform user id, stringified.
    pub user_id: String,
    /// The conversation this user is bound to.
    pub conversation: ConversationAccount,
    /// The bot's account in this conversation.
    pub bot: Option<ChannelAccount>,
    /// The user's account in this conversation.
    pub user: Option<ChannelAccount>,
}

impl ConversationReference {
    /// Build a reference from a successfully sent outbound activity.
    ///
    /// Outbound activities travel bot → user, so `from` is the bot and
    /// `recipient` is the user. Returns `None` when the activity carries no
    /// conversation.
    pub fn from_outbound(activity: &Activity) -> Option<Self> {
        let conversation = activity.conversation.clone()?;
        Some(Self {
            user_id: conversation.id.clone(),
            conversation,
            bot: activity.from.clone(),
            user: activity.recipient.clone(),
        })
    }
}

/// Concurrency-safe map from platform user id to the active conversation.
///
/// Holds at most one live reference per user; an upsert replaces any
/// previous reference atomically.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    refs: Mutex<HashMap<String, ConversationReference>>,
}

impl ConversationRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active reference for a user, if the bot has spoken to them.
    pub fn get(&self, user_id: &str) -> Option<ConversationReference> {
        self.refs
            .lock()
            .ok()
            .and_then(|map| map.get(user_id).cloned())
    }

    /// Create or overwrite the reference for its user.
    pub fn upsert(&self, reference: ConversationReference) {
        if let Ok(mut map) = self.refs.lock() {
            debug!(user_id = %reference.user_id, "conversation reference stored");
            map.insert(reference.user_id.clone(), reference);
        }
    }

    /// Remove a user's reference unconditionally.
    ///
    /// Called from end-of-conversation handling only.
    pub fn remove(&self, user_id: &str) -> Option<ConversationReference> {
        let removed = self.refs.lock().ok().and_then(|mut map| map.remove(user_id));
        if removed.is_some() {
            debug!(user_id, "conversation reference removed");
        }
        removed
    }

    /// Number of live references.
    pub fn len(&self) -> usize {
        self.refs.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Whether no conversation is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
