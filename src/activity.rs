//! Protocol activity model shared with the dialog engine.
//!
//! An [`Activity`] is one normalized, turn-based message exchanged with the
//! dialog engine. The adapter builds activities from raw gateway events on the
//! way in and translates them back into gateway calls on the way out. The
//! builder helpers here are plain functions over plain data; no fluent
//! inheritance tricks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel identifier stamped on every activity produced by this adapter.
pub const CHANNEL_ID: &str = "gateway";

/// The kind of an activity — an exhaustive tagged union.
///
/// Outbound dispatch in the translator matches on this; inbound
/// normalization produces exactly one kind per gateway event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    /// A plain user or bot message.
    Message,
    /// A reaction added to or removed from a previous message.
    MessageReaction,
    /// An edit of a previously seen message.
    MessageUpdate,
    /// A deletion of a previously seen message.
    MessageDelete,
    /// A transient typing indicator.
    Typing,
    /// Membership change, used for the conversation-start handshake.
    ConversationUpdate,
    /// Explicit end of the conversation; triggers per-user state cleanup.
    EndOfConversation,
    /// Diagnostic trace emitted on turn failure.
    Trace,
}

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    /// A human platform user.
    User,
    /// The bot identity itself.
    Bot,
}

/// A participant account as seen by the dialog engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    /// Platform user id, stringified.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether this account is the bot or a user.
    pub role: AccountRole,
}

/// The conversation an activity belongs to.
///
/// For this adapter the conversation id is the platform user id of the
/// direct-channel peer, stringified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    /// Conversation identifier.
    pub id: String,
}

impl ConversationAccount {
    /// Conversation account for the given platform user id.
    pub fn for_user(user_id: u64) -> Self {
        Self {
            id: user_id.to_string(),
        }
    }
}

/// A single reaction delta entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReaction {
    /// Reaction label (emote name).
    pub label: String,
}

/// An attachment referenced by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Where the attachment bytes can be fetched from.
    pub content_url: String,
    /// Optional explicit file name; derived from the URL when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Acknowledgement returned for every outbound call.
///
/// The id is freshly generated and deliberately distinct from any
/// platform-specific message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceResponse {
    /// Acknowledgement identifier.
    pub id: String,
}

impl ResourceResponse {
    /// Acknowledgement with a fresh UUID.
    pub fn fresh() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Acknowledgement echoing a known id (used by activity updates).
    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A normalized, turn-based protocol message.
///
/// Optional fields are omitted from serialized output so that logged
/// activities stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Activity kind.
    pub kind: ActivityKind,
    /// Activity id; for inbound activities this is the gateway message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Originating channel identifier (always [`CHANNEL_ID`] here).
    pub channel_id: String,
    /// Conversation this activity belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    /// Sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    /// Addressee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    /// Message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// When the underlying gateway event happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Attachment URLs to deliver with a message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Suggested action titles, rendered as quick-action buttons.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
    /// Reactions added since the referenced message was last seen.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions_added: Vec<MessageReaction>,
    /// Reactions removed since the referenced message was last seen.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions_removed: Vec<MessageReaction>,
    /// Members joining the conversation (conversation-update).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    /// Members leaving the conversation (conversation-update).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_removed: Vec<ChannelAccount>,
    /// Id of the activity this one refers back to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// Structured payload (trace activities).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Human-readable label (trace activities).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Activity {
    /// Empty activity of the given kind.
    pub fn new(kind: ActivityKind) -> Self {
        Self {
            kind,
            id: None,
            channel_id: CHANNEL_ID.to_owned(),
            conversation: None,
            from: None,
            recipient: None,
            text: None,
            timestamp: None,
            attachments: Vec::new(),
            suggested_actions: Vec::new(),
            reactions_added: Vec::new(),
            reactions_removed: Vec::new(),
            members_added: Vec::new(),
            members_removed: Vec::new(),
            reply_to_id: None,
            value: None,
            label: None,
        }
    }

    /// Plain message activity with the given text.
    pub fn message(text: impl Into<String>) -> Self {
        let mut activity = Self::new(ActivityKind::Message);
        activity.text = Some(text.into());
        activity
    }

    /// Typing-indicator activity.
    pub fn typing() -> Self {
        Self::new(ActivityKind::Typing)
    }

    /// Reaction activity referencing a previously seen message.
    ///
    /// The activity id and `reply_to_id` are both set to the original
    /// message id so the engine can correlate the reaction.
    pub fn message_reaction(
        original_id: impl Into<String>,
        conversation: ConversationAccount,
        reacting_user: ChannelAccount,
    ) -> Self {
        let id = original_id.into();
        let mut activity = Self::new(ActivityKind::MessageReaction);
        activity.id = Some(id.clone());
        activity.reply_to_id = Some(id);
        activity.conversation = Some(conversation);
        activity.from = Some(reacting_user);
        activity
    }

    /// Trace activity describing a diagnostic event.
    pub fn trace(label: impl Into<String>, value: serde_json::Value) -> Self {
        let mut activity = Self::new(ActivityKind::Trace);
        activity.label = Some(label.into());
        activity.value = Some(value);
        activity
    }

    /// Set the conversation.
    pub fn with_conversation(mut self, conversation: ConversationAccount) -> Self {
        self.conversation = Some(conversation);
        self
    }

    /// Set the sender.
    pub fn with_from(mut self, from: ChannelAccount) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the addressee.
    pub fn with_recipient(mut self, recipient: ChannelAccount) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Set the activity id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Record an added reaction.
    pub fn add_reaction(&mut self, label: impl Into<String>) {
        self.reactions_added.push(MessageReaction {
            label: label.into(),
        });
    }

    /// Record a removed reaction.
    pub fn remove_reaction(&mut self, label: impl Into<String>) {
        self.reactions_removed.push(MessageReaction {
            label: label.into(),
        });
    }

    /// Fill unset routing fields for a reply to `inbound`.
    ///
    /// The reply travels the opposite direction, so sender and recipient are
    /// swapped and the conversation is carried over. Fields already set are
    /// left alone.
    pub fn apply_reply_routing(&mut self, inbound: &Activity) {
        if self.conversation.is_none() {
            self.conversation = inbound.conversation.clone();
        }
        if self.from.is_none() {
            self.from = inbound.recipient.clone();
        }
        if self.recipient.is_none() {
            self.recipient = inbound.from.clone();
        }
    }

    /// Compact JSON rendering for structured logs.
    pub fn to_log_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
