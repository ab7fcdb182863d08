//! Gateway-facing types and the two seams to the external chat platform.
//!
//! The adapter never owns the gateway connection. It consumes push events
//! ([`GatewayEvent`]) delivered by the platform client and issues commands
//! back through the [`GatewayClient`] trait. Connection lifecycle — login,
//! reconnect, rate limiting — belongs entirely to the client implementation.
//!
//! [`EventVetoes`] lets a host short-circuit any inbound event kind before
//! the adapter's own logic runs; the default implementation is permissive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by gateway commands.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway session is not ready; fatal to the call, never retried.
    #[error("gateway session is not connected")]
    NotConnected,

    /// The referenced user does not exist on the platform.
    #[error("gateway user {0} not found")]
    UserNotFound(u64),

    /// The referenced message does not exist in the channel.
    #[error("message {message_id} not found in channel {channel_id}")]
    MessageNotFound {
        /// Channel that was searched.
        channel_id: u64,
        /// Message id that was requested.
        message_id: u64,
    },

    /// An activity carried a conversation id that is not a platform user id.
    #[error("invalid conversation id: {0:?}")]
    InvalidConversationId(String),

    /// An activity id could not be mapped to a gateway message id.
    #[error("invalid activity id: {0:?}")]
    InvalidActivityId(String),

    /// Wire-level failure reported by the platform client.
    #[error("gateway transport error: {0}")]
    Transport(String),
}

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A platform user as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayUser {
    /// Platform user id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Whether the account is a bot.
    pub is_bot: bool,
}

/// A direct-message channel between the bot and a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmChannel {
    /// Channel id.
    pub id: u64,
    /// The user on the other end.
    pub recipient: GatewayUser,
}

/// Visual style of a quick-action button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    /// Highlighted (the selected option).
    Primary,
    /// Default appearance.
    Secondary,
}

/// A quick-action button attached to a gateway message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Text shown on the button.
    pub label: String,
    /// Identifier delivered back when the button is clicked.
    pub custom_id: String,
    /// Visual style.
    pub style: ButtonStyle,
    /// Whether the button is inert.
    pub disabled: bool,
}

impl Button {
    /// Enabled secondary button with the given label and custom id.
    pub fn new(label: impl Into<String>, custom_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            custom_id: custom_id.into(),
            style: ButtonStyle::Secondary,
            disabled: false,
        }
    }
}

/// File bytes ready to upload with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// File name shown on the platform.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Content of an outbound direct message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Message text.
    pub text: String,
    /// Quick-action buttons (at most one row).
    pub buttons: Vec<Button>,
    /// Files to upload alongside the text.
    pub attachments: Vec<FileAttachment>,
}

/// Fields of a message edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageEdit {
    /// Replacement text.
    pub content: Option<String>,
    /// Replacement button row.
    pub buttons: Option<Vec<Button>>,
}

/// A message observed on or sent through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayMessage {
    /// Message id.
    pub id: u64,
    /// Channel the message lives in.
    pub channel_id: u64,
    /// Author of the message.
    pub author: GatewayUser,
    /// The direct-channel peer, when the message was sent in a DM.
    pub recipient: Option<GatewayUser>,
    /// Message text.
    pub content: String,
    /// When the message was created on the platform.
    pub timestamp: DateTime<Utc>,
    /// Buttons currently attached to the message.
    pub buttons: Vec<Button>,
}

impl GatewayMessage {
    /// Whether the message was sent in a direct channel.
    pub fn is_direct(&self) -> bool {
        self.recipient.is_some()
    }
}

/// A reaction being added to or removed from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    /// Channel holding the reacted-to message.
    pub channel_id: u64,
    /// The reacted-to message.
    pub message_id: u64,
    /// User performing the reaction.
    pub user_id: u64,
    /// Reaction label (emote name).
    pub label: String,
}

/// A click on a quick-action button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonInteraction {
    /// The bot message carrying the button row.
    pub message: GatewayMessage,
    /// User who clicked.
    pub user: GatewayUser,
    /// Custom id of the clicked button.
    pub custom_id: String,
}

/// A raw push event delivered by the gateway client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A new message appeared.
    MessageReceived(GatewayMessage),
    /// A message was edited.
    MessageUpdated {
        /// Id of the message before the edit.
        before_id: u64,
        /// The message after the edit.
        after: GatewayMessage,
    },
    /// A message was deleted.
    MessageDeleted {
        /// Channel the message lived in.
        channel_id: u64,
        /// Id of the deleted message.
        message_id: u64,
    },
    /// A reaction was added to a message.
    ReactionAdded(ReactionEvent),
    /// A reaction was removed from a message.
    ReactionRemoved(ReactionEvent),
    /// A user started typing.
    Typing {
        /// Channel where the typing happens.
        channel_id: u64,
        /// The typing user.
        user_id: u64,
    },
    /// A quick-action button was clicked.
    ButtonClicked(ButtonInteraction),
}

// ---------------------------------------------------------------------------
// Client seam
// ---------------------------------------------------------------------------

/// Command interface to the platform client.
///
/// Implementations must be `Send + Sync`; the adapter calls them from
/// detached tasks running concurrently for many users. None of these calls
/// are retried by the adapter — transport resilience is the client's job.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Whether the gateway session is ready for outbound commands.
    fn is_connected(&self) -> bool;

    /// The bot's own platform identity.
    fn current_user(&self) -> GatewayUser;

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UserNotFound`] or a transport error.
    async fn get_user(&self, user_id: u64) -> Result<GatewayUser, GatewayError>;

    /// Open (or reuse) the direct channel to a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user is unknown or the channel cannot be
    /// created.
    async fn open_dm(&self, user_id: u64) -> Result<DmChannel, GatewayError>;

    /// Resolve a channel id to a direct channel, if it is one.
    ///
    /// Returns `Ok(None)` for guild or otherwise non-direct channels.
    ///
    /// # Errors
    ///
    /// Returns a transport error on lookup failure.
    async fn dm_channel(&self, channel_id: u64) -> Result<Option<DmChannel>, GatewayError>;

    /// Send a direct message (text, buttons, files) to a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails; partial attachment handling is
    /// the caller's concern.
    async fn send_message(
        &self,
        user_id: u64,
        message: OutboundMessage,
    ) -> Result<GatewayMessage, GatewayError>;

    /// Fetch a message by channel and id; `Ok(None)` when it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns a transport error on lookup failure.
    async fn get_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<Option<GatewayMessage>, GatewayError>;

    /// Edit a previously sent message.
    ///
    /// # Errors
    ///
    /// Returns an error if the edit is rejected.
    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        edit: MessageEdit,
    ) -> Result<(), GatewayError>;

    /// Delete a previously sent message.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is rejected.
    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), GatewayError>;

    /// Add a reaction to a message as the bot.
    ///
    /// # Errors
    ///
    /// Returns an error if the reaction is rejected.
    async fn add_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        label: &str,
    ) -> Result<(), GatewayError>;

    /// Remove a user's reaction from a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal is rejected.
    async fn remove_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        label: &str,
        user_id: u64,
    ) -> Result<(), GatewayError>;

    /// Trigger a transient typing indicator in a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the indicator cannot be triggered.
    async fn trigger_typing(&self, channel_id: u64) -> Result<(), GatewayError>;
}

// ---------------------------------------------------------------------------
// Veto seam
// ---------------------------------------------------------------------------

/// Per-event veto predicates, checked before any adapter logic.
///
/// Returning `false` drops the event with no further effect; it is not an
/// error. Every method defaults to `true`.
#[async_trait]
pub trait EventVetoes: Send + Sync {
    /// Veto for message-received events.
    async fn message_received(&self, _message: &GatewayMessage) -> bool {
        true
    }

    /// Veto for message-updated events.
    async fn message_updated(&self, _before_id: u64, _after: &GatewayMessage) -> bool {
        true
    }

    /// Veto for message-deleted events.
    async fn message_deleted(&self, _channel_id: u64, _message_id: u64) -> bool {
        true
    }

    /// Veto for reaction-added events.
    async fn reaction_added(&self, _reaction: &ReactionEvent) -> bool {
        true
    }

    /// Veto for reaction-removed events.
    async fn reaction_removed(&self, _reaction: &ReactionEvent) -> bool {
        true
    }

    /// Veto for typing events.
    async fn typing(&self, _channel_id: u64, _user_id: u64) -> bool {
        true
    }

    /// Veto for button-interaction events.
    async fn button_clicked(&self, _interaction: &ButtonInteraction) -> bool {
        true
    }
}

/// The default, fully permissive veto set.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl EventVetoes for AllowAll {}
