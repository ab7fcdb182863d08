//! Inbound gateway event handling.
//!
//! Normalizes the seven raw gateway event kinds into protocol activities
//! and routes them to the dispatcher. Every handler applies its veto hook
//! first, then the structural filters (direct channel only, never the bot's
//! own traffic), then correlates against the cache where needed. A missing
//! correlation is a silent drop — the event is presumed stale — not an
//! error.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::activity::{Activity, ActivityKind, ConversationAccount};
use crate::bridge::DmBridge;
use crate::gateway::{
    Button, ButtonInteraction, ButtonStyle, GatewayMessage, GatewayUser, MessageEdit,
    ReactionEvent,
};

// ---------------------------------------------------------------------------
// Typing debounce
// ---------------------------------------------------------------------------

/// Per-user debounce clock for typing activities.
///
/// A typing activity is emitted for a user only when none has been emitted
/// yet or at least the debounce interval has elapsed since the last one.
/// The clock advances only on actual emission, so a stream of suppressed
/// signals cannot push the next emission further out.
#[derive(Debug)]
pub struct TypingTracker {
    debounce: Duration,
    last_emitted: Mutex<HashMap<u64, Instant>>,
}

impl TypingTracker {
    /// Tracker with the given debounce interval.
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a typing activity should be emitted for this user at `now`.
    pub fn should_emit(&self, user_id: u64, now: Instant) -> bool {
        self.last_emitted
            .lock()
            .map(|map| match map.get(&user_id) {
                None => true,
                Some(last) => now.saturating_duration_since(*last) >= self.debounce,
            })
            .unwrap_or(false)
    }

    /// Record that a typing activity was emitted for this user at `now`.
    pub fn record(&self, user_id: u64, now: Instant) {
        if let Ok(mut map) = self.last_emitted.lock() {
            map.insert(user_id, now);
        }
    }

    /// Drop a user's debounce entry; their next signal emits immediately.
    pub fn forget(&self, user_id: u64) {
        if let Ok(mut map) = self.last_emitted.lock() {
            map.remove(&user_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Event handlers
// ---------------------------------------------------------------------------

impl DmBridge {
    /// Handle a message appearing on the gateway.
    ///
    /// User-authored direct messages either continue the user's active
    /// conversation or trigger the conversation-start handshake. Bot
    /// messages and non-direct channels are ignored after the cache has
    /// observed the event.
    ///
    /// # Errors
    ///
    /// Returns an error when a gateway lookup fails mid-handling.
    pub async fn message_received(&self, message: GatewayMessage) -> anyhow::Result<()> {
        if !self.inner.vetoes.message_received(&message).await {
            debug!(message_id = message.id, "message-received vetoed");
            return Ok(());
        }

        self.inner.cache.observe_message(&message);

        if message.author.is_bot || !message.is_direct() {
            return Ok(());
        }
        self.create_or_continue_conversation(message).await
    }

    /// Continue the author's conversation, or start one if none is active.
    ///
    /// With an active reference the message becomes a continuation activity,
    /// is cached as received and dispatched. Without one, the dialog engine
    /// first gets a conversation-start handshake so it can greet the user;
    /// the reference itself appears only once the bot's reply is sent.
    ///
    /// # Errors
    ///
    /// Returns an error when a gateway lookup fails.
    pub async fn create_or_continue_conversation(
        &self,
        message: GatewayMessage,
    ) -> anyhow::Result<()> {
        let Some(user) = message.recipient.clone() else {
            return Ok(());
        };

        if let Some(reference) = self.inner.registry.get(&user.id.to_string()) {
            let mut activity = Activity::message(message.content.clone())
                .with_id(message.id.to_string())
                .with_conversation(reference.conversation)
                .with_from(self.inner.account_of(&message.author))
                .with_recipient(self.inner.bot_account());
            activity.timestamp = Some(Utc::now());

            self.inner.cache.insert_received_activity(activity.clone());
            self.inner.process_activity(activity).await;
        } else {
            self.start_conversation(&user).await?;
        }
        Ok(())
    }

    /// Run the conversation-start handshake for a user.
    ///
    /// Synthesizes a conversation-update activity announcing the user and
    /// the bot as members and dispatches it, letting the engine greet the
    /// user on the very first turn.
    ///
    /// # Errors
    ///
    /// Returns an error when the user's direct channel cannot be resolved.
    pub async fn start_conversation(&self, user: &GatewayUser) -> anyhow::Result<()> {
        let dm = self.inner.client.open_dm(user.id).await?;
        let user_account = self.inner.account_of(&dm.recipient);
        let bot_account = self.inner.bot_account();

        let mut activity = Activity::new(ActivityKind::ConversationUpdate)
            .with_id(Uuid::new_v4().to_string())
            .with_conversation(ConversationAccount::for_user(dm.recipient.id))
            .with_from(user_account.clone())
            .with_recipient(bot_account.clone());
        activity.members_added = vec![user_account, bot_account];

        self.inner.process_activity(activity).await;
        Ok(())
    }

    /// Handle an edit of a previously seen message.
    ///
    /// Correlates against the received-activity cache; an edit of an
    /// uncached message has no recoverable context and is dropped silently.
    /// A hit mutates the cached activity's text, retags it as an update and
    /// dispatches it under the same activity id.
    ///
    /// # Errors
    ///
    /// This handler performs no gateway calls and currently cannot fail.
    pub async fn message_updated(&self, before_id: u64, after: GatewayMessage) -> anyhow::Result<()> {
        if !self.inner.vetoes.message_updated(before_id, &after).await {
            return Ok(());
        }
        let Some(user) = after.recipient.clone() else {
            return Ok(());
        };
        if after.author.is_bot || self.inner.registry.get(&user.id.to_string()).is_none() {
            return Ok(());
        }

        let Some(mut activity) = self.inner.cache.received_activity(&before_id.to_string())
        else {
            debug!(message_id = before_id, "edit of uncached message dropped");
            return Ok(());
        };

        activity.text = Some(after.content);
        activity.kind = ActivityKind::MessageUpdate;
        self.inner.cache.insert_received_activity(activity.clone());
        self.inner.process_activity(activity).await;
        Ok(())
    }

    /// Handle a message deletion.
    ///
    /// Correlates against the gateway-message cache; an uncached id is
    /// dropped silently. A hit synthesizes a delete activity carrying the
    /// original author, id and text.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel lookup fails.
    pub async fn message_deleted(&self, channel_id: u64, message_id: u64) -> anyhow::Result<()> {
        if !self.inner.vetoes.message_deleted(channel_id, message_id).await {
            return Ok(());
        }
        let Some(dm) = self.inner.client.dm_channel(channel_id).await? else {
            return Ok(());
        };

        let Some(cached) = self.inner.cache.gateway_message(message_id) else {
            debug!(message_id, "delete of uncached message dropped");
            return Ok(());
        };
        if cached.author.is_bot {
            return Ok(());
        }
        let Some(reference) = self.inner.registry.get(&dm.recipient.id.to_string()) else {
            return Ok(());
        };

        let mut activity = Activity::new(ActivityKind::MessageDelete)
            .with_id(cached.id.to_string())
            .with_conversation(reference.conversation)
            .with_from(self.inner.account_of(&cached.author))
            .with_recipient(self.inner.bot_account());
        activity.text = Some(cached.content);

        self.inner.process_activity(activity).await;
        Ok(())
    }

    /// Handle a reaction added to a message.
    ///
    /// # Errors
    ///
    /// Returns an error when the reacting user cannot be looked up.
    pub async fn reaction_added(&self, reaction: ReactionEvent) -> anyhow::Result<()> {
        if !self.inner.vetoes.reaction_added(&reaction).await {
            return Ok(());
        }
        if let Some(mut activity) = self.reaction_activity(&reaction).await? {
            activity.add_reaction(reaction.label);
            self.inner.process_activity(activity).await;
        }
        Ok(())
    }

    /// Handle a reaction removed from a message.
    ///
    /// Add and remove are dispatched as distinct activities, never merged.
    ///
    /// # Errors
    ///
    /// Returns an error when the reacting user cannot be looked up.
    pub async fn reaction_removed(&self, reaction: ReactionEvent) -> anyhow::Result<()> {
        if !self.inner.vetoes.reaction_removed(&reaction).await {
            return Ok(());
        }
        if let Some(mut activity) = self.reaction_activity(&reaction).await? {
            activity.remove_reaction(reaction.label);
            self.inner.process_activity(activity).await;
        }
        Ok(())
    }

    /// Shared skeleton for both reaction kinds: skip the bot's own
    /// reactions, require an active conversation, reference the original
    /// message id.
    async fn reaction_activity(
        &self,
        reaction: &ReactionEvent,
    ) -> anyhow::Result<Option<Activity>> {
        if reaction.user_id == self.inner.client.current_user().id {
            return Ok(None);
        }
        let Some(reference) = self.inner.registry.get(&reaction.user_id.to_string()) else {
            return Ok(None);
        };

        let user = self.inner.client.get_user(reaction.user_id).await?;
        Ok(Some(Activity::message_reaction(
            reaction.message_id.to_string(),
            reference.conversation,
            self.inner.account_of(&user),
        )))
    }

    /// Handle a user-typing signal, debounced per user.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel or user lookup fails.
    pub async fn user_typing(&self, channel_id: u64, user_id: u64) -> anyhow::Result<()> {
        if !self.inner.vetoes.typing(channel_id, user_id).await {
            return Ok(());
        }
        let Some(dm) = self.inner.client.dm_channel(channel_id).await? else {
            return Ok(());
        };
        let user = self.inner.client.get_user(user_id).await?;
        if user.is_bot {
            return Ok(());
        }
        let Some(reference) = self.inner.registry.get(&dm.recipient.id.to_string()) else {
            return Ok(());
        };

        let now = Instant::now();
        if !self.inner.typing.should_emit(user.id, now) {
            return Ok(());
        }

        let activity = Activity::typing()
            .with_conversation(reference.conversation)
            .with_from(self.inner.account_of(&user))
            .with_recipient(self.inner.bot_account());
        self.inner.process_activity(activity).await;

        // Only an actual emission advances the debounce clock.
        self.inner.typing.record(user.id, now);
        Ok(())
    }

    /// Handle a quick-action button click.
    ///
    /// The click is dispatched as a message whose text is the button's
    /// custom id. Independently, the remote message's button row is edited
    /// so the chosen button is highlighted and the whole row disabled.
    ///
    /// # Errors
    ///
    /// Returns an error when the reflect-back edit is rejected.
    pub async fn button_clicked(&self, interaction: ButtonInteraction) -> anyhow::Result<()> {
        if !self.inner.vetoes.button_clicked(&interaction).await {
            return Ok(());
        }
        let Some(user) = interaction.message.recipient.clone() else {
            return Ok(());
        };

        let reflected: Vec<Button> = interaction
            .message
            .buttons
            .iter()
            .map(|b| Button {
                label: b.label.clone(),
                custom_id: b.custom_id.clone(),
                style: if b.custom_id == interaction.custom_id {
                    ButtonStyle::Primary
                } else {
                    ButtonStyle::Secondary
                },
                disabled: true,
            })
            .collect();
        self.inner
            .client
            .edit_message(
                interaction.message.channel_id,
                interaction.message.id,
                MessageEdit {
                    content: None,
                    buttons: Some(reflected),
                },
            )
            .await?;

        let mut activity = Activity::message(interaction.custom_id)
            .with_id(interaction.message.id.to_string())
            .with_from(self.inner.account_of(&user))
            .with_recipient(self.inner.bot_account());
        if let Some(reference) = self.inner.registry.get(&user.id.to_string()) {
            activity.conversation = Some(reference.conversation);
        }
        activity.timestamp = Some(Utc::now());

        self.inner.process_activity(activity).await;
        Ok(())
    }
}
