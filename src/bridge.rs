//! The adapter itself: shared state and the fire-and-forget event entry.
//!
//! A [`DmBridge`] owns the correlation cache, the conversation registry and
//! the seams to the gateway client, the veto hooks and the dialog engine.
//! Gateway events enter through [`DmBridge::handle_event`], which returns
//! immediately and runs the real work on a detached task — a slow turn must
//! never block the gateway's single delivery path, and a failing one must
//! never destabilize the shared connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::activity::{AccountRole, Activity, ChannelAccount, ResourceResponse};
use crate::cache::CorrelationCache;
use crate::dispatch::{DialogEngine, TurnStatus};
use crate::gateway::{AllowAll, EventVetoes, GatewayClient, GatewayError, GatewayEvent, GatewayUser};
use crate::ingest::TypingTracker;
use crate::registry::ConversationRegistry;

/// Tunables for a [`DmBridge`].
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Minimum gap between typing activities emitted for one user.
    pub typing_debounce: Duration,
    /// Retention window for cached gateway messages.
    pub cache_retention: Duration,
    /// Closing message sent when an end-of-conversation activity carries no
    /// text of its own.
    pub end_of_conversation_text: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            typing_debounce: Duration::from_secs(3),
            cache_retention: Duration::from_secs(3600),
            end_of_conversation_text: "The conversation has ended.".to_owned(),
        }
    }
}

/// Shared adapter state, reachable from every detached task and turn context.
pub(crate) struct BridgeInner {
    pub(crate) client: Arc<dyn GatewayClient>,
    pub(crate) engine: Arc<dyn DialogEngine>,
    pub(crate) vetoes: Arc<dyn EventVetoes>,
    pub(crate) cache: CorrelationCache,
    pub(crate) registry: ConversationRegistry,
    pub(crate) typing: TypingTracker,
    pub(crate) http: reqwest::Client,
    pub(crate) options: BridgeOptions,
}

impl BridgeInner {
    /// Protocol account for a gateway user.
    pub(crate) fn account_of(&self, user: &GatewayUser) -> ChannelAccount {
        ChannelAccount {
            id: user.id.to_string(),
            name: user.name.clone(),
            role: if user.is_bot {
                AccountRole::Bot
            } else {
                AccountRole::User
            },
        }
    }

    /// Protocol account for the bot itself.
    pub(crate) fn bot_account(&self) -> ChannelAccount {
        self.account_of(&self.client.current_user())
    }
}

/// Bidirectional adapter between a chat gateway and a turn-based dialog
/// engine.
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct DmBridge {
    pub(crate) inner: Arc<BridgeInner>,
}

impl DmBridge {
    /// Adapter over the given client and engine with permissive veto hooks.
    pub fn new(
        client: Arc<dyn GatewayClient>,
        engine: Arc<dyn DialogEngine>,
        options: BridgeOptions,
    ) -> Self {
        Self::with_vetoes(client, engine, Arc::new(AllowAll), options)
    }

    /// Adapter with custom veto hooks.
    pub fn with_vetoes(
        client: Arc<dyn GatewayClient>,
        engine: Arc<dyn DialogEngine>,
        vetoes: Arc<dyn EventVetoes>,
        options: BridgeOptions,
    ) -> Self {
        let inner = BridgeInner {
            client,
            engine,
            vetoes,
            cache: CorrelationCache::new(options.cache_retention),
            registry: ConversationRegistry::new(),
            typing: TypingTracker::new(options.typing_debounce),
            http: reqwest::Client::new(),
            options,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Handle a gateway event without blocking the delivery path.
    ///
    /// Returns immediately; the event's real work runs on a detached task
    /// whose errors are logged and absorbed, never propagated back to the
    /// gateway client. The returned handle resolves when that work is done
    /// and may be ignored.
    pub fn handle_event(&self, event: GatewayEvent) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            let result = match event {
                GatewayEvent::MessageReceived(message) => bridge.message_received(message).await,
                GatewayEvent::MessageUpdated { before_id, after } => {
                    bridge.message_updated(before_id, after).await
                }
                GatewayEvent::MessageDeleted {
                    channel_id,
                    message_id,
                } => bridge.message_deleted(channel_id, message_id).await,
                GatewayEvent::ReactionAdded(reaction) => bridge.reaction_added(reaction).await,
                GatewayEvent::ReactionRemoved(reaction) => bridge.reaction_removed(reaction).await,
                GatewayEvent::Typing {
                    channel_id,
                    user_id,
                } => bridge.user_typing(channel_id, user_id).await,
                GatewayEvent::ButtonClicked(interaction) => {
                    bridge.button_clicked(interaction).await
                }
            };
            if let Err(e) = result {
                warn!(error = %e, "gateway event handler failed");
            }
        })
    }

    /// Run one activity through the dialog engine's turn pipeline.
    ///
    /// Turn failures are absorbed at this boundary; the call always returns
    /// a status, never an error.
    pub async fn process_activity(&self, activity: Activity) -> TurnStatus {
        self.inner.process_activity(activity).await
    }

    /// Translate outbound activities into gateway calls.
    ///
    /// One acknowledgement is returned per activity, in order. Unknown
    /// activity kinds are ignored but still acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConnected`] while the session is down, or
    /// the first unrecoverable gateway failure.
    pub async fn send_activities(
        &self,
        mut activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>, GatewayError> {
        self.inner.send_activities(&mut activities).await
    }

    /// Edit the gateway message behind a previously sent activity.
    ///
    /// Editing a message that no longer exists is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is down or the edit is rejected.
    pub async fn update_activity(
        &self,
        activity: &Activity,
    ) -> Result<ResourceResponse, GatewayError> {
        self.inner.update_activity(activity).await
    }

    /// Delete the gateway message behind a previously sent activity.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is down or the delete is rejected.
    pub async fn delete_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
    ) -> Result<(), GatewayError> {
        self.inner.delete_activity(conversation_id, activity_id).await
    }

    /// The correlation cache backing this adapter.
    pub fn cache(&self) -> &CorrelationCache {
        &self.inner.cache
    }

    /// The conversation registry backing this adapter.
    pub fn registry(&self) -> &ConversationRegistry {
        &self.inner.registry
    }
}
