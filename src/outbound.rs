//! Outbound activity translation.
//!
//! Turns protocol activities back into gateway calls, dispatching
//! exhaustively on the activity kind. Kinds with no gateway counterpart
//! (conversation updates, traces and the like) are ignored, not errors —
//! every outbound activity is still acknowledged with a fresh response id,
//! independent of any platform message id.

use tracing::{debug, warn};

use crate::activity::{Activity, ActivityKind, ResourceResponse};
use crate::bridge::BridgeInner;
use crate::gateway::{Button, FileAttachment, GatewayError, MessageEdit, OutboundMessage};
use crate::registry::ConversationReference;

/// Hard cap on quick-action buttons per message.
const MAX_BUTTONS: usize = 5;

impl BridgeInner {
    /// Translate a batch of outbound activities into gateway calls.
    ///
    /// Message activities are stamped with the resulting gateway message id
    /// in place, so callers see the ids after the batch returns.
    pub(crate) async fn send_activities(
        &self,
        activities: &mut [Activity],
    ) -> Result<Vec<ResourceResponse>, GatewayError> {
        if !self.client.is_connected() {
            return Err(GatewayError::NotConnected);
        }

        let mut acks = Vec::with_capacity(activities.len());
        for activity in activities.iter_mut() {
            debug!(activity = %activity.to_log_json(), "outgoing activity");
            match activity.kind {
                ActivityKind::Message => self.send_message_activity(activity).await?,
                ActivityKind::MessageReaction => self.apply_reaction_deltas(activity).await?,
                ActivityKind::Typing => self.send_typing_activity(activity).await?,
                ActivityKind::EndOfConversation => self.end_conversation(activity).await?,
                ActivityKind::MessageUpdate
                | ActivityKind::MessageDelete
                | ActivityKind::ConversationUpdate
                | ActivityKind::Trace => {
                    debug!(kind = ?activity.kind, "outbound activity kind has no gateway call");
                }
            }
            acks.push(ResourceResponse::fresh());
        }
        Ok(acks)
    }

    /// Deliver a message activity: text, capped buttons, fetched attachments.
    ///
    /// On success the activity takes the resulting gateway message id, the
    /// user's conversation reference is refreshed and both the gateway
    /// message and the sent activity are cached.
    async fn send_message_activity(&self, activity: &mut Activity) -> Result<(), GatewayError> {
        let user_id = conversation_user_id(activity)?;
        let attachments = self.fetch_attachments(activity).await;
        let buttons = suggested_action_buttons(&activity.suggested_actions);

        let sent = self
            .client
            .send_message(
                user_id,
                OutboundMessage {
                    text: activity.text.clone().unwrap_or_default(),
                    buttons,
                    attachments,
                },
            )
            .await?;

        activity.id = Some(sent.id.to_string());
        if let Some(reference) = ConversationReference::from_outbound(activity) {
            self.registry.upsert(reference);
        }
        self.cache.insert_bot_message(&sent);
        self.cache.insert_sent_activity(activity.clone());
        Ok(())
    }

    /// Fetch attachment bytes sequentially.
    ///
    /// A failing fetch is skipped with a warning; it never aborts the rest
    /// of the send.
    async fn fetch_attachments(&self, activity: &Activity) -> Vec<FileAttachment> {
        let mut files = Vec::new();
        for attachment in &activity.attachments {
            if attachment.content_url.is_empty() {
                continue;
            }
            match self.fetch_one_attachment(&attachment.content_url).await {
                Ok(bytes) => files.push(FileAttachment {
                    name: attachment
                        .name
                        .clone()
                        .unwrap_or_else(|| file_name_from_url(&attachment.content_url)),
                    bytes,
                }),
                Err(e) => {
                    warn!(url = %attachment.content_url, error = %e, "skipping failed attachment");
                }
            }
        }
        files
    }

    async fn fetch_one_attachment(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Apply a reaction-delta activity to the referenced message.
    ///
    /// Every added and removed reaction is applied independently; one
    /// operation's failure does not block the others.
    async fn apply_reaction_deltas(&self, activity: &Activity) -> Result<(), GatewayError> {
        let user_id = conversation_user_id(activity)?;
        let Some(message_id) = activity.id.as_ref().and_then(|id| id.parse::<u64>().ok())
        else {
            debug!("reaction activity without a message id dropped");
            return Ok(());
        };

        let dm = self.client.open_dm(user_id).await?;
        if self.client.get_message(dm.id, message_id).await?.is_none() {
            debug!(message_id, "reaction target no longer exists");
            return Ok(());
        }

        for reaction in &activity.reactions_added {
            if let Err(e) = self
                .client
                .add_reaction(dm.id, message_id, &reaction.label)
                .await
            {
                warn!(label = %reaction.label, error = %e, "failed to add reaction");
            }
        }

        // Removals default to the bot's own reactions when no reactor is named.
        let remover = activity
            .from
            .as_ref()
            .and_then(|a| a.id.parse::<u64>().ok())
            .unwrap_or_else(|| self.client.current_user().id);
        for reaction in &activity.reactions_removed {
            if let Err(e) = self
                .client
                .remove_reaction(dm.id, message_id, &reaction.label, remover)
                .await
            {
                warn!(label = %reaction.label, error = %e, "failed to remove reaction");
            }
        }
        Ok(())
    }

    /// Trigger the typing indicator in the conversation's direct channel.
    async fn send_typing_activity(&self, activity: &Activity) -> Result<(), GatewayError> {
        let user_id = conversation_user_id(activity)?;
        let dm = self.client.open_dm(user_id).await?;
        self.client.trigger_typing(dm.id).await
    }

    /// Close a conversation: send the parting message, then clear every
    /// piece of per-user state.
    ///
    /// The cache clear is awaited — once this returns, no stale entry for
    /// the user is observable anywhere.
    async fn end_conversation(&self, activity: &Activity) -> Result<(), GatewayError> {
        let user_id = conversation_user_id(activity)?;
        let text = activity
            .text
            .clone()
            .unwrap_or_else(|| self.options.end_of_conversation_text.clone());

        self.client
            .send_message(
                user_id,
                OutboundMessage {
                    text,
                    ..OutboundMessage::default()
                },
            )
            .await?;

        self.cache.clear_for_user(user_id).await;
        self.registry.remove(&user_id.to_string());
        self.typing.forget(user_id);
        Ok(())
    }

    /// Edit the gateway message behind a previously sent activity.
    pub(crate) async fn update_activity(
        &self,
        activity: &Activity,
    ) -> Result<ResourceResponse, GatewayError> {
        if !self.client.is_connected() {
            return Err(GatewayError::NotConnected);
        }
        let ack = ResourceResponse::with_id(activity.id.clone().unwrap_or_default());

        let user_id = conversation_user_id(activity)?;
        let Some(message_id) = activity.id.as_ref().and_then(|id| id.parse::<u64>().ok())
        else {
            return Ok(ack);
        };

        let dm = self.client.open_dm(user_id).await?;
        if self.client.get_message(dm.id, message_id).await?.is_none() {
            return Ok(ack);
        }
        self.client
            .edit_message(
                dm.id,
                message_id,
                MessageEdit {
                    content: activity.text.clone(),
                    buttons: None,
                },
            )
            .await?;
        Ok(ack)
    }

    /// Delete the gateway message behind a previously sent activity.
    pub(crate) async fn delete_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
    ) -> Result<(), GatewayError> {
        if !self.client.is_connected() {
            return Err(GatewayError::NotConnected);
        }
        let user_id = conversation_id
            .parse::<u64>()
            .map_err(|_| GatewayError::InvalidConversationId(conversation_id.to_owned()))?;
        let message_id = activity_id
            .parse::<u64>()
            .map_err(|_| GatewayError::InvalidActivityId(activity_id.to_owned()))?;

        let dm = self.client.open_dm(user_id).await?;
        self.client.delete_message(dm.id, message_id).await
    }
}

/// Resolve the target platform user from an activity's conversation id.
fn conversation_user_id(activity: &Activity) -> Result<u64, GatewayError> {
    let id = activity
        .conversation
        .as_ref()
        .map(|c| c.id.as_str())
        .unwrap_or_default();
    id.parse::<u64>()
        .map_err(|_| GatewayError::InvalidConversationId(id.to_owned()))
}

/// File name for an attachment, taken from the last URL path segment.
fn file_name_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "attachment".to_owned())
}

/// Quick-action buttons from the first [`MAX_BUTTONS`] suggested actions;
/// extras are dropped.
fn suggested_action_buttons(titles: &[String]) -> Vec<Button> {
    titles
        .iter()
        .take(MAX_BUTTONS)
        .map(|title| Button::new(title.clone(), title.clone()))
        .collect()
}
