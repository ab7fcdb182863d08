//! Shared gateway and engine mocks for adapter integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use dmbridge::activity::{Activity, ConversationAccount};
use dmbridge::bridge::{BridgeOptions, DmBridge};
use dmbridge::dispatch::{DialogEngine, TurnContext};
use dmbridge::gateway::{
    DmChannel, GatewayClient, GatewayError, GatewayMessage, GatewayUser, MessageEdit,
    OutboundMessage,
};
use dmbridge::registry::ConversationReference;

/// Platform id of the mock bot identity.
pub const BOT_ID: u64 = 999;

pub fn bot_user() -> GatewayUser {
    GatewayUser {
        id: BOT_ID,
        name: "bridge-bot".to_owned(),
        is_bot: true,
    }
}

pub fn plain_user(id: u64, name: &str) -> GatewayUser {
    GatewayUser {
        id,
        name: name.to_owned(),
        is_bot: false,
    }
}

/// A user-authored message in that user's DM channel.
///
/// The mock gateway uses the user id as the DM channel id.
pub fn user_dm_message(id: u64, from: &GatewayUser, content: &str) -> GatewayMessage {
    GatewayMessage {
        id,
        channel_id: from.id,
        author: from.clone(),
        recipient: Some(from.clone()),
        content: content.to_owned(),
        timestamp: Utc::now(),
        buttons: Vec::new(),
    }
}

/// A bot-authored message in the given user's DM channel.
pub fn bot_dm_message(id: u64, to: &GatewayUser, content: &str) -> GatewayMessage {
    GatewayMessage {
        id,
        channel_id: to.id,
        author: bot_user(),
        recipient: Some(to.clone()),
        content: content.to_owned(),
        timestamp: Utc::now(),
        buttons: Vec::new(),
    }
}

/// In-memory gateway client recording every command it receives.
pub struct MockGateway {
    pub connected: AtomicBool,
    pub users: Mutex<HashMap<u64, GatewayUser>>,
    /// DM channels keyed by channel id (== recipient user id).
    pub dm_channels: Mutex<HashMap<u64, DmChannel>>,
    /// Messages the gateway knows about, keyed by (channel, message).
    pub known_messages: Mutex<HashMap<(u64, u64), GatewayMessage>>,
    /// Recorded send_message calls as (user_id, message).
    pub sent: Mutex<Vec<(u64, OutboundMessage)>>,
    /// Recorded edit_message calls as (channel_id, message_id, edit).
    pub edits: Mutex<Vec<(u64, u64, MessageEdit)>>,
    /// Recorded delete_message calls as (channel_id, message_id).
    pub deletes: Mutex<Vec<(u64, u64)>>,
    /// Recorded add_reaction calls as (channel_id, message_id, label).
    pub reactions_added: Mutex<Vec<(u64, u64, String)>>,
    /// Recorded remove_reaction calls as (channel_id, message_id, label, user_id).
    pub reactions_removed: Mutex<Vec<(u64, u64, String, u64)>>,
    /// Channels where typing was triggered.
    pub typing_triggers: Mutex<Vec<u64>>,
    /// Reaction label that add_reaction rejects, if any.
    pub failing_reaction: Mutex<Option<String>>,
    next_message_id: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            users: Mutex::new(HashMap::new()),
            dm_channels: Mutex::new(HashMap::new()),
            known_messages: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            reactions_added: Mutex::new(Vec::new()),
            reactions_removed: Mutex::new(Vec::new()),
            typing_triggers: Mutex::new(Vec::new()),
            failing_reaction: Mutex::new(None),
            next_message_id: AtomicU64::new(1000),
        })
    }

    /// Register a user with a DM channel whose id equals the user id.
    pub fn register_user(&self, user: &GatewayUser) {
        self.users
            .lock()
            .expect("users lock")
            .insert(user.id, user.clone());
        self.dm_channels.lock().expect("dm lock").insert(
            user.id,
            DmChannel {
                id: user.id,
                recipient: user.clone(),
            },
        );
    }

    /// Make a message resolvable through get_message.
    pub fn add_known_message(&self, message: GatewayMessage) {
        self.known_messages
            .lock()
            .expect("messages lock")
            .insert((message.channel_id, message.id), message);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("sent lock")
            .iter()
            .map(|(_, m)| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn current_user(&self) -> GatewayUser {
        bot_user()
    }

    async fn get_user(&self, user_id: u64) -> Result<GatewayUser, GatewayError> {
        self.users
            .lock()
            .expect("users lock")
            .get(&user_id)
            .cloned()
            .ok_or(GatewayError::UserNotFound(user_id))
    }

    async fn open_dm(&self, user_id: u64) -> Result<DmChannel, GatewayError> {
        self.dm_channels
            .lock()
            .expect("dm lock")
            .get(&user_id)
            .cloned()
            .ok_or(GatewayError::UserNotFound(user_id))
    }

    async fn dm_channel(&self, channel_id: u64) -> Result<Option<DmChannel>, GatewayError> {
        Ok(self
            .dm_channels
            .lock()
            .expect("dm lock")
            .get(&channel_id)
            .cloned())
    }

    async fn send_message(
        &self,
        user_id: u64,
        message: OutboundMessage,
    ) -> Result<GatewayMessage, GatewayError> {
        let recipient = self.get_user(user_id).await?;
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let sent = GatewayMessage {
            id,
            channel_id: user_id,
            author: bot_user(),
            recipient: Some(recipient),
            content: message.text.clone(),
            timestamp: Utc::now(),
            buttons: message.buttons.clone(),
        };
        self.add_known_message(sent.clone());
        self.sent
            .lock()
            .expect("sent lock")
            .push((user_id, message));
        Ok(sent)
    }

    async fn get_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<Option<GatewayMessage>, GatewayError> {
        Ok(self
            .known_messages
            .lock()
            .expect("messages lock")
            .get(&(channel_id, message_id))
            .cloned())
    }

    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        edit: MessageEdit,
    ) -> Result<(), GatewayError> {
        self.edits
            .lock()
            .expect("edits lock")
            .push((channel_id, message_id, edit));
        Ok(())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), GatewayError> {
        self.deletes
            .lock()
            .expect("deletes lock")
            .push((channel_id, message_id));
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        label: &str,
    ) -> Result<(), GatewayError> {
        let failing = self.failing_reaction.lock().expect("failing lock").clone();
        if failing.as_deref() == Some(label) {
            return Err(GatewayError::Transport(format!(
                "reaction {label} rejected"
            )));
        }
        self.reactions_added
            .lock()
            .expect("reactions lock")
            .push((channel_id, message_id, label.to_owned()));
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        label: &str,
        user_id: u64,
    ) -> Result<(), GatewayError> {
        self.reactions_removed
            .lock()
            .expect("reactions lock")
            .push((channel_id, message_id, label.to_owned(), user_id));
        Ok(())
    }

    async fn trigger_typing(&self, channel_id: u64) -> Result<(), GatewayError> {
        self.typing_triggers
            .lock()
            .expect("typing lock")
            .push(channel_id);
        Ok(())
    }
}

/// Engine that records every turn and optionally replies with fixed text.
pub struct RecordingEngine {
    pub turns: Mutex<Vec<Activity>>,
    pub reply: Option<String>,
}

impl RecordingEngine {
    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(Vec::new()),
            reply: None,
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(Vec::new()),
            reply: Some(text.to_owned()),
        })
    }

    pub fn turn_kinds(&self) -> Vec<dmbridge::activity::ActivityKind> {
        self.turns
            .lock()
            .expect("turns lock")
            .iter()
            .map(|a| a.kind)
            .collect()
    }
}

#[async_trait]
impl DialogEngine for RecordingEngine {
    async fn on_turn(&self, turn: Arc<TurnContext>) -> anyhow::Result<()> {
        self.turns
            .lock()
            .expect("turns lock")
            .push(turn.activity().clone());
        if let Some(ref text) = self.reply {
            turn.send_text(text.clone()).await?;
        }
        Ok(())
    }
}

/// Engine that fails every turn, capturing the context for inspection.
pub struct FailingEngine {
    pub captured: Mutex<Option<Arc<TurnContext>>>,
}

impl FailingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            captured: Mutex::new(None),
        })
    }
}

#[async_trait]
impl DialogEngine for FailingEngine {
    async fn on_turn(&self, turn: Arc<TurnContext>) -> anyhow::Result<()> {
        *self.captured.lock().expect("captured lock") = Some(turn);
        Err(anyhow::anyhow!("dialog tree exploded"))
    }
}

/// Bridge over the given mock gateway and engine with default options.
pub fn bridge_with(gateway: Arc<MockGateway>, engine: Arc<dyn DialogEngine>) -> DmBridge {
    DmBridge::new(gateway, engine, BridgeOptions::default())
}

/// Store an active conversation reference for a user, as if the bot had
/// already replied to them once.
pub fn seed_reference(bridge: &DmBridge, user: &GatewayUser) {
    bridge.registry().upsert(ConversationReference {
        user_id: user.id.to_string(),
        conversation: ConversationAccount::for_user(user.id),
        bot: None,
        user: None,
    });
}
