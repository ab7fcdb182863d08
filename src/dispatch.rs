//! Turn execution and turn-level error isolation.
//!
//! Each inbound activity gets a fresh [`TurnContext`] and exactly one pass
//! through the dialog engine's `on_turn` callback. The turn moves
//! Created → Running → Completed | Failed; whatever escapes the callback is
//! logged, reported to the user with two fixed notices plus a trace
//! activity, and absorbed — the dispatch call itself always returns.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::activity::{Activity, ResourceResponse};
use crate::bridge::BridgeInner;

/// Notice sent to the user when a turn fails.
const TURN_ERROR_NOTICE: &str = "The bot encountered an error or bug.";
/// Follow-up notice sent after [`TURN_ERROR_NOTICE`].
const TURN_ERROR_FOLLOWUP: &str = "To continue to run this bot, please fix the bot source code.";

/// Outcome of one turn through the dialog engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// The engine callback returned normally.
    Completed,
    /// The engine callback failed; the failure was reported and absorbed.
    Failed,
}

/// The dialog engine contract: one activity in, zero or more sends out.
///
/// The adapter invokes `on_turn` once per activity and only inspects
/// whether it completed or failed. Retry, backoff and dialog state are the
/// engine's own business.
#[async_trait]
pub trait DialogEngine: Send + Sync {
    /// Run one turn against the given context.
    ///
    /// # Errors
    ///
    /// Any error returned here is treated as a turn failure and absorbed by
    /// the dispatcher.
    async fn on_turn(&self, turn: Arc<TurnContext>) -> anyhow::Result<()>;
}

/// Context bound to exactly one activity for the duration of a turn.
///
/// Everything the engine sends through the context is recorded, so the
/// dispatcher (and tests) can inspect what a turn produced.
pub struct TurnContext {
    inner: Arc<BridgeInner>,
    activity: Activity,
    sent: Mutex<Vec<Activity>>,
}

impl TurnContext {
    pub(crate) fn new(inner: Arc<BridgeInner>, activity: Activity) -> Self {
        Self {
            inner,
            activity,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// The activity this turn was created for.
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Send a single activity to the user.
    ///
    /// Routing fields left unset are filled in as a reply to this turn's
    /// activity: same conversation, sender and recipient swapped.
    ///
    /// # Errors
    ///
    /// Returns an error when the gateway rejects the send.
    pub async fn send_activity(&self, activity: Activity) -> anyhow::Result<ResourceResponse> {
        let mut acks = self.send_activities(vec![activity]).await?;
        acks.pop()
            .ok_or_else(|| anyhow!("translator returned no acknowledgement"))
    }

    /// Send a plain text message to the user.
    ///
    /// # Errors
    ///
    /// Returns an error when the gateway rejects the send.
    pub async fn send_text(&self, text: impl Into<String>) -> anyhow::Result<ResourceResponse> {
        self.send_activity(Activity::message(text)).await
    }

    /// Send several activities in order.
    ///
    /// # Errors
    ///
    /// Returns an error when the gateway rejects a send; earlier activities
    /// in the batch may already have gone out.
    pub async fn send_activities(
        &self,
        activities: Vec<Activity>,
    ) -> anyhow::Result<Vec<ResourceResponse>> {
        let mut routed = Vec::with_capacity(activities.len());
        for mut activity in activities {
            activity.apply_reply_routing(&self.activity);
            routed.push(activity);
        }
        let acks = self.inner.send_activities(&mut routed).await?;
        // Logged after the gateway calls, so the entries carry the stamped
        // message ids.
        if let Ok(mut log) = self.sent.lock() {
            log.extend(routed);
        }
        Ok(acks)
    }

    /// Emit a trace activity describing a diagnostic event.
    ///
    /// # Errors
    ///
    /// Returns an error when the gateway rejects the send.
    pub async fn send_trace(
        &self,
        label: impl Into<String>,
        value: serde_json::Value,
    ) -> anyhow::Result<ResourceResponse> {
        self.send_activity(Activity::trace(label, value)).await
    }

    /// Edit a previously sent activity's gateway message.
    ///
    /// # Errors
    ///
    /// Returns an error when the gateway rejects the edit.
    pub async fn update_activity(&self, activity: &Activity) -> anyhow::Result<ResourceResponse> {
        Ok(self.inner.update_activity(activity).await?)
    }

    /// Delete a previously sent activity's gateway message.
    ///
    /// # Errors
    ///
    /// Returns an error when the gateway rejects the delete.
    pub async fn delete_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
    ) -> anyhow::Result<()> {
        Ok(self
            .inner
            .delete_activity(conversation_id, activity_id)
            .await?)
    }

    /// Everything sent through this context so far, in order.
    pub fn sent_activities(&self) -> Vec<Activity> {
        self.sent.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl BridgeInner {
    /// Run one activity through the engine with failure isolation.
    pub(crate) async fn process_activity(self: &Arc<Self>, activity: Activity) -> TurnStatus {
        debug!(activity = %activity.to_log_json(), "incoming activity");

        let turn = Arc::new(TurnContext::new(Arc::clone(self), activity));
        match self.engine.on_turn(Arc::clone(&turn)).await {
            Ok(()) => TurnStatus::Completed,
            Err(e) => {
                self.report_turn_failure(&turn, &e).await;
                TurnStatus::Failed
            }
        }
    }

    /// Report a turn failure to the logs and to the user.
    ///
    /// Each send is best effort; a failure while reporting is itself only
    /// logged, keeping the isolation boundary intact.
    async fn report_turn_failure(&self, turn: &TurnContext, cause: &anyhow::Error) {
        error!(error = %cause, "unhandled error during turn");

        for notice in [TURN_ERROR_NOTICE, TURN_ERROR_FOLLOWUP] {
            if let Err(e) = turn.send_text(notice).await {
                warn!(error = %e, "failed to deliver turn error notice");
            }
        }
        if let Err(e) = turn
            .send_trace("TurnError", json!({ "error": cause.to_string() }))
            .await
        {
            warn!(error = %e, "failed to emit turn error trace");
        }
    }
}
