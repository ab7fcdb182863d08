//! Per-user cache clearing across all three maps.

use std::time::Duration;

use dmbridge::activity::{Activity, ConversationAccount};
use dmbridge::cache::CorrelationCache;

use crate::common::{bot_dm_message, plain_user, user_dm_message};

#[tokio::test]
async fn clear_removes_messages_both_authored_by_and_addressed_to_the_user() {
    let cache = CorrelationCache::new(Duration::from_secs(3600));
    let user = plain_user(42, "ada");

    cache.observe_message(&user_dm_message(1, &user, "from ada"));
    cache.insert_bot_message(&bot_dm_message(2, &user, "to ada"));

    cache.clear_for_user(42).await;

    assert!(cache.gateway_message(1).is_none());
    assert!(cache.gateway_message(2).is_none());
}

#[tokio::test]
async fn clear_scopes_to_the_requested_user() {
    let cache = CorrelationCache::new(Duration::from_secs(3600));
    let ada = plain_user(42, "ada");
    let ben = plain_user(43, "ben");

    cache.observe_message(&user_dm_message(1, &ada, "from ada"));
    cache.observe_message(&user_dm_message(2, &ben, "from ben"));
    cache.insert_received_activity(
        Activity::message("from ada")
            .with_id("1")
            .with_conversation(ConversationAccount::for_user(42)),
    );
    cache.insert_received_activity(
        Activity::message("from ben")
            .with_id("2")
            .with_conversation(ConversationAccount::for_user(43)),
    );

    cache.clear_for_user(42).await;

    assert!(cache.gateway_message(1).is_none());
    assert!(cache.received_activity("1").is_none());
    assert!(cache.gateway_message(2).is_some());
    assert!(cache.received_activity("2").is_some());
}

#[tokio::test]
async fn clear_spares_activities_without_a_conversation() {
    let cache = CorrelationCache::new(Duration::from_secs(3600));
    cache.insert_sent_activity(Activity::message("unrouted").with_id("9"));

    cache.clear_for_user(42).await;

    assert!(cache.sent_activity("9").is_some());
}

#[tokio::test]
async fn clear_of_an_unknown_user_is_a_no_op() {
    let cache = CorrelationCache::new(Duration::from_secs(3600));
    let user = plain_user(7, "ada");
    cache.observe_message(&user_dm_message(1, &user, "hello"));

    cache.clear_for_user(12345).await;

    assert!(cache.gateway_message(1).is_some());
}
