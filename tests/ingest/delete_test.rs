//! Delete correlation against the gateway-message cache.

use dmbridge::activity::ActivityKind;

use crate::common::{
    bot_dm_message, bridge_with, plain_user, seed_reference, user_dm_message, MockGateway,
    RecordingEngine,
};

#[tokio::test]
async fn delete_of_cached_message_dispatches_with_original_text() {
    let gateway = MockGateway::new();
    let user = plain_user(7, "ada");
    gateway.register_user(&user);
    let engine = RecordingEngine::silent();
    let bridge = bridge_with(gateway, engine.clone());
    seed_reference(&bridge, &user);

    bridge
        .cache()
        .observe_message(&user_dm_message(55, &user, "delete me"));

    bridge
        .message_deleted(7, 55)
        .await
        .expect("handler should succeed");

    let turns = engine.turns.lock().expect("turns lock");
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].kind, ActivityKind::MessageDelete);
    assert_eq!(turns[0].id.as_deref(), Some("55"));
    assert_eq!(turns[0].text.as_deref(), Some("delete me"));
    assert_eq!(turns[0].from.as_ref().map(|a| a.id.as_str()), Some("7"));
}

#[tokio::test]
async fn delete_of_uncached_message_is_dropped_silently() {
    let gateway = MockGateway::new();
    let user = plain_user(7, "ada");
    gateway.register_user(&user);
    let engine = RecordingEngine::silent();
    let bridge = bridge_with(gateway, engine.clone());
    seed_reference(&bridge, &user);

    bridge
        .message_deleted(7, 999)
        .await
        .expect("handler should succeed");

    assert!(engine.turns.lock().expect("turns lock").is_empty());
}

#[tokio::test]
async fn delete_of_bot_message_is_ignored() {
    let gateway = MockGateway::new();
    let user = plain_user(7, "ada");
    gateway.register_user(&user);
    let engine = RecordingEngine::silent();
    let bridge = bridge_with(gateway, engine.clone());
    seed_reference(&bridge, &user);

    bridge
        .cache()
        .insert_bot_message(&bot_dm_message(60, &user, "bot said"));

    bridge
        .message_deleted(7, 60)
        .await
        .expect("handler should succeed");

    assert!(engine.turns.lock().expect("turns lock").is_empty());
}

#[tokio::test]
async fn delete_in_non_direct_channel_is_ignored() {
    let gateway = MockGateway::new();
    let user = plain_user(7, "ada");
    gateway.register_user(&user);
    let engine = RecordingEngine::silent();
    let bridge = bridge_with(gateway, engine.clone());
    seed_reference(&bridge, &user);

    bridge
        .cache()
        .observe_message(&user_dm_message(55, &user, "delete me"));

    // Channel 12345 is not a DM channel in the mock.
    bridge
        .message_deleted(12345, 55)
        .await
        .expect("handler should succeed");

    assert!(engine.turns.lock().expect("turns lock").is_empty());
}
