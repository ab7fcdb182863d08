//! Typing debounce behaviour.

use std::time::{Duration, Instant};

use dmbridge::activity::ActivityKind;
use dmbridge::ingest::TypingTracker;

use crate::common::{bridge_with, plain_user, seed_reference, MockGateway, RecordingEngine};

#[test]
fn first_signal_emits() {
    let tracker = TypingTracker::new(Duration::from_secs(3));
    let t0 = Instant::now();
    assert!(tracker.should_emit(1, t0));
}

#[test]
fn signal_within_debounce_window_is_suppressed() {
    let tracker = TypingTracker::new(Duration::from_secs(3));
    let t0 = Instant::now();
    tracker.record(1, t0);

    let t1 = t0.checked_add(Duration::from_secs(1)).expect("instant");
    assert!(!tracker.should_emit(1, t1));
}

#[test]
fn signal_after_debounce_window_emits() {
    let tracker = TypingTracker::new(Duration::from_secs(3));
    let t0 = Instant::now();
    tracker.record(1, t0);

    let t1 = t0.checked_add(Duration::from_secs(1)).expect("instant");
    assert!(!tracker.should_emit(1, t1));

    // Suppression must not advance the clock: 3.2s after the *emission*.
    let t2 = t0.checked_add(Duration::from_millis(3200)).expect("instant");
    assert!(tracker.should_emit(1, t2));
}

#[test]
fn exact_debounce_boundary_emits() {
    let tracker = TypingTracker::new(Duration::from_secs(3));
    let t0 = Instant::now();
    tracker.record(1, t0);

    let t1 = t0.checked_add(Duration::from_secs(3)).expect("instant");
    assert!(tracker.should_emit(1, t1));
}

#[test]
fn forget_resets_a_user() {
    let tracker = TypingTracker::new(Duration::from_secs(3));
    let t0 = Instant::now();
    tracker.record(1, t0);
    assert!(!tracker.should_emit(1, t0));

    tracker.forget(1);
    assert!(tracker.should_emit(1, t0));
}

#[test]
fn users_are_debounced_independently() {
    let tracker = TypingTracker::new(Duration::from_secs(3));
    let t0 = Instant::now();
    tracker.record(1, t0);

    assert!(tracker.should_emit(2, t0));
    assert!(!tracker.should_emit(1, t0));
}

#[tokio::test]
async fn typing_event_dispatches_one_activity_then_suppresses() {
    let gateway = MockGateway::new();
    let user = plain_user(7, "ada");
    gateway.register_user(&user);
    let engine = RecordingEngine::silent();
    let bridge = bridge_with(gateway, engine.clone());
    seed_reference(&bridge, &user);

    bridge.user_typing(7, 7).await.expect("handler");
    bridge.user_typing(7, 7).await.expect("handler");

    let kinds = engine.turn_kinds();
    assert_eq!(kinds, vec![ActivityKind::Typing]);
}

#[tokio::test]
async fn typing_without_active_conversation_is_ignored() {
    let gateway = MockGateway::new();
    let user = plain_user(7, "ada");
    gateway.register_user(&user);
    let engine = RecordingEngine::silent();
    let bridge = bridge_with(gateway, engine.clone());

    bridge.user_typing(7, 7).await.expect("handler");

    assert!(engine.turns.lock().expect("turns lock").is_empty());
}
