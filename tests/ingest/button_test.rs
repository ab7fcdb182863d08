//! Button interaction: dispatch plus idempotent UI reflect-back.

use dmbridge::activity::ActivityKind;
use dmbridge::gateway::{Button, ButtonInteraction, ButtonStyle};

use crate::common::{
    bot_dm_message, bridge_with, plain_user, seed_reference, MockGateway, RecordingEngine,
};

fn interaction(user: &dmbridge::gateway::GatewayUser, clicked: &str) -> ButtonInteraction {
    let mut message = bot_dm_message(80, user, "pick one");
    message.buttons = vec![
        Button::new("Red", "red"),
        Button::new("Green", "green"),
        Button::new("Blue", "blue"),
    ];
    ButtonInteraction {
        message,
        user: user.clone(),
        custom_id: clicked.to_owned(),
    }
}

#[tokio::test]
async fn click_dispatches_message_with_custom_id_text() {
    let gateway = MockGateway::new();
    let user = plain_user(7, "ada");
    gateway.register_user(&user);
    let engine = RecordingEngine::silent();
    let bridge = bridge_with(gateway, engine.clone());
    seed_reference(&bridge, &user);

    bridge
        .button_clicked(interaction(&user, "green"))
        .await
        .expect("handler should succeed");

    let turns = engine.turns.lock().expect("turns lock");
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].kind, ActivityKind::Message);
    assert_eq!(turns[0].text.as_deref(), Some("green"));
    assert_eq!(turns[0].id.as_deref(), Some("80"));
    assert_eq!(
        turns[0].conversation.as_ref().map(|c| c.id.as_str()),
        Some("7")
    );
}

#[tokio::test]
async fn click_reflects_selection_back_and_disables_the_row() {
    let gateway = MockGateway::new();
    let user = plain_user(7, "ada");
    gateway.register_user(&user);
    let engine = RecordingEngine::silent();
    let bridge = bridge_with(gateway.clone(), engine);
    seed_reference(&bridge, &user);

    bridge
        .button_clicked(interaction(&user, "green"))
        .await
        .expect("handler should succeed");

    let edits = gateway.edits.lock().expect("edits lock");
    assert_eq!(edits.len(), 1);
    let (channel_id, message_id, edit) = &edits[0];
    assert_eq!(*channel_id, 7);
    assert_eq!(*message_id, 80);

    let buttons = edit.buttons.as_ref().expect("button row replaced");
    assert_eq!(buttons.len(), 3);
    assert!(buttons.iter().all(|b| b.disabled));
    for button in buttons {
        let expected = if button.custom_id == "green" {
            ButtonStyle::Primary
        } else {
            ButtonStyle::Secondary
        };
        assert_eq!(button.style, expected);
    }
    assert!(edit.content.is_none(), "text must be left untouched");
}
