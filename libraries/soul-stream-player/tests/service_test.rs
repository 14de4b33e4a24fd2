//! Tests for running the player on its own task

mod common;

use common::{item, Harness};
use soul_stream_player::{
    PlayerCommand, PlayerHandle, PlayerNotification, PlayerService, PlayerState,
    SessionNotification,
};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

async fn next_state_change(rx: &mut broadcast::Receiver<PlayerNotification>) -> PlayerState {
    loop {
        let notification = timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("notification channel closed");
        if let PlayerNotification::StateChanged { to, .. } = notification {
            return to;
        }
    }
}

async fn wait_for_state(handle: &PlayerHandle, expected: PlayerState) {
    let mut state = handle.watch_state();
    timeout(WAIT, state.wait_for(|state| *state == expected))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

#[tokio::test]
async fn test_commands_and_events_flow_through_service() {
    let h = Harness::new();
    let handle = PlayerService::spawn(h.player()).unwrap();
    let mut notifications = handle.subscribe();
    let a = item("a");

    handle.play_items(vec![a.clone()], 0).await.unwrap();

    let first = timeout(WAIT, notifications.recv()).await.unwrap().unwrap();
    assert!(matches!(first, PlayerNotification::WillStartPlaying { item } if item == a));
    assert_eq!(next_state_change(&mut notifications).await, PlayerState::Buffering);

    h.decoder
        .last_session()
        .notify(SessionNotification::PlaybackLikelyToKeepUp);
    assert_eq!(next_state_change(&mut notifications).await, PlayerState::Playing);
    wait_for_state(&handle, PlayerState::Playing).await;
    assert_eq!(handle.state(), PlayerState::Playing);

    handle.pause().await.unwrap();
    assert_eq!(next_state_change(&mut notifications).await, PlayerState::Paused);

    let player = handle.shutdown().await.unwrap();
    assert_eq!(player.state(), &PlayerState::Paused);
    assert_eq!(player.current_item(), Some(&a));
}

#[tokio::test]
async fn test_failed_command_keeps_service_running() {
    let h = Harness::new();
    let handle = PlayerService::spawn(h.player()).unwrap();

    handle
        .send(PlayerCommand::Seek(Duration::from_secs(10)))
        .await
        .unwrap();
    handle.send(PlayerCommand::RemoveItem(3)).await.unwrap();
    handle.play_items(vec![item("a")], 0).await.unwrap();

    wait_for_state(&handle, PlayerState::Buffering).await;
    assert_eq!(h.decoder.loads().len(), 1);

    handle.stop().await.unwrap();
    wait_for_state(&handle, PlayerState::Stopped).await;
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_returned_player_can_be_driven_again() {
    let h = Harness::new();
    let handle = PlayerService::spawn(h.player()).unwrap();
    handle.play_items(vec![item("a")], 0).await.unwrap();
    wait_for_state(&handle, PlayerState::Buffering).await;

    let mut player = handle.shutdown().await.unwrap();
    player.drain_notifications();

    // Events raised while nobody was listening are still delivered.
    h.decoder
        .last_session()
        .notify(SessionNotification::PlaybackLikelyToKeepUp);
    assert_eq!(player.process_pending_events(), 1);
    assert_eq!(player.state(), &PlayerState::Playing);

    let handle = PlayerService::spawn(player).unwrap();
    assert_eq!(handle.state(), PlayerState::Playing);
    handle.next().await.unwrap();
    wait_for_state(&handle, PlayerState::Stopped).await;
    handle.shutdown().await.unwrap();
}
