//! Running the player on its own task
//!
//! [`PlayerService::spawn`] moves an [`AudioPlayer`] onto a tokio task that
//! owns it exclusively. Commands arrive through a [`PlayerHandle`], producer
//! events through the player's own channel, and both are applied one at a
//! time from a single `select!` loop. Notifications are broadcast to every
//! subscriber after each step.

use crate::error::{PlaybackError, Result};
use crate::event::Event;
use crate::item::AudioItem;
use crate::notification::PlayerNotification;
use crate::player::AudioPlayer;
use crate::types::{AudioQuality, PlayerMode, PlayerState, RemoteCommand};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pending commands before senders wait
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Notifications a slow subscriber may fall behind by before losing some
const NOTIFICATION_CHANNEL_CAPACITY: usize = 128;

/// Command applied by the service task
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    PlayItems {
        items: Vec<AudioItem>,
        start_index: usize,
    },
    AddItems(Vec<AudioItem>),
    RemoveItem(usize),
    Resume,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    Stop,
    Seek(Duration),
    SetVolume(f32),
    SetRate(f32),
    SetMode(PlayerMode),
    SetQuality(AudioQuality),
    Remote(RemoteCommand),
}

/// Spawns player tasks
pub struct PlayerService;

impl PlayerService {
    /// Move `player` onto a new task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(mut player: AudioPlayer) -> Result<PlayerHandle> {
        let events = player.take_events().ok_or(PlaybackError::ServiceStopped)?;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (notification_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(player.state().clone());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_player(
            player,
            command_rx,
            events,
            notification_tx.clone(),
            state_tx,
            cancel.clone(),
        ));

        Ok(PlayerHandle {
            commands: command_tx,
            notifications: notification_tx,
            state: state_rx,
            cancel,
            task,
        })
    }
}

/// Client side of a running player
pub struct PlayerHandle {
    commands: mpsc::Sender<PlayerCommand>,
    notifications: broadcast::Sender<PlayerNotification>,
    state: watch::Receiver<PlayerState>,
    cancel: CancellationToken,
    task: JoinHandle<AudioPlayer>,
}

impl PlayerHandle {
    /// Queue a command for the player task
    pub async fn send(&self, command: PlayerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::ServiceStopped)
    }

    pub async fn play_items(&self, items: Vec<AudioItem>, start_index: usize) -> Result<()> {
        self.send(PlayerCommand::PlayItems { items, start_index })
            .await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(PlayerCommand::Resume).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(PlayerCommand::Pause).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(PlayerCommand::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send(PlayerCommand::Previous).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(PlayerCommand::Stop).await
    }

    /// Receive every notification published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerNotification> {
        self.notifications.subscribe()
    }

    /// Latest published state
    pub fn state(&self) -> PlayerState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<PlayerState> {
        self.state.clone()
    }

    /// Stop the task and take the player back
    ///
    /// Commands still queued are dropped. The returned player can be driven
    /// directly or spawned again.
    pub async fn shutdown(self) -> Result<AudioPlayer> {
        self.cancel.cancel();
        self.task.await.map_err(|error| {
            warn!(%error, "Player task ended abnormally");
            PlaybackError::ServiceStopped
        })
    }
}

async fn run_player(
    mut player: AudioPlayer,
    mut commands: mpsc::Receiver<PlayerCommand>,
    mut events: mpsc::UnboundedReceiver<Event>,
    notifications: broadcast::Sender<PlayerNotification>,
    state: watch::Sender<PlayerState>,
    cancel: CancellationToken,
) -> AudioPlayer {
    info!("Player service started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            command = commands.recv() => match command {
                Some(command) => apply_command(&mut player, command),
                None => {
                    debug!("All player handles dropped");
                    break;
                }
            },

            Some(event) = events.recv() => player.handle_event(event),
        }

        publish(&mut player, &notifications, &state);
    }

    info!("Player service stopped");
    player.restore_events(events);
    player
}

fn apply_command(player: &mut AudioPlayer, command: PlayerCommand) {
    debug!(?command, "Player command");
    let outcome = match command {
        PlayerCommand::PlayItems { items, start_index } => player.play_items(items, start_index),
        PlayerCommand::AddItems(items) => {
            player.add_items(items);
            Ok(())
        }
        PlayerCommand::RemoveItem(index) => player.remove_item(index).map(|_| ()),
        PlayerCommand::Resume => {
            player.resume();
            Ok(())
        }
        PlayerCommand::Pause => {
            player.pause();
            Ok(())
        }
        PlayerCommand::TogglePlayPause => {
            player.toggle_play_pause();
            Ok(())
        }
        PlayerCommand::Next => {
            player.next();
            Ok(())
        }
        PlayerCommand::Previous => {
            player.previous();
            Ok(())
        }
        PlayerCommand::Stop => {
            player.stop();
            Ok(())
        }
        PlayerCommand::Seek(time) => player.seek(time),
        PlayerCommand::SetVolume(volume) => {
            player.set_volume(volume);
            Ok(())
        }
        PlayerCommand::SetRate(rate) => {
            player.set_rate(rate);
            Ok(())
        }
        PlayerCommand::SetMode(mode) => {
            player.set_mode(mode);
            Ok(())
        }
        PlayerCommand::SetQuality(quality) => {
            player.set_quality(quality);
            Ok(())
        }
        PlayerCommand::Remote(command) => {
            player.remote_control_received(command);
            Ok(())
        }
    };

    if let Err(error) = outcome {
        warn!(%error, "Player command failed");
    }
}

fn publish(
    player: &mut AudioPlayer,
    notifications: &broadcast::Sender<PlayerNotification>,
    state: &watch::Sender<PlayerState>,
) {
    for notification in player.drain_notifications() {
        // No subscribers is fine.
        let _ = notifications.send(notification);
    }

    let current = player.state();
    state.send_if_modified(|published| {
        if *published == *current {
            return false;
        }
        *published = current.clone();
        true
    });
}
