//! SessionDaemon - the task that owns the orchestrator
//!
//! All session state lives on one tokio task. Three event sources feed it:
//! - commands from `SessionHandle`s (each acked with the resulting snapshot)
//! - clock ticks while playing
//! - end-of-media events from the backend
//!
//! They are handled strictly one at a time, so a tick that ends the pass is
//! fully applied before the next command is looked at.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::assets::AssetLocator;
use crate::backend::{EndedReceiver, PlaybackBackend};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::mixer::ChannelMixer;
use crate::orchestrator::Orchestrator;
use crate::session::SessionSnapshot;

/// Pending commands before senders wait
const COMMAND_BUFFER: usize = 32;

/// Requests the daemon understands
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    PlayAll,
    StopAll,
    /// Unknown names are ignored
    Toggle { channel: String, enabled: bool },
    SetLooping(bool),
    /// Report state without changing it
    Snapshot,
    Shutdown,
}

struct Envelope {
    command: SessionCommand,
    reply: oneshot::Sender<SessionSnapshot>,
}

/// Cheap, cloneable access to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Envelope>,
    updates: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Send a command and wait for the state it produced
    pub async fn send(&self, command: SessionCommand) -> Result<SessionSnapshot> {
        let (reply, ack) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        ack.await.map_err(|_| SessionError::Closed)
    }

    pub async fn play_all(&self) -> Result<SessionSnapshot> {
        self.send(SessionCommand::PlayAll).await
    }

    pub async fn stop_all(&self) -> Result<SessionSnapshot> {
        self.send(SessionCommand::StopAll).await
    }

    pub async fn toggle_channel(&self, channel: &str, enabled: bool) -> Result<SessionSnapshot> {
        self.send(SessionCommand::Toggle {
            channel: channel.to_string(),
            enabled,
        })
        .await
    }

    pub async fn set_looping(&self, looping: bool) -> Result<SessionSnapshot> {
        self.send(SessionCommand::SetLooping(looping)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.send(SessionCommand::Snapshot).await
    }

    pub async fn shutdown(&self) -> Result<SessionSnapshot> {
        self.send(SessionCommand::Shutdown).await
    }

    /// Latest published state, without a round trip
    pub fn current(&self) -> SessionSnapshot {
        self.updates.borrow().clone()
    }

    /// Receiver for every published update
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Wait until the daemon task has exited
    pub async fn closed(&self) {
        self.commands.closed().await
    }
}

pub struct SessionDaemon;

impl SessionDaemon {
    /// Generate the chart, load every channel and start the event loop
    pub async fn start(
        config: SessionConfig,
        backend: Arc<dyn PlaybackBackend>,
        assets: AssetLocator,
    ) -> Result<SessionHandle> {
        config.validate()?;

        let (mixer, ended) = ChannelMixer::new(backend, config.volume, config.looping);
        let mut orchestrator = Orchestrator::new(&config, mixer);
        orchestrator.load_channels(&assets).await;

        let updates = orchestrator.subscribe();
        let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);

        tokio::spawn(run(orchestrator, inbox, ended));
        info!(
            interval_ms = config.tick_interval.as_millis() as u64,
            increment = config.tick_increment,
            max_position = config.max_position,
            "session daemon started"
        );

        Ok(SessionHandle { commands, updates })
    }
}

async fn run(
    mut orchestrator: Orchestrator,
    mut inbox: mpsc::Receiver<Envelope>,
    mut ended: EndedReceiver,
) {
    loop {
        tokio::select! {
            envelope = inbox.recv() => {
                let Some(Envelope { command, reply }) = envelope else {
                    debug!("all session handles dropped");
                    orchestrator.shutdown();
                    break;
                };
                let shutting_down = command == SessionCommand::Shutdown;
                apply(&mut orchestrator, command).await;
                let _ = reply.send(orchestrator.snapshot());
                if shutting_down {
                    break;
                }
            }
            increment = orchestrator.next_tick() => {
                orchestrator.on_tick(increment);
            }
            Some(handle) = ended.recv() => {
                orchestrator.on_media_ended(handle).await;
            }
        }
    }
    info!("session daemon stopped");
}

async fn apply(orchestrator: &mut Orchestrator, command: SessionCommand) {
    debug!(?command, "session command");
    match command {
        SessionCommand::PlayAll => orchestrator.play_all().await,
        SessionCommand::StopAll => orchestrator.stop_all(),
        SessionCommand::Toggle { channel, enabled } => {
            orchestrator.toggle_channel_by_name(&channel, enabled).await;
        }
        SessionCommand::SetLooping(looping) => orchestrator.set_looping(looping),
        SessionCommand::Snapshot => {}
        SessionCommand::Shutdown => orchestrator.shutdown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    async fn start(backend: Arc<MemoryBackend>) -> SessionHandle {
        let config = SessionConfig {
            seed: Some(1),
            ..Default::default()
        };
        SessionDaemon::start(config, backend, AssetLocator::new("audio", "wav"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = SessionConfig {
            points_per_channel: 0,
            ..Default::default()
        };
        let result = SessionDaemon::start(
            config,
            Arc::new(MemoryBackend::new()),
            AssetLocator::new("audio", "wav"),
        )
        .await;
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_acked_with_snapshot() {
        let handle = start(Arc::new(MemoryBackend::new())).await;

        let playing = handle.play_all().await.unwrap();
        assert!(playing.active);

        let toggled = handle.toggle_channel("bass", false).await.unwrap();
        assert!(!toggled.channel(crate::channel::ChannelKind::Bass).enabled);

        let ignored = handle.toggle_channel("kazoo", false).await.unwrap();
        assert_eq!(ignored.enabled_channels().len(), 3);

        let stopped = handle.stop_all().await.unwrap();
        assert!(!stopped.active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_handle() {
        let backend = Arc::new(MemoryBackend::new());
        let handle = start(backend.clone()).await;

        handle.shutdown().await.unwrap();
        handle.closed().await;

        assert!(handle.is_closed());
        assert_eq!(handle.play_all().await, Err(SessionError::Closed));
        assert_eq!(backend.open_count(), 0);
    }
}
