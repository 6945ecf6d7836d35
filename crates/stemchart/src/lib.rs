//! Stemchart: multi-stem playback session engine
//!
//! Plays a fixed set of instrument stems (drums, bass, others, vocals) on a
//! shared clock. Each stem can be switched on or off while the session runs,
//! and a per-stem chart reveals its points as the playback cursor passes
//! them.
//!
//! - **ChannelMixer**: one backend stream per stem, transport and loop policy
//! - **PlaybackClock**: fixed-rate ticks that advance the cursor
//! - **Orchestrator**: the Idle/Playing state machine tying them together
//! - **SessionDaemon**: a tokio task that serializes commands, ticks and
//!   end-of-media events, publishing snapshots through a watch channel
//!
//! Sound output sits behind the `PlaybackBackend` trait, drawing behind
//! `VisualFeedback`.

pub mod assets;
pub mod backend;
pub mod channel;
pub mod command;
pub mod config;
pub mod daemon;
pub mod decode;
pub mod error;
pub mod feedback;
pub mod mixer;
pub mod orchestrator;
pub mod session;
pub mod telemetry;
pub mod tick_clock;
pub mod track;

pub use assets::AssetLocator;
pub use backend::{BackendCall, BackendHandle, EndedSender, FileBackend, MemoryBackend, PlaybackBackend};
pub use channel::{ChannelKind, ChannelStyle, PerChannel, Rgba, UnknownChannel};
pub use command::{CommandParseError, ConsoleCommand};
pub use config::SessionConfig;
pub use daemon::{SessionCommand, SessionDaemon, SessionHandle};
pub use decode::{decode_audio, decode_wav, probe_audio, AudioInfo, DecodedAudio};
pub use error::{BackendError, SessionError};
pub use feedback::{spawn_feedback, TextFeedback, VisualFeedback};
pub use mixer::{Availability, ChannelMixer, EndedAction, PlaybackStopped};
pub use orchestrator::Orchestrator;
pub use session::{ChannelView, PlaybackSession, SessionSnapshot, TransportState};
pub use tick_clock::PlaybackClock;
pub use track::{Track, TrackPoint};
