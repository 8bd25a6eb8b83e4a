//! pillplayer - A multi-track audio player for the terminal.
//!
//! Several MP3/WAV files play as stacked lanes on one shared clock. Play,
//! pause, skip, volume and zoom apply to every lane at once, and scrubbing
//! one lane moves the others along according to a [`SyncPolicy`].
//!
//! The core is [`TransportController`], which owns the [`TrackSet`] and a
//! single engine binding over it. The rodio-backed engine lives in
//! [`engine::backend`]; the terminal front-end in [`app`] and [`ui`].

pub mod app;
pub mod config;
pub mod engine;
pub mod source;
pub mod sync;
pub mod tracks;
pub mod transport;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use config::PlayerConfig;
pub use engine::backend::RodioEngine;
pub use engine::{Engine, EngineBinding, EngineError, EngineEvent};
pub use source::{AudioFormat, SourceFile, SUPPORTED_AUDIO_FORMATS};
pub use sync::SyncPolicy;
pub use tracks::{Track, TrackId, TrackSet};
pub use transport::{CommandOutcome, TransportController, TransportPhase, TransportState};
