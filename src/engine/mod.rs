//! Playback engine interface.
//!
//! The player never decodes or plays audio itself. It drives an [`Engine`]
//! which opens sources and creates one [`EngineBinding`] per track-set
//! membership: all current tracks, one shared clock. Bindings report back
//! asynchronously through an [`EventSink`], which stamps every event with
//! the [`BindingId`] of the binding that produced it so the controller can
//! drop events from bindings it already tore down.
//!
//! [`backend`] provides the rodio-backed engine used by the terminal app.

pub mod backend;

#[cfg(test)]
pub(crate) mod mock;

use crate::config::{MultitrackOptions, WaveformOptions};
use crate::source::{SourceFile, SourceUrl};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Errors reported by an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Audio bytes could not be decoded.
    #[error("failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },
    /// A binding referenced a source the engine never opened (or already released).
    #[error("unknown source {0}")]
    UnknownSource(String),
    /// No audio output device could be opened.
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
    /// The background loader could not be started.
    #[error("failed to start loader: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Generation of an engine binding.
///
/// Every binding the controller creates gets the next value, so an ID
/// compares equal only to events from that exact binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(u64);

impl BindingId {
    /// The generation before any binding existed.
    pub const INITIAL: BindingId = BindingId(0);

    /// Returns the following generation.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something a binding reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// All tracks are loaded; playback commands may be issued.
    Ready,
    /// Shared playhead moved (seconds).
    Progress(f64),
    /// Playback reached the end of the media.
    Finished,
    /// User interacted with one lane's waveform.
    Interaction {
        track_index: usize,
        normalized_position: f64,
    },
    /// Loading failed; the binding will never become ready.
    LoadFailed(String),
}

/// An [`EngineEvent`] tagged with the binding that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingEvent {
    pub binding: BindingId,
    pub event: EngineEvent,
}

/// Channel end handed to a binding for reporting events.
///
/// Cheap to clone; clones can move to loader threads.
#[derive(Debug, Clone)]
pub struct EventSink {
    binding: BindingId,
    tx: Sender<BindingEvent>,
}

impl EventSink {
    pub fn new(binding: BindingId, tx: Sender<BindingEvent>) -> Self {
        Self { binding, tx }
    }

    /// The binding this sink stamps events with.
    pub fn binding(&self) -> BindingId {
        self.binding
    }

    /// Sends an event.
    ///
    /// A closed channel means the controller is gone; the event is dropped.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(BindingEvent {
            binding: self.binding,
            event,
        });
    }
}

/// Per-track input to [`Engine::create_binding`].
#[derive(Debug, Clone, Copy)]
pub struct TrackSpec<'a> {
    pub name: &'a str,
    pub source: &'a SourceUrl,
    /// Initial gain in [0, 1].
    pub volume: f64,
}

/// Shared options for a new binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingOptions {
    /// Initial zoom in pixels per second.
    pub min_px_per_sec: f64,
    pub waveform: WaveformOptions,
    pub multitrack: MultitrackOptions,
}

/// Factory for sources and bindings.
pub trait Engine {
    type Binding: EngineBinding;

    /// Turns a user file into a loadable reference.
    fn open_source(&mut self, file: &SourceFile) -> Result<SourceUrl, EngineError>;

    /// Releases a loadable reference previously returned by `open_source`.
    fn release_source(&mut self, source: SourceUrl);

    /// Creates a binding over `tracks`, in lane order.
    ///
    /// Loading is asynchronous: the binding emits [`EngineEvent::Ready`] or
    /// [`EngineEvent::LoadFailed`] through `events` later.
    fn create_binding(
        &mut self,
        tracks: &[TrackSpec<'_>],
        options: &BindingOptions,
        events: EventSink,
    ) -> Result<Self::Binding, EngineError>;
}

/// A live engine instance bound to the current track set.
pub trait EngineBinding {
    fn play(&mut self);

    fn pause(&mut self);

    /// Moves the shared playhead. The engine clamps to `[0, duration]`.
    fn set_time(&mut self, seconds: f64);

    /// Current shared playhead in seconds.
    fn current_time(&self) -> f64;

    /// Sets the gain of one lane.
    fn set_track_volume(&mut self, index: usize, volume: f64);

    /// Visual zoom, in pixels per second.
    fn zoom(&mut self, px_per_sec: f64);

    /// Moves one lane to a position normalized to its own duration.
    fn seek_track(&mut self, index: usize, normalized: f64);

    /// Duration of one lane in seconds, once known.
    fn track_duration(&self, index: usize) -> Option<f64>;

    /// Number of lanes (live playback handles) in this binding.
    fn track_count(&self) -> usize;

    /// Playhead of one lane. Defaults to the shared clock, capped at the
    /// lane's own end.
    fn track_time(&self, index: usize) -> Option<f64> {
        let duration = self.track_duration(index)?;
        Some(self.current_time().min(duration))
    }

    /// Longest lane duration, once known.
    fn duration(&self) -> Option<f64> {
        (0..self.track_count())
            .filter_map(|i| self.track_duration(i))
            .reduce(f64::max)
    }

    /// Gives the binding a chance to emit events from the UI thread.
    fn poll(&mut self) {}

    /// Tears the binding down, releasing every lane.
    fn destroy(self);
}
