//! Shared transport over all loaded tracks.
//!
//! [`TransportController`] is the single owner of the track set and of the
//! one live engine binding. Every user intent (play, pause, skip, volume,
//! zoom, scrubbing a lane) becomes one command applied to all lanes through
//! that binding.
//!
//! Any change to track membership tears the binding down and creates a new
//! one for the new set; the engine has no incremental add/remove. Each
//! binding gets a fresh [`BindingId`], and events stamped with an older ID
//! are ignored.
//!
//! # Phases
//!
//! ```text
//! Uninitialized --add--> Loading --Ready--> Paused <--play/pause--> Playing
//!                          ^                  |                       |
//!                          +---- add/remove --+-----------------------+
//! ```
//!
//! A binding that cannot be created, or that reports `LoadFailed`, leaves
//! the transport in `Failed` until the next membership change.

use crate::config::{PlayerConfig, ZoomConfig};
use crate::engine::{
    BindingEvent, BindingId, BindingOptions, Engine, EngineBinding, EngineEvent, EventSink,
    TrackSpec,
};
use crate::source::{RejectReason, RejectedFile, SourceFile};
use crate::sync::SyncPolicy;
use crate::tracks::{Track, TrackId, TrackSet};
use std::sync::mpsc::{self, Receiver, Sender};

/// Playback state visible to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportState {
    /// True only while every lane has been commanded to play.
    pub is_playing: bool,
    /// Global gain in [0, 1], applied identically to every lane.
    pub master_volume: f64,
    /// Pixels per second, applied identically to every lane.
    pub zoom_level: f64,
    /// Shared playhead in seconds.
    pub current_position: f64,
    /// The live binding accepts playback commands.
    pub ready: bool,
    /// Why the live binding failed to load, if it did.
    pub load_error: Option<String>,
}

impl TransportState {
    fn initial(master_volume: f64, zoom_level: f64) -> Self {
        Self {
            is_playing: false,
            master_volume,
            zoom_level,
            current_position: 0.0,
            ready: false,
            load_error: None,
        }
    }
}

/// Coarse transport phase, derived from the state and the track set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    /// No tracks, no binding.
    Uninitialized,
    /// Binding created, waiting for it to become ready.
    Loading,
    Paused,
    Playing,
    /// The binding could not be created or failed to load.
    Failed,
}

/// What happened to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command reached the engine.
    Applied,
    /// Already in the requested state; nothing was sent.
    Unchanged,
    /// Ignored because the binding is not ready.
    NotReady,
    /// Argument out of range; nothing was sent.
    Invalid,
}

impl CommandOutcome {
    pub fn is_applied(self) -> bool {
        self == CommandOutcome::Applied
    }
}

/// Result of an upload.
#[derive(Debug, Default)]
pub struct AddOutcome {
    /// IDs of the new tracks, in lane order.
    pub added: Vec<TrackId>,
    /// Files that did not become tracks.
    pub rejected: Vec<RejectedFile>,
}

struct LiveBinding<B> {
    id: BindingId,
    binding: B,
}

/// Owner of the track set, the engine binding and the shared transport state.
pub struct TransportController<E: Engine> {
    engine: E,
    tracks: TrackSet,
    binding: Option<LiveBinding<E::Binding>>,
    /// ID of the most recently created binding.
    generation: BindingId,
    state: TransportState,
    initial_volume: f64,
    initial_zoom: f64,
    options: BindingOptions,
    sync_policy: SyncPolicy,
    events_tx: Sender<BindingEvent>,
    events_rx: Receiver<BindingEvent>,
}

impl<E: Engine> TransportController<E> {
    /// Creates an empty transport driving `engine`.
    pub fn new(engine: E, config: &PlayerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let initial_volume = config.initial_volume.clamp(0.0, 1.0);
        let initial_zoom = if config.zoom.initial.is_finite() && config.zoom.initial > 0.0 {
            config.zoom.initial
        } else {
            let fallback = ZoomConfig::default().initial;
            tracing::warn!("Ignoring zoom {}, using {}", config.zoom.initial, fallback);
            fallback
        };
        Self {
            engine,
            tracks: TrackSet::new(),
            binding: None,
            generation: BindingId::INITIAL,
            state: TransportState::initial(initial_volume, initial_zoom),
            initial_volume,
            initial_zoom,
            options: BindingOptions {
                min_px_per_sec: initial_zoom,
                waveform: config.waveform.clone(),
                multitrack: config.multitrack.clone(),
            },
            sync_policy: config.sync_policy,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    pub fn phase(&self) -> TransportPhase {
        if self.tracks.is_empty() {
            TransportPhase::Uninitialized
        } else if self.state.load_error.is_some() {
            TransportPhase::Failed
        } else if !self.state.ready {
            TransportPhase::Loading
        } else if self.state.is_playing {
            TransportPhase::Playing
        } else {
            TransportPhase::Paused
        }
    }

    /// ID of the live binding, if one exists.
    pub fn binding_id(&self) -> Option<BindingId> {
        self.binding.as_ref().map(|live| live.id)
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.sync_policy
    }

    pub fn set_sync_policy(&mut self, policy: SyncPolicy) {
        self.sync_policy = policy;
    }

    /// Duration of one lane, once the binding knows it.
    pub fn track_duration(&self, index: usize) -> Option<f64> {
        self.binding.as_ref()?.binding.track_duration(index)
    }

    /// Longest lane duration, once known.
    pub fn duration(&self) -> Option<f64> {
        self.binding.as_ref()?.binding.duration()
    }

    /// Playhead of one lane in seconds.
    pub fn track_position(&self, index: usize) -> Option<f64> {
        self.binding.as_ref()?.binding.track_time(index)
    }

    /// Adds every supported file as a new track.
    ///
    /// Files with a MIME type outside the allow-list, or that the engine
    /// cannot open, are returned in [`AddOutcome::rejected`]. If anything
    /// was added the binding is rebuilt for the new set.
    pub fn add_tracks(&mut self, files: impl IntoIterator<Item = SourceFile>) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        for file in files {
            let Some(format) = file.format() else {
                tracing::warn!("Skipping {}: unsupported type {}", file.name, file.mime_type);
                let reason = RejectReason::UnsupportedType(file.mime_type.clone());
                outcome.rejected.push(RejectedFile { file, reason });
                continue;
            };

            let source = match self.engine.open_source(&file) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", file.name, e);
                    let reason = RejectReason::Unreadable(e.to_string());
                    outcome.rejected.push(RejectedFile { file, reason });
                    continue;
                }
            };

            match self.tracks.push(Track::new(file, format, source)) {
                Ok(id) => outcome.added.push(id),
                Err(duplicate) => self.engine.release_source(duplicate.into_source()),
            }
        }

        if !outcome.added.is_empty() {
            tracing::info!(
                "Added {} track(s), {} in set",
                outcome.added.len(),
                self.tracks.len()
            );
            self.rebuild();
        }
        outcome
    }

    /// Removes a track and releases its source.
    ///
    /// Returns false if no track has this ID.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        let Some(track) = self.tracks.remove(id) else {
            return false;
        };
        // The binding may still read from the source, so it goes first.
        self.teardown();
        tracing::info!("Removed track {} ({})", track.name(), id);
        self.engine.release_source(track.into_source());
        self.rebuild();
        true
    }

    /// Removes every track.
    pub fn clear(&mut self) {
        self.teardown();
        for track in self.tracks.drain() {
            self.engine.release_source(track.into_source());
        }
        self.rebuild();
    }

    pub fn play(&mut self) -> CommandOutcome {
        if !self.state.ready {
            return CommandOutcome::NotReady;
        }
        if self.state.is_playing {
            return CommandOutcome::Unchanged;
        }
        let Some(live) = self.binding.as_mut() else {
            return CommandOutcome::NotReady;
        };
        live.binding.play();
        self.state.is_playing = true;
        tracing::debug!("Play on binding {}", live.id);
        CommandOutcome::Applied
    }

    pub fn pause(&mut self) -> CommandOutcome {
        if !self.state.ready {
            return CommandOutcome::NotReady;
        }
        if !self.state.is_playing {
            return CommandOutcome::Unchanged;
        }
        let Some(live) = self.binding.as_mut() else {
            return CommandOutcome::NotReady;
        };
        live.binding.pause();
        self.state.is_playing = false;
        self.state.current_position = live.binding.current_time();
        tracing::debug!("Pause on binding {}", live.id);
        CommandOutcome::Applied
    }

    /// Play/pause button.
    pub fn toggle_play(&mut self) -> CommandOutcome {
        if self.state.is_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Sets the master volume on every lane.
    ///
    /// Values outside [0, 1] are clamped. Allowed while loading; the value
    /// also becomes the initial volume of the next binding.
    pub fn set_volume(&mut self, volume: f64) -> CommandOutcome {
        if !volume.is_finite() {
            return CommandOutcome::Invalid;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.state.master_volume = volume;
        if let Some(live) = self.binding.as_mut() {
            for index in 0..self.tracks.len() {
                live.binding.set_track_volume(index, volume);
            }
        }
        CommandOutcome::Applied
    }

    /// Sets the visual zoom (pixels per second). Allowed while loading.
    pub fn set_zoom(&mut self, px_per_sec: f64) -> CommandOutcome {
        if !(px_per_sec.is_finite() && px_per_sec > 0.0) {
            return CommandOutcome::Invalid;
        }
        self.state.zoom_level = px_per_sec;
        if let Some(live) = self.binding.as_mut() {
            live.binding.zoom(px_per_sec);
        }
        CommandOutcome::Applied
    }

    /// Moves the shared playhead by `delta` seconds (negative skips back).
    ///
    /// Clamping to the media bounds is left to the engine.
    pub fn skip(&mut self, delta: f64) -> CommandOutcome {
        if !delta.is_finite() {
            return CommandOutcome::Invalid;
        }
        let Some(binding) = self.ready_binding() else {
            return CommandOutcome::NotReady;
        };
        let target = binding.current_time() + delta;
        binding.set_time(target);
        let position = binding.current_time();
        self.state.current_position = position;
        tracing::debug!("Skip {:+.1}s -> {:.1}s", delta, position);
        CommandOutcome::Applied
    }

    /// Moves the shared playhead to an absolute position.
    pub fn seek(&mut self, seconds: f64) -> CommandOutcome {
        if !seconds.is_finite() {
            return CommandOutcome::Invalid;
        }
        let Some(binding) = self.ready_binding() else {
            return CommandOutcome::NotReady;
        };
        binding.set_time(seconds);
        self.state.current_position = binding.current_time();
        CommandOutcome::Applied
    }

    /// Scrubs lane `track_index` to `normalized` (0..=1 of its duration) and
    /// moves every other lane according to the sync policy.
    pub fn interact(&mut self, track_index: usize, normalized: f64) -> CommandOutcome {
        if !self.state.ready {
            return CommandOutcome::NotReady;
        }
        if !normalized.is_finite() || track_index >= self.tracks.len() {
            return CommandOutcome::Invalid;
        }
        let policy = self.sync_policy;
        let lanes = self.tracks.len();
        let Some(binding) = self.ready_binding() else {
            return CommandOutcome::NotReady;
        };

        let durations: Vec<Option<f64>> = (0..lanes).map(|i| binding.track_duration(i)).collect();
        let Some(alignment) = policy.align(track_index, normalized, &durations) else {
            return CommandOutcome::Invalid;
        };

        binding.seek_track(track_index, normalized.clamp(0.0, 1.0));
        for target in &alignment.targets {
            binding.seek_track(target.track_index, target.normalized);
        }
        self.state.current_position = alignment.seconds;
        tracing::debug!(
            "Lane {} scrubbed to {:.1}s, {} lane(s) aligned",
            track_index,
            alignment.seconds,
            alignment.targets.len()
        );
        CommandOutcome::Applied
    }

    /// Applies one event from a binding.
    ///
    /// Returns false if the event was ignored, either because it came from
    /// a binding that has since been torn down or because it changed nothing.
    pub fn handle_event(&mut self, event: BindingEvent) -> bool {
        if self.binding_id() != Some(event.binding) {
            tracing::debug!(
                "Ignoring {:?} from stale binding {}",
                event.event,
                event.binding
            );
            return false;
        }

        match event.event {
            EngineEvent::Ready => {
                if self.state.ready || self.state.load_error.is_some() {
                    return false;
                }
                self.state.ready = true;
                tracing::info!("Binding {} ready", event.binding);
            }
            EngineEvent::Progress(seconds) => {
                self.state.current_position = seconds;
            }
            EngineEvent::Finished => {
                self.state.is_playing = false;
                if let Some(live) = &self.binding {
                    self.state.current_position = live.binding.current_time();
                }
            }
            EngineEvent::Interaction {
                track_index,
                normalized_position,
            } => {
                return self.interact(track_index, normalized_position).is_applied();
            }
            EngineEvent::LoadFailed(reason) => {
                tracing::error!("Binding {} failed to load: {}", event.binding, reason);
                self.state.ready = false;
                self.state.is_playing = false;
                self.state.load_error = Some(reason);
            }
        }
        true
    }

    /// Polls the live binding and applies every pending event.
    ///
    /// Returns the number of events that changed state.
    pub fn pump(&mut self) -> usize {
        if let Some(live) = self.binding.as_mut() {
            live.binding.poll();
        }
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.handle_event(event) {
                applied += 1;
            }
        }
        applied
    }

    fn ready_binding(&mut self) -> Option<&mut E::Binding> {
        if !self.state.ready {
            return None;
        }
        self.binding.as_mut().map(|live| &mut live.binding)
    }

    fn teardown(&mut self) {
        if let Some(live) = self.binding.take() {
            tracing::debug!("Destroying binding {}", live.id);
            live.binding.destroy();
        }
    }

    /// Replaces the binding with one for the current track set.
    fn rebuild(&mut self) {
        self.teardown();

        if self.tracks.is_empty() {
            self.state = TransportState::initial(self.initial_volume, self.initial_zoom);
            return;
        }

        let volume = self.state.master_volume;
        let zoom = self.state.zoom_level;
        self.state = TransportState::initial(volume, zoom);

        self.generation = self.generation.next();
        let id = self.generation;
        let specs: Vec<TrackSpec<'_>> = self
            .tracks
            .iter()
            .map(|track| TrackSpec {
                name: track.name(),
                source: track.source(),
                volume,
            })
            .collect();
        let options = BindingOptions {
            min_px_per_sec: zoom,
            ..self.options.clone()
        };
        let events = EventSink::new(id, self.events_tx.clone());

        match self.engine.create_binding(&specs, &options, events) {
            Ok(binding) => {
                tracing::info!("Created binding {} with {} lane(s)", id, specs.len());
                self.binding = Some(LiveBinding { id, binding });
            }
            Err(e) => {
                tracing::error!("Failed to create binding {}: {}", id, e);
                self.state.load_error = Some(e.to_string());
            }
        }
    }
}

impl<E: Engine> Drop for TransportController<E> {
    fn drop(&mut self) {
        self.teardown();
        for track in self.tracks.drain() {
            self.engine.release_source(track.into_source());
        }
    }
}
