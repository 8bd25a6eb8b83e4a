//! Loaded tracks.
//!
//! A track pairs an uploaded file with the loadable reference the engine
//! opened for it. Tracks live in a [`TrackSet`] whose order is the lane order
//! shown to the user and the lane index used by the engine binding.

use crate::source::{AudioFormat, SourceFile, SourceUrl};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a track, assigned at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(Uuid);

impl TrackId {
    /// Generates a new random track ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One uploaded audio file in the active set.
///
/// The track owns its [`SourceUrl`]. Its playback handle is lane
/// `index_of(id)` of the controller's live engine binding.
#[derive(Debug)]
pub struct Track {
    /// Unique identifier for this track.
    pub id: TrackId,

    /// The file the track was created from.
    pub file: SourceFile,

    /// Recognized format of the file.
    pub format: AudioFormat,

    /// Loadable reference opened by the engine.
    source: SourceUrl,
}

impl Track {
    /// Creates a track with a fresh ID.
    pub fn new(file: SourceFile, format: AudioFormat, source: SourceUrl) -> Self {
        Self {
            id: TrackId::new(),
            file,
            format,
            source,
        }
    }

    /// Display name of the track.
    pub fn name(&self) -> &str {
        &self.file.name
    }

    /// Loadable reference for the engine.
    pub fn source(&self) -> &SourceUrl {
        &self.source
    }

    /// Consumes the track, handing back its loadable reference for release.
    pub fn into_source(self) -> SourceUrl {
        self.source
    }
}

/// Ordered collection of tracks with unique IDs.
#[derive(Debug, Default)]
pub struct TrackSet {
    tracks: Vec<Track>,
}

impl TrackSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { tracks: Vec::new() }
    }

    /// Appends a track.
    ///
    /// A track whose ID is already present is handed back unchanged.
    pub fn push(&mut self, track: Track) -> Result<TrackId, Track> {
        if self.contains(track.id) {
            return Err(track);
        }
        let id = track.id;
        self.tracks.push(track);
        Ok(id)
    }

    /// Removes a track by its ID.
    pub fn remove(&mut self, id: TrackId) -> Option<Track> {
        let pos = self.index_of(id)?;
        Some(self.tracks.remove(pos))
    }

    /// Removes every track, in lane order.
    pub fn drain(&mut self) -> impl Iterator<Item = Track> + '_ {
        self.tracks.drain(..)
    }

    /// Returns a reference to a track by its ID.
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Returns a reference to a track by lane index.
    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Lane index of a track.
    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.index_of(id).is_some()
    }

    /// Returns all tracks in lane order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
