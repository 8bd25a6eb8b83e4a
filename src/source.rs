//! Audio sources handed to the player.
//!
//! A [`SourceFile`] is what the user picked (name, MIME type, location).
//! Only MIME types on the [`SUPPORTED_AUDIO_FORMATS`] allow-list become
//! tracks; everything else is reported back as a [`RejectedFile`].
//! Once accepted, the engine turns the file into a [`SourceUrl`], a loadable
//! reference that must be released exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Engine-level format tag of a recognized audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// File extension used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// MIME types accepted by the player, mapped to their format tag.
pub const SUPPORTED_AUDIO_FORMATS: [(&str, AudioFormat); 2] = [
    ("audio/mpeg", AudioFormat::Mp3),
    ("audio/wav", AudioFormat::Wav),
];

/// Looks up the format tag for a MIME type.
///
/// Returns `None` for anything outside the allow-list.
pub fn format_for_mime(mime_type: &str) -> Option<AudioFormat> {
    SUPPORTED_AUDIO_FORMATS
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, format)| *format)
}

/// Guesses a MIME type from a file extension.
///
/// Unknown extensions map to `application/octet-stream`, which is then
/// rejected by the allow-list.
pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") | Some("wave") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// A raw audio file selected by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Display name (file name without directories).
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Where the bytes live.
    pub path: PathBuf,
}

impl SourceFile {
    /// Creates a source file with an explicit MIME type.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            path: path.into(),
        }
    }

    /// Creates a source file, deriving name and MIME type from the path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_from_path(&path);
        Self::new(name, mime_type, path)
    }

    /// Returns the format tag if the MIME type is on the allow-list.
    pub fn format(&self) -> Option<AudioFormat> {
        format_for_mime(&self.mime_type)
    }
}

/// Loadable reference to an opened source.
///
/// Deliberately not `Clone`: giving it back to the engine moves it, so a
/// source can only be released once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SourceUrl(String);

impl SourceUrl {
    /// Wraps an engine-specific locator.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns the locator string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a file did not become a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// MIME type is not on the allow-list.
    UnsupportedType(String),
    /// The engine could not open the file.
    Unreadable(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnsupportedType(mime) => write!(f, "unsupported type {}", mime),
            RejectReason::Unreadable(reason) => write!(f, "unreadable: {}", reason),
        }
    }
}

/// A file that was dropped during upload, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub file: SourceFile,
    pub reason: RejectReason,
}
