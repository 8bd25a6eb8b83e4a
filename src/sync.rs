//! Cross-lane position alignment.
//!
//! When the user scrubs one lane, every other lane has to follow. With
//! lanes of different lengths there are two reasonable answers, selected by
//! [`SyncPolicy`]:
//!
//! - **Proportional** (default): every lane jumps to the same fraction of
//!   its own duration. Scrubbing to 50% of a 60 s lane puts a 30 s lane at
//!   15 s.
//! - **Absolute**: every lane jumps to the same timestamp. Lanes shorter
//!   than that timestamp are parked at their end.

use serde::{Deserialize, Serialize};

/// Rule for propagating a waveform interaction to the other lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    #[default]
    Proportional,
    Absolute,
}

/// Where one lane should move to, normalized to that lane's duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekTarget {
    pub track_index: usize,
    pub normalized: f64,
}

/// Result of aligning all lanes to an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Absolute position of the interaction on the source lane (seconds).
    pub seconds: f64,
    /// Seek commands for every other lane, in lane order.
    pub targets: Vec<SeekTarget>,
}

impl SyncPolicy {
    /// Computes where every other lane goes when lane `source` is scrubbed
    /// to `normalized` (0..=1 of its own duration).
    ///
    /// `durations[i]` is lane `i`'s duration in seconds, `None` if unknown.
    /// Lanes with an unknown or zero duration are left alone. Returns `None`
    /// if the source lane itself has no known duration.
    pub fn align(
        self,
        source: usize,
        normalized: f64,
        durations: &[Option<f64>],
    ) -> Option<Alignment> {
        let source_duration = usable(*durations.get(source)?)?;
        let normalized = normalized.clamp(0.0, 1.0);
        let seconds = normalized * source_duration;

        let targets = durations
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != source)
            .filter_map(|(i, d)| {
                let duration = usable(*d)?;
                let position = match self {
                    SyncPolicy::Proportional => normalized,
                    SyncPolicy::Absolute => (seconds / duration).min(1.0),
                };
                Some(SeekTarget {
                    track_index: i,
                    normalized: position,
                })
            })
            .collect();

        Some(Alignment { seconds, targets })
    }
}

fn usable(duration: Option<f64>) -> Option<f64> {
    duration.filter(|d| d.is_finite() && *d > 0.0)
}
