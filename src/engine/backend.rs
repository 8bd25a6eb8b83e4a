//! rodio-backed engine.
//!
//! Opened files are read into memory as blobs, keyed by a `blob:` URL.
//! A binding decodes its blobs on a loader thread (tracks in parallel via
//! rayon) and hands the PCM back through a channel; the next
//! [`EngineBinding::poll`] on the UI thread installs one [`Sink`] per lane,
//! all fed from the same output stream, and emits `Ready`.
//!
//! The shared clock is the furthest lane playhead. Progress and end of
//! media are detected in `poll` as well, so every event is produced on the
//! UI thread.

use super::{
    BindingOptions, Engine, EngineBinding, EngineError, EngineEvent, EventSink, TrackSpec,
};
use crate::source::{SourceFile, SourceUrl};
use rayon::prelude::*;
use rodio::source::SeekError;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Minimum playhead movement (seconds) before a new progress event is sent.
const PROGRESS_RESOLUTION: f64 = 0.05;

/// Raw bytes of an opened file.
#[derive(Debug, Clone)]
struct Blob(Arc<[u8]>);

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// In-memory store of opened files.
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: HashMap<String, Blob>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a file into memory and returns its URL.
    pub fn open(&mut self, file: &SourceFile) -> Result<SourceUrl, EngineError> {
        let bytes = fs::read(&file.path).map_err(|source| EngineError::Io {
            path: file.path.clone(),
            source,
        })?;
        let url = format!("blob:{}", Uuid::new_v4());
        tracing::debug!("Opened {} as {} ({} bytes)", file.name, url, bytes.len());
        self.blobs.insert(url.clone(), Blob(bytes.into()));
        Ok(SourceUrl::new(url))
    }

    /// Drops the bytes behind a URL.
    pub fn release(&mut self, source: SourceUrl) {
        if self.blobs.remove(source.as_str()).is_none() {
            tracing::warn!("Release of unknown source {}", source);
        }
    }

    fn get(&self, source: &SourceUrl) -> Option<Blob> {
        self.blobs.get(source.as_str()).cloned()
    }

    /// Number of blobs held.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

/// Decoded, interleaved PCM for one lane.
#[derive(Debug, Clone)]
struct Pcm {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl Pcm {
    fn duration(&self) -> f64 {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate.max(1) as f64
    }
}

fn decode(name: &str, blob: Blob) -> Result<Pcm, EngineError> {
    let decoder = Decoder::new(Cursor::new(blob)).map_err(|e| EngineError::Decode {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();
    Ok(Pcm {
        samples: samples.into(),
        channels,
        sample_rate,
    })
}

/// Decodes every lane in parallel, preserving lane order.
fn decode_all(jobs: Vec<(String, Blob)>) -> Result<Vec<Pcm>, EngineError> {
    jobs.into_par_iter()
        .map(|(name, blob)| decode(&name, blob))
        .collect()
}

/// Audio source that plays a shared PCM buffer.
/// Implements rodio's Source trait, including seeking.
struct PcmSource {
    pcm: Pcm,
    /// Index of the next sample.
    pos: usize,
}

impl PcmSource {
    fn new(pcm: Pcm) -> Self {
        Self { pcm, pos: 0 }
    }
}

impl Iterator for PcmSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.pcm.samples.get(self.pos).copied()?;
        self.pos += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pcm.samples.len().saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl Source for PcmSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.pcm.samples.len().saturating_sub(self.pos))
    }

    fn channels(&self) -> u16 {
        self.pcm.channels
    }

    fn sample_rate(&self) -> u32 {
        self.pcm.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(self.pcm.duration()))
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        let channels = self.pcm.channels.max(1) as usize;
        let frame = (pos.as_secs_f64() * self.pcm.sample_rate as f64) as usize;
        // Stay on a frame boundary so channels don't swap.
        self.pos = (frame * channels).min(self.pcm.samples.len());
        Ok(())
    }
}

/// The rodio engine: one output stream shared by every binding.
pub struct RodioEngine {
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    handle: OutputStreamHandle,
    store: BlobStore,
}

impl RodioEngine {
    /// Opens the default audio output.
    pub fn new() -> Result<Self, EngineError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| EngineError::OutputUnavailable(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            handle,
            store: BlobStore::new(),
        })
    }

    /// Number of opened sources still held in memory.
    pub fn open_sources(&self) -> usize {
        self.store.len()
    }
}

impl Engine for RodioEngine {
    type Binding = RodioBinding;

    fn open_source(&mut self, file: &SourceFile) -> Result<SourceUrl, EngineError> {
        self.store.open(file)
    }

    fn release_source(&mut self, source: SourceUrl) {
        self.store.release(source);
    }

    fn create_binding(
        &mut self,
        tracks: &[TrackSpec<'_>],
        options: &BindingOptions,
        events: EventSink,
    ) -> Result<RodioBinding, EngineError> {
        let jobs = tracks
            .iter()
            .map(|t| {
                self.store
                    .get(t.source)
                    .map(|blob| (t.name.to_string(), blob))
                    .ok_or_else(|| EngineError::UnknownSource(t.source.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("loader-{}", events.binding()))
            .spawn(move || {
                // The binding may be gone by now; then nobody is listening.
                let _ = tx.send(decode_all(jobs));
            })
            .map_err(EngineError::Spawn)?;
        tracing::debug!(
            "Loading binding {} at {} px/s",
            events.binding(),
            options.min_px_per_sec
        );

        Ok(RodioBinding {
            handle: self.handle.clone(),
            pending: Some(rx),
            lanes: Vec::new(),
            volumes: tracks.iter().map(|t| t.volume).collect(),
            events,
            playing: false,
            last_progress: 0.0,
        })
    }
}

/// Snapshot of one lane's playhead.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LaneClock {
    position: f64,
    duration: f64,
    /// The sink has played everything queued.
    drained: bool,
}

impl LaneClock {
    /// Lane playhead; a drained lane sits at its end.
    fn time(&self) -> f64 {
        if self.drained {
            self.duration
        } else {
            clamp_time(self.position, self.duration)
        }
    }
}

/// Clamps a requested time into `[0, end]`.
fn clamp_time(seconds: f64, end: f64) -> f64 {
    if seconds.is_nan() {
        return 0.0;
    }
    seconds.clamp(0.0, end.max(0.0))
}

fn all_drained(clocks: &[LaneClock]) -> bool {
    !clocks.is_empty() && clocks.iter().all(|c| c.drained)
}

/// The shared clock: the furthest playhead among lanes still playing, or
/// the end of the longest lane once every lane has drained.
fn shared_time(clocks: &[LaneClock]) -> f64 {
    clocks
        .iter()
        .filter(|c| !c.drained)
        .map(LaneClock::time)
        .reduce(f64::max)
        .unwrap_or_else(|| clocks.iter().map(|c| c.duration).fold(0.0, f64::max))
}

/// What one poll of a playing binding should report.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Tick {
    Idle,
    Progress(f64),
    Finished,
}

fn playback_tick(playing: bool, clocks: &[LaneClock], last_progress: f64) -> Tick {
    if !playing || clocks.is_empty() {
        return Tick::Idle;
    }
    if all_drained(clocks) {
        return Tick::Finished;
    }
    let now = shared_time(clocks);
    if (now - last_progress).abs() >= PROGRESS_RESOLUTION {
        Tick::Progress(now)
    } else {
        Tick::Idle
    }
}

struct Lane {
    sink: Sink,
    pcm: Pcm,
}

impl Lane {
    fn duration(&self) -> f64 {
        self.pcm.duration()
    }

    fn clock(&self) -> LaneClock {
        LaneClock {
            position: self.sink.get_pos().as_secs_f64(),
            duration: self.duration(),
            drained: self.sink.empty(),
        }
    }

    fn rewind_if_drained(&self) {
        if self.sink.empty() {
            self.sink.append(PcmSource::new(self.pcm.clone()));
        }
    }

    fn seek(&self, seconds: f64) {
        let seconds = clamp_time(seconds, self.duration());
        self.rewind_if_drained();
        if let Err(e) = self.sink.try_seek(Duration::from_secs_f64(seconds)) {
            tracing::warn!("Seek to {:.2}s failed: {}", seconds, e);
        }
    }
}

/// A set of lanes playing in lockstep.
pub struct RodioBinding {
    handle: OutputStreamHandle,
    /// Loader result, until it arrives.
    pending: Option<Receiver<Result<Vec<Pcm>, EngineError>>>,
    lanes: Vec<Lane>,
    /// Gain per lane; applied when the lanes are installed.
    volumes: Vec<f64>,
    events: EventSink,
    playing: bool,
    last_progress: f64,
}

impl RodioBinding {
    fn clocks(&self) -> Vec<LaneClock> {
        self.lanes.iter().map(Lane::clock).collect()
    }

    fn check_loader(&mut self) {
        let Some(rx) = &self.pending else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                self.events
                    .emit(EngineEvent::LoadFailed("loader stopped".to_string()));
                return;
            }
        };
        self.pending = None;

        match result.and_then(|pcms| self.install(pcms)) {
            Ok(()) => self.events.emit(EngineEvent::Ready),
            Err(e) => self.events.emit(EngineEvent::LoadFailed(e.to_string())),
        }
    }

    fn install(&mut self, pcms: Vec<Pcm>) -> Result<(), EngineError> {
        let mut lanes = Vec::with_capacity(pcms.len());
        for (pcm, volume) in pcms.into_iter().zip(&self.volumes) {
            let sink = Sink::try_new(&self.handle)
                .map_err(|e| EngineError::OutputUnavailable(e.to_string()))?;
            sink.pause();
            sink.set_volume(*volume as f32);
            sink.append(PcmSource::new(pcm.clone()));
            lanes.push(Lane { sink, pcm });
        }
        tracing::debug!("Installed {} lane(s)", lanes.len());
        self.lanes = lanes;
        Ok(())
    }

    fn check_playback(&mut self) {
        match playback_tick(self.playing, &self.clocks(), self.last_progress) {
            Tick::Idle => {}
            Tick::Progress(now) => {
                self.last_progress = now;
                self.events.emit(EngineEvent::Progress(now));
            }
            Tick::Finished => {
                self.playing = false;
                self.events.emit(EngineEvent::Finished);
            }
        }
    }
}

impl EngineBinding for RodioBinding {
    fn play(&mut self) {
        if self.lanes.is_empty() {
            return;
        }
        // After the end of media, start over from the top.
        if all_drained(&self.clocks()) {
            for lane in &self.lanes {
                lane.rewind_if_drained();
            }
        }
        for lane in &self.lanes {
            lane.sink.play();
        }
        self.playing = true;
    }

    fn pause(&mut self) {
        for lane in &self.lanes {
            lane.sink.pause();
        }
        self.playing = false;
    }

    fn set_time(&mut self, seconds: f64) {
        let seconds = clamp_time(seconds, self.duration().unwrap_or(0.0));
        for lane in &self.lanes {
            lane.seek(seconds);
            if !self.playing {
                lane.sink.pause();
            }
        }
        self.last_progress = seconds;
    }

    fn current_time(&self) -> f64 {
        shared_time(&self.clocks())
    }

    fn set_track_volume(&mut self, index: usize, volume: f64) {
        if let Some(v) = self.volumes.get_mut(index) {
            *v = volume;
        }
        if let Some(lane) = self.lanes.get(index) {
            lane.sink.set_volume(volume as f32);
        }
    }

    fn zoom(&mut self, px_per_sec: f64) {
        tracing::debug!("Binding {} zoom {} px/s", self.events.binding(), px_per_sec);
    }

    fn seek_track(&mut self, index: usize, normalized: f64) {
        if let Some(lane) = self.lanes.get(index) {
            lane.seek(clamp_time(normalized, 1.0) * lane.duration());
            if !self.playing {
                lane.sink.pause();
            }
        }
    }

    fn track_duration(&self, index: usize) -> Option<f64> {
        self.lanes.get(index).map(Lane::duration)
    }

    fn track_count(&self) -> usize {
        self.volumes.len()
    }

    fn track_time(&self, index: usize) -> Option<f64> {
        self.lanes.get(index).map(|lane| lane.clock().time())
    }

    fn poll(&mut self) {
        self.check_loader();
        self.check_playback();
    }

    fn destroy(self) {
        for lane in &self.lanes {
            lane.sink.stop();
        }
        tracing::debug!("Binding {} destroyed", self.events.binding());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes a 16-bit sine WAV into memory.
    fn wav_bytes(seconds: f64, sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (seconds * sample_rate as f64) as usize;
            for i in 0..frames {
                let sample = ((i as f32 * 0.05).sin() * 8000.0) as i16;
                for _ in 0..channels {
                    writer.write_sample(sample).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn blob(bytes: Vec<u8>) -> Blob {
        Blob(bytes.into())
    }

    fn pcm(frames: usize, channels: u16, sample_rate: u32) -> Pcm {
        let samples: Vec<f32> = (0..frames * channels as usize).map(|i| i as f32).collect();
        Pcm {
            samples: samples.into(),
            channels,
            sample_rate,
        }
    }

    #[test]
    fn test_decode_wav() {
        let decoded = decode("tone.wav", blob(wav_bytes(0.5, 8000, 2))).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 8000);
        assert!((decoded.duration() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode("noise.wav", blob(vec![1, 2, 3, 4])).unwrap_err();
        assert!(matches!(err, EngineError::Decode { .. }));
    }

    #[test]
    fn test_decode_all_keeps_lane_order() {
        let jobs = vec![
            ("a".to_string(), blob(wav_bytes(0.2, 8000, 1))),
            ("b".to_string(), blob(wav_bytes(0.6, 8000, 1))),
            ("c".to_string(), blob(wav_bytes(0.4, 8000, 1))),
        ];
        let decoded = decode_all(jobs).unwrap();
        let durations: Vec<f64> = decoded
            .iter()
            .map(|p| (p.duration() * 10.0).round())
            .collect();
        assert_eq!(durations, [2.0, 6.0, 4.0]);
    }

    #[test]
    fn test_decode_all_fails_on_any_lane() {
        let jobs = vec![
            ("good".to_string(), blob(wav_bytes(0.1, 8000, 1))),
            ("bad".to_string(), blob(vec![0; 16])),
        ];
        assert!(decode_all(jobs).is_err());
    }

    #[test]
    fn test_pcm_source_plays_everything() {
        let source = PcmSource::new(pcm(4, 2, 4));
        assert_eq!(source.channels(), 2);
        assert_eq!(source.total_duration(), Some(Duration::from_secs(1)));
        assert_eq!(source.collect::<Vec<_>>().len(), 8);
    }

    #[test]
    fn test_pcm_source_seek_lands_on_frame() {
        let mut source = PcmSource::new(pcm(10, 2, 10));
        source.try_seek(Duration::from_millis(500)).unwrap();
        // Frame 5 of a stereo buffer starts at sample 10.
        assert_eq!(source.next(), Some(10.0));

        source.try_seek(Duration::from_secs(5)).unwrap();
        assert_eq!(source.next(), None);
    }

    fn clock(position: f64, duration: f64, drained: bool) -> LaneClock {
        LaneClock {
            position,
            duration,
            drained,
        }
    }

    #[test]
    fn test_clamp_time() {
        assert_eq!(clamp_time(-4.0, 60.0), 0.0);
        assert_eq!(clamp_time(75.0, 60.0), 60.0);
        assert_eq!(clamp_time(12.5, 60.0), 12.5);
        assert_eq!(clamp_time(f64::NAN, 60.0), 0.0);
        // No lanes yet: everything lands on zero.
        assert_eq!(clamp_time(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_shared_time_is_furthest_live_lane() {
        let clocks = [clock(12.0, 60.0, false), clock(14.0, 30.0, false)];
        assert_eq!(shared_time(&clocks), 14.0);

        // A drained short lane no longer drives the clock.
        let clocks = [clock(40.0, 60.0, false), clock(0.0, 30.0, true)];
        assert_eq!(shared_time(&clocks), 40.0);

        // A position past the lane end is capped.
        assert_eq!(shared_time(&[clock(31.0, 30.0, false)]), 30.0);
    }

    #[test]
    fn test_shared_time_after_end_of_media() {
        let clocks = [clock(0.0, 60.0, true), clock(0.0, 30.0, true)];
        assert_eq!(shared_time(&clocks), 60.0);
        assert_eq!(shared_time(&[]), 0.0);
        assert_eq!(clocks[1].time(), 30.0);
    }

    #[test]
    fn test_playback_tick() {
        let playing = [clock(1.0, 60.0, false), clock(1.02, 30.0, false)];
        assert_eq!(playback_tick(true, &playing, 0.0), Tick::Progress(1.02));
        // Below the progress resolution.
        assert_eq!(playback_tick(true, &playing, 1.0), Tick::Idle);
        // Paused bindings report nothing.
        assert_eq!(playback_tick(false, &playing, 0.0), Tick::Idle);
        assert_eq!(playback_tick(true, &[], 0.0), Tick::Idle);

        let drained = [clock(0.0, 60.0, true), clock(0.0, 30.0, true)];
        assert_eq!(playback_tick(true, &drained, 59.9), Tick::Finished);
        let one_left = [clock(45.0, 60.0, false), clock(0.0, 30.0, true)];
        assert_eq!(playback_tick(true, &one_left, 44.0), Tick::Progress(45.0));
    }

    #[test]
    fn test_drained_lane_rewinds_once() {
        // An idle sink has no output device behind it.
        let (sink, _queue) = Sink::new_idle();
        let lane = Lane {
            sink,
            pcm: pcm(20, 1, 10),
        };
        assert!(lane.clock().drained);
        assert!(all_drained(&[lane.clock()]));

        lane.rewind_if_drained();
        assert!(!lane.clock().drained);
        assert_eq!(lane.sink.len(), 1);

        lane.rewind_if_drained();
        assert_eq!(lane.sink.len(), 1);
        assert_eq!(lane.duration(), 2.0);
    }

    #[test]
    fn test_blob_store_open_release() {
        let path = std::env::temp_dir().join(format!("pillplayer-{}.wav", Uuid::new_v4()));
        fs::write(&path, wav_bytes(0.1, 8000, 1)).unwrap();

        let mut store = BlobStore::new();
        let url = store.open(&SourceFile::from_path(&path)).unwrap();
        assert!(url.as_str().starts_with("blob:"));
        assert_eq!(store.len(), 1);
        assert!(store.get(&url).is_some());

        store.release(url);
        assert!(store.is_empty());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_blob_store_missing_file() {
        let mut store = BlobStore::new();
        let err = store
            .open(&SourceFile::from_path("/definitely/not/here.wav"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
        assert!(store.is_empty());
    }

    #[test]
    #[ignore] // Requires an audio output device
    fn test_binding_becomes_ready() {
        let path = std::env::temp_dir().join(format!("pillplayer-{}.wav", Uuid::new_v4()));
        fs::write(&path, wav_bytes(1.0, 8000, 1)).unwrap();

        let mut engine = RodioEngine::new().unwrap();
        let url = engine.open_source(&SourceFile::from_path(&path)).unwrap();
        let (tx, rx) = mpsc::channel();
        let options = BindingOptions {
            min_px_per_sec: 5.0,
            waveform: Default::default(),
            multitrack: Default::default(),
        };
        let specs = [TrackSpec {
            name: "tone.wav",
            source: &url,
            volume: 1.0,
        }];
        let id = crate::engine::BindingId::INITIAL.next();
        let mut binding = engine
            .create_binding(&specs, &options, EventSink::new(id, tx))
            .unwrap();

        let mut ready = false;
        for _ in 0..200 {
            binding.poll();
            if let Ok(event) = rx.try_recv() {
                ready = event.event == EngineEvent::Ready;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(ready);
        assert!((binding.track_duration(0).unwrap() - 1.0).abs() < 0.01);

        binding.destroy();
        engine.release_source(url);
        assert_eq!(engine.open_sources(), 0);
        fs::remove_file(&path).unwrap();
    }
}
