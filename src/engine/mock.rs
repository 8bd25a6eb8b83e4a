//! Recording engine for tests.
//!
//! Every command and resource operation is written to a shared [`MockLog`]
//! so tests can check what reached the engine, and how many bindings,
//! lanes and sources are alive at any point.

use super::{
    BindingId, BindingOptions, Engine, EngineBinding, EngineError, EngineEvent, EventSink,
    TrackSpec,
};
use crate::source::{SourceFile, SourceUrl};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Duration given to tracks without an explicit one.
pub const DEFAULT_DURATION: f64 = 60.0;

/// A command received by a binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    SetTime(f64),
    SetTrackVolume(usize, f64),
    Zoom(f64),
    SeekTrack(usize, f64),
}

/// A binding as it was created.
#[derive(Debug, Clone)]
pub struct CreatedBinding {
    pub id: BindingId,
    pub names: Vec<String>,
    pub volumes: Vec<f64>,
    pub zoom: f64,
}

#[derive(Debug, Default)]
pub struct MockLog {
    pub opened: Vec<String>,
    pub released: Vec<String>,
    pub created: Vec<CreatedBinding>,
    pub destroyed: Vec<BindingId>,
    /// Sum of lanes over bindings that are not destroyed.
    pub live_handles: usize,
    /// Commands in call order, tagged with the receiving binding.
    pub commands: Vec<(BindingId, Command)>,
    sinks: Vec<EventSink>,
}

impl MockLog {
    /// Sources opened and not yet released.
    pub fn live_sources(&self) -> usize {
        self.opened.len() - self.released.len()
    }

    pub fn live_bindings(&self) -> usize {
        self.created.len() - self.destroyed.len()
    }

    /// Event sink of the binding with the given ID.
    pub fn sink(&self, id: BindingId) -> Option<EventSink> {
        self.sinks.iter().find(|s| s.binding() == id).cloned()
    }

    /// Commands without their binding tag.
    pub fn command_list(&self) -> Vec<Command> {
        self.commands.iter().map(|(_, c)| c.clone()).collect()
    }
}

pub struct MockEngine {
    log: Rc<RefCell<MockLog>>,
    durations: HashMap<String, f64>,
    unreadable: HashSet<String>,
    fail_bindings: bool,
    next_url: u64,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(MockLog::default())),
            durations: HashMap::new(),
            unreadable: HashSet::new(),
            fail_bindings: false,
            next_url: 1,
        }
    }

    /// Shared handle on the log.
    pub fn log(&self) -> Rc<RefCell<MockLog>> {
        Rc::clone(&self.log)
    }

    /// Sets the duration reported for tracks with this name.
    pub fn with_duration(mut self, name: &str, seconds: f64) -> Self {
        self.durations.insert(name.to_string(), seconds);
        self
    }

    /// Makes `open_source` fail for files with this name.
    pub fn with_unreadable(mut self, name: &str) -> Self {
        self.unreadable.insert(name.to_string());
        self
    }

    /// Makes every `create_binding` call fail.
    pub fn with_failing_bindings(mut self) -> Self {
        self.fail_bindings = true;
        self
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MockEngine {
    type Binding = MockBinding;

    fn open_source(&mut self, file: &SourceFile) -> Result<SourceUrl, EngineError> {
        if self.unreadable.contains(&file.name) {
            return Err(EngineError::Io {
                path: file.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
        }
        let url = format!("mock:{}:{}", self.next_url, file.name);
        self.next_url += 1;
        self.log.borrow_mut().opened.push(url.clone());
        Ok(SourceUrl::new(url))
    }

    fn release_source(&mut self, source: SourceUrl) {
        self.log.borrow_mut().released.push(source.as_str().to_string());
    }

    fn create_binding(
        &mut self,
        tracks: &[TrackSpec<'_>],
        options: &BindingOptions,
        events: EventSink,
    ) -> Result<MockBinding, EngineError> {
        if self.fail_bindings {
            return Err(EngineError::OutputUnavailable("mock failure".to_string()));
        }
        let id = events.binding();
        let durations = tracks
            .iter()
            .map(|t| {
                self.durations
                    .get(t.name)
                    .copied()
                    .unwrap_or(DEFAULT_DURATION)
            })
            .collect();

        let mut log = self.log.borrow_mut();
        log.created.push(CreatedBinding {
            id,
            names: tracks.iter().map(|t| t.name.to_string()).collect(),
            volumes: tracks.iter().map(|t| t.volume).collect(),
            zoom: options.min_px_per_sec,
        });
        log.live_handles += tracks.len();
        log.sinks.push(events);

        Ok(MockBinding {
            id,
            log: Rc::clone(&self.log),
            durations,
            position: 0.0,
        })
    }
}

pub struct MockBinding {
    id: BindingId,
    log: Rc<RefCell<MockLog>>,
    durations: Vec<f64>,
    position: f64,
}

impl MockBinding {
    fn record(&self, command: Command) {
        self.log.borrow_mut().commands.push((self.id, command));
    }
}

impl EngineBinding for MockBinding {
    fn play(&mut self) {
        self.record(Command::Play);
    }

    fn pause(&mut self) {
        self.record(Command::Pause);
    }

    fn set_time(&mut self, seconds: f64) {
        self.record(Command::SetTime(seconds));
        let end = self.duration().unwrap_or(0.0);
        self.position = seconds.clamp(0.0, end);
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn set_track_volume(&mut self, index: usize, volume: f64) {
        self.record(Command::SetTrackVolume(index, volume));
    }

    fn zoom(&mut self, px_per_sec: f64) {
        self.record(Command::Zoom(px_per_sec));
    }

    fn seek_track(&mut self, index: usize, normalized: f64) {
        self.record(Command::SeekTrack(index, normalized));
    }

    fn track_duration(&self, index: usize) -> Option<f64> {
        self.durations.get(index).copied()
    }

    fn track_count(&self) -> usize {
        self.durations.len()
    }

    fn destroy(self) {
        let mut log = self.log.borrow_mut();
        log.destroyed.push(self.id);
        log.live_handles -= self.durations.len();
    }
}

/// Emits an event as if the binding `id` had produced it.
pub fn emit(log: &Rc<RefCell<MockLog>>, id: BindingId, event: EngineEvent) {
    let sink = log.borrow().sink(id);
    if let Some(sink) = sink {
        sink.emit(event);
    }
}
