//! Headless document controller for perpetual-groove.
//!
//! Loads and saves sequences as MIDI files or Groove JSON documents, and
//! expands loops for playback, behind one API the CLI shares.

mod config;
mod summary;

use std::fs;
use std::path::{Path, PathBuf};

use pg_engine::schedule_track;
use pg_formats::{GrooveFile, MidiFile};
use pg_ir::{BarBeatTime, EventContainer, MetaData, MetaEvent, TimeSignature, TrackColor};
use thiserror::Error;

// Re-export common types so callers don't need pg-ir/pg-formats directly.
pub use config::Config;
pub use pg_formats::FormatError;
pub use pg_ir::{Event, Sequence, Track};
pub use summary::{Summary, TrackSummary};

/// Error type for controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("configuration: {0}")]
    Config(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Neither a MIDI file nor a Groove document
    #[error("{0}: unrecognized file format")]
    UnknownFormat(PathBuf),
    #[error("no track at index {0}")]
    NoSuchTrack(usize),
}

/// Which codec a file is read or written with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Midi,
    Groove,
}

impl FileKind {
    /// Guess from leading bytes: the `MThd` magic, or a JSON object.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"MThd") {
            return Some(FileKind::Midi);
        }
        match data.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Some(FileKind::Groove),
            _ => None,
        }
    }
}

/// Owns the current sequence and the settings used to edit and expand it.
pub struct Controller {
    config: Config,
    sequence: Sequence,
    /// Where the current sequence was loaded from.
    source: Option<PathBuf>,
}

impl Controller {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let sequence = new_sequence(&config);
        Self { config, sequence, source: None }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Document management ---

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn sequence_mut(&mut self) -> &mut Sequence {
        &mut self.sequence
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Discard the current sequence for an empty one.
    pub fn reset(&mut self) {
        self.sequence = new_sequence(&self.config);
        self.source = None;
    }

    /// Append a track, colouring tracks in palette order from the
    /// configured default colour.
    pub fn add_track(&mut self, name: &str) -> &mut Track {
        let first = TrackColor::ALL.iter().position(|c| *c == self.config.default_color).unwrap_or(0);
        let color = TrackColor::for_index(first + self.sequence.tracks.len());
        self.sequence.tracks.push(Track::new(name, color));
        let last = self.sequence.tracks.len() - 1;
        &mut self.sequence.tracks[last]
    }

    pub fn load_midi(&mut self, data: &[u8]) -> Result<(), ControllerError> {
        self.sequence = pg_formats::load_midi(data)?;
        log::info!("loaded MIDI sequence with {} tracks", self.sequence.tracks.len());
        Ok(())
    }

    pub fn load_groove(&mut self, data: &[u8]) -> Result<(), ControllerError> {
        let file = GrooveFile::from_slice(data)?;
        self.sequence = file.to_sequence();
        log::info!("loaded Groove document with {} tracks", self.sequence.tracks.len());
        Ok(())
    }

    /// Load a file of either kind, chosen by its leading bytes.
    pub fn load_path(&mut self, path: &Path) -> Result<FileKind, ControllerError> {
        let data = fs::read(path).map_err(|source| ControllerError::Io { path: path.to_path_buf(), source })?;
        let kind = FileKind::detect(&data).ok_or_else(|| ControllerError::UnknownFormat(path.to_path_buf()))?;
        match kind {
            FileKind::Midi => self.load_midi(&data)?,
            FileKind::Groove => self.load_groove(&data)?,
        }
        self.source = Some(path.to_path_buf());
        Ok(kind)
    }

    pub fn midi_bytes(&self) -> Result<Vec<u8>, ControllerError> {
        Ok(MidiFile::from_sequence(&self.sequence).to_bytes()?)
    }

    pub fn groove_json(&self) -> Result<String, ControllerError> {
        let source = self.source.as_ref().map(|p| p.display().to_string());
        Ok(GrooveFile::from_sequence(&self.sequence, source).to_json()?)
    }

    pub fn save_midi(&self, path: &Path) -> Result<(), ControllerError> {
        let bytes = self.midi_bytes()?;
        fs::write(path, bytes).map_err(|source| ControllerError::Io { path: path.to_path_buf(), source })
    }

    pub fn save_groove(&self, path: &Path) -> Result<(), ControllerError> {
        let json = self.groove_json()?;
        fs::write(path, json).map_err(|source| ControllerError::Io { path: path.to_path_buf(), source })
    }

    // --- Inspection ---

    pub fn summary(&self) -> Summary {
        Summary::of(&self.sequence)
    }

    /// Position past which infinite loops are not expanded.
    pub fn horizon(&self) -> BarBeatTime {
        let beats_per_bar = self.sequence.time_signature().beats_per_bar.max(1) as u64;
        let bar_ticks = beats_per_bar * pg_ir::TICKS_PER_QUARTER as u64;
        let end = self.sequence.end_of_file.max(self.sequence.content_end());
        end.shifted(self.config.loop_horizon_bars.saturating_mul(bar_ticks))
    }

    /// A track's events merged with its loop expansions, up to the horizon.
    pub fn expanded_events(&self, track: usize) -> Result<EventContainer, ControllerError> {
        let track = self.sequence.tracks.get(track).ok_or(ControllerError::NoSuchTrack(track))?;
        Ok(schedule_track(track, self.horizon()))
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

fn new_sequence(config: &Config) -> Sequence {
    let zero = BarBeatTime::zero();
    let mut sequence = Sequence::empty();
    let signature = TimeSignature::new(config.beats_per_bar, 4);
    sequence.tempo.insert(MetaEvent::new(zero, MetaData::TimeSignature(signature)).into());
    sequence.set_tempo(zero, config.default_bpm);
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_ir::{ChannelEvent, Loop, Uuid};

    #[test]
    fn detects_file_kind() {
        assert_eq!(FileKind::detect(b"MThd\0\0\0\x06"), Some(FileKind::Midi));
        assert_eq!(FileKind::detect(b"  \n{\"tracks\": []}"), Some(FileKind::Groove));
        assert_eq!(FileKind::detect(b"RIFF"), None);
        assert_eq!(FileKind::detect(b""), None);
    }

    #[test]
    fn new_sequence_follows_config() {
        let config = Config { default_bpm: 90.0, beats_per_bar: 3, ..Config::default() };
        let ctrl = Controller::with_config(config);
        assert_eq!(ctrl.sequence().time_signature().beats_per_bar, 3);
        assert!((ctrl.sequence().tempo_at(BarBeatTime::zero()) - 90.0).abs() < 0.01);
    }

    #[test]
    fn track_colours_start_from_default() {
        let config = Config { default_color: TrackColor::Celery, ..Config::default() };
        let mut ctrl = Controller::with_config(config);
        assert_eq!(ctrl.add_track("a").color, TrackColor::Celery);
        assert_eq!(ctrl.add_track("b").color, TrackColor::Chestnut);
    }

    #[test]
    fn horizon_caps_infinite_loops() {
        let mut ctrl = Controller::with_config(Config { loop_horizon_bars: 2, ..Config::default() });
        let track = ctrl.add_track("Loop");
        track.events.insert(ChannelEvent::note_on(0, 60, 100, BarBeatTime::zero()).into());
        let mut slice = EventContainer::with_span(BarBeatTime::zero(), BarBeatTime::from_ticks(960));
        slice.insert(ChannelEvent::note_on(0, 62, 100, BarBeatTime::zero()).into());
        let mut lp = Loop::new(Uuid::from_u128(1), BarBeatTime::zero(), slice);
        lp.repetitions = Loop::INFINITE;
        track.loops.push(lp);
        ctrl.sequence_mut().refresh_end_of_file();

        assert_eq!(ctrl.horizon().ticks(), 960 + 2 * 1920);
        let expanded = ctrl.expanded_events(0).unwrap();
        assert_eq!(expanded.channel_events().count(), 1 + 5);
        assert!(matches!(ctrl.expanded_events(3), Err(ControllerError::NoSuchTrack(3))));
    }
}
