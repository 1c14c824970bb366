//! Printable overview of a sequence.

use std::fmt;

use pg_ir::{BarBeatTime, Sequence, TimeSignature, TrackColor};

#[derive(Clone, Debug, PartialEq)]
pub struct TrackSummary {
    pub name: String,
    pub color: TrackColor,
    pub instrument: Option<String>,
    pub events: usize,
    pub nodes: usize,
    pub loops: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub time_signature: TimeSignature,
    pub tempo_changes: Vec<(BarBeatTime, f64)>,
    pub end_of_file: BarBeatTime,
    pub tracks: Vec<TrackSummary>,
}

impl Summary {
    pub fn of(sequence: &Sequence) -> Self {
        let tracks = sequence
            .tracks
            .iter()
            .map(|track| TrackSummary {
                name: track.name.clone(),
                color: track.color,
                instrument: track.instrument.clone(),
                events: track.events.len(),
                nodes: track.events.node_events().count()
                    + track.loops.iter().map(|lp| lp.events.node_events().count()).sum::<usize>(),
                loops: track.loops.len(),
            })
            .collect();
        Self {
            time_signature: sequence.time_signature(),
            tempo_changes: sequence.tempo_changes(),
            end_of_file: sequence.end_of_file,
            tracks,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Meter:    {}/{}", self.time_signature.beats_per_bar, self.time_signature.beat_unit)?;
        for (time, bpm) in &self.tempo_changes {
            writeln!(f, "Tempo:    {:.2} BPM at {}", bpm, time)?;
        }
        writeln!(f, "End:      {}", self.end_of_file)?;
        writeln!(f, "Tracks:   {}", self.tracks.len())?;
        for (index, track) in self.tracks.iter().enumerate() {
            write!(
                f,
                "  {:2}. {} [{}] {} events, {} nodes, {} loops",
                index, track.name, track.color, track.events, track.nodes, track.loops
            )?;
            if let Some(instrument) = &track.instrument {
                write!(f, " ({})", instrument)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
