//! Integration test: Groove JSON documents, lenient loading and conversion.

use pg_formats::{FormatError, GrooveFile, GrooveNode};
use pg_ir::{
    BarBeatTime, Duration, EventContainer, Generator, Loop, NodeData, NodeEvent, NodeIdentifier, NoteGenerator,
    Point, Sequence, TrackColor, Trajectory, Uuid, Velocity,
};
use serde_json::{json, Value};

fn node_json(id: u128, add: &str, remove: Option<&str>) -> Value {
    json!({
        "identifier": { "nodeIdentifier": Uuid::from_u128(id).to_string() },
        "generator": { "note": { "channel": 0, "tone": 60, "duration": "eighth", "velocity": "mf" } },
        "trajectory": { "position": [0.5, 0.5], "velocity": [1.0, 0.0] },
        "addTime": add,
        "removeTime": remove,
    })
}

fn track_json(name: &str, color: Option<&str>) -> Value {
    let mut nodes = serde_json::Map::new();
    nodes.insert(Uuid::from_u128(1).to_string(), node_json(1, "0:1.0", Some("1:0.0")));
    let mut track = json!({
        "name": name,
        "instrument": { "soundFont": "Strings", "program": 48 },
        "nodes": nodes,
        "loops": [],
    });
    if let Some(color) = color {
        track["color"] = json!(color);
    }
    track
}

fn document(tracks: Vec<Value>) -> String {
    json!({
        "source": "session.mid",
        "tracks": tracks,
        "tempoChanges": { "0:0/4.0/480@120": 120.0, "1920": 96.0 },
        "endOfFile": "4:0/4.0/480@120",
    })
    .to_string()
}

#[test]
fn track_missing_color_is_skipped() {
    let text = document(vec![
        track_json("Piano", Some("#4875A8")),
        track_json("Broken", None),
        track_json("Drums", Some("muddyWaters")),
    ]);
    let file = GrooveFile::from_json(&text).unwrap();
    let names: Vec<&str> = file.tracks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Piano", "Drums"]);
    assert_eq!(file.tracks[0].color, TrackColor::SteelBlue);
    assert_eq!(file.tracks[1].color, TrackColor::MuddyWaters);
    assert_eq!(file.source.as_deref(), Some("session.mid"));
}

#[test]
fn missing_required_field_fails_document() {
    let text = json!({ "tracks": [], "endOfFile": "0:0.0" }).to_string();
    assert!(matches!(GrooveFile::from_json(&text), Err(FormatError::MalformedProject(_))));
}

#[test]
fn out_of_range_times_are_rejected_not_wrapped() {
    let too_late = format!("{}:0.0", u64::MAX);
    let text = json!({ "tracks": [], "tempoChanges": {}, "endOfFile": too_late }).to_string();
    assert!(matches!(GrooveFile::from_json(&text), Err(FormatError::MalformedProject(_))));

    let mut track = track_json("Piano", Some("muddyWaters"));
    track["nodes"] = json!([node_json(1, &too_late, None), node_json(2, "0:2.0", None)]);
    let file = GrooveFile::from_json(&document(vec![track])).unwrap();
    assert_eq!(file.tracks[0].nodes.len(), 1);
    let sequence = file.to_sequence();
    assert_eq!(sequence.tracks[0].events.len(), 1);
}

#[test]
fn invalid_json_fails_document() {
    assert!(matches!(GrooveFile::from_json("{ \"tracks\": ["), Err(FormatError::Json(_))));
}

#[test]
fn bad_node_is_skipped_within_track() {
    let mut track = track_json("Piano", Some("muddyWaters"));
    track["nodes"] = json!([node_json(1, "0:0.0", None), { "identifier": "nope" }, node_json(2, "0:2.0", None)]);
    let file = GrooveFile::from_json(&document(vec![track])).unwrap();
    assert_eq!(file.tracks[0].nodes.len(), 2);
}

#[test]
fn remove_before_add_is_dropped_on_load() {
    let mut track = track_json("Piano", Some("muddyWaters"));
    track["nodes"] = json!([node_json(3, "2:0.0", Some("1:0.0"))]);
    let file = GrooveFile::from_json(&document(vec![track])).unwrap();
    let node = file.tracks[0].nodes.values().next().unwrap();
    assert_eq!(node.add_time.ticks(), 2 * 1920);
    assert_eq!(node.remove_time(), None);
}

#[test]
fn remove_before_add_is_rejected_on_set() {
    let mut node = GrooveNode::new(
        NodeIdentifier::new(Uuid::from_u128(9), None),
        Generator::Note(NoteGenerator::default()),
        Trajectory::default(),
        BarBeatTime::from_ticks(960),
    );
    node.set_remove_time(Some(BarBeatTime::from_ticks(100)));
    assert_eq!(node.remove_time(), None);
}

#[test]
fn tempo_keys_parse_both_forms() {
    let file = GrooveFile::from_json(&document(vec![])).unwrap();
    let changes: Vec<(u64, f64)> = file.tempo_changes.iter().map(|(t, bpm)| (t.ticks(), *bpm)).collect();
    assert_eq!(changes, vec![(0, 120.0), (1920, 96.0)]);
    assert_eq!(file.end_of_file.ticks(), 4 * 1920);
}

#[test]
fn json_round_trip_keeps_content() {
    let text = document(vec![track_json("Piano", Some("#4875A8"))]);
    let file = GrooveFile::from_json(&text).unwrap();
    let again = GrooveFile::from_json(&file.to_json().unwrap()).unwrap();
    assert_eq!(again, file);
}

#[test]
fn sequence_conversion_keeps_nodes_and_loops() {
    let loop_id = Uuid::from_u128(0x5150);
    let node_id = NodeIdentifier::new(Uuid::from_u128(4), None);
    let loop_node = NodeIdentifier::new(Uuid::from_u128(5), Some(loop_id));
    let add = |identifier, ticks| {
        NodeEvent::new(
            BarBeatTime::from_ticks(ticks),
            NodeData::Add {
                identifier,
                trajectory: Trajectory::new(Point::new(0.0, 1.0), Point::new(2.0, 3.0)),
                generator: Generator::Note(NoteGenerator::new(67, Duration::Half, Velocity::P)),
            },
        )
    };

    let mut sequence = Sequence::new();
    sequence.set_tempo(BarBeatTime::from_ticks(3840), 140.0);
    let track = sequence.add_track("Arp");
    track.instrument = Some(json!({ "program": 5 }).to_string());
    track.events.insert(add(node_id, 480).into());
    track.events.insert(NodeEvent::new(BarBeatTime::from_ticks(1440), NodeData::Remove { identifier: node_id }).into());
    let mut slice = EventContainer::with_span(BarBeatTime::zero(), BarBeatTime::from_ticks(1920));
    slice.insert(add(loop_node, 120).into());
    let mut lp = Loop::new(loop_id, BarBeatTime::from_ticks(1920), slice);
    lp.repetitions = Loop::INFINITE;
    track.loops.push(lp);

    let file = GrooveFile::from_sequence(&sequence, None);
    let groove_track = &file.tracks[0];
    assert_eq!(groove_track.instrument, json!({ "program": 5 }));
    assert_eq!(groove_track.nodes[&node_id].remove_time().map(|t| t.ticks()), Some(1440));
    assert_eq!(groove_track.loops[0].nodes[&loop_node].add_time.ticks(), 120);
    assert_eq!(file.tempo_changes.len(), 2);

    let rebuilt = GrooveFile::from_json(&file.to_json().unwrap()).unwrap().to_sequence();
    let arp = &rebuilt.tracks[0];
    assert_eq!(arp.name, "Arp");
    assert_eq!(arp.events.node_events().count(), 2);
    assert_eq!(arp.loops[0].repetitions, Loop::INFINITE);
    assert_eq!(arp.loops[0].end.ticks(), 3840);
    assert_eq!(arp.loops[0].slice_duration(), 1920);
    assert_eq!(rebuilt.tempo_at(BarBeatTime::from_ticks(4000)), sequence.tempo_at(BarBeatTime::from_ticks(4000)));
}
