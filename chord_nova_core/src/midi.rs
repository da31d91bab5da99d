// MIDI output from generated progressions.
//
// Converts a chord progression into a Standard MIDI File (SMF) for playback.
// Track 0 carries the tempo; track 1 holds the chords, each one sounding
// for a fixed number of quarter notes, all voices attacked together.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1 (multi-track).

use crate::pitch::Chord;
use midly::{
    Format, Header, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Playback settings for an exported progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiOptions {
    pub tempo_bpm: u16,
    /// Length of each chord in quarter notes.
    pub quarters_per_chord: u16,
    /// General MIDI program (0 = acoustic grand piano).
    pub program: u8,
    pub velocity: u8,
}

impl Default for MidiOptions {
    fn default() -> Self {
        MidiOptions {
            tempo_bpm: 120,
            quarters_per_chord: 4,
            program: 0,
            velocity: 80,
        }
    }
}

/// Convert a progression to MIDI and write to a file.
pub fn write_midi(chords: &[Chord], options: &MidiOptions, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let smf = progression_to_smf(chords, options);
    let mut buf = Vec::new();
    smf.write(&mut buf)?;
    std::fs::write(path, &buf)?;
    log::info!("wrote {} chords to {}", chords.len(), path.display());
    Ok(())
}

fn event(delta: u32, channel: u4, message: MidiMessage) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi { channel, message },
    }
}

/// Convert a progression to an in-memory SMF.
pub fn progression_to_smf(chords: &[Chord], options: &MidiOptions) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo track
    let mut tempo_track: Track<'static> = Vec::new();
    let tempo_microseconds = 60_000_000 / options.tempo_bpm.max(1) as u32;
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    let channel = u4::new(0);
    let velocity = u7::new(options.velocity.min(127));
    let chord_ticks = TICKS_PER_QUARTER as u32 * options.quarters_per_chord.max(1) as u32;

    let mut track: Track<'static> = Vec::new();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::TrackName(b"Progression")),
    });
    track.push(event(
        0,
        channel,
        MidiMessage::ProgramChange {
            program: u7::new(options.program.min(127)),
        },
    ));

    for chord in chords {
        for &pitch in chord.pitches() {
            track.push(event(
                0,
                channel,
                MidiMessage::NoteOn {
                    key: u7::new(pitch),
                    vel: velocity,
                },
            ));
        }
        // The first release carries the chord's duration.
        for (i, &pitch) in chord.pitches().iter().enumerate() {
            let delta = if i == 0 { chord_ticks } else { 0 };
            track.push(event(
                delta,
                channel,
                MidiMessage::NoteOff {
                    key: u7::new(pitch),
                    vel: u7::new(0),
                },
            ));
        }
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    smf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progression() -> Vec<Chord> {
        vec![
            Chord::from_midi(&[60, 64, 67]).unwrap(),
            Chord::from_midi(&[65, 69, 72]).unwrap(),
            Chord::from_midi(&[67, 71, 74, 77]).unwrap(),
        ]
    }

    #[test]
    fn test_progression_to_smf_basic() {
        let smf = progression_to_smf(&progression(), &MidiOptions::default());
        // 1 tempo track + 1 chord track
        assert_eq!(smf.tracks.len(), 2);
        let notes_on = smf.tracks[1]
            .iter()
            .filter(|e| matches!(e.kind, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. }))
            .count();
        assert_eq!(notes_on, 10);
    }

    #[test]
    fn test_chord_duration_in_ticks() {
        let options = MidiOptions {
            quarters_per_chord: 2,
            ..MidiOptions::default()
        };
        let smf = progression_to_smf(&progression(), &options);
        let total: u32 = smf.tracks[1].iter().map(|e| e.delta.as_int()).sum();
        assert_eq!(total, 3 * 2 * TICKS_PER_QUARTER as u32);
    }

    #[test]
    fn test_write_midi_round_trips_through_midly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progression.mid");
        write_midi(&progression(), &MidiOptions::default(), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let parsed = Smf::parse(&bytes).unwrap();
        assert_eq!(parsed.tracks.len(), 2);
    }
}
