// Chords as validated pitch sets, plus pitch naming and interval helpers.
//
// A `Chord` is the engine's central input value: a non-empty set of MIDI
// pitches in 0..=127, normalised to ascending order with exact duplicates
// removed. Octave doublings (same pitch class, different octave) are kept;
// they feed the thickness descriptor.
//
// Enumerated candidates are built through `Chord::from_sorted`, which skips
// validation because the search space only produces sorted, in-range,
// duplicate-free pitch lists.
//
// Pitch-class sets are carried around as `u16` bitmasks (bit `pc` set) and
// exact pitch sets as `u128` bitmasks (bit `pitch` set). Both are cheap keys
// for the uniqueness policy and for set arithmetic in the bigram evaluator.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::EngineError;

/// Pitch list storage. Twelve inline slots covers every default-config chord.
pub type Pitches = SmallVec<[u8; 12]>;

/// Highest valid MIDI pitch.
pub const MAX_PITCH: u8 = 127;

/// A validated, normalised chord.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<u8>")]
pub struct Chord {
    pitches: Pitches,
}

impl Chord {
    /// Validate raw pitch values (as they arrive from a request document).
    ///
    /// Fails with `InvalidChord` on an empty list or any value outside
    /// 0..=127. The result is sorted and deduplicated.
    pub fn parse_midi(values: &[i64]) -> Result<Self, EngineError> {
        if values.is_empty() {
            return Err(EngineError::invalid_chord("a chord needs at least one pitch"));
        }
        let mut pitches = Pitches::with_capacity(values.len());
        for &v in values {
            if !(0..=MAX_PITCH as i64).contains(&v) {
                return Err(EngineError::invalid_chord(format!(
                    "pitch {v} is outside 0..={MAX_PITCH}"
                )));
            }
            pitches.push(v as u8);
        }
        pitches.sort_unstable();
        pitches.dedup();
        Ok(Chord { pitches })
    }

    /// Validate MIDI pitches given as bytes.
    pub fn from_midi(pitches: &[u8]) -> Result<Self, EngineError> {
        let values: Vec<i64> = pitches.iter().map(|&p| p as i64).collect();
        Self::parse_midi(&values)
    }

    /// Build from pitches already known to be sorted, unique and in range.
    pub(crate) fn from_sorted(pitches: Pitches) -> Self {
        debug_assert!(!pitches.is_empty());
        debug_assert!(pitches.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(pitches.iter().all(|&p| p <= MAX_PITCH));
        Chord { pitches }
    }

    pub fn pitches(&self) -> &[u8] {
        &self.pitches
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    /// Always false for a constructed chord; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn lowest(&self) -> u8 {
        self.pitches[0]
    }

    pub fn highest(&self) -> u8 {
        self.pitches[self.pitches.len() - 1]
    }

    pub fn pc_mask(&self) -> u16 {
        pc_mask(&self.pitches)
    }

    pub fn pitch_mask(&self) -> u128 {
        pitch_mask(&self.pitches)
    }
}

impl TryFrom<Vec<i64>> for Chord {
    type Error = EngineError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Chord::parse_midi(&values)
    }
}

impl From<Chord> for Vec<u8> {
    fn from(chord: Chord) -> Self {
        chord.pitches.into_vec()
    }
}

/// Pitch class (0-11) of a MIDI pitch.
pub fn pitch_class(pitch: u8) -> u8 {
    pitch % 12
}

/// Bitmask of the pitch classes present.
pub fn pc_mask(pitches: &[u8]) -> u16 {
    pitches.iter().fold(0u16, |mask, &p| mask | (1 << (p % 12)))
}

/// Bitmask of the exact pitches present.
pub fn pitch_mask(pitches: &[u8]) -> u128 {
    pitches.iter().fold(0u128, |mask, &p| mask | (1u128 << p))
}

/// Pitch classes present in a mask, ascending.
pub fn mask_pitch_classes(mask: u16) -> SmallVec<[u8; 12]> {
    (0..12u8).filter(|pc| mask & (1 << pc) != 0).collect()
}

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Sharp spelling of a pitch class ("C", "C#", ...).
pub fn pc_name(pc: u8) -> &'static str {
    SHARP_NAMES[(pc % 12) as usize]
}

/// Note name with octave, sharp spelling, middle C = "C4".
pub fn note_name(pitch: u8) -> String {
    let octave = (pitch / 12) as i16 - 1;
    format!("{}{}", pc_name(pitch % 12), octave)
}

/// Space-separated note names of a pitch list ("C4 E4 G4").
pub fn names_with_octave(pitches: &[u8]) -> String {
    let names: Vec<String> = pitches.iter().map(|&p| note_name(p)).collect();
    names.join(" ")
}

/// Parse a note name such as "C4", "F#3", "Bb2" or "E-5" into a MIDI pitch.
///
/// Accepts `#` for sharp and `b` or `-` for flat. Returns `None` for
/// anything unparsable or outside 0..=127.
///
/// Octaves are unsigned, so the octave -1 names that `note_name` prints for
/// pitches 0..=11 do not parse back: "C-1" reads as C flat 1 (23). Use MIDI
/// numbers for those pitches.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars();
    let step = match chars.next()?.to_ascii_uppercase() {
        'C' => 0i32,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (accidental, digits) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') | Some('-') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let octave: i32 = digits.parse().ok()?;
    let midi = (octave + 1) * 12 + step + accidental;
    if (0..=MAX_PITCH as i32).contains(&midi) {
        Some(midi as u8)
    } else {
        None
    }
}

/// Interval helpers over pitches and pitch classes.
pub mod interval {
    /// Interval class (0-6) of a semitone distance: the distance mod 12,
    /// folded so that inversions share a class.
    pub fn interval_class(semitones: u8) -> u8 {
        let d = semitones % 12;
        if d > 6 { 12 - d } else { d }
    }

    /// Signed pitch-class motion from one pitch to another, in -5..=6.
    ///
    /// This is the octave-equivalent displacement of a voice: the shortest
    /// way round the pitch-class circle, with the tritone counted upward.
    pub fn pc_motion(from: u8, to: u8) -> i8 {
        let d = ((to % 12) as i8 - (from % 12) as i8).rem_euclid(12);
        if d > 6 { d - 12 } else { d }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chord_is_sorted_and_deduplicated() {
        let chord = Chord::parse_midi(&[67, 60, 64, 60]).unwrap();
        assert_eq!(chord.pitches(), &[60, 64, 67]);
        assert_eq!(chord.lowest(), 60);
        assert_eq!(chord.highest(), 67);
    }

    #[test]
    fn test_chord_rejects_empty_and_out_of_range() {
        assert!(matches!(
            Chord::parse_midi(&[]),
            Err(EngineError::InvalidChord { .. })
        ));
        assert!(matches!(
            Chord::parse_midi(&[60, 128]),
            Err(EngineError::InvalidChord { .. })
        ));
        assert!(matches!(
            Chord::parse_midi(&[-1]),
            Err(EngineError::InvalidChord { .. })
        ));
    }

    #[test]
    fn test_chord_serde_validates() {
        let chord: Chord = serde_json::from_str("[64, 60, 67]").unwrap();
        assert_eq!(chord.pitches(), &[60, 64, 67]);
        assert!(serde_json::from_str::<Chord>("[200]").is_err());
        assert_eq!(serde_json::to_string(&chord).unwrap(), "[60,64,67]");
    }

    #[test]
    fn test_masks() {
        let chord = Chord::from_midi(&[48, 60, 64]).unwrap();
        assert_eq!(chord.pc_mask(), 0b1_0001);
        assert_eq!(chord.pitch_mask().count_ones(), 3);
        assert_eq!(mask_pitch_classes(chord.pc_mask()).as_slice(), &[0, 4]);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
        assert_eq!(names_with_octave(&[65, 69, 72]), "F4 A4 C5");
    }

    #[test]
    fn test_parse_note_name() {
        assert_eq!(parse_note_name("C4"), Some(60));
        assert_eq!(parse_note_name("c#4"), Some(61));
        assert_eq!(parse_note_name("Db4"), Some(61));
        assert_eq!(parse_note_name("E-4"), Some(63));
        assert_eq!(parse_note_name("H4"), None);
        assert_eq!(parse_note_name("C"), None);
        assert_eq!(parse_note_name("G10"), None);
    }

    #[test]
    fn test_octave_minus_one_is_read_as_flat() {
        assert_eq!(note_name(0), "C-1");
        assert_eq!(parse_note_name("C-1"), Some(23));
        assert_eq!(parse_note_name("C#-1"), None);
    }

    #[test]
    fn test_interval_helpers() {
        assert_eq!(interval::interval_class(7), 5); // P5 ~ P4
        assert_eq!(interval::interval_class(13), 1); // m9 ~ m2
        assert_eq!(interval::interval_class(6), 6);
        assert_eq!(interval::pc_motion(60, 65), 5);
        assert_eq!(interval::pc_motion(60, 67), -5);
        assert_eq!(interval::pc_motion(64, 65), 1);
        assert_eq!(interval::pc_motion(60, 72), 0);
        assert_eq!(interval::pc_motion(60, 66), 6);
        assert_eq!(interval::pc_motion(66, 60), 6);
    }
}
