// Single-chord descriptors.
//
// `describe` turns a validated `Chord` into an immutable `ChordStats`
// snapshot: cardinalities, pitch-class histogram, interval-class vector,
// root, tension, thickness, geometrical center, alignment (chord-degree
// labels) and self-diff (spacing profile). Root, tension and thickness come
// from the `ScoringPolicy`; the rest are fixed set arithmetic.
//
// ChordStats is computed fresh for every candidate the enumerator visits,
// so this module avoids heap allocation for chords of up to twelve pitches.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::pitch::{Chord, Pitches, interval, pc_name};
use crate::scoring::{ScoringPolicy, round2};

/// Chord-degree label of each interval above the root (0..=11).
const DEGREE_LABELS: [u8; 12] = [1, 9, 9, 3, 3, 11, 5, 5, 13, 13, 7, 7];

/// Derived metrics of one chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordStats {
    /// Sorted pitches.
    pub notes: Pitches,
    /// `n`: pitch count.
    pub num_of_pitches: u32,
    /// `m`: distinct pitch classes.
    pub num_of_unique_pitch_classes: u32,
    pub pc_histogram: [u32; 12],
    /// Interval-class vector over distinct pitch classes (bin = ic - 1).
    pub count_vec: [u32; 6],
    pub root: Option<u8>,
    pub tension: f64,
    pub thickness: f64,
    pub geometrical_center: f64,
    pub alignment: SmallVec<[u8; 12]>,
    pub self_diff: SmallVec<[u8; 12]>,
}

impl ChordStats {
    pub fn pc_mask(&self) -> u16 {
        self.pc_histogram
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .fold(0u16, |m, (pc, _)| m | (1 << pc))
    }

    pub fn n(&self) -> u32 {
        self.num_of_pitches
    }

    pub fn m(&self) -> u32 {
        self.num_of_unique_pitch_classes
    }

    /// Semitone range between the outer voices.
    pub fn span(&self) -> u32 {
        match (self.notes.first(), self.notes.last()) {
            (Some(lo), Some(hi)) => (hi - lo) as u32,
            _ => 0,
        }
    }

    pub fn root_name(&self) -> Option<&'static str> {
        self.root.map(pc_name)
    }

    /// Chord-degree label of the bass voice.
    pub fn bass_degree(&self) -> Option<u8> {
        self.alignment.first().copied()
    }
}

/// Describe a validated chord.
pub fn describe<S: ScoringPolicy + ?Sized>(chord: &Chord, scoring: &S) -> ChordStats {
    describe_pitches(chord.pitches(), scoring)
}

/// Describe a sorted, duplicate-free, non-empty pitch list.
pub(crate) fn describe_pitches<S: ScoringPolicy + ?Sized>(pitches: &[u8], scoring: &S) -> ChordStats {
    let mut pc_histogram = [0u32; 12];
    for &p in pitches {
        pc_histogram[(p % 12) as usize] += 1;
    }
    let present: SmallVec<[u8; 12]> = (0..12u8)
        .filter(|&pc| pc_histogram[pc as usize] > 0)
        .collect();

    let mut count_vec = [0u32; 6];
    for (i, &a) in present.iter().enumerate() {
        for &b in &present[i + 1..] {
            let ic = interval::interval_class(b - a);
            count_vec[(ic - 1) as usize] += 1;
        }
    }

    let root = scoring.root(pitches);
    let reference = root.unwrap_or_else(|| pitches.first().map_or(0, |&p| p % 12));
    let alignment = pitches
        .iter()
        .map(|&p| DEGREE_LABELS[((p % 12 + 12 - reference) % 12) as usize])
        .collect();
    let self_diff = pitches.windows(2).map(|w| w[1] - w[0]).collect();

    ChordStats {
        notes: Pitches::from_slice(pitches),
        num_of_pitches: pitches.len() as u32,
        num_of_unique_pitch_classes: present.len() as u32,
        pc_histogram,
        count_vec,
        root,
        tension: scoring.tension(pitches),
        thickness: scoring.thickness(pitches),
        geometrical_center: geometrical_center(pitches),
        alignment,
        self_diff,
    }
}

/// Circular mean of the pitch classes as a percentage of the circle.
/// Symmetric chords (vanishing resultant) sit at 0.
fn geometrical_center(pitches: &[u8]) -> f64 {
    let (mut x, mut y) = (0.0f64, 0.0f64);
    for &p in pitches {
        let angle = TAU * (p % 12) as f64 / 12.0;
        x += angle.cos();
        y += angle.sin();
    }
    if x.hypot(y) < 1e-9 {
        return 0.0;
    }
    let angle = y.atan2(x).rem_euclid(TAU);
    let pct = round2(100.0 * angle / TAU);
    if pct >= 100.0 { 0.0 } else { pct }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::StandardScoring;

    fn stats(pitches: &[u8]) -> ChordStats {
        describe(&Chord::from_midi(pitches).unwrap(), &StandardScoring::default())
    }

    #[test]
    fn test_c_major_triad() {
        let s = stats(&[60, 64, 67]);
        assert_eq!(s.num_of_pitches, 3);
        assert_eq!(s.num_of_unique_pitch_classes, 3);
        assert_eq!(s.count_vec, [0, 0, 1, 1, 1, 0]);
        assert_eq!(s.root, Some(0));
        assert_eq!(s.root_name(), Some("C"));
        assert_eq!(s.tension, 18.33);
        assert_eq!(s.thickness, 0.0);
        assert_eq!(s.geometrical_center, 37.5);
        assert_eq!(s.alignment.as_slice(), &[1, 3, 5]);
        assert_eq!(s.self_diff.as_slice(), &[4, 3]);
        assert_eq!(s.span(), 7);
    }

    #[test]
    fn test_doubled_and_inverted_chord() {
        // E3 C4 G4 C5: first inversion with a doubled root.
        let s = stats(&[52, 60, 67, 72]);
        assert_eq!(s.num_of_pitches, 4);
        assert_eq!(s.num_of_unique_pitch_classes, 3);
        assert_eq!(s.root, Some(0));
        assert_eq!(s.alignment.as_slice(), &[3, 1, 5, 1]);
        assert_eq!(s.bass_degree(), Some(3));
        assert_eq!(s.thickness, 10.0);
        assert_eq!(s.pc_mask(), 0b1001_0001);
    }

    #[test]
    fn test_single_pitch() {
        let s = stats(&[60]);
        assert_eq!(s.count_vec, [0; 6]);
        assert_eq!(s.tension, 0.0);
        assert_eq!(s.geometrical_center, 0.0);
        assert!(s.self_diff.is_empty());
        assert_eq!(s.alignment.as_slice(), &[1]);
    }

    #[test]
    fn test_symmetric_chord_center_is_zero() {
        // Augmented triad: evenly spaced around the circle.
        assert_eq!(stats(&[60, 64, 68]).geometrical_center, 0.0);
    }

    #[test]
    fn test_rootless_chord_aligns_to_bass() {
        let s = stats(&[62, 68]);
        assert_eq!(s.root, None);
        assert_eq!(s.root_name(), None);
        assert_eq!(s.alignment.as_slice(), &[1, 5]);
    }
}
