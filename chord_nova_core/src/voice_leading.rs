// Voice-leading analysis between two chords.
//
// Voices move octave-equivalently: the displacement of a voice is the
// signed pitch-class motion from its antecedent pitch to the consequent
// pitch it is paired with, in -5..=6 (see `interval::pc_motion`). `sv` is
// the sum of absolute displacements.
//
// Equal cardinality: every admissible permutation of consequent voices onto
// antecedent voices is a candidate pairing. The winner minimises sv, then
// the largest single displacement, then the displacement vector
// lexicographically. The vector is indexed by antecedent voice in pitch
// order. The best cyclic rotation of the pitch-class orders seeds a
// branch-and-bound search over the permutations.
//
// Unequal cardinality: each antecedent voice goes to its nearest consequent
// voice, then each consequent voice nobody reached is fed from its nearest
// antecedent voice. Ties go to the lower index. `vec` lists antecedent
// pairs first, then the extra pairs.
//
// The alignment window restricts which (antecedent index, consequent index)
// pairs are admissible. In `Interval` mode a pair must satisfy
// i_min <= |i - j| <= i_max; `Unlimited` and `List` admit every pair. If no
// admissible pairing exists the analysis fails with `IncompatibleAlignment`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::EngineError;
use crate::pitch::interval::pc_motion;

/// Policy for pairing voices of chords with different cardinalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlignMode {
    #[default]
    Unlimited,
    Interval,
    List,
}

/// Which voice pairs the analyzer may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentWindow {
    pub mode: AlignMode,
    pub i_min: usize,
    pub i_max: usize,
}

impl Default for AlignmentWindow {
    fn default() -> Self {
        AlignmentWindow {
            mode: AlignMode::Unlimited,
            i_min: 0,
            i_max: 24,
        }
    }
}

impl AlignmentWindow {
    fn admits(&self, i: usize, j: usize) -> bool {
        match self.mode {
            AlignMode::Interval => {
                let d = i.abs_diff(j);
                self.i_min <= d && d <= self.i_max
            }
            AlignMode::Unlimited | AlignMode::List => true,
        }
    }
}

/// Per-voice displacement and aggregate distance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceLeadingResult {
    pub vec: SmallVec<[i8; 16]>,
    pub sv: u32,
}

impl VoiceLeadingResult {
    fn from_vec(vec: SmallVec<[i8; 16]>) -> Self {
        let sv = vec.iter().map(|d| d.unsigned_abs() as u32).sum();
        VoiceLeadingResult { vec, sv }
    }

    /// Largest single-voice displacement.
    pub fn max_motion(&self) -> u32 {
        self.vec.iter().map(|d| d.unsigned_abs() as u32).max().unwrap_or(0)
    }
}

/// Analyse the voice leading from `ante` to `post` (both sorted).
pub fn lead(ante: &[u8], post: &[u8], window: &AlignmentWindow) -> Result<VoiceLeadingResult, EngineError> {
    let found = if ante.len() == post.len() {
        lead_equal(ante, post, window)
    } else {
        lead_unequal(ante, post, window)
    };
    found.ok_or(EngineError::IncompatibleAlignment {
        ante_len: ante.len(),
        post_len: post.len(),
        i_min: window.i_min,
        i_max: window.i_max,
    })
}

/// Voice indices sorted by (pitch class, pitch).
fn pc_order(pitches: &[u8]) -> SmallVec<[usize; 12]> {
    let mut order: SmallVec<[usize; 12]> = (0..pitches.len()).collect();
    order.sort_by_key(|&i| (pitches[i] % 12, pitches[i]));
    order
}

type Ranked = (u32, u32, SmallVec<[i8; 16]>);

fn rank(vec: SmallVec<[i8; 16]>) -> Ranked {
    let sv = vec.iter().map(|d| d.unsigned_abs() as u32).sum();
    let max = vec.iter().map(|d| d.unsigned_abs() as u32).max().unwrap_or(0);
    (sv, max, vec)
}

/// Best admissible cyclic rotation of the pitch-class orders. Rotations
/// reach the minimal sv cheaply, which makes them a tight starting bound.
fn best_rotation(ante: &[u8], post: &[u8], window: &AlignmentWindow) -> Option<Ranked> {
    let n = ante.len();
    let a_ord = pc_order(ante);
    let p_ord = pc_order(post);

    let mut best: Option<Ranked> = None;
    'rotation: for r in 0..n {
        let mut vec: SmallVec<[i8; 16]> = SmallVec::from_elem(0, n);
        for k in 0..n {
            let i = a_ord[k];
            let j = p_ord[(k + r) % n];
            if !window.admits(i, j) {
                continue 'rotation;
            }
            vec[i] = pc_motion(ante[i], post[j]);
        }
        let ranked = rank(vec);
        if best.as_ref().is_none_or(|b| ranked < *b) {
            best = Some(ranked);
        }
    }
    best
}

/// Depth-first search over permutations, antecedent voice by voice.
struct PairingSearch {
    /// Per antecedent voice: admissible (motion, consequent voice), motion
    /// ascending, so vectors are visited in lexicographic order.
    options: Vec<SmallVec<[(i8, usize); 16]>>,
    /// `floor[i]`: least possible sv of voices `i..`.
    floor: SmallVec<[u32; 17]>,
    used: SmallVec<[bool; 16]>,
    vec: SmallVec<[i8; 16]>,
    best: Option<Ranked>,
}

impl PairingSearch {
    fn visit(&mut self, i: usize, sv: u32, max: u32) {
        if i == self.options.len() {
            let ranked = (sv, max, self.vec.clone());
            if self.best.as_ref().is_none_or(|b| ranked < *b) {
                self.best = Some(ranked);
            }
            return;
        }
        for k in 0..self.options[i].len() {
            let (d, j) = self.options[i][k];
            if self.used[j] {
                continue;
            }
            let sv = sv + d.unsigned_abs() as u32;
            let max = max.max(d.unsigned_abs() as u32);
            self.vec.push(d);
            if !self.pruned(i, sv, max) {
                self.used[j] = true;
                self.visit(i + 1, sv, max);
                self.used[j] = false;
            }
            self.vec.pop();
        }
    }

    /// Can no completion of the current prefix (voices `..=i`) beat the
    /// incumbent?
    fn pruned(&self, i: usize, sv: u32, max: u32) -> bool {
        let Some((bsv, bmax, bvec)) = &self.best else {
            return false;
        };
        let bound = sv + self.floor[i + 1];
        if bound != *bsv {
            return bound > *bsv;
        }
        if max != *bmax {
            return max > *bmax;
        }
        self.vec.as_slice() > &bvec[..=i]
    }
}

fn lead_equal(ante: &[u8], post: &[u8], window: &AlignmentWindow) -> Option<VoiceLeadingResult> {
    let n = ante.len();
    if n == 0 {
        return Some(VoiceLeadingResult::from_vec(SmallVec::new()));
    }
    let mut options = Vec::with_capacity(n);
    for i in 0..n {
        let mut row: SmallVec<[(i8, usize); 16]> = (0..n)
            .filter(|&j| window.admits(i, j))
            .map(|j| (pc_motion(ante[i], post[j]), j))
            .collect();
        if row.is_empty() {
            return None;
        }
        row.sort();
        options.push(row);
    }
    let mut floor: SmallVec<[u32; 17]> = SmallVec::from_elem(0, n + 1);
    for i in (0..n).rev() {
        let least = options[i].iter().map(|(d, _)| d.unsigned_abs() as u32).min().unwrap_or(0);
        floor[i] = floor[i + 1] + least;
    }

    let mut search = PairingSearch {
        options,
        floor,
        used: SmallVec::from_elem(false, n),
        vec: SmallVec::new(),
        best: best_rotation(ante, post, window),
    };
    search.visit(0, 0, 0);
    search.best.map(|(_, _, vec)| VoiceLeadingResult::from_vec(vec))
}

/// Nearest admissible voice of `to` for a voice `from_idx` of `from`.
/// Returns the signed motion in the `from -> to` direction.
fn nearest(
    from: &[u8],
    to: &[u8],
    from_idx: usize,
    admits: impl Fn(usize, usize) -> bool,
) -> Option<(usize, i8)> {
    let mut best: Option<(usize, i8)> = None;
    for (j, &p) in to.iter().enumerate() {
        if !admits(from_idx, j) {
            continue;
        }
        let d = pc_motion(from[from_idx], p);
        if best.is_none_or(|(_, bd)| d.unsigned_abs() < bd.unsigned_abs()) {
            best = Some((j, d));
        }
    }
    best
}

fn lead_unequal(ante: &[u8], post: &[u8], window: &AlignmentWindow) -> Option<VoiceLeadingResult> {
    let mut vec: SmallVec<[i8; 16]> = SmallVec::new();
    let mut covered: SmallVec<[bool; 16]> = SmallVec::from_elem(false, post.len());

    for i in 0..ante.len() {
        let (j, d) = nearest(ante, post, i, |a, p| window.admits(a, p))?;
        covered[j] = true;
        vec.push(d);
    }
    for j in 0..post.len() {
        if covered[j] {
            continue;
        }
        // Search from the consequent side, then flip the motion back to
        // antecedent -> consequent.
        let (_, d) = nearest(post, ante, j, |p, a| window.admits(a, p))?;
        vec.push(pc_motion_back(d));
    }
    Some(VoiceLeadingResult::from_vec(vec))
}

/// Reverse a pitch-class motion while keeping it in -5..=6.
fn pc_motion_back(d: i8) -> i8 {
    if d == 6 { 6 } else { -d }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlimited() -> AlignmentWindow {
        AlignmentWindow::default()
    }

    #[test]
    fn test_c_major_to_f_major() {
        let vl = lead(&[60, 64, 67], &[65, 69, 72], &unlimited()).unwrap();
        assert_eq!(vl.vec.as_slice(), &[0, 1, 2]);
        assert_eq!(vl.sv, 3);
        assert_eq!(vl.max_motion(), 2);
    }

    #[test]
    fn test_identity_has_zero_distance() {
        let chord = [48, 55, 64, 70];
        let vl = lead(&chord, &chord, &unlimited()).unwrap();
        assert_eq!(vl.sv, 0);
        assert!(vl.vec.iter().all(|&d| d == 0));
    }

    #[test]
    fn test_pairing_with_least_motion_wins() {
        // C E -> D F#: the pairings give (+2, +2) or (+6, -2).
        let vl = lead(&[60, 64], &[62, 66], &unlimited()).unwrap();
        assert_eq!(vl.vec.as_slice(), &[2, 2]);
        assert_eq!(vl.sv, 4);
    }

    #[test]
    fn test_tie_break_looks_past_rotations() {
        // Same sv and max motion as the best rotation, smaller vector.
        let vl = lead(&[52, 57, 60, 71], &[51, 54, 61, 74], &unlimited()).unwrap();
        assert_eq!(vl.vec.as_slice(), &[-1, -3, 1, 3]);
        assert_eq!(vl.sv, 8);
        assert_eq!(vl.max_motion(), 3);
    }

    #[test]
    fn test_unequal_cardinality_covers_every_voice() {
        // C E G -> C E G Bb: three ante pairs plus the extra seventh.
        let vl = lead(&[60, 64, 67], &[60, 64, 67, 70], &unlimited()).unwrap();
        assert_eq!(vl.vec.len(), 4);
        assert_eq!(&vl.vec[..3], &[0, 0, 0]);
        assert_eq!(vl.vec[3], -2); // C -> Bb
        assert_eq!(vl.sv, 2);

        // Collapsing: C E G -> C G.
        let vl = lead(&[60, 64, 67], &[60, 67], &unlimited()).unwrap();
        assert_eq!(vl.vec.as_slice(), &[0, 3, 0]);
    }

    #[test]
    fn test_interval_window_can_be_unsatisfiable() {
        let window = AlignmentWindow {
            mode: AlignMode::Interval,
            i_min: 5,
            i_max: 6,
        };
        let err = lead(&[60, 64, 67], &[65, 69, 72], &window).unwrap_err();
        assert_eq!(err.category(), "incompatible_alignment");
    }

    #[test]
    fn test_interval_window_restricts_pairing() {
        // Only index distance 0 is allowed: voices must keep their slot.
        let window = AlignmentWindow {
            mode: AlignMode::Interval,
            i_min: 0,
            i_max: 0,
        };
        let vl = lead(&[60, 64, 67], &[65, 69, 72], &window).unwrap();
        // 60->65, 64->69, 67->72: every voice up a fourth.
        assert_eq!(vl.vec.as_slice(), &[5, 5, 5]);
        assert_eq!(vl.sv, 15);
    }
}
