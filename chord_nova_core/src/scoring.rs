// Scoring policies: the numeric formulas behind root, tension, thickness,
// chroma, similarity and the composite quality indicator.
//
// The enumerator and substitution searcher never compute a score directly.
// They go through the `ScoringPolicy` trait, so an alternate weighting can
// be plugged into `Engine::with_scoring` without touching the search code.
// `StandardScoring` is the default implementation:
//
// Root (RootPolicy::Consonance): every pitch pair votes by its interval
//   mod 12, ranked P5 > P4 > M3 > m6 > m3 > M6 > M2 > m7 > m2 > M7, each
//   naming either its lower or upper pitch as root. Tritones and octaves
//   abstain. Best rank wins; ties go to the lowest pair. RootPolicy::Bass
//   just takes the bass pitch class.
// Tension: mean over pitch pairs of a per-interval-class dissonance weight,
//   damped by the number of octaves separating the pair, scaled to 0-100.
// Thickness: octave doublings, each worth `thickness_unit / octaves`.
// Chroma: cosine of two interval-class vectors, as a percentage.
// Similarity: chroma blended with the shared-pitch-class ratio.
// Q indicator: similarity minus voice-leading cost minus tension change.
//
// Every floating output is rounded to two decimals (`round2`) so equality
// windows are exact and results are reproducible across platforms.

use serde::{Deserialize, Serialize};

use crate::pitch::interval;

/// Round to two decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// 100 x cosine similarity of two count vectors.
///
/// Two zero vectors are identical (100); one zero vector against a
/// non-zero one shares nothing (0).
pub fn cosine_percent(a: &[u32], b: &[u32]) -> f64 {
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    match (na == 0.0, nb == 0.0) {
        (true, true) => 100.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => round2(100.0 * dot / (na.sqrt() * nb.sqrt())),
    }
}

/// How a chord's root is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RootPolicy {
    #[default]
    Consonance,
    Bass,
}

/// Tunable coefficients of `StandardScoring`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Dissonance weight per interval class 0..=6.
    pub interval_weights: [f64; 7],
    /// Per-octave damping of pair dissonance.
    pub octave_damping: f64,
    /// Thickness contributed by a doubling one octave apart.
    pub thickness_unit: f64,
    /// Share of `similarity` taken from chroma; the rest from common notes.
    pub chroma_share: f64,

    // Q indicator
    pub q_similarity: f64,
    pub q_sv: f64,
    pub q_tension: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            interval_weights: [0.0, 1.0, 0.6, 0.25, 0.2, 0.1, 0.8],
            octave_damping: 0.5,
            thickness_unit: 10.0,
            chroma_share: 0.5,

            q_similarity: 1.0,
            q_sv: 3.0,
            q_tension: 0.5,
        }
    }
}

impl ScoringWeights {
    /// Load weights from a JSON document. Missing fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// The scoring formulas used by descriptors and bigram evaluation.
///
/// Implementations must be deterministic and thread-safe: partitioned
/// generation calls them from several rayon workers at once.
pub trait ScoringPolicy: Sync {
    /// Root pitch class of a sorted pitch list, or `None` if undetectable.
    fn root(&self, pitches: &[u8]) -> Option<u8>;

    /// Tension in 0..=100.
    fn tension(&self, pitches: &[u8]) -> f64;

    /// Doubling density, 0 for a chord without octave doublings.
    fn thickness(&self, pitches: &[u8]) -> f64;

    /// Similarity of two interval-class vectors in 0..=100.
    fn chroma(&self, count_vec_a: &[u32; 6], count_vec_b: &[u32; 6]) -> f64 {
        cosine_percent(count_vec_a, count_vec_b)
    }

    /// Integer similarity percentage from chroma and shared pitch classes.
    fn similarity(&self, chroma: f64, common_note: u32, m_max: u32) -> u32;

    /// Composite ranking score.
    fn q_indicator(&self, similarity: u32, sv: u32, tension_delta: f64) -> f64;
}

/// Default scoring: fixed formulas parameterised by `ScoringWeights`.
#[derive(Debug, Clone, Default)]
pub struct StandardScoring {
    pub weights: ScoringWeights,
    pub root_policy: RootPolicy,
}

impl StandardScoring {
    pub fn new(weights: ScoringWeights, root_policy: RootPolicy) -> Self {
        StandardScoring {
            weights,
            root_policy,
        }
    }

    pub fn with_root_policy(root_policy: RootPolicy) -> Self {
        StandardScoring {
            weights: ScoringWeights::default(),
            root_policy,
        }
    }
}

/// Root vote of an interval (mod 12): rank (lower is stronger) and whether
/// the lower pitch of the pair is the root.
fn root_vote(semitones_mod12: u8) -> Option<(u8, bool)> {
    match semitones_mod12 {
        7 => Some((0, true)),
        5 => Some((1, false)),
        4 => Some((2, true)),
        8 => Some((3, false)),
        3 => Some((4, true)),
        9 => Some((5, false)),
        2 => Some((6, false)),
        10 => Some((7, true)),
        1 => Some((8, false)),
        11 => Some((9, true)),
        _ => None,
    }
}

fn consonance_root(pitches: &[u8]) -> Option<u8> {
    let first_pc = pitches.first()? % 12;
    if pitches.iter().all(|&p| p % 12 == first_pc) {
        return Some(first_pc);
    }
    let mut best: Option<(u8, u8)> = None; // (rank, root pc)
    for (i, &a) in pitches.iter().enumerate() {
        for &b in &pitches[i + 1..] {
            let (lo, hi) = (a.min(b), a.max(b));
            let Some((rank, lower_is_root)) = root_vote((hi - lo) % 12) else {
                continue;
            };
            // Strictly better only: the first pair found at a rank wins.
            if best.is_none_or(|(r, _)| rank < r) {
                let root = if lower_is_root { lo } else { hi };
                best = Some((rank, root % 12));
            }
        }
    }
    best.map(|(_, pc)| pc)
}

impl ScoringPolicy for StandardScoring {
    fn root(&self, pitches: &[u8]) -> Option<u8> {
        match self.root_policy {
            RootPolicy::Consonance => consonance_root(pitches),
            RootPolicy::Bass => pitches.first().map(|&p| p % 12),
        }
    }

    fn tension(&self, pitches: &[u8]) -> f64 {
        let w = &self.weights;
        let mut total = 0.0;
        let mut pairs = 0u32;
        for (i, &lo) in pitches.iter().enumerate() {
            for &hi in &pitches[i + 1..] {
                let d = hi.abs_diff(lo);
                let ic = interval::interval_class(d) as usize;
                let octaves = (d / 12) as f64;
                total += w.interval_weights[ic] / (1.0 + w.octave_damping * octaves);
                pairs += 1;
            }
        }
        if pairs == 0 {
            0.0
        } else {
            round2(100.0 * total / pairs as f64)
        }
    }

    fn thickness(&self, pitches: &[u8]) -> f64 {
        let mut total = 0.0;
        for (i, &lo) in pitches.iter().enumerate() {
            for &hi in &pitches[i + 1..] {
                let d = hi.abs_diff(lo);
                if d % 12 == 0 && d > 0 {
                    total += self.weights.thickness_unit / (d / 12) as f64;
                }
            }
        }
        round2(total)
    }

    fn similarity(&self, chroma: f64, common_note: u32, m_max: u32) -> u32 {
        let share = self.weights.chroma_share;
        let common = if m_max == 0 {
            0.0
        } else {
            100.0 * common_note as f64 / m_max as f64
        };
        (share * chroma + (1.0 - share) * common).round().max(0.0) as u32
    }

    fn q_indicator(&self, similarity: u32, sv: u32, tension_delta: f64) -> f64 {
        let w = &self.weights;
        round2(w.q_similarity * similarity as f64 - w.q_sv * sv as f64 - w.q_tension * tension_delta.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consonance_root_of_triads() {
        let s = StandardScoring::default();
        assert_eq!(s.root(&[60, 64, 67]), Some(0)); // C major
        assert_eq!(s.root(&[64, 67, 72]), Some(0)); // first inversion
        assert_eq!(s.root(&[67, 72, 76]), Some(0)); // second inversion
        assert_eq!(s.root(&[57, 60, 64]), Some(9)); // A minor
        assert_eq!(s.root(&[65, 69, 72]), Some(5)); // F major
    }

    #[test]
    fn test_root_edge_cases() {
        let s = StandardScoring::default();
        assert_eq!(s.root(&[60]), Some(0));
        assert_eq!(s.root(&[48, 60, 72]), Some(0));
        assert_eq!(s.root(&[60, 66]), None, "a bare tritone has no root");
        let bass = StandardScoring::with_root_policy(RootPolicy::Bass);
        assert_eq!(bass.root(&[64, 67, 72]), Some(4));
    }

    #[test]
    fn test_tension_of_major_triad() {
        let s = StandardScoring::default();
        assert_eq!(s.tension(&[60, 64, 67]), 18.33);
        assert_eq!(s.tension(&[60]), 0.0);
        // A minor second is the most tense interval.
        assert_eq!(s.tension(&[60, 61]), 100.0);
        // An octave of separation damps it.
        assert!(s.tension(&[60, 73]) < s.tension(&[60, 61]));
    }

    #[test]
    fn test_thickness_counts_doublings() {
        let s = StandardScoring::default();
        assert_eq!(s.thickness(&[60, 64, 67]), 0.0);
        assert_eq!(s.thickness(&[48, 60, 64]), 10.0);
        assert_eq!(s.thickness(&[48, 60, 72]), 25.0); // 10 + 10 + 10/2
    }

    #[test]
    fn test_cosine_percent() {
        assert_eq!(cosine_percent(&[0, 0, 1, 1, 1, 0], &[0, 0, 1, 1, 1, 0]), 100.0);
        assert_eq!(cosine_percent(&[0; 6], &[0; 6]), 100.0);
        assert_eq!(cosine_percent(&[0; 6], &[1, 0, 0, 0, 0, 0]), 0.0);
        assert_eq!(cosine_percent(&[1, 0], &[0, 1]), 0.0);
    }

    #[test]
    fn test_similarity_and_q() {
        let s = StandardScoring::default();
        // C major -> F major: identical interval content, one shared note.
        let x = s.similarity(100.0, 1, 3);
        assert_eq!(x, 67);
        assert_eq!(s.q_indicator(x, 3, 0.0), 58.0);
        assert_eq!(s.q_indicator(100, 0, -4.0), 98.0);
    }

    #[test]
    fn test_partial_weights_json() {
        let w = ScoringWeights::from_json(r#"{"q_sv": 1.0}"#).unwrap();
        assert_eq!(w.q_sv, 1.0);
        assert_eq!(w.octave_damping, 0.5);
        assert!(ScoringWeights::from_json("{not json").is_err());
    }
}
