// Pairwise (bigram) evaluation of an antecedent and a consequent chord.
//
// `evaluate` combines the two chords' descriptors with their voice-leading
// result into `BigramStats`: tension and tension change, chroma (interval
// content similarity), chroma_old (pitch-class histogram similarity), common
// notes, sv, similarity, the Q indicator, spans, and the root movement. The
// naming fields (`root_name`, `name`, `name_with_octave`) describe the
// consequent, since that is the chord a listener is choosing.
//
// Stateless and deterministic: identical inputs give identical outputs.

use serde::{Deserialize, Serialize};

use crate::descriptor::ChordStats;
use crate::naming::chord_name;
use crate::pitch::{names_with_octave, pc_name};
use crate::scoring::{ScoringPolicy, cosine_percent, round2};
use crate::voice_leading::VoiceLeadingResult;

/// Interval class of the motion between two roots, by direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootMovement {
    Same,
    UpSemitone,
    UpStep,
    UpMinorThird,
    UpMajorThird,
    UpFourth,
    Tritone,
    DownFourth,
    DownMajorThird,
    DownMinorThird,
    DownStep,
    DownSemitone,
}

impl RootMovement {
    const BY_INTERVAL: [RootMovement; 12] = [
        RootMovement::Same,
        RootMovement::UpSemitone,
        RootMovement::UpStep,
        RootMovement::UpMinorThird,
        RootMovement::UpMajorThird,
        RootMovement::UpFourth,
        RootMovement::Tritone,
        RootMovement::DownFourth,
        RootMovement::DownMajorThird,
        RootMovement::DownMinorThird,
        RootMovement::DownStep,
        RootMovement::DownSemitone,
    ];

    /// Classify the motion from root `from` to root `to` (pitch classes).
    pub fn between(from: u8, to: u8) -> Self {
        Self::BY_INTERVAL[((to % 12 + 12 - from % 12) % 12) as usize]
    }

    /// Upward interval in semitones (0..=11) this class stands for.
    pub fn semitones(self) -> u8 {
        Self::BY_INTERVAL
            .iter()
            .position(|&rm| rm == self)
            .map_or(0, |i| i as u8)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RootMovement::Same => "same",
            RootMovement::UpSemitone => "up_semitone",
            RootMovement::UpStep => "up_step",
            RootMovement::UpMinorThird => "up_minor_third",
            RootMovement::UpMajorThird => "up_major_third",
            RootMovement::UpFourth => "up_fourth",
            RootMovement::Tritone => "tritone",
            RootMovement::DownFourth => "down_fourth",
            RootMovement::DownMajorThird => "down_major_third",
            RootMovement::DownMinorThird => "down_minor_third",
            RootMovement::DownStep => "down_step",
            RootMovement::DownSemitone => "down_semitone",
        }
    }
}

/// Pairwise descriptors of a progression step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigramStats {
    pub name_with_octave: String,
    pub name: Option<String>,
    pub root_name: Option<String>,
    /// Consequent tension.
    pub tension: f64,
    pub tension_delta: f64,
    pub chroma: f64,
    pub chroma_old: f64,
    pub common_note: u32,
    pub sv: u32,
    pub similarity: u32,
    pub q_indicator: f64,
    pub span: u32,
    pub sspan: u32,
    pub root_movement: Option<RootMovement>,
}

/// Evaluate the step `ante -> post`.
pub fn evaluate<S: ScoringPolicy + ?Sized>(
    ante: &ChordStats,
    post: &ChordStats,
    vl: &VoiceLeadingResult,
    scoring: &S,
) -> BigramStats {
    let chroma = scoring.chroma(&ante.count_vec, &post.count_vec);
    let chroma_old = cosine_percent(&ante.pc_histogram, &post.pc_histogram);
    let common_note = (ante.pc_mask() & post.pc_mask()).count_ones();
    let similarity = scoring.similarity(chroma, common_note, ante.m().max(post.m()));
    let tension_delta = round2(post.tension - ante.tension);
    let q_indicator = scoring.q_indicator(similarity, vl.sv, tension_delta);

    let lo = ante.notes.first().min(post.notes.first()).copied().unwrap_or(0);
    let hi = ante.notes.last().max(post.notes.last()).copied().unwrap_or(0);

    let root_movement = match (ante.root, post.root) {
        (Some(a), Some(b)) => Some(RootMovement::between(a, b)),
        _ => None,
    };

    BigramStats {
        name_with_octave: names_with_octave(&post.notes),
        name: chord_name(post.pc_mask(), post.root),
        root_name: post.root.map(|r| pc_name(r).to_string()),
        tension: post.tension,
        tension_delta,
        chroma,
        chroma_old,
        common_note,
        sv: vl.sv,
        similarity,
        q_indicator,
        span: post.span(),
        sspan: (hi - lo) as u32,
        root_movement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::describe;
    use crate::pitch::Chord;
    use crate::scoring::StandardScoring;
    use crate::voice_leading::{AlignmentWindow, lead};

    fn step(ante: &[u8], post: &[u8]) -> BigramStats {
        let scoring = StandardScoring::default();
        let a = describe(&Chord::from_midi(ante).unwrap(), &scoring);
        let b = describe(&Chord::from_midi(post).unwrap(), &scoring);
        let vl = lead(ante, post, &AlignmentWindow::default()).unwrap();
        evaluate(&a, &b, &vl, &scoring)
    }

    #[test]
    fn test_c_major_to_f_major() {
        let bg = step(&[60, 64, 67], &[65, 69, 72]);
        assert_eq!(bg.sv, 3);
        assert_eq!(bg.chroma, 100.0);
        assert_eq!(bg.common_note, 1);
        assert_eq!(bg.similarity, 67);
        assert_eq!(bg.q_indicator, 58.0);
        assert_eq!(bg.tension_delta, 0.0);
        assert_eq!(bg.span, 7);
        assert_eq!(bg.sspan, 12);
        assert_eq!(bg.root_movement, Some(RootMovement::UpFourth));
        assert_eq!(bg.root_name.as_deref(), Some("F"));
        assert_eq!(bg.name.as_deref(), Some("F"));
        assert_eq!(bg.name_with_octave, "F4 A4 C5");
    }

    #[test]
    fn test_identical_chords() {
        let bg = step(&[60, 64, 67], &[60, 64, 67]);
        assert_eq!(bg.sv, 0);
        assert_eq!(bg.similarity, 100);
        assert_eq!(bg.chroma_old, 100.0);
        assert_eq!(bg.root_movement, Some(RootMovement::Same));
        assert_eq!(bg.q_indicator, 100.0);
    }

    #[test]
    fn test_rootless_consequent_has_no_movement() {
        let bg = step(&[60, 64, 67], &[60, 66]);
        assert_eq!(bg.root_movement, None);
        assert_eq!(bg.root_name, None);
        assert_eq!(bg.name, None);
    }

    #[test]
    fn test_root_movement_classes() {
        assert_eq!(RootMovement::between(0, 7), RootMovement::DownFourth);
        assert_eq!(RootMovement::between(7, 0), RootMovement::UpFourth);
        assert_eq!(RootMovement::between(11, 0), RootMovement::UpSemitone);
        assert_eq!(RootMovement::UpMinorThird.semitones(), 3);
        let json = serde_json::to_string(&RootMovement::DownMajorThird).unwrap();
        assert_eq!(json, "\"down_major_third\"");
        assert_eq!(RootMovement::DownMajorThird.as_str(), "down_major_third");
    }
}
