// Request and response documents.
//
// One request struct per operation, plus the `Request` envelope tagged by
// `op` for line-delimited serving. Chords arrive as integer MIDI numbers and
// are validated by the engine, so an out-of-range pitch is an
// `invalid_chord` error while a non-numeric one is a `parse` error.
//
// Responses are serialize-only. A generated candidate or a substitute is
// flattened into one `stats` object holding both the chord's own
// descriptors and the bigram metrics of the step it takes part in; fields
// that do not apply (no detectable root) serialize as null.

use chord_nova_core::config::{ProgressionConfig, SubstitutionConfig};
use chord_nova_core::naming::chord_name;
use chord_nova_core::pitch::names_with_octave;
use chord_nova_core::scoring::{RootPolicy, ScoringWeights, StandardScoring};
use chord_nova_core::{
    Analysis, BigramStats, Candidate, ChordStats, RootMovement, Side, SubstituteEntry, SubstitutePair,
};
use serde::{Deserialize, Serialize};

/// Scoring policy selection carried by a request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringDoc {
    pub root_policy: RootPolicy,
    pub weights: ScoringWeights,
}

impl ScoringDoc {
    pub fn scoring(&self) -> StandardScoring {
        StandardScoring::new(self.weights.clone(), self.root_policy)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub chord: Vec<i64>,
    #[serde(default)]
    pub config: ProgressionConfig,
    #[serde(default)]
    pub scoring: ScoringDoc,
    /// Scan cardinality partitions on the thread pool.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyseRequest {
    pub ante: Vec<i64>,
    pub post: Vec<i64>,
    #[serde(default)]
    pub scoring: ScoringDoc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubstituteRequest {
    pub ante: Vec<i64>,
    pub post: Vec<i64>,
    #[serde(default)]
    pub config: SubstitutionConfig,
    #[serde(default)]
    pub scoring: ScoringDoc,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Envelope for one line of `serve` input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Generate(GenerateRequest),
    Analyse(AnalyseRequest),
    Substitute(SubstituteRequest),
}

/// Chord descriptors and step metrics of one generated candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateStats {
    pub notes: Vec<u8>,
    pub name_with_octave: String,
    pub name: Option<String>,
    pub root: Option<u8>,
    pub root_name: Option<String>,
    pub num_of_pitches: u32,
    pub num_of_unique_pitch_classes: u32,
    pub count_vec: [u32; 6],
    pub thickness: f64,
    pub geometrical_center: f64,
    pub alignment: Vec<u8>,
    pub self_diff: Vec<u8>,
    pub tension: f64,
    pub tension_delta: f64,
    pub chroma: f64,
    pub chroma_old: f64,
    pub common_note: u32,
    pub sv: u32,
    pub vec: Vec<i8>,
    pub similarity: u32,
    pub q_indicator: f64,
    pub span: u32,
    pub sspan: u32,
    pub root_movement: Option<RootMovement>,
}

impl CandidateStats {
    /// `chord` described on its own, together with the metrics of `step`,
    /// the progression step it takes part in.
    fn flatten(chord: &ChordStats, step: &BigramStats, vec: &[i8]) -> Self {
        CandidateStats {
            notes: chord.notes.to_vec(),
            name_with_octave: names_with_octave(&chord.notes),
            name: chord_name(chord.pc_mask(), chord.root),
            root: chord.root,
            root_name: chord.root_name().map(str::to_string),
            num_of_pitches: chord.num_of_pitches,
            num_of_unique_pitch_classes: chord.num_of_unique_pitch_classes,
            count_vec: chord.count_vec,
            thickness: chord.thickness,
            geometrical_center: chord.geometrical_center,
            alignment: chord.alignment.to_vec(),
            self_diff: chord.self_diff.to_vec(),
            tension: chord.tension,
            tension_delta: step.tension_delta,
            chroma: step.chroma,
            chroma_old: step.chroma_old,
            common_note: step.common_note,
            sv: step.sv,
            vec: vec.to_vec(),
            similarity: step.similarity,
            q_indicator: step.q_indicator,
            span: step.span,
            sspan: step.sspan,
            root_movement: step.root_movement,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateDoc {
    pub stats: CandidateStats,
}

impl From<&Candidate> for CandidateDoc {
    fn from(c: &Candidate) -> Self {
        CandidateDoc {
            stats: CandidateStats::flatten(&c.stats, &c.bigram, &c.vl.vec),
        }
    }
}

/// A substitute chord. `stats` describes the substitute itself; its step
/// metrics are those of the progression with the substitute in place.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubstituteEntryDoc {
    pub side: Side,
    pub stats: CandidateStats,
    pub sim_orig: u32,
}

impl From<&SubstituteEntry> for SubstituteEntryDoc {
    fn from(e: &SubstituteEntry) -> Self {
        SubstituteEntryDoc {
            side: e.side,
            stats: CandidateStats::flatten(&e.stats, &e.bigram, &e.vl.vec),
            sim_orig: e.sim_orig,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubstitutePairDoc {
    pub ante: SubstituteEntryDoc,
    pub post: SubstituteEntryDoc,
    /// The step from the ante substitute to the post substitute.
    pub bigram: BigramStats,
}

impl From<&SubstitutePair> for SubstitutePairDoc {
    fn from(p: &SubstitutePair) -> Self {
        SubstitutePairDoc {
            ante: SubstituteEntryDoc::from(&p.ante),
            post: SubstituteEntryDoc::from(&p.post),
            bigram: p.bigram.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerateResponse {
    pub candidates: Vec<CandidateDoc>,
    pub total_evaluated: u64,
    pub interrupted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubstituteResponse {
    pub entries: Vec<SubstituteEntryDoc>,
    pub pairs: Vec<SubstitutePairDoc>,
    pub total_evaluated: u64,
    pub interrupted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub category: String,
}

/// Any response document.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Generate(GenerateResponse),
    Analyse(Box<Analysis>),
    Substitute(SubstituteResponse),
    Error(ErrorResponse),
}
