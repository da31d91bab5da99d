// Search configuration documents.
//
// `ProgressionConfig` drives generation and `SubstitutionConfig` drives the
// substitution searcher. Both are plain serde values whose sections default
// field by field, so a request may carry only the fields it changes.
//
// Every `*_min` / `*_max` pair is an inclusive window. A document with an
// inverted window (min > max) is accepted: the dimension is simply
// unsatisfiable and the search returns nothing. Code that builds a config
// programmatically goes through `ProgressionConfigBuilder`, whose `build()`
// rejects inverted windows up front.
//
// `validate()` catches the hard incompatibilities that no search could make
// sense of (out-of-range pitches, unknown sort codes, mismatched similarity
// lists, ...) and reports them as `EngineError::InvalidConfig`.
//
// See also: `filter.rs` which compiles a ProgressionConfig into the
// per-candidate constraint checks, `substitute.rs` for the Param windows.

use serde::{Deserialize, Serialize};

use crate::bigram::RootMovement;
use crate::error::EngineError;
use crate::pitch::MAX_PITCH;
use crate::scale::Scale;
use crate::sort::parse_sort_order;
use crate::voice_leading::{AlignMode, AlignmentWindow};

// ---------------------------------------------------------------------------
// Progression config sections
// ---------------------------------------------------------------------------

/// Which directional share-of-voices windows apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VlSetting {
    #[default]
    Default,
    Steady,
    Ascending,
    Descending,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceLeadingSection {
    /// Per-voice motion window, in semitones.
    pub vl_min: u32,
    pub vl_max: u32,
    pub vl_setting: VlSetting,
    /// Percentage of voices that hold, rise or fall.
    pub steady_min: f64,
    pub steady_max: f64,
    pub ascending_min: f64,
    pub ascending_max: f64,
    pub descending_min: f64,
    pub descending_max: f64,
}

impl Default for VoiceLeadingSection {
    fn default() -> Self {
        VoiceLeadingSection {
            vl_min: 0,
            vl_max: 4,
            vl_setting: VlSetting::Default,
            steady_min: 0.0,
            steady_max: 100.0,
            ascending_min: 0.0,
            ascending_max: 100.0,
            descending_min: 0.0,
            descending_max: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeSection {
    pub lowest: u32,
    pub highest: u32,
    /// Distinct pitch classes.
    pub m_min: u32,
    pub m_max: u32,
    /// Pitch count. 0 is read as 1.
    pub n_min: u32,
    pub n_max: u32,
    /// Thickness.
    pub h_min: f64,
    pub h_max: f64,
    /// Root pitch class.
    pub r_min: u32,
    pub r_max: u32,
    /// Geometrical center.
    pub g_min: f64,
    pub g_max: f64,
}

impl Default for RangeSection {
    fn default() -> Self {
        RangeSection {
            lowest: 0,
            highest: 127,
            m_min: 1,
            m_max: 15,
            n_min: 1,
            n_max: 12,
            h_min: 0.0,
            h_max: 50.0,
            r_min: 0,
            r_max: 11,
            g_min: 0.0,
            g_max: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonicSection {
    /// Chroma.
    pub k_min: f64,
    pub k_max: f64,
    /// Chroma over pitch-class histograms.
    pub kk_min: f64,
    pub kk_max: f64,
    /// Tension.
    pub t_min: f64,
    pub t_max: f64,
    /// Common notes.
    pub c_min: u32,
    pub c_max: u32,
    pub sv_min: u32,
    pub sv_max: u32,
    /// Span and union span.
    pub s_min: u32,
    pub s_max: u32,
    pub ss_min: u32,
    pub ss_max: u32,
    /// Q indicator.
    pub q_min: f64,
    pub q_max: f64,
    /// Similarity.
    pub x_min: u32,
    pub x_max: u32,
}

impl Default for HarmonicSection {
    fn default() -> Self {
        HarmonicSection {
            k_min: 0.0,
            k_max: 100.0,
            kk_min: 0.0,
            kk_max: 100.0,
            t_min: 0.0,
            t_max: 100.0,
            c_min: 0,
            c_max: 15,
            sv_min: 0,
            sv_max: 100,
            s_min: 0,
            s_max: 12,
            ss_min: 0,
            ss_max: 12,
            q_min: -500.0,
            q_max: 500.0,
            x_min: 0,
            x_max: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSection {
    pub align_mode: AlignMode,
    /// Voice-pairing index window (Interval mode).
    pub i_min: usize,
    pub i_max: usize,
    /// Window on adjacent-voice spacing (Interval mode).
    pub i_low: u32,
    pub i_high: u32,
    /// Accepted alignment vectors (List mode). Empty accepts any.
    pub alignment_list: Vec<Vec<u8>>,
}

impl Default for AlignmentSection {
    fn default() -> Self {
        AlignmentSection {
            align_mode: AlignMode::Unlimited,
            i_min: 0,
            i_max: 24,
            i_low: 0,
            i_high: 24,
            alignment_list: Vec::new(),
        }
    }
}

impl AlignmentSection {
    pub fn window(&self) -> AlignmentWindow {
        AlignmentWindow {
            mode: self.align_mode,
            i_min: self.i_min,
            i_max: self.i_max,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionSection {
    pub enabled: bool,
    /// Forbidden notes, compared by pitch class.
    pub exclusion_notes: Vec<u32>,
    /// Forbidden root pitch classes.
    pub exclusion_roots: Vec<u8>,
    /// Forbidden intervals, compared by interval class. 0 forbids doublings.
    pub exclusion_intervals: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PedalSection {
    pub enabled: bool,
    /// Exact pedal pitches.
    pub pedal_notes: Vec<u32>,
    /// Pedal pitch classes.
    pub pedal_notes_set: Vec<u8>,
    pub in_bass: bool,
    /// Re-anchor the exact pedal pitches to the seed each round.
    pub realign: bool,
    /// Apply the pedal every `period` rounds. 0 is read as 1.
    pub period: u32,
    /// Require the exact pedal pitches, not just their classes.
    pub connect_pedal: bool,
}

impl Default for PedalSection {
    fn default() -> Self {
        PedalSection {
            enabled: false,
            pedal_notes: Vec::new(),
            pedal_notes_set: Vec::new(),
            in_bass: false,
            realign: false,
            period: 1,
            connect_pedal: false,
        }
    }
}

/// Equality key used to drop duplicate candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UniqueMode {
    #[default]
    Disabled,
    PitchClassSet,
    ExactPitch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniquenessSection {
    pub unique_mode: UniqueMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleSection {
    /// Permitted pitch classes. Empty means chromatic.
    pub overall_scale: Vec<u8>,
}

impl Default for ScaleSection {
    fn default() -> Self {
        ScaleSection {
            overall_scale: (0..12).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilaritySection {
    pub enabled: bool,
    /// How many rounds back each window looks (1 = the current seed).
    pub sim_period: Vec<u32>,
    pub sim_min: Vec<u32>,
    pub sim_max: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootMovementSection {
    pub enabled: bool,
    pub rm_priority: Vec<RootMovement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BassSection {
    /// Chord degrees allowed in the bass. Empty accepts any.
    pub bass_avail: Vec<u8>,
}

impl Default for BassSection {
    fn default() -> Self {
        BassSection {
            bass_avail: vec![1, 3, 5, 7, 9, 11, 13],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordLibrarySection {
    /// Pitch-class sets; a candidate must match one up to transposition.
    pub chord_library: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSection {
    pub sort_order: String,
}

/// What the CLI writes for a generation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputMode {
    Text,
    Midi,
    #[default]
    Both,
}

impl OutputMode {
    pub fn wants_text(self) -> bool {
        matches!(self, OutputMode::Text | OutputMode::Both)
    }

    pub fn wants_midi(self) -> bool {
        matches!(self, OutputMode::Midi | OutputMode::Both)
    }
}

// ---------------------------------------------------------------------------
// ProgressionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub voice_leading: VoiceLeadingSection,
    pub range: RangeSection,
    pub harmonic: HarmonicSection,
    pub alignment: AlignmentSection,
    pub exclusion: ExclusionSection,
    pub pedal: PedalSection,
    pub uniqueness: UniquenessSection,
    pub scale: ScaleSection,
    pub similarity: SimilaritySection,
    pub root_movement: RootMovementSection,
    pub bass: BassSection,
    pub chord_library: ChordLibrarySection,
    pub sort: SortSection,
    pub continual: bool,
    pub loop_count: u32,
    pub output_mode: OutputMode,
    /// Keep at most this many candidates per round. Absent = all.
    pub max_results: Option<usize>,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        ProgressionConfig {
            voice_leading: VoiceLeadingSection::default(),
            range: RangeSection::default(),
            harmonic: HarmonicSection::default(),
            alignment: AlignmentSection::default(),
            exclusion: ExclusionSection::default(),
            pedal: PedalSection::default(),
            uniqueness: UniquenessSection::default(),
            scale: ScaleSection::default(),
            similarity: SimilaritySection::default(),
            root_movement: RootMovementSection::default(),
            bass: BassSection::default(),
            chord_library: ChordLibrarySection::default(),
            sort: SortSection::default(),
            continual: false,
            loop_count: 1,
            output_mode: OutputMode::Both,
            max_results: None,
        }
    }
}

fn check_pitch(what: &str, value: u32) -> Result<(), EngineError> {
    if value > MAX_PITCH as u32 {
        return Err(EngineError::invalid_config(format!(
            "{what} {value} is outside 0..={MAX_PITCH}"
        )));
    }
    Ok(())
}

impl ProgressionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reject hard incompatibilities. Inverted windows are not errors here.
    pub fn validate(&self) -> Result<(), EngineError> {
        check_pitch("lowest", self.range.lowest)?;
        check_pitch("highest", self.range.highest)?;
        Scale::from_pitch_classes(&self.scale.overall_scale)?;
        for &p in &self.pedal.pedal_notes {
            check_pitch("pedal note", p)?;
        }
        parse_sort_order(&self.sort.sort_order)?;

        let sim = &self.similarity;
        if sim.sim_period.len() != sim.sim_min.len() || sim.sim_period.len() != sim.sim_max.len() {
            return Err(EngineError::invalid_config(format!(
                "similarity lists differ in length (sim_period {}, sim_min {}, sim_max {})",
                sim.sim_period.len(),
                sim.sim_min.len(),
                sim.sim_max.len()
            )));
        }
        if sim.sim_period.contains(&0) {
            return Err(EngineError::invalid_config("sim_period entries start at 1"));
        }
        if self.continual && self.loop_count == 0 {
            return Err(EngineError::invalid_config("continual generation needs loop_count >= 1"));
        }
        Ok(())
    }

    /// The scale, with the empty-list fallback applied.
    pub fn scale(&self) -> Result<Scale, EngineError> {
        Scale::from_pitch_classes(&self.scale.overall_scale)
    }

    /// Cardinality window with `n_min = 0` read as 1.
    pub fn cardinality(&self) -> (usize, usize) {
        (self.range.n_min.max(1) as usize, self.range.n_max as usize)
    }

    /// Pitch window clipped to valid MIDI.
    pub fn pitch_bounds(&self) -> (u8, u8) {
        let clip = |v: u32| v.min(MAX_PITCH as u32) as u8;
        (clip(self.range.lowest), clip(self.range.highest))
    }

    /// Register a candidate around `seed` (sorted) can occupy: the pitch
    /// window, narrowed so that seed and candidate together fit inside
    /// `ss_max`. Empty (low > high) when the seed alone is wider.
    pub fn generation_bounds(&self, seed: &[u8]) -> (u8, u8) {
        let (lo, hi) = self.pitch_bounds();
        let (Some(&first), Some(&last)) = (seed.first(), seed.last()) else {
            return (lo, hi);
        };
        let ss = self.harmonic.ss_max.min(MAX_PITCH as u32) as u8;
        (lo.max(last.saturating_sub(ss)), hi.min(first.saturating_add(ss)))
    }

    /// Rounds to run: 1 unless continual.
    pub fn rounds(&self) -> u32 {
        if self.continual { self.loop_count } else { 1 }
    }

    fn windows(&self) -> Vec<(&'static str, f64, f64)> {
        let vl = &self.voice_leading;
        let r = &self.range;
        let h = &self.harmonic;
        let a = &self.alignment;
        vec![
            ("vl", vl.vl_min as f64, vl.vl_max as f64),
            ("steady", vl.steady_min, vl.steady_max),
            ("ascending", vl.ascending_min, vl.ascending_max),
            ("descending", vl.descending_min, vl.descending_max),
            ("pitch range", r.lowest as f64, r.highest as f64),
            ("m", r.m_min as f64, r.m_max as f64),
            ("n", r.n_min.max(1) as f64, r.n_max as f64),
            ("h", r.h_min, r.h_max),
            ("r", r.r_min as f64, r.r_max as f64),
            ("g", r.g_min, r.g_max),
            ("k", h.k_min, h.k_max),
            ("kk", h.kk_min, h.kk_max),
            ("t", h.t_min, h.t_max),
            ("c", h.c_min as f64, h.c_max as f64),
            ("sv", h.sv_min as f64, h.sv_max as f64),
            ("s", h.s_min as f64, h.s_max as f64),
            ("ss", h.ss_min as f64, h.ss_max as f64),
            ("q", h.q_min, h.q_max),
            ("x", h.x_min as f64, h.x_max as f64),
            ("i", a.i_min as f64, a.i_max as f64),
            ("i_low/i_high", a.i_low as f64, a.i_high as f64),
        ]
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Programmatic construction of a `ProgressionConfig`, validated once in
/// `build()`.
#[derive(Debug, Clone, Default)]
pub struct ProgressionConfigBuilder {
    config: ProgressionConfig,
}

impl ProgressionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    pub fn from_config(config: ProgressionConfig) -> Self {
        ProgressionConfigBuilder { config }
    }

    pub fn pitch_range(mut self, lowest: u8, highest: u8) -> Self {
        self.config.range.lowest = lowest as u32;
        self.config.range.highest = highest as u32;
        self
    }

    pub fn cardinality(mut self, n_min: u32, n_max: u32) -> Self {
        self.config.range.n_min = n_min;
        self.config.range.n_max = n_max;
        self
    }

    pub fn unique_pitch_classes(mut self, m_min: u32, m_max: u32) -> Self {
        self.config.range.m_min = m_min;
        self.config.range.m_max = m_max;
        self
    }

    pub fn thickness(mut self, min: f64, max: f64) -> Self {
        self.config.range.h_min = min;
        self.config.range.h_max = max;
        self
    }

    pub fn root(mut self, min: u32, max: u32) -> Self {
        self.config.range.r_min = min;
        self.config.range.r_max = max;
        self
    }

    pub fn geometrical_center(mut self, min: f64, max: f64) -> Self {
        self.config.range.g_min = min;
        self.config.range.g_max = max;
        self
    }

    pub fn voice_motion(mut self, vl_min: u32, vl_max: u32) -> Self {
        self.config.voice_leading.vl_min = vl_min;
        self.config.voice_leading.vl_max = vl_max;
        self
    }

    pub fn vl_setting(mut self, setting: VlSetting) -> Self {
        self.config.voice_leading.vl_setting = setting;
        self
    }

    pub fn tension(mut self, min: f64, max: f64) -> Self {
        self.config.harmonic.t_min = min;
        self.config.harmonic.t_max = max;
        self
    }

    pub fn chroma(mut self, min: f64, max: f64) -> Self {
        self.config.harmonic.k_min = min;
        self.config.harmonic.k_max = max;
        self
    }

    pub fn common_notes(mut self, min: u32, max: u32) -> Self {
        self.config.harmonic.c_min = min;
        self.config.harmonic.c_max = max;
        self
    }

    pub fn sv(mut self, min: u32, max: u32) -> Self {
        self.config.harmonic.sv_min = min;
        self.config.harmonic.sv_max = max;
        self
    }

    pub fn span(mut self, min: u32, max: u32) -> Self {
        self.config.harmonic.s_min = min;
        self.config.harmonic.s_max = max;
        self
    }

    pub fn sspan(mut self, min: u32, max: u32) -> Self {
        self.config.harmonic.ss_min = min;
        self.config.harmonic.ss_max = max;
        self
    }

    pub fn q_indicator(mut self, min: f64, max: f64) -> Self {
        self.config.harmonic.q_min = min;
        self.config.harmonic.q_max = max;
        self
    }

    pub fn similarity(mut self, min: u32, max: u32) -> Self {
        self.config.harmonic.x_min = min;
        self.config.harmonic.x_max = max;
        self
    }

    pub fn alignment(mut self, section: AlignmentSection) -> Self {
        self.config.alignment = section;
        self
    }

    pub fn exclusion(mut self, section: ExclusionSection) -> Self {
        self.config.exclusion = section;
        self
    }

    pub fn pedal(mut self, section: PedalSection) -> Self {
        self.config.pedal = section;
        self
    }

    pub fn unique_mode(mut self, mode: UniqueMode) -> Self {
        self.config.uniqueness.unique_mode = mode;
        self
    }

    pub fn scale(mut self, scale: Scale) -> Self {
        self.config.scale.overall_scale = scale.pitch_classes();
        self
    }

    pub fn similarity_history(mut self, section: SimilaritySection) -> Self {
        self.config.similarity = section;
        self
    }

    pub fn root_movement(mut self, rm_priority: Vec<RootMovement>) -> Self {
        self.config.root_movement = RootMovementSection {
            enabled: true,
            rm_priority,
        };
        self
    }

    pub fn bass_avail(mut self, degrees: Vec<u8>) -> Self {
        self.config.bass.bass_avail = degrees;
        self
    }

    pub fn chord_library(mut self, sets: Vec<Vec<u8>>) -> Self {
        self.config.chord_library.chord_library = sets;
        self
    }

    pub fn sort_order(mut self, order: &str) -> Self {
        self.config.sort.sort_order = order.to_string();
        self
    }

    pub fn continual(mut self, loop_count: u32) -> Self {
        self.config.continual = true;
        self.config.loop_count = loop_count;
        self
    }

    pub fn max_results(mut self, cap: usize) -> Self {
        self.config.max_results = Some(cap);
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.config.output_mode = mode;
        self
    }

    /// Validate and freeze. Inverted windows are errors here.
    pub fn build(self) -> Result<ProgressionConfig, EngineError> {
        for (name, min, max) in self.config.windows() {
            if min > max {
                return Err(EngineError::invalid_config(format!(
                    "window {name} is inverted ({min} > {max})"
                )));
            }
        }
        let sim = &self.config.similarity;
        for (i, (lo, hi)) in sim.sim_min.iter().zip(&sim.sim_max).enumerate() {
            if lo > hi {
                return Err(EngineError::invalid_config(format!(
                    "similarity window {i} is inverted ({lo} > {hi})"
                )));
            }
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

// ---------------------------------------------------------------------------
// Substitution config
// ---------------------------------------------------------------------------

/// Which side of the progression is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubstituteObject {
    Antechord,
    #[default]
    Postchord,
    Both,
}

/// Acceptance window of one substitution metric.
///
/// The all-zero Param is the "unset" document value and constrains nothing,
/// so `{center: 0, radius: 0}` alone cannot ask for an exact zero. Set
/// `enabled` to force the window on regardless of its values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Param {
    pub enabled: bool,
    pub center: f64,
    pub radius: f64,
    /// Window is `center +- radius` percent of the original's value.
    pub use_percentage: bool,
    /// Bounds on the distance from the original's value.
    pub min_sub: f64,
    pub max_sub: f64,
}

impl Param {
    /// A Param constrains nothing until something in it is set, or it is
    /// explicitly enabled.
    pub fn is_active(&self) -> bool {
        self.enabled || self.radius != 0.0 || self.center != 0.0 || self.use_percentage
    }

    fn has_distance_bounds(&self) -> bool {
        self.min_sub != 0.0 || self.max_sub != 0.0
    }

    /// Inclusive value window given the original's value.
    pub fn window(&self, original: f64) -> (f64, f64) {
        if self.use_percentage {
            let a = original * (self.center - self.radius) / 100.0;
            let b = original * (self.center + self.radius) / 100.0;
            (a.min(b), a.max(b))
        } else {
            (self.center - self.radius, self.center + self.radius)
        }
    }

    /// Does `value` pass this Param, for an original value `original`?
    pub fn accepts(&self, value: f64, original: f64) -> bool {
        if self.is_active() {
            let (lo, hi) = self.window(original);
            // Tolerate float noise from the percentage product.
            if value < lo - 1e-9 || value > hi + 1e-9 {
                return false;
            }
        }
        if self.has_distance_bounds() {
            let d = (value - original).abs();
            if d < self.min_sub || d > self.max_sub {
                return false;
            }
        }
        true
    }
}

/// Names of the substitution Params, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    SimOrig,
    Cardinality,
    Tension,
    Chroma,
    CommonNote,
    Span,
    Sspan,
    Sv,
    QIndicator,
    Similarity,
    ChromaOld,
    Root,
}

impl ParamName {
    pub const ALL: [ParamName; 12] = [
        ParamName::SimOrig,
        ParamName::Cardinality,
        ParamName::Tension,
        ParamName::Chroma,
        ParamName::CommonNote,
        ParamName::Span,
        ParamName::Sspan,
        ParamName::Sv,
        ParamName::QIndicator,
        ParamName::Similarity,
        ParamName::ChromaOld,
        ParamName::Root,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamName::SimOrig => "sim_orig",
            ParamName::Cardinality => "cardinality",
            ParamName::Tension => "tension",
            ParamName::Chroma => "chroma",
            ParamName::CommonNote => "common_note",
            ParamName::Span => "span",
            ParamName::Sspan => "sspan",
            ParamName::Sv => "sv",
            ParamName::QIndicator => "q_indicator",
            ParamName::Similarity => "similarity",
            ParamName::ChromaOld => "chroma_old",
            ParamName::Root => "root",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == name)
    }

    /// Params that describe the new progression step rather than the
    /// substitute chord alone.
    pub fn is_pair_metric(self) -> bool {
        !matches!(
            self,
            ParamName::SimOrig | ParamName::Cardinality | ParamName::Tension | ParamName::Root
        )
    }
}

/// Split a comma- or whitespace-separated Param list.
pub fn parse_param_list(list: &str) -> Result<Vec<ParamName>, EngineError> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            ParamName::from_name(tok)
                .ok_or_else(|| EngineError::invalid_config(format!("unknown substitution parameter {tok:?}")))
        })
        .collect()
}

fn default_sample_size() -> u64 {
    100_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstitutionConfig {
    pub object: SubstituteObject,
    pub test_all: bool,
    /// Evaluation cap when `test_all` is false.
    pub sample_size: u64,
    pub sort_order: String,
    /// Params whose center is reset to the original's value.
    pub reset_list: String,
    /// Params switched to percentage mode.
    pub percentage_list: String,
    pub sim_orig: Param,
    pub cardinality: Param,
    pub tension: Param,
    pub chroma: Param,
    pub common_note: Param,
    pub span: Param,
    pub sspan: Param,
    pub sv: Param,
    pub q_indicator: Param,
    pub similarity: Param,
    pub chroma_old: Param,
    pub root: Param,
    pub rm_priority: Vec<RootMovement>,

    // Search universe
    pub lowest: u32,
    pub highest: u32,
    pub n_min: u32,
    pub n_max: u32,
    /// Farthest registral distance of a substitute pitch from the original.
    pub reach: u8,
    pub overall_scale: Vec<u8>,
    /// Entries per side combined into pairs when `object` is Both.
    pub pair_pool: usize,
    pub max_results: Option<usize>,
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        SubstitutionConfig {
            object: SubstituteObject::Postchord,
            test_all: false,
            sample_size: default_sample_size(),
            sort_order: String::new(),
            reset_list: String::new(),
            percentage_list: String::new(),
            sim_orig: Param::default(),
            cardinality: Param::default(),
            tension: Param::default(),
            chroma: Param::default(),
            common_note: Param::default(),
            span: Param::default(),
            sspan: Param::default(),
            sv: Param::default(),
            q_indicator: Param::default(),
            similarity: Param::default(),
            chroma_old: Param::default(),
            root: Param::default(),
            rm_priority: Vec::new(),
            lowest: 0,
            highest: 127,
            n_min: 1,
            n_max: 12,
            reach: 4,
            overall_scale: (0..12).collect(),
            pair_pool: 64,
            max_results: None,
        }
    }
}

impl SubstitutionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn param(&self, name: ParamName) -> &Param {
        match name {
            ParamName::SimOrig => &self.sim_orig,
            ParamName::Cardinality => &self.cardinality,
            ParamName::Tension => &self.tension,
            ParamName::Chroma => &self.chroma,
            ParamName::CommonNote => &self.common_note,
            ParamName::Span => &self.span,
            ParamName::Sspan => &self.sspan,
            ParamName::Sv => &self.sv,
            ParamName::QIndicator => &self.q_indicator,
            ParamName::Similarity => &self.similarity,
            ParamName::ChromaOld => &self.chroma_old,
            ParamName::Root => &self.root,
        }
    }

    pub fn param_mut(&mut self, name: ParamName) -> &mut Param {
        match name {
            ParamName::SimOrig => &mut self.sim_orig,
            ParamName::Cardinality => &mut self.cardinality,
            ParamName::Tension => &mut self.tension,
            ParamName::Chroma => &mut self.chroma,
            ParamName::CommonNote => &mut self.common_note,
            ParamName::Span => &mut self.span,
            ParamName::Sspan => &mut self.sspan,
            ParamName::Sv => &mut self.sv,
            ParamName::QIndicator => &mut self.q_indicator,
            ParamName::Similarity => &mut self.similarity,
            ParamName::ChromaOld => &mut self.chroma_old,
            ParamName::Root => &mut self.root,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        check_pitch("lowest", self.lowest)?;
        check_pitch("highest", self.highest)?;
        Scale::from_pitch_classes(&self.overall_scale)?;
        parse_sort_order(&self.sort_order)?;
        parse_param_list(&self.reset_list)?;
        parse_param_list(&self.percentage_list)?;
        if !self.test_all && self.sample_size == 0 {
            return Err(EngineError::invalid_config(
                "sample_size must be positive unless test_all is set",
            ));
        }
        Ok(())
    }

    pub fn scale(&self) -> Result<Scale, EngineError> {
        Scale::from_pitch_classes(&self.overall_scale)
    }

    pub fn cardinality_bounds(&self) -> (usize, usize) {
        (self.n_min.max(1) as usize, self.n_max as usize)
    }

    pub fn pitch_bounds(&self) -> (u8, u8) {
        let clip = |v: u32| v.min(MAX_PITCH as u32) as u8;
        (clip(self.lowest), clip(self.highest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = ProgressionConfig::from_json(r#"{"harmonic": {"t_max": 40.0}, "continual": true}"#).unwrap();
        assert_eq!(config.harmonic.t_max, 40.0);
        assert_eq!(config.harmonic.q_min, -500.0);
        assert_eq!(config.voice_leading.vl_max, 4);
        assert_eq!(config.loop_count, 1);
        assert!(config.continual);
        assert_eq!(config.bass.bass_avail, vec![1, 3, 5, 7, 9, 11, 13]);
    }

    #[test]
    fn test_default_config_round_trips() {
        let config = ProgressionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back = ProgressionConfig::from_json(&json).unwrap();
        assert_eq!(config, back);
        assert!(json.contains("\"align_mode\":\"Unlimited\""), "got {json}");
        assert!(json.contains("\"unique_mode\":\"Disabled\""), "got {json}");
    }

    #[test]
    fn test_validate_rejects_hard_incompatibilities() {
        let mut config = ProgressionConfig::default();
        config.range.highest = 200;
        assert_eq!(config.validate().unwrap_err().category(), "invalid_config");

        let mut config = ProgressionConfig::default();
        config.sort.sort_order = "q, nope".into();
        assert!(config.validate().is_err());

        let mut config = ProgressionConfig::default();
        config.similarity.sim_period = vec![1, 2];
        config.similarity.sim_min = vec![0];
        config.similarity.sim_max = vec![100, 100];
        assert!(config.validate().is_err());

        let mut config = ProgressionConfig::default();
        config.continual = true;
        config.loop_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_window_is_valid_document_but_builder_error() {
        let mut config = ProgressionConfig::default();
        config.harmonic.t_min = 60.0;
        config.harmonic.t_max = 10.0;
        assert!(config.validate().is_ok());

        let err = ProgressionConfigBuilder::from_config(config).build().unwrap_err();
        assert!(err.to_string().contains("window t"), "got {err}");
    }

    #[test]
    fn test_builder() {
        let config = ProgressionConfigBuilder::new()
            .pitch_range(48, 84)
            .cardinality(3, 4)
            .unique_mode(UniqueMode::PitchClassSet)
            .sort_order("sv+, q")
            .continual(4)
            .build()
            .unwrap();
        assert_eq!(config.pitch_bounds(), (48, 84));
        assert_eq!(config.cardinality(), (3, 4));
        assert_eq!(config.rounds(), 4);
    }

    #[test]
    fn test_generation_bounds_follow_sspan() {
        let mut config = ProgressionConfig::default();
        assert_eq!(config.generation_bounds(&[60, 64, 67]), (55, 72));
        config.range.lowest = 58;
        assert_eq!(config.generation_bounds(&[60, 64, 67]), (58, 72));
        config.harmonic.ss_max = 200;
        assert_eq!(config.generation_bounds(&[60, 64, 67]), (58, 127));
        config.harmonic.ss_max = 3;
        let (lo, hi) = config.generation_bounds(&[60, 64, 67]);
        assert!(lo > hi);
    }

    #[test]
    fn test_n_min_zero_reads_as_one() {
        let mut config = ProgressionConfig::default();
        config.range.n_min = 0;
        assert_eq!(config.cardinality(), (1, 12));
    }

    #[test]
    fn test_param_windows() {
        let inactive = Param::default();
        assert!(!inactive.is_active());
        assert!(inactive.accepts(123.0, 0.0));

        let exact = Param {
            center: 18.33,
            ..Param::default()
        };
        assert!(exact.accepts(18.33, 0.0));
        assert!(!exact.accepts(18.34, 0.0));

        let pct = Param {
            center: 100.0,
            radius: 10.0,
            use_percentage: true,
            ..Param::default()
        };
        assert!(pct.accepts(55.0, 50.0));
        assert!(!pct.accepts(56.0, 50.0));

        let dist = Param {
            min_sub: 1.0,
            max_sub: 3.0,
            ..Param::default()
        };
        assert!(!dist.accepts(10.0, 10.0));
        assert!(dist.accepts(12.0, 10.0));
    }

    #[test]
    fn test_enabled_param_is_exact_at_zero() {
        let zero: Param = serde_json::from_str(r#"{"enabled": true, "center": 0, "radius": 0}"#).unwrap();
        assert!(zero.is_active());
        assert!(zero.accepts(0.0, 5.0));
        assert!(!zero.accepts(0.5, 5.0));

        let unset: Param = serde_json::from_str(r#"{"center": 0, "radius": 0}"#).unwrap();
        assert!(!unset.is_active());
        assert!(unset.accepts(0.5, 5.0));
    }

    #[test]
    fn test_substitution_config_validation() {
        let config = SubstitutionConfig::from_json(r#"{"object": "Both", "tension": {"center": 20.0}}"#).unwrap();
        assert_eq!(config.object, SubstituteObject::Both);
        assert_eq!(config.tension.center, 20.0);
        assert_eq!(config.sample_size, 100_000);
        assert!(config.validate().is_ok());

        let mut bad = SubstitutionConfig::default();
        bad.reset_list = "tension, colour".into();
        assert!(bad.validate().is_err());

        let mut bad = SubstitutionConfig::default();
        bad.sample_size = 0;
        assert!(bad.validate().is_err());
        bad.test_all = true;
        assert!(bad.validate().is_ok());
    }

    #[test]
    fn test_param_names() {
        assert_eq!(
            parse_param_list("tension, sim_orig root").unwrap(),
            vec![ParamName::Tension, ParamName::SimOrig, ParamName::Root]
        );
        assert!(ParamName::Chroma.is_pair_metric());
        assert!(!ParamName::Cardinality.is_pair_metric());
    }
}
