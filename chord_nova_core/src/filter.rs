// Constraint filter: does a candidate satisfy every active dimension?
//
// `accepts` is the generic inclusive window test. `ConstraintFilter`
// compiles a `ProgressionConfig` once per search (masks, rotated chord
// library, parsed windows) and then answers per candidate in three stages,
// cheapest first:
//
//   check_chord          Exclusion, Pedal, Range, Bass, ChordLibrary,
//                        Alignment (spacing / list), chord-only data
//   check_voice_leading  per-voice motion window and directional shares
//   check_bigram         Harmonic windows, RootMovement, Similarity
//
// Each stage returns the first failing `Dimension`, which the enumerator
// tallies for its debug log. Disabled dimensions are vacuously satisfied
// and the result is a pure conjunction, so stage order only affects speed.
//
// The filter is immutable and shared read-only by partitioned workers.

use std::fmt;

use crate::bigram::{BigramStats, RootMovement};
use crate::config::{ProgressionConfig, VlSetting};
use crate::descriptor::ChordStats;
use crate::error::EngineError;
use crate::pitch::{Pitches, interval, pitch_mask};
use crate::scoring::ScoringPolicy;
use crate::voice_leading::{AlignMode, AlignmentWindow, VoiceLeadingResult};

/// Inclusive window test. An inverted window accepts nothing.
pub fn accepts<T: PartialOrd>(value: T, min: T, max: T) -> bool {
    min <= value && value <= max
}

/// The independently toggleable constraint dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Exclusion,
    Pedal,
    Range,
    Bass,
    ChordLibrary,
    Alignment,
    VoiceLeading,
    Harmonic,
    RootMovement,
    Similarity,
}

impl Dimension {
    pub const COUNT: usize = 10;

    pub const ALL: [Dimension; Dimension::COUNT] = [
        Dimension::Exclusion,
        Dimension::Pedal,
        Dimension::Range,
        Dimension::Bass,
        Dimension::ChordLibrary,
        Dimension::Alignment,
        Dimension::VoiceLeading,
        Dimension::Harmonic,
        Dimension::RootMovement,
        Dimension::Similarity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Exclusion => "exclusion",
            Dimension::Pedal => "pedal",
            Dimension::Range => "range",
            Dimension::Bass => "bass",
            Dimension::ChordLibrary => "chord_library",
            Dimension::Alignment => "alignment",
            Dimension::VoiceLeading => "voice_leading",
            Dimension::Harmonic => "harmonic",
            Dimension::RootMovement => "root_movement",
            Dimension::Similarity => "similarity",
        }
    }
}

/// Rejection counts per dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectionTally {
    counts: [u64; Dimension::COUNT],
}

impl RejectionTally {
    pub fn record(&mut self, dim: Dimension) {
        self.counts[dim as usize] += 1;
    }

    pub fn get(&self, dim: Dimension) -> u64 {
        self.counts[dim as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn merge(&mut self, other: &RejectionTally) {
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
    }
}

impl fmt::Display for RejectionTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for dim in Dimension::ALL {
            let n = self.get(dim);
            if n == 0 {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}={}", dim.name(), n)?;
            first = false;
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// Per-round context a candidate is judged against.
#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    /// 0-based round index within a continual run.
    pub index: u32,
    /// Progression so far, oldest first. The last entry is the seed.
    pub history: &'a [ChordStats],
    /// Exact pedal pitches for this round (after realignment).
    pub pedal_pitches: &'a [u8],
}

/// Move each pedal pitch to the seed's nearest pitch of the same class, if
/// the seed has one.
pub fn realign_pedal(pedal: &[u8], seed: &[u8]) -> Pitches {
    pedal
        .iter()
        .map(|&p| {
            seed.iter()
                .copied()
                .filter(|&s| s % 12 == p % 12)
                .min_by_key(|&s| (s.abs_diff(p), s))
                .unwrap_or(p)
        })
        .collect()
}

fn rotations(mask: u16) -> [u16; 12] {
    let m = mask as u32;
    std::array::from_fn(|r| ((m << r | m >> (12 - r)) & 0x0FFF) as u16)
}

/// A compiled, immutable view of the constraint part of a config.
#[derive(Debug, Clone)]
pub struct ConstraintFilter {
    config: ProgressionConfig,
    exclusion_mask: u16,
    exclusion_roots_mask: u16,
    exclusion_ics: Vec<u8>,
    pedal_mask: u16,
    library: Vec<u16>,
    rm_priority: Vec<RootMovement>,
}

impl ConstraintFilter {
    pub fn new(config: &ProgressionConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let ex = &config.exclusion;
        let exclusion_mask = ex.exclusion_notes.iter().fold(0u16, |m, &n| m | (1 << (n % 12)));
        let exclusion_roots_mask = ex.exclusion_roots.iter().fold(0u16, |m, &r| m | (1 << (r % 12)));
        let exclusion_ics = ex
            .exclusion_intervals
            .iter()
            .map(|&v| interval::interval_class((v % 12) as u8))
            .collect();

        let pedal = &config.pedal;
        let pedal_mask = pedal
            .pedal_notes_set
            .iter()
            .map(|&pc| pc as u32)
            .chain(pedal.pedal_notes.iter().copied())
            .fold(0u16, |m, n| m | (1 << (n % 12)));

        let library = config
            .chord_library
            .chord_library
            .iter()
            .flat_map(|set| rotations(set.iter().fold(0u16, |m, &pc| m | (1 << (pc % 12)))))
            .collect();

        let rm_priority = if config.root_movement.enabled {
            config.root_movement.rm_priority.clone()
        } else {
            Vec::new()
        };

        Ok(ConstraintFilter {
            config: config.clone(),
            exclusion_mask,
            exclusion_roots_mask,
            exclusion_ics,
            pedal_mask,
            library,
            rm_priority,
        })
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn alignment_window(&self) -> AlignmentWindow {
        self.config.alignment.window()
    }

    /// Root-movement preference list used as the final sort tie-breaker.
    pub fn rm_priority(&self) -> &[RootMovement] {
        &self.rm_priority
    }

    /// Initial exact pedal pitches.
    pub fn pedal_pitches(&self) -> Pitches {
        self.config
            .pedal
            .pedal_notes
            .iter()
            .map(|&p| p.min(127) as u8)
            .collect()
    }

    fn pedal_applies(&self, round: u32) -> bool {
        let pedal = &self.config.pedal;
        pedal.enabled && round % pedal.period.max(1) == 0
    }

    /// Chord-only dimensions.
    pub fn check_chord(&self, stats: &ChordStats, ctx: &RoundContext) -> Result<(), Dimension> {
        let cfg = &self.config;
        let pc_mask = stats.pc_mask();

        if cfg.exclusion.enabled {
            let root_excluded = stats
                .root
                .is_some_and(|r| self.exclusion_roots_mask & (1 << r) != 0);
            let interval_excluded = self.exclusion_ics.iter().any(|&ic| {
                if ic == 0 {
                    stats.n() > stats.m()
                } else {
                    stats.count_vec[(ic - 1) as usize] > 0
                }
            });
            if pc_mask & self.exclusion_mask != 0 || root_excluded || interval_excluded {
                return Err(Dimension::Exclusion);
            }
        }

        if self.pedal_applies(ctx.index) {
            if pc_mask & self.pedal_mask != self.pedal_mask {
                return Err(Dimension::Pedal);
            }
            if cfg.pedal.in_bass && self.pedal_mask != 0 {
                let bass_pc = stats.notes.first().map_or(0, |&p| p % 12);
                if self.pedal_mask & (1 << bass_pc) == 0 {
                    return Err(Dimension::Pedal);
                }
            }
            if cfg.pedal.connect_pedal {
                let required = pitch_mask(ctx.pedal_pitches);
                if pitch_mask(&stats.notes) & required != required {
                    return Err(Dimension::Pedal);
                }
            }
        }

        let range = &cfg.range;
        let root_ok = match stats.root {
            Some(r) => accepts(r as u32, range.r_min, range.r_max),
            None => range.r_min == 0 && range.r_max >= 11,
        };
        if !accepts(stats.thickness, range.h_min, range.h_max)
            || !root_ok
            || !accepts(stats.geometrical_center, range.g_min, range.g_max)
            || !accepts(stats.m(), range.m_min, range.m_max)
        {
            return Err(Dimension::Range);
        }

        let bass_avail = &cfg.bass.bass_avail;
        if !bass_avail.is_empty() && !stats.bass_degree().is_some_and(|d| bass_avail.contains(&d)) {
            return Err(Dimension::Bass);
        }

        if !self.library.is_empty() && !self.library.contains(&pc_mask) {
            return Err(Dimension::ChordLibrary);
        }

        let align = &cfg.alignment;
        let alignment_ok = match align.align_mode {
            AlignMode::Interval => stats
                .self_diff
                .iter()
                .all(|&d| accepts(d as u32, align.i_low, align.i_high)),
            AlignMode::List => {
                align.alignment_list.is_empty()
                    || align
                        .alignment_list
                        .iter()
                        .any(|a| a.as_slice() == stats.alignment.as_slice())
            }
            AlignMode::Unlimited => true,
        };
        if !alignment_ok {
            return Err(Dimension::Alignment);
        }
        Ok(())
    }

    /// Per-voice motion window and directional share windows.
    pub fn check_voice_leading(&self, vl: &VoiceLeadingResult) -> Result<(), Dimension> {
        let s = &self.config.voice_leading;
        if !vl
            .vec
            .iter()
            .all(|d| accepts(d.unsigned_abs() as u32, s.vl_min, s.vl_max))
        {
            return Err(Dimension::VoiceLeading);
        }
        if s.vl_setting == VlSetting::Default || vl.vec.is_empty() {
            return Ok(());
        }
        let total = vl.vec.len() as f64;
        let share = |pred: fn(i8) -> bool| 100.0 * vl.vec.iter().filter(|&&d| pred(d)).count() as f64 / total;
        let steady = || accepts(share(|d| d == 0), s.steady_min, s.steady_max);
        let ascending = || accepts(share(|d| d > 0), s.ascending_min, s.ascending_max);
        let descending = || accepts(share(|d| d < 0), s.descending_min, s.descending_max);
        let ok = match s.vl_setting {
            VlSetting::Default => true,
            VlSetting::Steady => steady(),
            VlSetting::Ascending => ascending(),
            VlSetting::Descending => descending(),
            VlSetting::All => steady() && ascending() && descending(),
        };
        if ok { Ok(()) } else { Err(Dimension::VoiceLeading) }
    }

    /// Pairwise dimensions, judged on the finished bigram.
    pub fn check_bigram<S: ScoringPolicy + ?Sized>(
        &self,
        stats: &ChordStats,
        bigram: &BigramStats,
        ctx: &RoundContext,
        scoring: &S,
    ) -> Result<(), Dimension> {
        let h = &self.config.harmonic;
        let harmonic_ok = accepts(bigram.tension, h.t_min, h.t_max)
            && accepts(bigram.chroma, h.k_min, h.k_max)
            && accepts(bigram.chroma_old, h.kk_min, h.kk_max)
            && accepts(bigram.common_note, h.c_min, h.c_max)
            && accepts(bigram.sv, h.sv_min, h.sv_max)
            && accepts(bigram.span, h.s_min, h.s_max)
            && accepts(bigram.sspan, h.ss_min, h.ss_max)
            && accepts(bigram.q_indicator, h.q_min, h.q_max)
            && accepts(bigram.similarity, h.x_min, h.x_max);
        if !harmonic_ok {
            return Err(Dimension::Harmonic);
        }

        if !self.rm_priority.is_empty()
            && !bigram
                .root_movement
                .is_some_and(|rm| self.rm_priority.contains(&rm))
        {
            return Err(Dimension::RootMovement);
        }

        let sim = &self.config.similarity;
        if sim.enabled {
            for ((&period, &lo), &hi) in sim.sim_period.iter().zip(&sim.sim_min).zip(&sim.sim_max) {
                let back = period as usize;
                if back == 0 || back > ctx.history.len() {
                    continue;
                }
                let past = &ctx.history[ctx.history.len() - back];
                let x = similarity_between(past, stats, scoring);
                if !accepts(x, lo, hi) {
                    return Err(Dimension::Similarity);
                }
            }
        }
        Ok(())
    }

    /// All dimensions at once, for callers holding a finished evaluation.
    pub fn accepts_all<S: ScoringPolicy + ?Sized>(
        &self,
        stats: &ChordStats,
        vl: &VoiceLeadingResult,
        bigram: &BigramStats,
        ctx: &RoundContext,
        scoring: &S,
    ) -> bool {
        self.check_chord(stats, ctx).is_ok()
            && self.check_voice_leading(vl).is_ok()
            && self.check_bigram(stats, bigram, ctx, scoring).is_ok()
    }
}

/// Similarity percentage between two described chords.
pub fn similarity_between<S: ScoringPolicy + ?Sized>(a: &ChordStats, b: &ChordStats, scoring: &S) -> u32 {
    let chroma = scoring.chroma(&a.count_vec, &b.count_vec);
    let common = (a.pc_mask() & b.pc_mask()).count_ones();
    scoring.similarity(chroma, common, a.m().max(b.m()))
}
