// Candidate enumeration: one search round, and continual rounds.
//
// A round takes a seed chord and walks the generation `ChordSpace` around
// it. Every visited subset is one evaluation: describe it, run the chord
// filter, analyse voice leading from the seed, run the voice-leading
// filter, evaluate the bigram, run the pairwise filter. Survivors are
// de-duplicated under the uniqueness key (first seen in enumeration order
// wins), sorted stably by the configured keys, and capped.
//
// Partitioned rounds split the space by cardinality, scan the partitions on
// rayon's pool, and concatenate the per-partition survivors in partition
// order before de-duplication. Since the partitions concatenate to the
// sequential walk, the result is bit-identical to a sequential round.
//
// Continual generation is the `Rounds` iterator: each round's winner (the
// best candidate not already in the progression, by uniqueness key) seeds
// the next round. It stops after `loop_count` rounds, after a round with no
// winner, or when the budget trips. `Rounds::restart_from` resumes from any
// earlier round's winner with that round's history.

use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::bigram::{BigramStats, RootMovement, evaluate};
use crate::budget::{BudgetMeter, SearchBudget};
use crate::config::UniqueMode;
use crate::descriptor::{ChordStats, describe, describe_pitches};
use crate::error::EngineError;
use crate::filter::{ConstraintFilter, Dimension, RejectionTally, RoundContext, realign_pedal};
use crate::pitch::{Chord, Pitches, pc_mask, pitch_mask};
use crate::scale::Scale;
use crate::scoring::ScoringPolicy;
use crate::sort::{Metric, SortKey, Sortable, parse_sort_order, sort_by_keys};
use crate::space::ChordSpace;
use crate::voice_leading::{VoiceLeadingResult, lead};

/// A generated consequent chord, scored against its seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub stats: ChordStats,
    pub bigram: BigramStats,
    pub vl: VoiceLeadingResult,
}

impl Candidate {
    pub fn chord(&self) -> Chord {
        Chord::from_sorted(self.stats.notes.clone())
    }
}

impl Sortable for Candidate {
    fn metric(&self, metric: Metric) -> Option<f64> {
        let b = &self.bigram;
        let s = &self.stats;
        let v = match metric {
            Metric::Tension => b.tension,
            Metric::Chroma => b.chroma,
            Metric::ChromaOld => b.chroma_old,
            Metric::CommonNote => b.common_note as f64,
            Metric::Sv => b.sv as f64,
            Metric::Similarity => b.similarity as f64,
            Metric::QIndicator => b.q_indicator,
            Metric::Span => b.span as f64,
            Metric::Sspan => b.sspan as f64,
            Metric::Pitches => s.n() as f64,
            Metric::UniquePitchClasses => s.m() as f64,
            Metric::Thickness => s.thickness,
            Metric::GeometricalCenter => s.geometrical_center,
            Metric::Root => return s.root.map(f64::from),
            Metric::SimOrig => return None,
        };
        Some(v)
    }

    fn root_movement(&self) -> Option<RootMovement> {
        self.bigram.root_movement
    }
}

/// Result of a generate call.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub candidates: Vec<Candidate>,
    pub total_evaluated: u64,
    /// The budget stopped the search before the space was exhausted.
    pub interrupted: bool,
}

impl Generation {
    /// Nothing matched. Not an error.
    pub fn is_exhausted(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// One step of a continual run.
#[derive(Debug, Clone)]
pub struct Round {
    pub index: u32,
    pub seed: Chord,
    /// Surviving candidates of this round, sorted and capped.
    pub candidates: Vec<Candidate>,
    pub winner: Option<Candidate>,
    pub total_evaluated: u64,
    pub interrupted: bool,
    pub rejections: RejectionTally,
    /// Progression up to and including `seed`.
    pub history: Vec<Chord>,
}

/// Uniqueness key of a pitch list. `None` when uniqueness is disabled.
pub fn unique_key(mode: UniqueMode, pitches: &[u8]) -> Option<u128> {
    match mode {
        UniqueMode::Disabled => None,
        UniqueMode::PitchClassSet => Some(pc_mask(pitches) as u128),
        UniqueMode::ExactPitch => Some(pitch_mask(pitches)),
    }
}

/// Drop later duplicates under the uniqueness key.
pub fn dedup_candidates(candidates: Vec<Candidate>, mode: UniqueMode) -> Vec<Candidate> {
    if mode == UniqueMode::Disabled {
        return candidates;
    }
    let mut seen = FxHashSet::default();
    candidates
        .into_iter()
        .filter(|c| unique_key(mode, &c.stats.notes).is_none_or(|k| seen.insert(k)))
        .collect()
}

/// Evaluate one candidate against the seed, stopping at the first failing
/// dimension.
pub(crate) fn evaluate_candidate<S: ScoringPolicy + ?Sized>(
    pitches: &[u8],
    seed: &ChordStats,
    filter: &ConstraintFilter,
    ctx: &RoundContext,
    scoring: &S,
) -> Result<Candidate, Dimension> {
    let stats = describe_pitches(pitches, scoring);
    filter.check_chord(&stats, ctx)?;
    let vl = lead(&seed.notes, &stats.notes, &filter.alignment_window()).map_err(|_| Dimension::Alignment)?;
    filter.check_voice_leading(&vl)?;
    let bigram = evaluate(seed, &stats, &vl, scoring);
    filter.check_bigram(&stats, &bigram, ctx, scoring)?;
    Ok(Candidate { stats, bigram, vl })
}

/// Accepted candidates of one (partition of a) space, in walk order.
#[derive(Debug, Default)]
struct Scan {
    accepted: Vec<Candidate>,
    evaluated: u64,
    tally: RejectionTally,
}

fn scan<S: ScoringPolicy + ?Sized>(
    space: ChordSpace,
    seed: &ChordStats,
    filter: &ConstraintFilter,
    ctx: &RoundContext,
    scoring: &S,
    meter: &BudgetMeter,
) -> Scan {
    let mut out = Scan::default();
    for pitches in space {
        if !meter.tick() {
            break;
        }
        out.evaluated += 1;
        match evaluate_candidate(&pitches, seed, filter, ctx, scoring) {
            Ok(c) => out.accepted.push(c),
            Err(dim) => out.tally.record(dim),
        }
    }
    out
}

/// Immutable inputs shared by every round of a run.
#[derive(Debug, Clone)]
pub(crate) struct SearchPlan {
    pub filter: Arc<ConstraintFilter>,
    pub scale: Scale,
    pub sort_keys: Vec<SortKey>,
    pub budget: SearchBudget,
    pub parallel: bool,
}

impl SearchPlan {
    pub fn new(filter: ConstraintFilter, budget: SearchBudget, parallel: bool) -> Result<Self, EngineError> {
        let config = filter.config();
        let scale = config.scale()?;
        let mut sort_keys = parse_sort_order(&config.sort.sort_order)?;
        if sort_keys.is_empty() {
            sort_keys.push(SortKey::descending(Metric::QIndicator));
        }
        Ok(SearchPlan {
            filter: Arc::new(filter),
            scale,
            sort_keys,
            budget,
            parallel,
        })
    }
}

/// Output of `search_round` before winner selection.
#[derive(Debug)]
pub(crate) struct RoundOutcome {
    pub candidates: Vec<Candidate>,
    pub total_evaluated: u64,
    pub interrupted: bool,
    pub rejections: RejectionTally,
}

/// Run one round from `seed`.
pub(crate) fn search_round<S: ScoringPolicy + ?Sized>(
    plan: &SearchPlan,
    scoring: &S,
    index: u32,
    history: &[ChordStats],
    pedal: &[u8],
) -> RoundOutcome {
    let filter = plan.filter.as_ref();
    let config = filter.config();
    let Some(seed) = history.last() else {
        return RoundOutcome {
            candidates: Vec::new(),
            total_evaluated: 0,
            interrupted: false,
            rejections: RejectionTally::default(),
        };
    };
    let ctx = RoundContext {
        index,
        history,
        pedal_pitches: pedal,
    };
    let space = ChordSpace::for_generation(
        &seed.notes,
        config.generation_bounds(&seed.notes),
        plan.scale,
        config.voice_leading.vl_max,
        config.cardinality(),
        (config.range.m_min, config.range.m_max),
    );
    log::debug!(
        "round {index}: universe of {} pitches, {} subsets",
        space.universe().len(),
        space.size()
    );

    let meter = plan.budget.meter();
    let scans: Vec<Scan> = if plan.parallel {
        space
            .partitions()
            .into_par_iter()
            .map(|part| scan(part, seed, filter, &ctx, scoring, &meter))
            .collect()
    } else {
        vec![scan(space, seed, filter, &ctx, scoring, &meter)]
    };

    let mut accepted = Vec::new();
    let mut total_evaluated = 0;
    let mut rejections = RejectionTally::default();
    for s in scans {
        accepted.extend(s.accepted);
        total_evaluated += s.evaluated;
        rejections.merge(&s.tally);
    }

    let mut candidates = dedup_candidates(accepted, config.uniqueness.unique_mode);
    sort_by_keys(&mut candidates, &plan.sort_keys, filter.rm_priority());
    if let Some(cap) = config.max_results {
        candidates.truncate(cap);
    }
    log::debug!(
        "round {index}: {total_evaluated} evaluated, {} kept, rejected by {rejections}",
        candidates.len()
    );
    RoundOutcome {
        candidates,
        total_evaluated,
        interrupted: meter.tripped(),
        rejections,
    }
}

/// Pick the next seed: the best candidate not already in the progression.
fn select_winner(candidates: &[Candidate], mode: UniqueMode, keys: &FxHashSet<u128>, seed: &Chord) -> Option<Candidate> {
    candidates
        .iter()
        .find(|c| match unique_key(mode, &c.stats.notes) {
            Some(k) => !keys.contains(&k),
            None => c.stats.notes.as_slice() != seed.pitches(),
        })
        .cloned()
}

/// Lazy sequence of continual-generation rounds.
pub struct Rounds<'e, S: ScoringPolicy + ?Sized> {
    scoring: &'e S,
    plan: SearchPlan,
    history: Vec<Chord>,
    stats_history: Vec<ChordStats>,
    keys: FxHashSet<u128>,
    pedal: Pitches,
    index: u32,
    limit: u32,
    finished: bool,
}

impl<'e, S: ScoringPolicy + ?Sized> Rounds<'e, S> {
    pub(crate) fn new(scoring: &'e S, plan: SearchPlan, seed: Chord) -> Self {
        let pedal = plan.filter.pedal_pitches();
        let limit = plan.filter.config().rounds();
        Self::resume(scoring, plan, vec![seed], pedal, 0, limit)
    }

    fn resume(scoring: &'e S, plan: SearchPlan, history: Vec<Chord>, pedal: Pitches, index: u32, limit: u32) -> Self {
        let mode = plan.filter.config().uniqueness.unique_mode;
        let stats_history = history.iter().map(|c| describe(c, scoring)).collect();
        let keys = history.iter().filter_map(|c| unique_key(mode, c.pitches())).collect();
        Rounds {
            scoring,
            plan,
            history,
            stats_history,
            keys,
            pedal,
            index,
            limit,
            finished: false,
        }
    }

    /// Continue from `round`'s winner with the history that led to it.
    /// A round without a winner yields an empty sequence.
    pub fn restart_from(&self, round: &Round) -> Rounds<'e, S> {
        let mut history = round.history.clone();
        let mut rounds = match &round.winner {
            Some(w) => {
                history.push(w.chord());
                let pedal = self.plan.filter.pedal_pitches();
                Self::resume(self.scoring, self.plan.clone(), history, pedal, round.index + 1, self.limit)
            }
            None => Self::resume(self.scoring, self.plan.clone(), history, Pitches::new(), round.index, self.limit),
        };
        if round.winner.is_none() {
            rounds.finished = true;
        }
        rounds
    }

    /// Chords chosen so far, starting with the initial seed.
    pub fn progression(&self) -> &[Chord] {
        &self.history
    }
}

impl<S: ScoringPolicy + ?Sized> Iterator for Rounds<'_, S> {
    type Item = Round;

    fn next(&mut self) -> Option<Round> {
        if self.finished || self.index >= self.limit {
            return None;
        }
        let seed = self.history.last()?.clone();
        let config = self.plan.filter.config();
        if config.pedal.realign {
            self.pedal = realign_pedal(&self.pedal, seed.pitches());
        }
        let outcome = search_round(&self.plan, self.scoring, self.index, &self.stats_history, &self.pedal);
        let mode = config.uniqueness.unique_mode;
        let winner = select_winner(&outcome.candidates, mode, &self.keys, &seed);

        let round = Round {
            index: self.index,
            seed,
            candidates: outcome.candidates,
            winner: winner.clone(),
            total_evaluated: outcome.total_evaluated,
            interrupted: outcome.interrupted,
            rejections: outcome.rejections,
            history: self.history.clone(),
        };

        match winner {
            Some(w) => {
                log::info!(
                    "round {}: {} ({}), q={}",
                    self.index,
                    w.bigram.name_with_octave,
                    w.bigram.name.as_deref().unwrap_or("-"),
                    w.bigram.q_indicator
                );
                if let Some(k) = unique_key(mode, &w.stats.notes) {
                    self.keys.insert(k);
                }
                self.history.push(w.chord());
                self.stats_history.push(w.stats);
            }
            None => {
                log::info!("round {}: no winner, stopping", self.index);
                self.finished = true;
            }
        }
        if round.interrupted {
            self.finished = true;
        }
        self.index += 1;
        Some(round)
    }
}
