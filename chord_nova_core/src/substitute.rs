// Substitution search.
//
// Given an original progression step `ante -> post`, look for replacement
// chords for one side (or both) that stay close to the original. Every
// candidate is scored against the *original*: side metrics compare the
// substitute with the chord it replaces, pair metrics compare the new
// progression step with the original step. Each metric has a `Param`
// window (see `config::Param`); a candidate survives when every active
// window accepts it.
//
// The walk is the "closest first" `ChordSpace::for_substitution`. Without
// `test_all` it stops after `sample_size` evaluations per side, so a capped
// search still returns the nearest substitutes. The original chord is
// evaluated but never returned.
//
// `Both` searches each side independently, then pairs the best `pair_pool`
// entries of each side (every entry under `test_all`) and keeps the pairs
// whose own bigram passes every active pair-metric window. Pair evaluations
// count toward `total_evaluated`.

use serde::{Deserialize, Serialize};

use crate::bigram::{BigramStats, RootMovement, evaluate};
use crate::budget::{BudgetMeter, SearchBudget};
use crate::config::{ParamName, SubstituteObject, SubstitutionConfig, parse_param_list};
use crate::descriptor::{ChordStats, describe, describe_pitches};
use crate::error::EngineError;
use crate::filter::similarity_between;
use crate::pitch::Chord;
use crate::scoring::ScoringPolicy;
use crate::sort::{Metric, SortKey, Sortable, parse_sort_order, sort_by_keys};
use crate::space::ChordSpace;
use crate::voice_leading::{AlignmentWindow, VoiceLeadingResult, lead};

/// Side of the progression a substitute replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Antechord,
    Postchord,
}

/// A single substitute chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstituteEntry {
    pub side: Side,
    pub stats: ChordStats,
    /// The new progression step with this substitute in place.
    pub bigram: BigramStats,
    pub vl: VoiceLeadingResult,
    /// Similarity of the replaced original to this substitute, 0..=100.
    pub sim_orig: u32,
}

/// Both sides replaced at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutePair {
    pub ante: SubstituteEntry,
    pub post: SubstituteEntry,
    /// The step `ante.stats -> post.stats`.
    pub bigram: BigramStats,
}

impl SubstitutePair {
    fn sim_orig(&self) -> f64 {
        (self.ante.sim_orig + self.post.sim_orig) as f64 / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub entries: Vec<SubstituteEntry>,
    pub pairs: Vec<SubstitutePair>,
    pub total_evaluated: u64,
    pub interrupted: bool,
}

fn metric_of(stats: &ChordStats, bigram: &BigramStats, sim_orig: f64, metric: Metric) -> Option<f64> {
    let v = match metric {
        Metric::Tension => stats.tension,
        Metric::Chroma => bigram.chroma,
        Metric::ChromaOld => bigram.chroma_old,
        Metric::CommonNote => bigram.common_note as f64,
        Metric::Sv => bigram.sv as f64,
        Metric::Similarity => bigram.similarity as f64,
        Metric::QIndicator => bigram.q_indicator,
        Metric::Span => bigram.span as f64,
        Metric::Sspan => bigram.sspan as f64,
        Metric::Pitches => stats.n() as f64,
        Metric::UniquePitchClasses => stats.m() as f64,
        Metric::Thickness => stats.thickness,
        Metric::GeometricalCenter => stats.geometrical_center,
        Metric::Root => return stats.root.map(f64::from),
        Metric::SimOrig => sim_orig,
    };
    Some(v)
}

impl Sortable for SubstituteEntry {
    fn metric(&self, metric: Metric) -> Option<f64> {
        metric_of(&self.stats, &self.bigram, self.sim_orig as f64, metric)
    }

    fn root_movement(&self) -> Option<RootMovement> {
        self.bigram.root_movement
    }
}

impl Sortable for SubstitutePair {
    fn metric(&self, metric: Metric) -> Option<f64> {
        metric_of(&self.post.stats, &self.bigram, self.sim_orig(), metric)
    }

    fn root_movement(&self) -> Option<RootMovement> {
        self.bigram.root_movement
    }
}

/// Value of a Param's metric, given the chord on the substituted side and
/// the progression step it takes part in.
fn param_value(name: ParamName, side: &ChordStats, step: &BigramStats, sim_orig: u32) -> Option<f64> {
    let v = match name {
        ParamName::SimOrig => sim_orig as f64,
        ParamName::Cardinality => side.n() as f64,
        ParamName::Tension => side.tension,
        ParamName::Root => return side.root.map(f64::from),
        ParamName::Chroma => step.chroma,
        ParamName::CommonNote => step.common_note as f64,
        ParamName::Span => step.span as f64,
        ParamName::Sspan => step.sspan as f64,
        ParamName::Sv => step.sv as f64,
        ParamName::QIndicator => step.q_indicator,
        ParamName::Similarity => step.similarity as f64,
        ParamName::ChromaOld => step.chroma_old,
    };
    Some(v)
}

/// The original step, which every candidate is measured against.
struct Original {
    ante: ChordStats,
    post: ChordStats,
    bigram: BigramStats,
}

impl Original {
    fn replaced(&self, side: Side) -> &ChordStats {
        match side {
            Side::Antechord => &self.ante,
            Side::Postchord => &self.post,
        }
    }

    /// A replaced chord is 100% similar to itself.
    fn value(&self, name: ParamName, side: Side) -> Option<f64> {
        param_value(name, self.replaced(side), &self.bigram, 100)
    }
}

/// Apply `reset_list` and `percentage_list` to a copy of the config.
fn resolve_params(config: &SubstitutionConfig, original: &Original, side: Side) -> Result<SubstitutionConfig, EngineError> {
    let mut resolved = config.clone();
    for name in parse_param_list(&config.reset_list)? {
        if let Some(orig) = original.value(name, side) {
            let p = resolved.param_mut(name);
            p.center = orig;
            p.use_percentage = false;
        }
    }
    for name in parse_param_list(&config.percentage_list)? {
        let p = resolved.param_mut(name);
        p.use_percentage = true;
        if p.center == 0.0 {
            p.center = 100.0;
        }
    }
    Ok(resolved)
}

/// Do the active Params in `names` accept this candidate? A missing value
/// (no detectable root) fails any active window on it.
fn params_accept(
    config: &SubstitutionConfig,
    names: impl IntoIterator<Item = ParamName>,
    value: impl Fn(ParamName) -> Option<f64>,
    original: impl Fn(ParamName) -> Option<f64>,
) -> bool {
    names.into_iter().all(|name| {
        let param = config.param(name);
        if !param.is_active() && param.min_sub == 0.0 && param.max_sub == 0.0 {
            return true;
        }
        match (value(name), original(name)) {
            (Some(v), Some(o)) => param.accepts(v, o),
            _ => false,
        }
    })
}

fn sort_keys(config: &SubstitutionConfig) -> Result<Vec<SortKey>, EngineError> {
    let mut keys = parse_sort_order(&config.sort_order)?;
    if keys.is_empty() {
        keys.push(SortKey::descending(Metric::SimOrig));
    }
    Ok(keys)
}

/// Search replacements for one side of the original step.
fn search_side<S: ScoringPolicy + ?Sized>(
    side: Side,
    original: &Original,
    config: &SubstitutionConfig,
    scoring: &S,
    meter: &BudgetMeter,
) -> Result<(Vec<SubstituteEntry>, u64), EngineError> {
    let resolved = resolve_params(config, original, side)?;
    let replaced = original.replaced(side);
    let space = ChordSpace::for_substitution(
        &replaced.notes,
        config.pitch_bounds(),
        config.scale()?,
        config.reach,
        config.cardinality_bounds(),
    );
    let cap = if config.test_all { u64::MAX } else { config.sample_size };
    let window = AlignmentWindow::default();

    let mut entries = Vec::new();
    let mut evaluated = 0u64;
    for pitches in space {
        if evaluated >= cap || !meter.tick() {
            break;
        }
        evaluated += 1;
        if pitches.as_slice() == replaced.notes.as_slice() {
            continue;
        }
        let stats = describe_pitches(&pitches, scoring);
        let (from, to) = match side {
            Side::Antechord => (&stats, &original.post),
            Side::Postchord => (&original.ante, &stats),
        };
        let Ok(vl) = lead(&from.notes, &to.notes, &window) else {
            continue;
        };
        let bigram = evaluate(from, to, &vl, scoring);
        let sim_orig = similarity_between(replaced, &stats, scoring);
        let accepted = params_accept(
            &resolved,
            ParamName::ALL,
            |name| param_value(name, &stats, &bigram, sim_orig),
            |name| original.value(name, side),
        );
        if accepted {
            entries.push(SubstituteEntry {
                side,
                stats,
                bigram,
                vl,
                sim_orig,
            });
        }
    }
    log::debug!("substitute {side:?}: {evaluated} evaluated, {} accepted", entries.len());
    Ok((entries, evaluated))
}

/// Combine the best entries of each side into re-paired progressions.
fn pair_up<S: ScoringPolicy + ?Sized>(
    ante: &[SubstituteEntry],
    post: &[SubstituteEntry],
    original: &Original,
    config: &SubstitutionConfig,
    scoring: &S,
    meter: &BudgetMeter,
) -> Result<(Vec<SubstitutePair>, u64), EngineError> {
    // Pair metrics have no side; resolve against the post side.
    let resolved = resolve_params(config, original, Side::Postchord)?;
    // `test_all` pairs every entry; otherwise only the `pair_pool` closest.
    let pool = if config.test_all { usize::MAX } else { config.pair_pool };
    let best = |entries: &[SubstituteEntry]| {
        let mut top = entries.to_vec();
        top.sort_by(|a, b| b.sim_orig.cmp(&a.sim_orig));
        top.truncate(pool);
        top
    };
    let (ante, post) = (best(ante), best(post));
    let window = AlignmentWindow::default();
    let pair_params = ParamName::ALL.into_iter().filter(|p| p.is_pair_metric());

    let mut pairs = Vec::new();
    let mut evaluated = 0u64;
    'outer: for a in &ante {
        for p in &post {
            if !meter.tick() {
                break 'outer;
            }
            evaluated += 1;
            let Ok(vl) = lead(&a.stats.notes, &p.stats.notes, &window) else {
                continue;
            };
            let bigram = evaluate(&a.stats, &p.stats, &vl, scoring);
            let accepted = params_accept(
                &resolved,
                pair_params.clone(),
                |name| param_value(name, &p.stats, &bigram, p.sim_orig),
                |name| original.value(name, Side::Postchord),
            );
            if accepted {
                pairs.push(SubstitutePair {
                    ante: a.clone(),
                    post: p.clone(),
                    bigram,
                });
            }
        }
    }
    Ok((pairs, evaluated))
}

/// Run a substitution search for the step `ante -> post`.
pub(crate) fn substitute<S: ScoringPolicy + ?Sized>(
    ante: &Chord,
    post: &Chord,
    config: &SubstitutionConfig,
    scoring: &S,
    budget: &SearchBudget,
) -> Result<Substitution, EngineError> {
    config.validate()?;
    let ante_stats = describe(ante, scoring);
    let post_stats = describe(post, scoring);
    let vl = lead(ante.pitches(), post.pitches(), &AlignmentWindow::default())?;
    let bigram = evaluate(&ante_stats, &post_stats, &vl, scoring);
    let original = Original {
        ante: ante_stats,
        post: post_stats,
        bigram,
    };

    let keys = sort_keys(config)?;
    let meter = budget.meter();
    let sides: &[Side] = match config.object {
        SubstituteObject::Antechord => &[Side::Antechord],
        SubstituteObject::Postchord => &[Side::Postchord],
        SubstituteObject::Both => &[Side::Antechord, Side::Postchord],
    };

    let mut per_side = Vec::with_capacity(sides.len());
    let mut total_evaluated = 0;
    for &side in sides {
        let (mut entries, evaluated) = search_side(side, &original, config, scoring, &meter)?;
        sort_by_keys(&mut entries, &keys, &config.rm_priority);
        total_evaluated += evaluated;
        per_side.push(entries);
    }

    let mut pairs = Vec::new();
    if let [ante_entries, post_entries] = per_side.as_slice() {
        let (found, evaluated) = pair_up(ante_entries, post_entries, &original, config, scoring, &meter)?;
        pairs = found;
        sort_by_keys(&mut pairs, &keys, &config.rm_priority);
        total_evaluated += evaluated;
    }

    let mut entries: Vec<SubstituteEntry> = per_side.into_iter().flatten().collect();
    if let Some(cap) = config.max_results {
        entries.truncate(cap);
        pairs.truncate(cap);
    }
    log::info!(
        "substitution: {} entries, {} pairs, {total_evaluated} evaluated",
        entries.len(),
        pairs.len()
    );
    Ok(Substitution {
        entries,
        pairs,
        total_evaluated,
        interrupted: meter.tripped(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Param;
    use crate::scoring::StandardScoring;

    fn run(ante: &[u8], post: &[u8], config: &SubstitutionConfig) -> Substitution {
        let ante = Chord::from_midi(ante).unwrap();
        let post = Chord::from_midi(post).unwrap();
        substitute(&ante, &post, config, &StandardScoring::default(), &SearchBudget::unlimited()).unwrap()
    }

    fn small() -> SubstitutionConfig {
        SubstitutionConfig {
            reach: 2,
            n_min: 3,
            n_max: 3,
            ..SubstitutionConfig::default()
        }
    }

    #[test]
    fn test_original_is_never_returned() {
        let out = run(&[60, 64, 67], &[67, 71, 74], &small());
        assert!(!out.entries.is_empty());
        assert!(out.entries.iter().all(|e| e.stats.notes.as_slice() != [67, 71, 74]));
        assert!(out.entries.iter().all(|e| e.side == Side::Postchord));
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn test_default_sort_is_sim_orig_descending() {
        let out = run(&[60, 64, 67], &[67, 71, 74], &small());
        assert!(out.entries.windows(2).all(|w| w[0].sim_orig >= w[1].sim_orig));
    }

    #[test]
    fn test_sample_size_caps_evaluations() {
        let config = SubstitutionConfig {
            sample_size: 7,
            ..small()
        };
        let out = run(&[60, 64, 67], &[67, 71, 74], &config);
        assert_eq!(out.total_evaluated, 7);
        assert!(!out.interrupted);
    }

    #[test]
    fn test_cardinality_param_is_exact_with_zero_radius() {
        let config = SubstitutionConfig {
            n_min: 2,
            n_max: 4,
            test_all: true,
            cardinality: Param {
                center: 4.0,
                ..Param::default()
            },
            ..small()
        };
        let out = run(&[60, 64, 67], &[67, 71, 74], &config);
        assert!(!out.entries.is_empty());
        assert!(out.entries.iter().all(|e| e.stats.n() == 4));
    }

    #[test]
    fn test_reset_list_centers_on_original() {
        // Zero radius around the original's sv.
        let base = run(&[60, 64, 67], &[67, 71, 74], &SubstitutionConfig { test_all: true, ..small() });
        let config = SubstitutionConfig {
            test_all: true,
            reset_list: "sv".to_string(),
            ..small()
        };
        let out = run(&[60, 64, 67], &[67, 71, 74], &config);
        let scoring = StandardScoring::default();
        let a = describe(&Chord::from_midi(&[60, 64, 67]).unwrap(), &scoring);
        let p = describe(&Chord::from_midi(&[67, 71, 74]).unwrap(), &scoring);
        let vl = lead(&a.notes, &p.notes, &AlignmentWindow::default()).unwrap();
        assert!(out.entries.len() < base.entries.len());
        assert!(out.entries.iter().all(|e| e.bigram.sv == vl.sv));
    }

    #[test]
    fn test_percentage_list_switches_mode() {
        let config = SubstitutionConfig {
            percentage_list: "tension".to_string(),
            tension: Param {
                radius: 0.0,
                ..Param::default()
            },
            test_all: true,
            ..small()
        };
        let orig = describe(&Chord::from_midi(&[67, 71, 74]).unwrap(), &StandardScoring::default());
        let out = run(&[60, 64, 67], &[67, 71, 74], &config);
        assert!(!out.entries.is_empty());
        assert!(out.entries.iter().all(|e| (e.stats.tension - orig.tension).abs() < 1e-6));
    }

    #[test]
    fn test_both_produces_pairs_and_counts_them() {
        let config = SubstitutionConfig {
            object: SubstituteObject::Both,
            reach: 1,
            pair_pool: 4,
            ..small()
        };
        let out = run(&[60, 64, 67], &[67, 71, 74], &config);
        assert!(out.entries.iter().any(|e| e.side == Side::Antechord));
        assert!(out.entries.iter().any(|e| e.side == Side::Postchord));
        let first_post = out.entries.iter().position(|e| e.side == Side::Postchord).unwrap();
        assert!(out.entries[..first_post].iter().all(|e| e.side == Side::Antechord));
        assert!(!out.pairs.is_empty());
        assert!(out.pairs.len() <= 16);
        let single = run(&[60, 64, 67], &[67, 71, 74], &SubstitutionConfig { object: SubstituteObject::Antechord, ..config.clone() })
            .total_evaluated
            + run(&[60, 64, 67], &[67, 71, 74], &SubstitutionConfig { object: SubstituteObject::Postchord, ..config.clone() })
                .total_evaluated;
        assert_eq!(out.total_evaluated, single + 16);
    }

    #[test]
    fn test_test_all_pairs_every_entry() {
        let config = SubstitutionConfig {
            object: SubstituteObject::Both,
            reach: 2,
            pair_pool: 4,
            test_all: true,
            ..small()
        };
        let out = run(&[60, 64, 67], &[67, 71, 74], &config);
        let ante = out.entries.iter().filter(|e| e.side == Side::Antechord).count();
        let post = out.entries.iter().filter(|e| e.side == Side::Postchord).count();
        assert!(ante > 4 && post > 4);
        // No pair-metric window is active, so every combination survives.
        assert_eq!(out.pairs.len(), ante * post);

        let mut brute = 0;
        for a in out.entries.iter().filter(|e| e.side == Side::Antechord) {
            for p in out.entries.iter().filter(|e| e.side == Side::Postchord) {
                if lead(&a.stats.notes, &p.stats.notes, &AlignmentWindow::default()).is_ok() {
                    brute += 1;
                }
            }
        }
        assert_eq!(out.pairs.len(), brute);
    }

    #[test]
    fn test_enabled_zero_window_is_exact() {
        let config = SubstitutionConfig {
            n_min: 1,
            tension: Param {
                enabled: true,
                ..Param::default()
            },
            ..small()
        };
        let out = run(&[60, 64, 67], &[67, 71, 74], &config);
        assert!(!out.entries.is_empty());
        assert!(out.entries.iter().all(|e| e.stats.tension == 0.0));
    }

    #[test]
    fn test_unknown_param_name_is_invalid_config() {
        let config = SubstitutionConfig {
            reset_list: "tension,bogus".to_string(),
            ..small()
        };
        let ante = Chord::from_midi(&[60, 64, 67]).unwrap();
        let post = Chord::from_midi(&[67, 71, 74]).unwrap();
        let err = substitute(&ante, &post, &config, &StandardScoring::default(), &SearchBudget::unlimited()).unwrap_err();
        assert_eq!(err.category(), "invalid_config");
    }
}
