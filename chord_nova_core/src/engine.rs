// The engine facade: the three public operations.
//
// `Engine` owns a scoring policy and exposes describe, analyse, generate and
// substitute over it. It holds no other state, so one engine can serve any
// number of concurrent calls (`&self` everywhere, policies are `Sync`).
// Every call validates its own inputs and reports failures as
// `EngineError`; an empty result is a success.

use serde::{Deserialize, Serialize};

use crate::bigram::{BigramStats, evaluate};
use crate::budget::SearchBudget;
use crate::config::{ProgressionConfig, SubstitutionConfig};
use crate::descriptor::{ChordStats, describe};
use crate::enumerate::{Generation, Rounds, SearchPlan, search_round};
use crate::error::EngineError;
use crate::filter::ConstraintFilter;
use crate::pitch::Chord;
use crate::scoring::{ScoringPolicy, StandardScoring};
use crate::substitute::{Substitution, substitute};
use crate::voice_leading::{AlignmentWindow, VoiceLeadingResult, lead};

/// Pairwise analysis of one progression step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub ante_stats: ChordStats,
    pub post_stats: ChordStats,
    pub vl_result: VoiceLeadingResult,
    pub bigram_stats: BigramStats,
}

#[derive(Debug, Clone, Default)]
pub struct Engine<S: ScoringPolicy = StandardScoring> {
    scoring: S,
}

impl Engine<StandardScoring> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: ScoringPolicy> Engine<S> {
    pub fn with_scoring(scoring: S) -> Self {
        Engine { scoring }
    }

    pub fn scoring(&self) -> &S {
        &self.scoring
    }

    pub fn describe(&self, chord: &Chord) -> ChordStats {
        describe(chord, &self.scoring)
    }

    /// Analyse `ante -> post` with unrestricted voice pairing.
    pub fn analyse(&self, ante: &Chord, post: &Chord) -> Result<Analysis, EngineError> {
        self.analyse_with(ante, post, &AlignmentWindow::default())
    }

    pub fn analyse_with(&self, ante: &Chord, post: &Chord, window: &AlignmentWindow) -> Result<Analysis, EngineError> {
        let ante_stats = describe(ante, &self.scoring);
        let post_stats = describe(post, &self.scoring);
        let vl_result = lead(ante.pitches(), post.pitches(), window)?;
        let bigram_stats = evaluate(&ante_stats, &post_stats, &vl_result, &self.scoring);
        Ok(Analysis {
            ante_stats,
            post_stats,
            vl_result,
            bigram_stats,
        })
    }

    /// Generate consequents of `seed`, or a continual chain when
    /// `config.continual` is set.
    pub fn generate(&self, seed: &Chord, config: &ProgressionConfig) -> Result<Generation, EngineError> {
        self.generate_with_budget(seed, config, &SearchBudget::unlimited())
    }

    pub fn generate_with_budget(
        &self,
        seed: &Chord,
        config: &ProgressionConfig,
        budget: &SearchBudget,
    ) -> Result<Generation, EngineError> {
        self.run(seed, config, budget, false)
    }

    /// Like `generate_with_budget`, with each round's space split by
    /// cardinality and scanned on the rayon pool. Same output.
    pub fn generate_partitioned(
        &self,
        seed: &Chord,
        config: &ProgressionConfig,
        budget: &SearchBudget,
    ) -> Result<Generation, EngineError> {
        self.run(seed, config, budget, true)
    }

    fn run(&self, seed: &Chord, config: &ProgressionConfig, budget: &SearchBudget, parallel: bool) -> Result<Generation, EngineError> {
        let plan = SearchPlan::new(ConstraintFilter::new(config)?, budget.clone(), parallel)?;
        if !config.continual {
            let seed_stats = describe(seed, &self.scoring);
            let pedal = plan.filter.pedal_pitches();
            let outcome = search_round(&plan, &self.scoring, 0, &[seed_stats], &pedal);
            return Ok(Generation {
                candidates: outcome.candidates,
                total_evaluated: outcome.total_evaluated,
                interrupted: outcome.interrupted,
            });
        }

        let mut generation = Generation {
            candidates: Vec::new(),
            total_evaluated: 0,
            interrupted: false,
        };
        for round in Rounds::new(&self.scoring, plan, seed.clone()) {
            generation.total_evaluated += round.total_evaluated;
            generation.interrupted |= round.interrupted;
            generation.candidates.extend(round.winner);
        }
        Ok(generation)
    }

    /// Lazy continual rounds from `seed`. A non-continual config yields a
    /// single round.
    pub fn rounds(&self, seed: &Chord, config: &ProgressionConfig) -> Result<Rounds<'_, S>, EngineError> {
        self.rounds_with_budget(seed, config, &SearchBudget::unlimited())
    }

    pub fn rounds_with_budget(
        &self,
        seed: &Chord,
        config: &ProgressionConfig,
        budget: &SearchBudget,
    ) -> Result<Rounds<'_, S>, EngineError> {
        let plan = SearchPlan::new(ConstraintFilter::new(config)?, budget.clone(), false)?;
        Ok(Rounds::new(&self.scoring, plan, seed.clone()))
    }

    pub fn substitute(&self, ante: &Chord, post: &Chord, config: &SubstitutionConfig) -> Result<Substitution, EngineError> {
        self.substitute_with_budget(ante, post, config, &SearchBudget::unlimited())
    }

    pub fn substitute_with_budget(
        &self,
        ante: &Chord,
        post: &Chord,
        config: &SubstitutionConfig,
        budget: &SearchBudget,
    ) -> Result<Substitution, EngineError> {
        substitute(ante, post, config, &self.scoring, budget)
    }
}
