// Chord Nova engine
//
// A combinatorial chord-progression engine. Given a seed chord (a set of
// MIDI pitches) and a constraint configuration, it enumerates every
// consequent chord in a bounded search space, scores each step with
// harmonic and voice-leading metrics, filters by a dozen independent
// constraint dimensions, and ranks what survives. It also analyses a given
// step and searches for substitutes that stay close to an original pair.
//
// Architecture:
// - pitch.rs: Chord value type, pitch classes, note names
// - scale.rs: Pitch-class scales and presets
// - scoring.rs: Pluggable scoring policy (root, tension, thickness, Q)
// - descriptor.rs: Per-chord statistics (ChordStats)
// - voice_leading.rs: Minimal-motion voice pairing between two chords
// - naming.rs: Chord-quality names
// - bigram.rs: Metrics of one progression step (BigramStats)
// - sort.rs: Sort-order parsing and stable multi-key sorting
// - config.rs: ProgressionConfig / SubstitutionConfig documents + builder
// - filter.rs: Compiled constraint dimensions with rejection tallies
// - budget.rs: Cancellation, deadlines, evaluation caps
// - space.rs: Lazy candidate search spaces
// - enumerate.rs: Generation rounds, continual Rounds iterator
// - substitute.rs: Substitution search (single side and pairs)
// - engine.rs: The Engine facade
// - midi.rs: MIDI export of progressions
//
// Every search is deterministic: the same inputs give the same candidates
// in the same order, sequential or partitioned.

pub mod bigram;
pub mod budget;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod filter;
pub mod midi;
pub mod naming;
pub mod pitch;
pub mod scale;
pub mod scoring;
pub mod sort;
pub mod space;
pub mod substitute;
pub mod voice_leading;

pub use bigram::{BigramStats, RootMovement};
pub use budget::{CancelToken, SearchBudget};
pub use config::{ProgressionConfig, ProgressionConfigBuilder, SubstitutionConfig};
pub use descriptor::ChordStats;
pub use engine::{Analysis, Engine};
pub use enumerate::{Candidate, Generation, Round, Rounds};
pub use error::EngineError;
pub use pitch::Chord;
pub use scoring::{ScoringPolicy, StandardScoring};
pub use substitute::{Side, SubstituteEntry, SubstitutePair, Substitution};
pub use voice_leading::VoiceLeadingResult;
