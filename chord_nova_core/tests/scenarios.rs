// End-to-end scenarios through the public Engine API.

use chord_nova_core::config::{AlignmentSection, ExclusionSection, Param, SubstituteObject, UniqueMode};
use chord_nova_core::pitch::interval::pc_motion;
use chord_nova_core::voice_leading::AlignMode;
use chord_nova_core::sort::Sortable;
use chord_nova_core::sort::Metric;
use chord_nova_core::{
    CancelToken, Chord, Engine, ProgressionConfig, ProgressionConfigBuilder, RootMovement, SearchBudget,
    SubstitutionConfig,
};

fn chord(p: &[u8]) -> Chord {
    Chord::from_midi(p).unwrap()
}

#[test]
fn test_c_major_with_defaults_walks_the_whole_space() {
    let engine = Engine::new();
    let generation = engine.generate(&chord(&[60, 64, 67]), &ProgressionConfig::default()).unwrap();
    // Register 55..=72 (sspan 12 around the seed), every pitch class in
    // reach: all subsets of 1..=12 of those 18 pitches.
    assert_eq!(generation.total_evaluated, 249_527);
    for voicing in [[55, 60, 64], [64, 67, 72]] {
        assert!(generation.candidates.iter().any(|c| c.stats.notes.as_slice() == voicing));
    }
    assert!(!generation.interrupted);
    assert!(!generation.is_exhausted());
    let q: Vec<f64> = generation
        .candidates
        .iter()
        .map(|c| c.metric(Metric::QIndicator).unwrap())
        .collect();
    assert!(q.windows(2).all(|w| w[0] >= w[1]), "not sorted by q: {:?}", &q[..q.len().min(10)]);
}

#[test]
fn test_generation_is_deterministic_and_partition_invariant() {
    let engine = Engine::new();
    let config = ProgressionConfigBuilder::new()
        .cardinality(2, 5)
        .voice_motion(0, 3)
        .sort_order("sv+ t")
        .build()
        .unwrap();
    let seed = chord(&[55, 62, 67]);
    let a = engine.generate(&seed, &config).unwrap();
    let b = engine.generate(&seed, &config).unwrap();
    let c = engine
        .generate_partitioned(&seed, &config, &SearchBudget::unlimited())
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn test_analyse_c_major_to_f_major() {
    let engine = Engine::new();
    let analysis = engine.analyse(&chord(&[60, 64, 67]), &chord(&[65, 69, 72])).unwrap();
    assert_eq!(analysis.vl_result.sv, 3);
    assert_eq!(analysis.bigram_stats.root_movement, Some(RootMovement::UpFourth));
    assert_eq!(analysis.bigram_stats.name_with_octave, "F4 A4 C5");
}

#[test]
fn test_substitute_with_exact_tension() {
    let engine = Engine::new();
    let post = chord(&[67, 71, 74]);
    let x = engine.describe(&post).tension;
    let config = SubstitutionConfig {
        object: SubstituteObject::Postchord,
        tension: Param {
            center: x,
            radius: 0.0,
            ..Param::default()
        },
        ..SubstitutionConfig::default()
    };
    let result = engine.substitute(&chord(&[60, 64, 67]), &post, &config).unwrap();
    assert!(!result.entries.is_empty());
    for entry in &result.entries {
        assert_eq!(entry.stats.tension, x, "entry {:?}", entry.stats.notes);
    }
}

#[test]
fn test_continual_pitch_class_progression_has_no_repeats() {
    let engine = Engine::new();
    let config = ProgressionConfigBuilder::new()
        .cardinality(3, 4)
        .voice_motion(0, 2)
        .unique_mode(UniqueMode::PitchClassSet)
        .continual(4)
        .build()
        .unwrap();
    let seed = chord(&[60, 64, 67]);
    let mut rounds = engine.rounds(&seed, &config).unwrap();
    let collected: Vec<_> = rounds.by_ref().collect();
    assert_eq!(collected.len(), 4);
    let progression = rounds.progression();
    for (i, a) in progression.iter().enumerate() {
        for b in &progression[i + 1..] {
            assert_ne!(a.pc_mask(), b.pc_mask());
        }
    }
}

#[test]
fn test_cancelled_search_is_flagged() {
    let engine = Engine::new();
    let token = CancelToken::new();
    token.cancel();
    let budget = SearchBudget::unlimited().with_cancel(token);
    let generation = engine
        .generate_with_budget(&chord(&[60, 64, 67]), &ProgressionConfig::default(), &budget)
        .unwrap();
    assert!(generation.interrupted);
    assert_eq!(generation.total_evaluated, 0);
    assert!(generation.is_exhausted());
}

#[test]
fn test_chord_library_restricts_to_major_triads() {
    let engine = Engine::new();
    let config = ProgressionConfigBuilder::new()
        .cardinality(3, 3)
        .chord_library(vec![vec![0, 4, 7]])
        .build()
        .unwrap();
    let generation = engine.generate(&chord(&[60, 64, 67]), &config).unwrap();
    assert!(!generation.is_exhausted());
    for c in &generation.candidates {
        assert_eq!(c.stats.count_vec, [0, 0, 1, 1, 1, 0], "{:?}", c.stats.notes);
    }
}

#[test]
fn test_substitute_with_exact_zero_tension() {
    let engine = Engine::new();
    let config = SubstitutionConfig {
        object: SubstituteObject::Postchord,
        tension: Param {
            enabled: true,
            center: 0.0,
            radius: 0.0,
            ..Param::default()
        },
        ..SubstitutionConfig::default()
    };
    let result = engine.substitute(&chord(&[60, 64, 67]), &chord(&[67, 71, 74]), &config).unwrap();
    assert!(!result.entries.is_empty());
    assert!(result.entries.iter().all(|e| e.stats.tension == 0.0));
}

#[test]
fn test_interval_alignment_keeps_voice_slots_and_spacing() {
    let engine = Engine::new();
    let config = ProgressionConfigBuilder::new()
        .cardinality(3, 3)
        .alignment(AlignmentSection {
            align_mode: AlignMode::Interval,
            i_min: 0,
            i_max: 0,
            i_low: 3,
            i_high: 4,
            ..AlignmentSection::default()
        })
        .build()
        .unwrap();
    let seed = [60, 64, 67];
    let generation = engine.generate(&chord(&seed), &config).unwrap();
    assert!(!generation.is_exhausted());
    for c in &generation.candidates {
        assert!(c.stats.self_diff.iter().all(|&d| (3..=4).contains(&d)), "{:?}", c.stats.notes);
        for (i, &d) in c.vl.vec.iter().enumerate() {
            assert_eq!(d, pc_motion(seed[i], c.stats.notes[i]));
        }
    }
}

#[test]
fn test_list_alignment_keeps_root_position_triads() {
    let engine = Engine::new();
    let config = ProgressionConfigBuilder::new()
        .cardinality(3, 3)
        .alignment(AlignmentSection {
            align_mode: AlignMode::List,
            alignment_list: vec![vec![1, 3, 5]],
            ..AlignmentSection::default()
        })
        .build()
        .unwrap();
    let generation = engine.generate(&chord(&[60, 64, 67]), &config).unwrap();
    assert!(!generation.is_exhausted());
    for c in &generation.candidates {
        assert_eq!(c.stats.alignment.as_slice(), &[1, 3, 5], "{:?}", c.stats.notes);
    }
}

#[test]
fn test_exclusion_roots_drop_candidates() {
    let engine = Engine::new();
    let seed = chord(&[60, 64, 67]);
    let base = ProgressionConfigBuilder::new().cardinality(3, 3).voice_motion(0, 2);
    let all = engine.generate(&seed, &base.clone().build().unwrap()).unwrap();
    let config = base
        .exclusion(ExclusionSection {
            enabled: true,
            exclusion_roots: vec![0],
            ..ExclusionSection::default()
        })
        .build()
        .unwrap();
    let generation = engine.generate(&seed, &config).unwrap();
    assert!(!generation.is_exhausted());
    assert!(generation.candidates.len() < all.candidates.len());
    assert!(generation.candidates.iter().all(|c| c.stats.root != Some(0)));
    assert_eq!(generation.total_evaluated, all.total_evaluated);
}

#[test]
fn test_invalid_chord_is_an_error() {
    let err = Chord::parse_midi(&[60, 128]).unwrap_err();
    assert_eq!(err.category(), "invalid_chord");
    assert!(Chord::parse_midi(&[]).is_err());
}
