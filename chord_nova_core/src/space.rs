// The lazy candidate search space.
//
// A `ChordSpace` is an iterator over candidate pitch lists that never
// materialises the cross product: it walks a list of stages, each stage
// being "all k-subsets of this pitch pool", one combination at a time.
// Memory is bounded by the pool and a single index vector.
//
// Generation space: the pool is every in-scale pitch inside the given
// register whose pitch class lies within `vl_max` of some seed pitch class.
// Voice leading is octave-equivalent, so every voice of a candidate pairs
// with some seed voice and moves at least that pitch-class distance; a
// pitch farther away can never pass the voice-leading window. Stages run
// cardinality-ascending; within a stage combinations come out in
// lexicographic order.
//
// Substitution space: "closest first". Stage r = 0..=reach holds subsets
// whose farthest pitch is exactly r semitones from the original chord. The
// pool of stage r lists the distance-r pitches first, so restricting the
// first combination index to that prefix yields exactly the subsets that
// use at least one of them. Within a shell, cardinalities run by closeness
// to the original's.
//
// Both spaces skip subsets whose distinct-pitch-class count falls outside
// the m window; skipped subsets are not evaluations.

use smallvec::SmallVec;

use crate::pitch::interval::interval_class;
use crate::pitch::{Pitches, pc_mask};
use crate::scale::Scale;

/// One stage: all `k`-subsets of `pool` whose first element lies in
/// `pool[..first_limit]`.
#[derive(Debug, Clone)]
struct Stage {
    pool: Vec<u8>,
    k: usize,
    first_limit: usize,
}

impl Stage {
    fn size(&self) -> u128 {
        let n = self.pool.len() as u64;
        let rest = n.saturating_sub(self.first_limit as u64);
        binomial(n, self.k as u64) - binomial(rest, self.k as u64)
    }
}

/// n choose k, saturating.
pub fn binomial(n: u64, k: u64) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc.saturating_mul((n - i) as u128) / (i + 1) as u128;
    }
    acc
}

/// Lexicographic combination state over one stage.
#[derive(Debug, Clone)]
struct Cursor {
    idx: SmallVec<[usize; 16]>,
    done: bool,
}

impl Cursor {
    fn start(stage: &Stage) -> Self {
        let n = stage.pool.len();
        let k = stage.k;
        let done = k == 0 || k > n || stage.first_limit == 0;
        Cursor {
            idx: (0..k).collect(),
            done,
        }
    }

    fn advance(&mut self, stage: &Stage) {
        let n = stage.pool.len();
        let k = self.idx.len();
        let mut i = k;
        while i > 0 {
            i -= 1;
            if self.idx[i] < n - k + i {
                self.idx[i] += 1;
                for j in i + 1..k {
                    self.idx[j] = self.idx[j - 1] + 1;
                }
                if self.idx[0] >= stage.first_limit {
                    self.done = true;
                }
                return;
            }
        }
        self.done = true;
    }
}

/// Lazy iterator over candidate pitch lists (each sorted ascending).
#[derive(Debug, Clone)]
pub struct ChordSpace {
    stages: Vec<Stage>,
    stage: usize,
    cursor: Option<Cursor>,
    m_min: u32,
    m_max: u32,
}

impl ChordSpace {
    fn from_stages(stages: Vec<Stage>, m_min: u32, m_max: u32) -> Self {
        ChordSpace {
            stages,
            stage: 0,
            cursor: None,
            m_min,
            m_max,
        }
    }

    /// Generation space around `seed`. `bounds` is the register to search,
    /// usually `ProgressionConfig::generation_bounds`.
    pub fn for_generation(
        seed: &[u8],
        bounds: (u8, u8),
        scale: Scale,
        vl_max: u32,
        cardinality: (usize, usize),
        m_window: (u32, u32),
    ) -> Self {
        let (lo, hi) = bounds;
        let pool: Vec<u8> = scale
            .pitches_in_range(lo, hi)
            .into_iter()
            .filter(|&p| seed.iter().any(|&s| u32::from(interval_class(p.abs_diff(s))) <= vl_max))
            .collect();
        let (n_min, n_max) = cardinality;
        let n_max = n_max.min(pool.len());
        let stages = (n_min.max(1)..=n_max)
            .map(|k| Stage {
                first_limit: pool.len(),
                pool: pool.clone(),
                k,
            })
            .collect();
        Self::from_stages(stages, m_window.0, m_window.1)
    }

    /// Substitution space around `original`, closest shells first.
    pub fn for_substitution(
        original: &[u8],
        bounds: (u8, u8),
        scale: Scale,
        reach: u8,
        cardinality: (usize, usize),
    ) -> Self {
        let (lo, hi) = bounds;
        let distance = |p: u8| original.iter().map(|&o| p.abs_diff(o)).min().unwrap_or(u8::MAX);
        let candidates: Vec<(u8, u8)> = scale
            .pitches_in_range(lo, hi)
            .into_iter()
            .map(|p| (p, distance(p)))
            .filter(|&(_, d)| d <= reach)
            .collect();

        let (n_min, n_max) = cardinality;
        let mut cards: Vec<usize> = (n_min.max(1)..=n_max).collect();
        let target = original.len();
        cards.sort_by_key(|&k| (k.abs_diff(target), k));

        let mut stages = Vec::new();
        for r in 0..=reach {
            let exact: Vec<u8> = candidates.iter().filter(|c| c.1 == r).map(|c| c.0).collect();
            if exact.is_empty() {
                continue;
            }
            let inner = candidates.iter().filter(|c| c.1 < r).map(|c| c.0);
            let first_limit = exact.len();
            let pool: Vec<u8> = exact.into_iter().chain(inner).collect();
            for &k in &cards {
                if k <= pool.len() {
                    stages.push(Stage {
                        pool: pool.clone(),
                        k,
                        first_limit,
                    });
                }
            }
        }
        Self::from_stages(stages, 1, u32::MAX)
    }

    /// Number of subsets the space walks before m-window skipping.
    pub fn size(&self) -> u128 {
        self.stages.iter().map(Stage::size).sum()
    }

    /// Pitch pool of the first stage (the generation universe).
    pub fn universe(&self) -> &[u8] {
        self.stages.first().map(|s| s.pool.as_slice()).unwrap_or(&[])
    }

    /// Split into one space per stage, in walk order. Concatenating the
    /// partitions' output reproduces this space's output exactly.
    pub fn partitions(&self) -> Vec<ChordSpace> {
        self.stages
            .iter()
            .map(|s| Self::from_stages(vec![s.clone()], self.m_min, self.m_max))
            .collect()
    }

    fn in_m_window(&self, pitches: &[u8]) -> bool {
        let m = pc_mask(pitches).count_ones();
        self.m_min <= m && m <= self.m_max
    }
}

impl Iterator for ChordSpace {
    type Item = Pitches;

    fn next(&mut self) -> Option<Pitches> {
        loop {
            let stage = self.stages.get(self.stage)?;
            let cursor = self.cursor.get_or_insert_with(|| Cursor::start(stage));
            if cursor.done {
                self.stage += 1;
                self.cursor = None;
                continue;
            }
            let mut pitches: Pitches = cursor.idx.iter().map(|&i| stage.pool[i]).collect();
            cursor.advance(stage);
            pitches.sort_unstable();
            if self.in_m_window(&pitches) {
                return Some(pitches);
            }
        }
    }
}
