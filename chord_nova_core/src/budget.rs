// Search budgets: cancellation, deadlines and evaluation caps.
//
// A search runs to exhaustion unless its `SearchBudget` trips. Tripping
// never changes what was computed so far, only how far the search got; the
// outcome is flagged `interrupted` so callers can tell a truncated result
// from a complete one.
//
// `CancelToken` is a cloneable handle over a shared flag, so another thread
// (a UI, a request handler) can stop a running search. `BudgetMeter` is the
// per-search counter the enumeration loops tick once per candidate; it is
// shared by reference between partitioned workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How often (in evaluations) the meter reads the clock.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Limits on a single search call. The default is unlimited.
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    pub cancel: Option<CancelToken>,
    pub deadline: Option<Instant>,
    pub max_evaluations: Option<u64>,
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_max_evaluations(mut self, cap: u64) -> Self {
        self.max_evaluations = Some(cap);
        self
    }

    pub fn meter(&self) -> BudgetMeter<'_> {
        BudgetMeter {
            budget: self,
            evaluated: AtomicU64::new(0),
            tripped: AtomicBool::new(false),
        }
    }
}

/// Running evaluation count against a budget.
#[derive(Debug)]
pub struct BudgetMeter<'a> {
    budget: &'a SearchBudget,
    evaluated: AtomicU64,
    tripped: AtomicBool,
}

impl BudgetMeter<'_> {
    /// Claim one evaluation. Returns false (and latches `tripped`) when the
    /// budget is spent; the caller must stop without evaluating.
    pub fn tick(&self) -> bool {
        if self.tripped.load(Ordering::Relaxed) {
            return false;
        }
        if self.budget.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            self.trip();
            return false;
        }
        let n = self.evaluated.fetch_add(1, Ordering::Relaxed);
        if self.budget.max_evaluations.is_some_and(|cap| n >= cap) {
            self.evaluated.fetch_sub(1, Ordering::Relaxed);
            self.trip();
            return false;
        }
        if n % DEADLINE_CHECK_INTERVAL == 0
            && self.budget.deadline.is_some_and(|d| Instant::now() >= d)
        {
            self.evaluated.fetch_sub(1, Ordering::Relaxed);
            self.trip();
            return false;
        }
        true
    }

    fn trip(&self) {
        if !self.tripped.swap(true, Ordering::Relaxed) {
            log::warn!("search interrupted after {} evaluations", self.evaluated());
        }
    }

    pub fn tripped(&self) -> bool {
        self.tripped.load(Ordering::Relaxed)
    }

    pub fn evaluated(&self) -> u64 {
        self.evaluated.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_trips() {
        let budget = SearchBudget::unlimited();
        let meter = budget.meter();
        for _ in 0..10_000 {
            assert!(meter.tick());
        }
        assert_eq!(meter.evaluated(), 10_000);
        assert!(!meter.tripped());
    }

    #[test]
    fn test_evaluation_cap() {
        let budget = SearchBudget::unlimited().with_max_evaluations(3);
        let meter = budget.meter();
        assert!(meter.tick());
        assert!(meter.tick());
        assert!(meter.tick());
        assert!(!meter.tick());
        assert!(!meter.tick());
        assert_eq!(meter.evaluated(), 3);
        assert!(meter.tripped());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let budget = SearchBudget::unlimited().with_cancel(token.clone());
        let meter = budget.meter();
        assert!(meter.tick());
        token.cancel();
        assert!(!meter.tick());
        assert!(meter.tripped());
    }

    #[test]
    fn test_expired_deadline_trips_on_first_check() {
        let budget = SearchBudget::unlimited().with_timeout(Duration::ZERO);
        let meter = budget.meter();
        assert!(!meter.tick());
        assert_eq!(meter.evaluated(), 0);
    }
}
