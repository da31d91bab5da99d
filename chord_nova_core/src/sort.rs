// Result ordering.
//
// A sort order is a list of metric codes separated by commas or whitespace,
// each optionally suffixed with `+` (ascending) or `-` (descending, the
// default). For example `"q, sv+ t"` sorts by Q indicator descending, then
// voice-leading distance ascending, then tension descending.
//
// Codes: t (tension), k (chroma), kk (chroma_old), c (common notes),
// sv (voice-leading distance), x (similarity), q (Q indicator), s (span),
// ss (union span), n (pitch count), m (distinct pitch classes),
// h (thickness), g (geometrical center), r (root) and sim (similarity to the
// original, substitution only).
//
// Sorting is stable: ties that survive every key keep enumeration order,
// after an optional root-movement preference list has been applied.

use std::cmp::Ordering;

use crate::bigram::RootMovement;
use crate::error::EngineError;

/// A sortable metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Tension,
    Chroma,
    ChromaOld,
    CommonNote,
    Sv,
    Similarity,
    QIndicator,
    Span,
    Sspan,
    Pitches,
    UniquePitchClasses,
    Thickness,
    GeometricalCenter,
    Root,
    SimOrig,
}

impl Metric {
    pub fn from_code(code: &str) -> Option<Self> {
        let metric = match code {
            "t" => Metric::Tension,
            "k" => Metric::Chroma,
            "kk" => Metric::ChromaOld,
            "c" => Metric::CommonNote,
            "sv" => Metric::Sv,
            "x" => Metric::Similarity,
            "q" => Metric::QIndicator,
            "s" => Metric::Span,
            "ss" => Metric::Sspan,
            "n" => Metric::Pitches,
            "m" => Metric::UniquePitchClasses,
            "h" => Metric::Thickness,
            "g" => Metric::GeometricalCenter,
            "r" => Metric::Root,
            "sim" => Metric::SimOrig,
            _ => return None,
        };
        Some(metric)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub metric: Metric,
    pub ascending: bool,
}

impl SortKey {
    pub fn descending(metric: Metric) -> Self {
        SortKey {
            metric,
            ascending: false,
        }
    }
}

/// Parse a sort order. An empty string yields an empty list; callers
/// substitute their own default key.
pub fn parse_sort_order(order: &str) -> Result<Vec<SortKey>, EngineError> {
    order
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            let (code, ascending) = match tok.strip_suffix('+') {
                Some(code) => (code, true),
                None => (tok.strip_suffix('-').unwrap_or(tok), false),
            };
            let metric = Metric::from_code(&code.to_ascii_lowercase()).ok_or_else(|| {
                EngineError::invalid_config(format!("unknown sort code {tok:?}"))
            })?;
            Ok(SortKey { metric, ascending })
        })
        .collect()
}

/// Something the result sorter can rank.
pub trait Sortable {
    /// Value of a metric, or `None` when it does not apply (an undetectable
    /// root, or `sim` outside substitution). `None` ranks below any value.
    fn metric(&self, metric: Metric) -> Option<f64>;

    fn root_movement(&self) -> Option<RootMovement>;
}

fn compare_metric(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

fn rm_rank(priority: &[RootMovement], rm: Option<RootMovement>) -> usize {
    rm.and_then(|rm| priority.iter().position(|&p| p == rm))
        .unwrap_or(priority.len())
}

/// Stable sort by the given keys, then by position of the root movement in
/// `rm_priority` (unlisted movements last).
pub fn sort_by_keys<T: Sortable>(items: &mut [T], keys: &[SortKey], rm_priority: &[RootMovement]) {
    items.sort_by(|a, b| {
        for key in keys {
            let ord = compare_metric(a.metric(key.metric), b.metric(key.metric));
            let ord = if key.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        if rm_priority.is_empty() {
            Ordering::Equal
        } else {
            rm_rank(rm_priority, a.root_movement()).cmp(&rm_rank(rm_priority, b.root_movement()))
        }
    });
}
