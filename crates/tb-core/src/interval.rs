//! Interval unions over millisecond time.
//!
//! A set is kept sorted and merged. Spans that overlap or touch collapse into
//! one component; degenerate spans (points) are kept so they can be counted,
//! but contribute nothing to the length.

use serde::{Deserialize, Serialize};

/// One component `[start_ms, end_ms)`; `start_ms == end_ms` is a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Span {
    /// Creates a span, swapping the bounds if they are inverted.
    pub const fn new(start_ms: i64, end_ms: i64) -> Self {
        if end_ms < start_ms {
            Self {
                start_ms: end_ms,
                end_ms: start_ms,
            }
        } else {
            Self { start_ms, end_ms }
        }
    }

    pub const fn point(time_ms: i64) -> Self {
        Self {
            start_ms: time_ms,
            end_ms: time_ms,
        }
    }

    pub const fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub const fn is_point(&self) -> bool {
        self.start_ms == self.end_ms
    }
}

/// A union of spans, stored as disjoint sorted components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSet {
    spans: Vec<Span>,
}

impl IntervalSet {
    pub const fn new() -> Self {
        Self { spans: Vec::new() }
    }

    /// Builds the union of `spans`.
    pub fn from_spans(spans: impl IntoIterator<Item = Span>) -> Self {
        let mut sorted: Vec<Span> = spans.into_iter().collect();
        sorted.sort_unstable();

        let mut merged: Vec<Span> = Vec::with_capacity(sorted.len());
        for span in sorted {
            if let Some(last) = merged.last_mut() {
                if span.start_ms <= last.end_ms {
                    last.end_ms = last.end_ms.max(span.end_ms);
                } else {
                    merged.push(span);
                }
            } else {
                merged.push(span);
            }
        }

        Self { spans: merged }
    }

    /// Adds one span to the union.
    pub fn insert(&mut self, span: Span) {
        let spans = std::mem::take(&mut self.spans);
        *self = Self::from_spans(spans.into_iter().chain(std::iter::once(span)));
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::from_spans(self.spans.iter().chain(&other.spans).copied())
    }

    /// The part of the set inside the closed range `[start_ms, end_ms]`.
    ///
    /// Components that only touch the range at one end are kept as points.
    #[must_use]
    pub fn clip(&self, start_ms: i64, end_ms: i64) -> Self {
        let spans = self
            .spans
            .iter()
            .filter(|span| span.end_ms >= start_ms && span.start_ms <= end_ms)
            .map(|span| Span::new(span.start_ms.max(start_ms), span.end_ms.min(end_ms)))
            .collect();
        Self { spans }
    }

    /// Total covered length; points count for nothing.
    pub fn total_ms(&self) -> i64 {
        self.spans.iter().map(Span::duration_ms).sum()
    }

    /// Number of disjoint components.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Components with a positive length.
    pub fn non_degenerate(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|span| !span.is_point())
    }
}

impl FromIterator<Span> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = Span>>(iter: I) -> Self {
        Self::from_spans(iter)
    }
}
