use miette::{SourceOffset, SourceSpan};
use std::cmp::{max, min};
use std::fmt::{Debug, Display};
use std::ops::Range;

/// Compact index of a byte in the source code.
pub type SourcePosition = u32;

/// A half-open range of bytes in the input string.
///
/// Spans are small enough to be copied around freely. Every syntax node, every IR instruction and
/// every diagnostic carries one.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Default, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Span {
    pub low: SourcePosition,
    pub high: SourcePosition,
}

impl From<Span> for SourceSpan {
    fn from(val: Span) -> Self {
        SourceSpan::new(
            SourceOffset::from(val.low as usize),
            val.high.saturating_sub(val.low) as usize,
        )
    }
}

impl Span {
    pub fn new(range: Range<SourcePosition>) -> Self {
        Self {
            low: range.start,
            high: range.end,
        }
    }

    /// Create a span covering the single byte at `low`.
    pub fn pos(low: SourcePosition) -> Self {
        Self { low, high: low + 1 }
    }

    pub fn from_pair(low: &Span, high: &Span) -> Self {
        low.merge(high)
    }

    pub fn empty() -> Self {
        Self { low: 0, high: 0 }
    }

    /// Get the union of two spans.
    ///
    /// ```
    /// use ember_span::Span;
    ///
    /// let a = Span::new(0..10);
    /// let b = Span::new(5..15);
    /// assert_eq!(a.merge(&b), Span::new(0..15));
    /// ```
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            low: min(self.low, other.low),
            high: max(self.high, other.high),
        }
    }

    pub fn len(&self) -> usize {
        self.high.saturating_sub(self.low) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.high <= self.low
    }
}

impl From<Range<SourcePosition>> for Span {
    fn from(range: Range<SourcePosition>) -> Self {
        Self::new(range)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.low, self.high)
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::Span;
    use miette::SourceSpan;

    #[test]
    fn test_merge_is_commutative() {
        let a = Span::new(3..4);
        let b = Span::new(10..12);
        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(Span::from_pair(&a, &b), Span::new(3..12));
    }

    #[test]
    fn test_conversion_into_source_span() {
        let span: SourceSpan = Span::new(4..9).into();
        assert_eq!(span.offset(), 4);
        assert_eq!(span.len(), 5);
        let inverted: SourceSpan = Span { low: 9, high: 4 }.into();
        assert_eq!(inverted.len(), 0);
    }

    #[test]
    fn test_single_position_span() {
        let span = Span::pos(7);
        assert_eq!(span.len(), 1);
        assert!(!span.is_empty());
        assert!(Span::empty().is_empty());
    }
}
