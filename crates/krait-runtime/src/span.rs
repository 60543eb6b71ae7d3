//! Source spans (character offsets into the original fragment text)

/// A half-open character range `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-width span for synthesized nodes
    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Smallest span covering both `self` and `other`
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Resolve a character offset to a 1-based (line, column) pair.
///
/// Offsets count characters (the unit spans are measured in), so multi-byte
/// source reports sensible positions. Offsets past the end resolve to the
/// final position.
pub fn line_col(source: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;
    for (idx, ch) in source.chars().enumerate() {
        if idx >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_spans() {
        let a = Span::new(2, 5);
        let b = Span::new(4, 9);
        assert_eq!(a.merge(b), Span::new(2, 9));
        assert_eq!(b.merge(a), Span::new(2, 9));
    }

    #[test]
    fn test_dummy_is_empty() {
        assert!(Span::dummy().is_empty());
        assert_eq!(Span::new(3, 3).len(), 0);
    }

    #[test]
    fn test_line_col_first_line() {
        assert_eq!(line_col("x + y", 0), (1, 1));
        assert_eq!(line_col("x + y", 4), (1, 5));
    }

    #[test]
    fn test_line_col_multi_line() {
        let src = "a = 1\nb = 2\nc = 3";
        assert_eq!(line_col(src, 6), (2, 1));
        assert_eq!(line_col(src, 10), (2, 5));
        assert_eq!(line_col(src, 12), (3, 1));
    }

    #[test]
    fn test_line_col_past_end() {
        assert_eq!(line_col("ab", 100), (1, 3));
    }
}
