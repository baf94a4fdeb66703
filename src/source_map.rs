//! Where each resolved instruction came from in the assembly source.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use crate::parsing::{AsLineSpan, LineSpan, Span};

/// Program counter values of a resolved program mapped to the span of source that
/// produced the instruction. `V` is a byte [Span] or a [LineSpan].
///
/// Resolved instructions without a source, such as an implicit `end`, have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap<V> {
    spans: BTreeMap<usize, V>,
}

impl<V> FromIterator<(usize, V)> for SourceMap<V> {
    fn from_iter<I>(iter: I) -> Self
        where I: IntoIterator<Item = (usize, V)>
    {
        SourceMap {
            spans: iter.into_iter().collect(),
        }
    }
}

impl<V> SourceMap<V> {
    pub fn get_source_span(&self, program_counter: usize) -> Option<&V> {
        self.spans.get(&program_counter)
    }

    /// Entries in program counter order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &V)> {
        self.spans.iter().map(|(program_counter, span)| (*program_counter, span))
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl SourceMap<Span> {
    /// Converts byte offsets into line and column numbers of `source`.
    pub fn into_line_based(self, source: &str) -> SourceMap<LineSpan> {
        self.spans.into_iter()
            .map(|(program_counter, span)| (program_counter, span.as_line_span(source)))
            .collect()
    }
}

impl SourceMap<LineSpan> {
    /// The first instruction starting on the one-based `line`, if any.
    pub fn program_counter_at_line(&self, line: usize) -> Option<usize> {
        self.iter()
            .find(|(_, span)| span.start.line == line)
            .map(|(program_counter, _)| program_counter)
    }
}

#[test]
fn test_line_based_lookup() {
    let source = "move 1 a\n\nadd 2 a\nhalt";

    let map: SourceMap<Span> = vec![(0, 0..8), (1, 10..17), (2, 18..22)].into_iter().collect();
    assert_eq!(map.iter().map(|(pc, _)| pc).collect::<Vec<_>>(), vec![0, 1, 2]);

    let lines = map.into_line_based(source);

    assert_eq!(lines.len(), 3);
    assert_eq!(lines.get_source_span(1).map(|span| (span.start.line, span.start.column)), Some((3, 1)));
    assert_eq!(lines.program_counter_at_line(4), Some(2));
    assert_eq!(lines.program_counter_at_line(2), None);
}
