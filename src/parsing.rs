//! Error reporting shared by the source front end and the tools.

use std::fmt;
use std::ops::Range;

use itertools::Itertools;

/// Byte offsets into the source text.
pub type Span = Range<usize>;

/// A one-based line and column in the source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for LineLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

pub type LineSpan = Range<LineLocation>;

/// Conversion of byte offsets into line and column numbers.
pub trait AsLineSpan {
    fn as_line_span(&self, source: &str) -> LineSpan;
}

fn locate(source: &str, offset: usize) -> LineLocation {
    let before = source.get(..offset).unwrap_or(source);

    let line_start = before.rfind('\n').map(|index| index + 1).unwrap_or(0);

    LineLocation {
        line: before.matches('\n').count() + 1,
        column: before[line_start..].chars().count() + 1,
    }
}

impl AsLineSpan for Span {
    fn as_line_span(&self, source: &str) -> LineSpan {
        locate(source, self.start)..locate(source, self.end)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Text that is not any kind of token.
    InvalidToken {
        span: Span,
    },

    /// A token in a position where it is not allowed.
    UnexpectedToken {
        span: Span,
    },

    UnknownCommand {
        span: Span,
        name: String,
        suggestion: Option<String>,
    },

    OperandCount {
        span: Span,
        expected: Range<usize>,
        got: usize,
    },

    InvalidOperand {
        span: Span,
        index: usize,
    },

    /// A relative branch that would loop on itself.
    ZeroOffset {
        span: Span,
    },

    EndOfStream,
}

/// An error with a stack of contexts, innermost first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error<Context> {
    pub kind: ErrorKind,
    pub context: Vec<Context>,
}

impl<C> Error<C> {
    pub fn new(kind: ErrorKind) -> Error<C> {
        Error {
            kind,
            context: Vec::new(),
        }
    }

    pub fn span(&self) -> Option<&Span> {
        match self.kind {
            ErrorKind::EndOfStream => None,
            ErrorKind::InvalidToken { ref span }
            | ErrorKind::UnexpectedToken { ref span }
            | ErrorKind::UnknownCommand { ref span, .. }
            | ErrorKind::OperandCount { ref span, .. }
            | ErrorKind::InvalidOperand { ref span, .. }
            | ErrorKind::ZeroOffset { ref span } => Some(span),
        }
    }

    /// The position of the error as line and column numbers.
    pub fn line_span(&self, source: &str) -> Option<LineSpan> {
        self.span().map(|span| span.as_line_span(source))
    }
}

impl<C> From<ErrorKind> for Error<C> {
    fn from(kind: ErrorKind) -> Error<C> {
        Error::new(kind)
    }
}

pub trait ErrorExt<R, C> {
    fn context<T>(self, ctx: T) -> Self where T: Into<C>;
}

impl<R, C> ErrorExt<R, C> for Result<R, Error<C>> {
    fn context<T>(mut self, ctx: T) -> Self where T: Into<C> {
        if let Err(ref mut err) = self {
            err.context.push(ctx.into());
        }

        self
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::InvalidToken { .. } => write!(f, "invalid token"),
            ErrorKind::UnexpectedToken { .. } => write!(f, "unexpected token"),
            ErrorKind::UnknownCommand { name, suggestion: Some(suggestion), .. } =>
                write!(f, "unknown command '{}', did you mean '{}'?", name, suggestion),
            ErrorKind::UnknownCommand { name, suggestion: None, .. } =>
                write!(f, "unknown command '{}'", name),
            ErrorKind::OperandCount { expected, got, .. } if expected.len() == 1 =>
                write!(f, "expected {} operand(s), found {}", expected.start, got),
            ErrorKind::OperandCount { expected, got, .. } =>
                write!(f, "expected {} to {} operands, found {}", expected.start, expected.end - 1, got),
            ErrorKind::InvalidOperand { index, .. } => write!(f, "operand #{} is not valid here", index + 1),
            ErrorKind::ZeroOffset { .. } => write!(f, "branch offset cannot be zero"),
            ErrorKind::EndOfStream => write!(f, "unexpected end of input"),
        }
    }
}

impl<C> fmt::Display for Error<C>
where
    C: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ctx = self.context.iter()
            .rev()
            .join(": ");

        match self.span() {
            Some(span) if ctx.is_empty() =>
                write!(f, "error at position {}-{}: {}", span.start, span.end, self.kind),
            Some(span) =>
                write!(f, "error at position {}-{}: {}: {}", span.start, span.end, ctx, self.kind),
            None if ctx.is_empty() => write!(f, "{}", self.kind),
            None => write!(f, "{}: {}", ctx, self.kind),
        }
    }
}

impl<C: fmt::Debug + fmt::Display> std::error::Error for Error<C> {}

#[test]
fn test_line_span() {
    let source = "halt\n  add 1 a\n";
    let span: Span = 7..14;

    let line_span = span.as_line_span(source);
    assert_eq!(line_span.start, LineLocation { line: 2, column: 3 });
    assert_eq!(line_span.end, LineLocation { line: 2, column: 10 });
}

#[test]
fn test_error_context_display() {
    let result: Result<(), Error<String>> = Err(ErrorKind::ZeroOffset { span: 3..4 }.into());
    let result = result.context("while parsing `zero`").context("line 1");

    assert_eq!(
        result.unwrap_err().to_string(),
        "error at position 3-4: line 1: while parsing `zero`: branch offset cannot be zero",
    );
}
