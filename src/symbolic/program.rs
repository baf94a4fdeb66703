use std::fmt;

use slog::Logger;

use crate::error::ResolutionError;
use crate::instruction::Instruction;
use crate::parsing::Span;
use crate::resolver::{self, ResolvedProgram};
use crate::source_map::SourceMap;

use super::parser::{ParseError, Parser};

/// An unresolved program together with the source span of every instruction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub spans: Vec<Span>,
}

impl Program {
    pub fn parse(input: &str) -> Result<Program, ParseError> {
        let (instructions, spans) = Parser::new(input)
            .parse()?
            .into_iter()
            .unzip();

        Ok(Program {
            instructions,
            spans,
        })
    }

    pub fn resolve(&self) -> Result<ResolvedProgram, ResolutionError> {
        resolver::resolve(&self.instructions)
    }

    pub fn resolve_with_logger<L>(&self, logger: L) -> Result<ResolvedProgram, ResolutionError>
        where L: Into<Option<Logger>>,
    {
        resolver::resolve_with_logger(&self.instructions, logger)
    }

    /// Maps program counter values of `resolved`, which must have been resolved from this
    /// program, to the source spans of their instructions.
    pub fn source_map(&self, resolved: &ResolvedProgram) -> SourceMap<Span> {
        resolved.origins.iter()
            .enumerate()
            .filter_map(|(program_counter, origin)| {
                self.spans.get(*origin).map(|span| (program_counter, span.clone()))
            })
            .collect()
    }

    /// The source span of the instruction a resolution error points at.
    pub fn error_span(&self, error: &ResolutionError) -> Option<&Span> {
        self.spans.get(error.position)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{:04}. {}", index, instruction)?;
        }

        Ok(())
    }
}

#[test]
fn test_source_map_skips_meta_instructions() {
    use crate::parsing::AsLineSpan;

    let source = "name $20 total\nmain:\n  move 1 total\n  halt\n";
    let program = Program::parse(source).unwrap();
    let resolved = program.resolve().unwrap();

    assert_eq!(resolved.instructions.len(), 3);

    let map = program.source_map(&resolved);
    assert_eq!(map.get_source_span(0).map(|span| &source[span.clone()]), Some("move 1 total"));
    assert_eq!(map.get_source_span(1).map(|span| &source[span.clone()]), Some("halt"));

    let lines = map.into_line_based(source);
    assert_eq!(lines.get_source_span(0).map(|span| span.start.line), Some(3));
    assert_eq!(
        lines.get_source_span(2).cloned(),
        Some((source.len()..source.len()).as_line_span(source)),
    );
}

#[test]
fn test_error_span_of_undefined_label() {
    let source = "halt\ncall :nowhere\n";
    let program = Program::parse(source).unwrap();
    let error = program.resolve().unwrap_err();

    assert_eq!(error.position, 1);
    assert_eq!(program.error_span(&error).map(|span| &source[span.clone()]), Some("call :nowhere"));
}
