//! Resolution of symbolic instruction streams into executable programs.
//!
//! The resolver runs in three steps:
//!
//! 1. `list` blocks are expanded into the initial memory image and removed.
//! 2. Subroutine labels (`func`) and variable aliases (`name`) are entered into the symbol
//!    table in a single pass and removed. A label is bound to the index its following
//!    instruction will have once every meta-instruction before it is gone.
//! 3. Jump and call targets are replaced with the instruction indices from step 2. A `call`
//!    additionally receives its own index as its indirect object, which the emulator pushes
//!    as the return address.
//!
//! Resolution does not modify its input; it produces a new [ResolvedProgram].

use std::collections::BTreeMap;

use slog::{debug, o, trace, Discard, Logger};

use crate::error::{ResolutionError, ResolutionErrorKind};
use crate::instruction::{Instruction, Verb};
use crate::symbol_table::{Symbol, SymbolTable, FIRST_USER_ADDRESS};
use crate::token::{parse_literal, Mode, Token};

/// First address of the stack region. Initial data must end below it.
pub const STACK_BASE: u8 = 240;

/// The largest number of instructions in a resolved program. The program counter value 255
/// never names an instruction, so falling through the last one is a fetch out of bounds
/// instead of a wrap to index 0.
pub const MAX_INSTRUCTIONS: usize = 255;

/// The output of the resolver and the input of the [Emulator](crate::emulator::Emulator).
#[derive(Debug, Clone)]
pub struct ResolvedProgram {
    /// Executable instructions, indexed by program counter value.
    pub instructions: Vec<Instruction>,

    pub symbol_table: SymbolTable,

    /// Initial memory contents laid out by `list` blocks.
    pub writes: BTreeMap<u8, u8>,

    /// For every executable instruction, its index in the unresolved sequence.
    pub origins: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Entry {
    origin: usize,
    instruction: Instruction,
}

impl Entry {
    fn fail(&self, kind: ResolutionErrorKind) -> ResolutionError {
        ResolutionError {
            position: self.origin,
            instruction: self.instruction.clone(),
            kind,
        }
    }

    fn malformed(&self, token: &Token) -> ResolutionError {
        self.fail(ResolutionErrorKind::MalformedOperand { token: token.clone() })
    }
}

/// Resolves `instructions` without logging.
pub fn resolve(instructions: &[Instruction]) -> Result<ResolvedProgram, ResolutionError> {
    resolve_with_logger(instructions, None)
}

pub fn resolve_with_logger<L>(instructions: &[Instruction], logger: L)
    -> Result<ResolvedProgram, ResolutionError>
where
    L: Into<Option<Logger>>,
{
    let logger = logger
        .into()
        .unwrap_or(Logger::root(Discard, o!()))
        .new(o!("stage" => "resolution"));

    let entries = instructions.iter()
        .cloned()
        .enumerate()
        .map(|(origin, instruction)| Entry { origin, instruction })
        .collect::<Vec<_>>();

    let mut symbol_table = SymbolTable::new();
    let mut writes = BTreeMap::new();

    let entries = expand_lists(entries, &mut symbol_table, &mut writes, &logger)?;
    let entries = register_symbols(entries, &mut symbol_table, &logger)?;

    if let Some(entry) = entries.get(MAX_INSTRUCTIONS) {
        return Err(entry.fail(ResolutionErrorKind::ProgramTooLarge { length: entries.len() }));
    }

    let entries = resolve_references(entries, &symbol_table, &logger)?;

    debug!(logger, "resolution finished";
        "instructions" => entries.len(),
        "symbols" => symbol_table.len(),
        "writes" => writes.len());

    let (origins, instructions) = entries.into_iter()
        .map(|entry| (entry.origin, entry.instruction))
        .unzip();

    Ok(ResolvedProgram {
        instructions,
        symbol_table,
        writes,
        origins,
    })
}

fn expand_lists(
    entries: Vec<Entry>,
    symbol_table: &mut SymbolTable,
    writes: &mut BTreeMap<u8, u8>,
    logger: &Logger,
) -> Result<Vec<Entry>, ResolutionError> {
    let mut kept = Vec::with_capacity(entries.len());

    for entry in entries {
        if entry.instruction.verb != Verb::List {
            kept.push(entry);
            continue;
        }

        let mut address = match entry.instruction.direct_object {
            Token::Address { value, mode: Mode::Direct } => value,
            ref other => return Err(entry.malformed(other)),
        };

        let elements = match entry.instruction.indirect_object {
            Token::DataList(ref elements) => elements,
            ref other => return Err(entry.malformed(other)),
        };

        for element in elements {
            let literal = parse_literal(&element.value)
                .ok_or_else(|| entry.fail(ResolutionErrorKind::MalformedElement {
                    element: element.value.clone(),
                }))?;

            let width = literal.width();

            if address < FIRST_USER_ADDRESS as i32 {
                return Err(entry.fail(ResolutionErrorKind::ReservedAddress { address }));
            }

            if address + width as i32 > STACK_BASE as i32 {
                return Err(entry.fail(ResolutionErrorKind::DataOverflow { address, width }));
            }

            if let Some(ref name) = element.name {
                symbol_table.define_alias(name, address)
                    .map_err(|kind| entry.fail(kind))?;

                trace!(logger, "add a list element to the symbol table";
                    "name" => name, "address" => address);
            }

            for (offset, byte) in literal.bytes().into_iter().enumerate() {
                writes.insert((address + offset as i32) as u8, byte);
            }

            trace!(logger, "lay out data"; "address" => address, "width" => width);

            address += width as i32;
        }
    }

    Ok(kept)
}

fn register_symbols(
    entries: Vec<Entry>,
    symbol_table: &mut SymbolTable,
    logger: &Logger,
) -> Result<Vec<Entry>, ResolutionError> {
    let mut offset = 0;
    let mut kept = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        match entry.instruction.verb {
            Verb::Func => {
                let name = match entry.instruction.direct_object {
                    Token::Subroutine { ref name, .. } => name,
                    ref other => return Err(entry.malformed(other)),
                };

                let target = index - offset;

                symbol_table.define_routine(name, target)
                    .map_err(|kind| entry.fail(kind))?;

                trace!(logger, "add a label to the symbol table"; "label" => name, "index" => target);

                offset += 1;
            },
            Verb::Name => {
                let address = match entry.instruction.direct_object {
                    Token::Address { value, mode: Mode::Direct } => value,
                    ref other => return Err(entry.malformed(other)),
                };

                let name = match entry.instruction.indirect_object {
                    Token::Variable { ref name, .. } => name,
                    ref other => return Err(entry.malformed(other)),
                };

                symbol_table.define_alias(name, address)
                    .map_err(|kind| entry.fail(kind))?;

                trace!(logger, "add an alias to the symbol table"; "name" => name, "address" => address);

                offset += 1;
            },
            _ => kept.push(entry),
        }
    }

    Ok(kept)
}

fn resolve_references(
    mut entries: Vec<Entry>,
    symbol_table: &SymbolTable,
    logger: &Logger,
) -> Result<Vec<Entry>, ResolutionError> {
    for (index, entry) in entries.iter_mut().enumerate() {
        if !entry.instruction.verb.is_control_transfer() {
            continue;
        }

        let target = match entry.instruction.direct_object {
            Token::Subroutine { ref name, .. } => match symbol_table.get(name) {
                Some(Symbol::Routine(target)) => target,
                Some(Symbol::Address(_)) => {
                    return Err(entry.fail(ResolutionErrorKind::NotARoutine { name: name.clone() }));
                },
                None => {
                    let suggestion = symbol_table.closest(name).map(str::to_string);

                    return Err(entry.fail(ResolutionErrorKind::UndefinedSymbol {
                        name: name.clone(),
                        suggestion,
                    }));
                },
            },
            Token::Number(number) => number.value as usize,
            ref other => return Err(entry.malformed(other)),
        };

        trace!(logger, "replace target"; "index" => index, "target" => target);

        entry.instruction.direct_object = Token::number(target as i32);

        if entry.instruction.verb == Verb::Call {
            entry.instruction.indirect_object = Token::number(index as i32);
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{JumpCondition, Register};
    use crate::token::DataElement;
    use pretty_assertions::assert_eq;

    fn element(name: Option<&str>, value: &str) -> DataElement {
        DataElement {
            name: name.map(str::to_string),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_labels_bind_to_following_instruction() {
        let program = vec![
            Instruction::new(Verb::Name, Token::address(10), Token::variable("count")),
            Instruction::new(Verb::Call, Token::call("work"), Token::Blank),
            Instruction::bare(Verb::Halt),
            Instruction::new(Verb::Func, Token::label("work"), Token::Blank),
            Instruction::new(Verb::Increment, Token::Blank, Token::variable("count")),
            Instruction::bare(Verb::Return),
        ];

        let resolved = resolve(&program).unwrap();

        assert_eq!(resolved.instructions, vec![
            Instruction::new(Verb::Call, Token::number(2), Token::number(0)),
            Instruction::bare(Verb::Halt),
            Instruction::new(Verb::Increment, Token::Blank, Token::variable("count")),
            Instruction::bare(Verb::Return),
        ]);

        assert_eq!(resolved.symbol_table.get("work"), Some(Symbol::Routine(2)));
        assert_eq!(resolved.symbol_table.address("count"), Some(10));
        assert_eq!(resolved.origins, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_backward_jump_and_call_index() {
        let program = vec![
            Instruction::new(Verb::Func, Token::label("top"), Token::Blank),
            Instruction::new(Verb::Decrement, Token::Blank, Token::register(Register::B)),
            Instruction::new(Verb::Jump(JumpCondition::Greater), Token::call("top"), Token::register(Register::B)),
            Instruction::new(Verb::Call, Token::call("top"), Token::Blank),
            Instruction::bare(Verb::End),
        ];

        let resolved = resolve(&program).unwrap();

        assert_eq!(resolved.instructions[1].direct_object, Token::number(0));
        assert_eq!(resolved.instructions[2].direct_object, Token::number(0));
        assert_eq!(resolved.instructions[2].indirect_object, Token::number(2));
    }

    #[test]
    fn test_two_names_for_one_address() {
        let program = vec![
            Instruction::new(Verb::Name, Token::address(20), Token::variable("x")),
            Instruction::new(Verb::Name, Token::address(20), Token::variable("y")),
            Instruction::bare(Verb::Halt),
        ];

        let err = resolve(&program).unwrap_err();

        assert_eq!(err.position, 1);
        assert_eq!(err.kind, ResolutionErrorKind::AddressTaken {
            address: 20,
            owner: "x".into(),
        });
    }

    #[test]
    fn test_call_to_undefined_label() {
        let program = vec![
            Instruction::new(Verb::Func, Token::label("print_all"), Token::Blank),
            Instruction::bare(Verb::Return),
            Instruction::new(Verb::Call, Token::call("print_al"), Token::Blank),
            Instruction::bare(Verb::Halt),
        ];

        let err = resolve(&program).unwrap_err();

        assert_eq!(err.position, 2);
        assert_eq!(err.kind, ResolutionErrorKind::UndefinedSymbol {
            name: "print_al".into(),
            suggestion: Some("print_all".into()),
        });
    }

    #[test]
    fn test_duplicate_label() {
        let program = vec![
            Instruction::new(Verb::Func, Token::label("loop"), Token::Blank),
            Instruction::new(Verb::Func, Token::label("loop"), Token::Blank),
            Instruction::bare(Verb::Halt),
        ];

        let err = resolve(&program).unwrap_err();

        assert_eq!(err.kind, ResolutionErrorKind::DuplicateSymbol {
            name: "loop".into(),
            existing: Symbol::Routine(0),
        });
    }

    #[test]
    fn test_alias_of_register_address() {
        let program = vec![
            Instruction::new(Verb::Name, Token::address(8), Token::variable("sneaky")),
        ];

        let err = resolve(&program).unwrap_err();

        assert_eq!(err.kind, ResolutionErrorKind::ReservedAddress { address: 8 });
    }

    #[test]
    fn test_jump_to_alias_is_rejected() {
        let program = vec![
            Instruction::new(Verb::Name, Token::address(30), Token::variable("data")),
            Instruction::new(Verb::Jump(JumpCondition::Always), Token::call("data"), Token::Blank),
        ];

        let err = resolve(&program).unwrap_err();

        assert_eq!(err.kind, ResolutionErrorKind::NotARoutine { name: "data".into() });
    }

    #[test]
    fn test_list_expansion() {
        let program = vec![
            Instruction::new(Verb::List, Token::address(10), Token::DataList(vec![
                element(Some("greeting"), "\"hi\""),
                element(None, "0x20"),
                element(Some("offset"), "-2"),
            ])),
            Instruction::new(Verb::Func, Token::label("main"), Token::Blank),
            Instruction::bare(Verb::Halt),
        ];

        let resolved = resolve(&program).unwrap();

        let expected = vec![(10, b'h'), (11, b'i'), (12, 0x20), (13, 0xFE)]
            .into_iter()
            .collect::<BTreeMap<u8, u8>>();

        assert_eq!(resolved.writes, expected);
        assert_eq!(resolved.symbol_table.address("greeting"), Some(10));
        assert_eq!(resolved.symbol_table.address("offset"), Some(13));
        assert_eq!(resolved.symbol_table.get("main"), Some(Symbol::Routine(0)));
        assert_eq!(resolved.instructions, vec![Instruction::bare(Verb::Halt)]);
    }

    #[test]
    fn test_list_errors() {
        let malformed = vec![
            Instruction::new(Verb::List, Token::address(10), Token::DataList(vec![
                element(None, "twelve"),
            ])),
        ];

        assert_eq!(resolve(&malformed).unwrap_err().kind, ResolutionErrorKind::MalformedElement {
            element: "twelve".into(),
        });

        let overflow = vec![
            Instruction::new(Verb::List, Token::address(238), Token::DataList(vec![
                element(None, "\"abc\""),
            ])),
        ];

        assert_eq!(resolve(&overflow).unwrap_err().kind, ResolutionErrorKind::DataOverflow {
            address: 238,
            width: 3,
        });
    }

    #[test]
    fn test_input_is_left_untouched() {
        let program = vec![
            Instruction::new(Verb::Func, Token::label("main"), Token::Blank),
            Instruction::new(Verb::Jump(JumpCondition::Always), Token::call("main"), Token::Blank),
        ];

        let copy = program.clone();
        resolve(&program).unwrap();

        assert_eq!(program, copy);
    }

    #[test]
    fn test_program_too_large() {
        let program = vec![Instruction::bare(Verb::Dump); MAX_INSTRUCTIONS + 1];

        let err = resolve(&program).unwrap_err();

        assert_eq!(err.kind, ResolutionErrorKind::ProgramTooLarge { length: MAX_INSTRUCTIONS + 1 });

        let full = vec![Instruction::bare(Verb::Dump); 256];
        assert_eq!(resolve(&full).unwrap_err().position, 255);

        let largest = vec![Instruction::bare(Verb::Newline); 255];
        assert_eq!(resolve(&largest).unwrap().instructions.len(), 255);
    }
}
