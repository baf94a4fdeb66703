//! Errors raised while resolving and executing programs.
//!
//! Every error is fatal: a program that fails to resolve or execute has to be corrected and
//! resolved again from scratch.

use thiserror::Error;

use crate::instruction::{Instruction, Verb};
use crate::symbol_table::Symbol;
use crate::token::Token;

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(", did you mean '{}'?", name),
        None => String::new(),
    }
}

fn while_executing(instruction: &Option<Instruction>) -> String {
    match instruction {
        Some(instruction) => format!(" `{}`", instruction),
        None => String::new(),
    }
}

/// Reason the resolver rejected a program.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolutionErrorKind {
    #[error("undefined symbol '{name}'{}", did_you_mean(.suggestion))]
    UndefinedSymbol {
        name: String,
        /// The closest defined name, if one is similar enough.
        suggestion: Option<String>,
    },

    #[error("name '{name}' is already bound to {existing}")]
    DuplicateSymbol {
        name: String,
        existing: Symbol,
    },

    #[error("address ${address} can only have one label, it already belongs to '{owner}'")]
    AddressTaken {
        address: u8,
        owner: String,
    },

    #[error("cannot place a name or data at reserved address ${address}")]
    ReservedAddress {
        address: i32,
    },

    #[error("malformed data list element '{element}'")]
    MalformedElement {
        element: String,
    },

    #[error("{width} byte(s) of data at ${address} do not fit below the stack")]
    DataOverflow {
        address: i32,
        width: usize,
    },

    #[error("'{name}' names a memory address, not a subroutine")]
    NotARoutine {
        name: String,
    },

    #[error("unexpected operand {token}")]
    MalformedOperand {
        token: Token,
    },

    #[error("program has {length} instructions, at most 255 fit below the program counter limit")]
    ProgramTooLarge {
        length: usize,
    },
}

/// Error raised by the [resolver](crate::resolver).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("at instruction #{position} `{instruction}`: {kind}")]
pub struct ResolutionError {
    /// Index of the offending instruction in the unresolved instruction sequence.
    pub position: usize,
    pub instruction: Instruction,
    pub kind: ResolutionErrorKind,
}

/// Reason the emulator aborted a program.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExecutionErrorKind {
    #[error("cannot write {value} to the PC, SP or FLAG register at ${address}")]
    ReservedRegister {
        address: u8,
        value: i32,
    },

    #[error("cannot write {value} into the stack at ${address}")]
    StackRegion {
        address: u8,
        value: i32,
    },

    #[error("address {address} is out of bounds")]
    AddressOutOfBounds {
        address: i32,
    },

    #[error("entry not found: '{name}'")]
    UndefinedSymbol {
        name: String,
    },

    #[error("{token} does not name a memory location")]
    NotAddressable {
        token: Token,
    },

    #[error("{token} does not have a value")]
    NotAValue {
        token: Token,
    },

    #[error("{token} is not a resolved instruction index")]
    UnresolvedTarget {
        token: Token,
    },

    #[error("'{verb}' cannot be executed")]
    MetaInstruction {
        verb: Verb,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("stack overflow, stack pointer at ${stack_pointer}")]
    StackOverflow {
        stack_pointer: u8,
    },

    #[error("pop from an empty stack")]
    StackUnderflow,

    #[error("program counter ran past the last of {length} instructions")]
    InstructionOutOfBounds {
        length: usize,
    },

    #[error("input ended while waiting for a line")]
    EndOfInput,
}

/// Error raised by the [emulator](crate::emulator::Emulator).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("at instruction #{program_counter}{}: {kind}", while_executing(.instruction))]
pub struct ExecutionError {
    pub program_counter: u8,
    /// The failing instruction, absent if it could not be fetched.
    pub instruction: Option<Instruction>,
    pub kind: ExecutionErrorKind,
}
