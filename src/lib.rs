//! A crate for assembling and running programs for the Kuro 8-bit instruction set.
//!
//! A Kuro machine has 256 byte-wide memory cells. The first ten hold the registers
//! (`a b c h l i j`, the program counter, the stack pointer and the flags), cells
//! `240..=255` hold a downward growing stack and everything in between is free for data.
//! Instructions live in their own sequence, indexed by the program counter.
//!
//! This crate provides the functionality to:
//! - Parse assembly source into [instructions](instruction::Instruction). ([symbolic])
//! - Resolve labels, variable names and data lists into an executable
//!   [program](resolver::ResolvedProgram) and its initial memory image. ([resolver])
//! - Execute resolved programs. ([emulator])
//!
//! # Example
//! ```
//! use kuro::{
//!     symbolic::Program,
//!     emulator::{Emulator, TestIo},
//! };
//!
//! // Adds 13 and 15 together and prints the answer.
//! let source = r#"
//!     ; data
//!     list $20 [x = 13 y = 15]
//!
//!     ; logic
//!     move $x a
//!     add $y a
//!     nout a
//!     halt
//! "#;
//!
//! // Parse the source into unresolved instructions.
//! let program = Program::parse(source).unwrap();
//!
//! // Resolve the symbols and lay out the data.
//! let resolved = program.resolve().unwrap();
//!
//! // Execute the program with a test IO handler that records the output.
//! let mut emulator = Emulator::new(resolved, TestIo::new());
//!
//! emulator.run()
//!     .expect("an error occured while emulating the program");
//!
//! assert_eq!(emulator.io.text(), "28\n");
//! ```
//!
//! # Executables
//!
//! ## `kurorun`
//!
//! Built with the `kurorun` feature. Assembles and runs a source file, reading input from
//! and printing output to the terminal.
//!
//! ```text
//! $ kurorun --seed 7 -v examples.kuro
//! ```
pub mod parsing;
pub mod token;
pub mod instruction;
pub mod symbol_table;
pub mod resolver;
pub mod emulator;
pub mod symbolic;
pub mod source_map;
pub mod error;
pub mod event;

pub use emulator::Emulator;
pub use resolver::{resolve, ResolvedProgram};
