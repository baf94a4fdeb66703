//! Parsing assembly source into unresolved programs.
//!
//! The resolver and the emulator never depend on this module; it only produces the
//! instruction sequences they consume.

pub mod parser;
pub mod program;
pub mod token;

pub use self::parser::ParseError;
pub use self::program::Program;
