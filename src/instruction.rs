//! types for representing instructions and their parts

use std::fmt;
use std::str::FromStr;

use crate::token::Token;

/// Predicate of a conditional absolute jump. The comparison is always made between the
/// jump's indirect object and the `A` register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpCondition {
    /// Unconditional jump. (`jump`)
    Always,
    /// Jump if the value is greater than `A`. (`jgt`)
    Greater,
    /// Jump if the value is greater than or equal to `A`. (`jge`)
    GreaterOrEqual,
    /// Jump if the value equals `A`. (`jeq`)
    Equal,
    /// Jump if the value is less than or equal to `A`. (`jle`)
    LessOrEqual,
    /// Jump if the value is less than `A`. (`jlt`)
    Less,
}

/// Predicate of a relative branch, tested against the flag register as left by the last
/// arithmetic or comparison instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BranchCondition {
    /// Zero-result flag. (`zero`)
    Zero,
    /// Greater-than comparison flag. (`pos`)
    Positive,
    /// Negative-result flag. (`neg`)
    Negative,
}

/// Every operation the assembler understands.
///
/// The first group are the symbolic arithmetic and logic operators, the rest are keywords.
/// `Func`, `Name` and `List` are meta-instructions that only exist until the
/// [resolver](crate::resolver) has consumed them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verb {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
    Not,
    Increment,
    Decrement,
    Random,

    Move,
    Save,
    Load,
    Swap,

    Text,
    Input,
    Output,
    Print,
    NumberInput,
    NumberOutput,
    Tally,
    Newline,

    Compare,
    Branch(BranchCondition),
    Jump(JumpCondition),

    Push,
    Pop,
    Dump,
    Restore,
    Call,
    Return,

    Picture,
    Halt,
    End,

    Func,
    Name,
    List,
}

impl Verb {
    /// True for instructions whose direct object is a label reference to be resolved.
    pub fn is_control_transfer(&self) -> bool {
        matches!(self, Verb::Jump(_) | Verb::Call)
    }

    /// True for the instructions that stop the fetch loop.
    pub fn is_halt(&self) -> bool {
        matches!(self, Verb::Halt | Verb::End)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Verb::Add => "+",
            Verb::Subtract => "-",
            Verb::Multiply => "*",
            Verb::Divide => "/",
            Verb::Modulo => "%",
            Verb::And => "&",
            Verb::Or => "|",
            Verb::Xor => "^",
            Verb::ShiftLeft => "<<",
            Verb::ShiftRight => ">>",
            Verb::Not => "!",
            Verb::Increment => "inc",
            Verb::Decrement => "dec",
            Verb::Random => "rand",

            Verb::Move => "move",
            Verb::Save => "save",
            Verb::Load => "load",
            Verb::Swap => "swap",

            Verb::Text => "text",
            Verb::Input => "in",
            Verb::Output => "out",
            Verb::Print => "prnt",
            Verb::NumberInput => "nin",
            Verb::NumberOutput => "nout",
            Verb::Tally => "tlly",
            Verb::Newline => "nwln",

            Verb::Compare => "comp",
            Verb::Branch(BranchCondition::Zero) => "zero",
            Verb::Branch(BranchCondition::Positive) => "pos",
            Verb::Branch(BranchCondition::Negative) => "neg",
            Verb::Jump(JumpCondition::Always) => "jump",
            Verb::Jump(JumpCondition::Greater) => "jgt",
            Verb::Jump(JumpCondition::GreaterOrEqual) => "jge",
            Verb::Jump(JumpCondition::Equal) => "jeq",
            Verb::Jump(JumpCondition::LessOrEqual) => "jle",
            Verb::Jump(JumpCondition::Less) => "jlt",

            Verb::Push => "push",
            Verb::Pop => "pop",
            Verb::Dump => "dump",
            Verb::Restore => "rstr",
            Verb::Call => "call",
            Verb::Return => "rtrn",

            Verb::Picture => "pic",
            Verb::Halt => "halt",
            Verb::End => "end",

            Verb::Func => "func",
            Verb::Name => "name",
            Verb::List => "list",
        })
    }
}

impl FromStr for Verb {
    type Err = ();

    /// Parses the canonical form produced by [Display](fmt::Display).
    fn from_str(input: &str) -> Result<Verb, ()> {
        let verb = match input {
            "+" => Verb::Add,
            "-" => Verb::Subtract,
            "*" => Verb::Multiply,
            "/" => Verb::Divide,
            "%" => Verb::Modulo,
            "&" => Verb::And,
            "|" => Verb::Or,
            "^" => Verb::Xor,
            "<<" => Verb::ShiftLeft,
            ">>" => Verb::ShiftRight,
            "!" => Verb::Not,
            "inc" => Verb::Increment,
            "dec" => Verb::Decrement,
            "rand" => Verb::Random,
            "move" => Verb::Move,
            "save" => Verb::Save,
            "load" => Verb::Load,
            "swap" => Verb::Swap,
            "text" => Verb::Text,
            "in" => Verb::Input,
            "out" => Verb::Output,
            "prnt" => Verb::Print,
            "nin" => Verb::NumberInput,
            "nout" => Verb::NumberOutput,
            "tlly" => Verb::Tally,
            "nwln" => Verb::Newline,
            "comp" => Verb::Compare,
            "zero" => Verb::Branch(BranchCondition::Zero),
            "pos" => Verb::Branch(BranchCondition::Positive),
            "neg" => Verb::Branch(BranchCondition::Negative),
            "jump" => Verb::Jump(JumpCondition::Always),
            "jgt" => Verb::Jump(JumpCondition::Greater),
            "jge" => Verb::Jump(JumpCondition::GreaterOrEqual),
            "jeq" => Verb::Jump(JumpCondition::Equal),
            "jle" => Verb::Jump(JumpCondition::LessOrEqual),
            "jlt" => Verb::Jump(JumpCondition::Less),
            "push" => Verb::Push,
            "pop" => Verb::Pop,
            "dump" => Verb::Dump,
            "rstr" => Verb::Restore,
            "call" => Verb::Call,
            "rtrn" => Verb::Return,
            "pic" => Verb::Picture,
            "halt" => Verb::Halt,
            "end" => Verb::End,
            "func" => Verb::Func,
            "name" | "var" => Verb::Name,
            "list" => Verb::List,
            _ => return Err(()),
        };

        Ok(verb)
    }
}

/// The ten fixed registers, which live in memory cells `0..=9`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    A,
    B,
    C,
    H,
    L,
    I,
    J,
    ProgramCounter,
    StackPointer,
    Flags,
}

impl Register {
    /// All registers in address order.
    pub const ALL: [Register; 10] = [
        Register::A,
        Register::B,
        Register::C,
        Register::H,
        Register::L,
        Register::I,
        Register::J,
        Register::ProgramCounter,
        Register::StackPointer,
        Register::Flags,
    ];

    /// The general purpose registers saved by `dump` and restored by `rstr`.
    pub const GENERAL: [Register; 7] = [
        Register::A,
        Register::B,
        Register::C,
        Register::H,
        Register::L,
        Register::I,
        Register::J,
    ];

    pub fn address(&self) -> u8 {
        match self {
            Register::A => 0,
            Register::B => 1,
            Register::C => 2,
            Register::H => 3,
            Register::L => 4,
            Register::I => 5,
            Register::J => 6,
            Register::ProgramCounter => 7,
            Register::StackPointer => 8,
            Register::Flags => 9,
        }
    }

    pub fn from_address(address: u8) -> Option<Register> {
        Register::ALL.get(address as usize).copied()
    }

    /// The name the register is known by in the symbol table.
    pub fn name(&self) -> &'static str {
        match self {
            Register::A => "a_register",
            Register::B => "b_register",
            Register::C => "c_register",
            Register::H => "h_register",
            Register::L => "l_register",
            Register::I => "i_register",
            Register::J => "j_register",
            Register::ProgramCounter => "program_counter",
            Register::StackPointer => "stack_pointer",
            Register::Flags => "flag_register",
        }
    }

    /// True for the program counter, stack pointer and flag register.
    pub fn is_reserved(&self) -> bool {
        !Register::GENERAL.contains(self)
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(input: &str) -> Result<Register, ()> {
        let register = match input.to_lowercase().as_ref() {
            "a" => Register::A,
            "b" => Register::B,
            "c" => Register::C,
            "h" => Register::H,
            "l" => Register::L,
            "i" => Register::I,
            "j" => Register::J,
            "pc" => Register::ProgramCounter,
            "sp" => Register::StackPointer,
            "flags" => Register::Flags,
            _ => return Err(()),
        };

        Ok(register)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Register::A => "a",
            Register::B => "b",
            Register::C => "c",
            Register::H => "h",
            Register::L => "l",
            Register::I => "i",
            Register::J => "j",
            Register::ProgramCounter => "pc",
            Register::StackPointer => "sp",
            Register::Flags => "flags",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub verb: Verb,
    pub direct_object: Token,
    pub indirect_object: Token,
}

impl Instruction {
    pub fn new(verb: Verb, direct_object: Token, indirect_object: Token) -> Instruction {
        Instruction {
            verb,
            direct_object,
            indirect_object,
        }
    }

    /// An instruction without operands, such as `halt` or `dump`.
    pub fn bare(verb: Verb) -> Instruction {
        Instruction::new(verb, Token::Blank, Token::Blank)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.verb)?;

        if !self.direct_object.is_blank() {
            write!(f, " {}", self.direct_object)?;
        }

        if !self.indirect_object.is_blank() {
            write!(f, " {}", self.indirect_object)?;
        }

        Ok(())
    }
}

#[test]
fn test_verb_round_trip_names() {
    for name in &["+", "<<", "inc", "jle", "rstr", "pic", "list"] {
        let verb: Verb = name.parse().unwrap();
        assert_eq!(&verb.to_string(), name);
    }

    assert_eq!("var".parse::<Verb>(), Ok(Verb::Name));
    assert!("bogus".parse::<Verb>().is_err());
}

#[test]
fn test_register_addresses() {
    for (i, register) in Register::ALL.iter().enumerate() {
        assert_eq!(register.address() as usize, i);
        assert_eq!(Register::from_address(i as u8), Some(*register));
    }

    assert!(Register::StackPointer.is_reserved());
    assert!(!Register::J.is_reserved());
    assert_eq!(Register::from_address(10), None);
}

#[test]
fn test_instruction_display() {
    use crate::token::Mode;

    let ins = Instruction::new(
        Verb::Add,
        Token::register(Register::B),
        Token::Register { register: Register::A, mode: Mode::Indirect },
    );

    assert_eq!(ins.to_string(), "+ b @a");
    assert_eq!(Instruction::bare(Verb::Halt).to_string(), "halt");
}
