//! Operand tokens shared by the resolver and the emulator.

use std::fmt;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::{pair, preceded},
};

use crate::instruction::Register;

/// Addressing mode of a location operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The operand names the target cell itself. (`$10`, `$count`, `a`)
    Direct,

    /// The operand names a cell holding the address of the target. (`@10`, `@count`, `@a`)
    Indirect,
}

/// Distinguishes unprefixed literals from ones written with an explicit sign.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sign {
    /// Written without a sign. Masked to `0..=255` when used as a value.
    Natural,

    /// Written with a leading `+` or `-`. Clamped to `-128..=127` when used as a value.
    Signed,
}

/// Whether a subroutine token defines a label or refers to one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// `name:`
    Label,
    /// `:name`
    Call,
}

/// A literal value of a data list element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Text(String),
    Number(Number),
}

impl Literal {
    /// Number of memory cells the literal occupies.
    pub fn width(&self) -> usize {
        match self {
            Literal::Text(text) => text.len(),
            Literal::Number(_) => 1,
        }
    }

    /// The bytes the literal lays out in memory. Strings are not terminated.
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Literal::Text(text) => text.bytes().collect(),
            Literal::Number(number) => vec![number.as_byte()],
        }
    }
}

/// A parsed numeric literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Number {
    pub value: i32,
    pub sign: Sign,
}

impl Number {
    pub fn natural(value: i32) -> Number {
        Number { value, sign: Sign::Natural }
    }

    pub fn signed(value: i32) -> Number {
        Number { value, sign: Sign::Signed }
    }

    /// The value an instruction sees when it reads this literal.
    pub fn operand_value(&self) -> i32 {
        match self.sign {
            Sign::Natural => self.value & 0xFF,
            Sign::Signed => self.value.max(-128).min(127),
        }
    }

    /// The byte stored when this literal is written to memory.
    pub fn as_byte(&self) -> u8 {
        (self.operand_value() & 0xFF) as u8
    }
}

/// An unresolved element of a `list` data block, e.g. `greeting = "hi"` or `0x20`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataElement {
    /// Alias assigned to the address of the element, if any.
    pub name: Option<String>,

    /// The element's source text. Quoted text is a string, anything else must be a number.
    pub value: String,
}

/// An operand of an [Instruction](crate::instruction::Instruction).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// An absent operand.
    Blank,

    Number(Number),

    Register {
        register: Register,
        mode: Mode,
    },

    Address {
        value: i32,
        mode: Mode,
    },

    Variable {
        name: String,
        mode: Mode,
    },

    Subroutine {
        name: String,
        role: Role,
    },

    StringLiteral(String),

    DataList(Vec<DataElement>),
}

impl Token {
    pub fn number(value: i32) -> Token {
        Token::Number(Number::natural(value))
    }

    pub fn register(register: Register) -> Token {
        Token::Register { register, mode: Mode::Direct }
    }

    pub fn address(value: i32) -> Token {
        Token::Address { value, mode: Mode::Direct }
    }

    pub fn variable<S: Into<String>>(name: S) -> Token {
        Token::Variable { name: name.into(), mode: Mode::Direct }
    }

    pub fn call<S: Into<String>>(name: S) -> Token {
        Token::Subroutine { name: name.into(), role: Role::Call }
    }

    pub fn label<S: Into<String>>(name: S) -> Token {
        Token::Subroutine { name: name.into(), role: Role::Label }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Token::Blank)
    }
}

fn prefix(mode: Mode) -> &'static str {
    match mode {
        Mode::Direct => "$",
        Mode::Indirect => "@",
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Blank => write!(f, "_"),
            Token::Number(Number { value, sign: Sign::Natural }) => write!(f, "{}", value),
            Token::Number(Number { value, sign: Sign::Signed }) => write!(f, "{:+}", value),
            Token::Register { register, mode: Mode::Direct } => write!(f, "{}", register),
            Token::Register { register, mode: Mode::Indirect } => write!(f, "@{}", register),
            Token::Address { value, mode } => write!(f, "{}{}", prefix(*mode), value),
            Token::Variable { name, mode } => write!(f, "{}{}", prefix(*mode), name),
            Token::Subroutine { name, role: Role::Label } => write!(f, "{}:", name),
            Token::Subroutine { name, role: Role::Call } => write!(f, ":{}", name),
            Token::StringLiteral(text) => write!(f, "{:?}", text),
            Token::DataList(elements) => {
                write!(f, "[")?;

                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }

                    match element.name {
                        Some(ref name) => write!(f, "{} = {}", name, element.value)?,
                        None => write!(f, "{}", element.value)?,
                    }
                }

                write!(f, "]")
            },
        }
    }
}

fn take_digits(radix: u32) -> impl Fn(&str) -> IResult<&str, i32> {
    move |input: &str| map_res(
        take_while1(move |c: char| c.is_digit(radix)),
        move |s| i32::from_str_radix(s, radix),
    )(input)
}

fn take_number(input: &str) -> IResult<&str, (Option<char>, i32)> {
    pair(
        opt(alt((char('+'), char('-')))),
        alt((
            preceded(tag_no_case("0b"), take_digits(2)),
            preceded(tag_no_case("0x"), take_digits(16)),
            preceded(tag_no_case("0o"), take_digits(8)),
            take_digits(10),
        )),
    )(input)
}

/// Parses a numeric literal such as `42`, `-7`, `0x1F`, `+0b101` or `0o17`.
///
/// Returns `None` if the whole input is not a single literal.
pub fn parse_number(input: &str) -> Option<Number> {
    let (_, (sign, magnitude)) = all_consuming(take_number)(input.trim()).ok()?;

    Some(match sign {
        None => Number::natural(magnitude),
        Some('-') => Number::signed(-magnitude),
        Some(_) => Number::signed(magnitude),
    })
}

/// Reads the integer at the start of a line of user input, ignoring anything after it.
///
/// Lines without a leading integer read as zero. Values outside the `i32` range saturate.
pub fn parse_leading_integer(input: &str) -> i32 {
    let parsed: IResult<&str, &str> = recognize(pair(
        opt(alt((char('+'), char('-')))),
        digit1,
    ))(input.trim_start());

    match parsed {
        Ok((_, digits)) => digits.parse::<i64>()
            .map(|value| value.max(i32::min_value() as i64).min(i32::max_value() as i64) as i32)
            .unwrap_or_else(|_| if digits.starts_with('-') { i32::min_value() } else { i32::max_value() }),
        Err(_) => 0,
    }
}

/// Interprets a data list element's source text.
pub fn parse_literal(input: &str) -> Option<Literal> {
    let input = input.trim();

    if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
        return Some(Literal::Text(input[1..input.len() - 1].to_string()));
    }

    parse_number(input).map(Literal::Number)
}

#[test]
fn test_parse_number_prefixes() {
    assert_eq!(parse_number("42"), Some(Number::natural(42)));
    assert_eq!(parse_number("0x1F"), Some(Number::natural(31)));
    assert_eq!(parse_number("0B101"), Some(Number::natural(5)));
    assert_eq!(parse_number("0o17"), Some(Number::natural(15)));
    assert_eq!(parse_number("-0x10"), Some(Number::signed(-16)));
    assert_eq!(parse_number("+3"), Some(Number::signed(3)));
}

#[test]
fn test_parse_number_rejects_garbage() {
    assert_eq!(parse_number("0x"), None);
    assert_eq!(parse_number("12ab"), None);
    assert_eq!(parse_number(""), None);
    assert_eq!(parse_number("--1"), None);
}

#[test]
fn test_operand_value_clamps_and_masks() {
    assert_eq!(Number::signed(-300).operand_value(), -128);
    assert_eq!(Number::signed(200).operand_value(), 127);
    assert_eq!(Number::natural(300).operand_value(), 44);
    assert_eq!(Number::signed(-1).as_byte(), 0xFF);
}

#[test]
fn test_parse_leading_integer() {
    assert_eq!(parse_leading_integer("42\n"), 42);
    assert_eq!(parse_leading_integer("  -7 apples"), -7);
    assert_eq!(parse_leading_integer("seven"), 0);
    assert_eq!(parse_leading_integer(""), 0);
    assert_eq!(parse_leading_integer("99999999999"), i32::max_value());
}

#[test]
fn test_parse_literal() {
    assert_eq!(parse_literal("\"hi\""), Some(Literal::Text("hi".into())));
    assert_eq!(parse_literal(" 7 "), Some(Literal::Number(Number::natural(7))));
    assert_eq!(parse_literal("\"unterminated"), None);
    assert_eq!(Literal::Text("abc".into()).width(), 3);
}
