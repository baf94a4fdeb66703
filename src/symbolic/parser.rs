//! Parser turning assembly source into unresolved [Instructions](Instruction).
//!
//! The token stream is partitioned into groups that each start with a command word or a
//! label definition. Every group becomes exactly one instruction; the operand shapes a
//! command accepts are listed in [COMMANDS].

use std::collections::HashMap;

use edit_distance::edit_distance;
use lazy_static::lazy_static;
use logos::Logos;

use crate::instruction::{BranchCondition, Instruction, JumpCondition, Register, Verb};
use crate::parsing::{Error, ErrorExt, ErrorKind, Span};
use crate::token::{parse_number, DataElement, Mode, Number, Sign, Token as Operand};

use super::token::Token;

pub type ParseError = Error<String>;

/// The operands a command accepts, in source order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    /// `add 2 b`: a value and an optional destination, which defaults to `a`.
    Binary,
    /// `inc b 2`: a destination and an optional amount, which defaults to one.
    Adjust,
    /// `pop b`: a single location.
    Location,
    /// `push 2`: a single value.
    Value,
    /// `comp a 2`: two values.
    Compare,
    /// `move 2 b`: a value and a destination.
    Transfer,
    /// `load b @10`: a destination and a value.
    Load,
    /// `swap a b`: two locations.
    Swap,
    /// `zero -3`: a non-zero relative offset.
    Branch,
    /// `jump :loop`, `call :print`
    Target,
    /// `jgt :loop 10`: a label reference and a value compared against `a`.
    Conditional,
    /// `in $20 8`: a location and an optional length limit.
    Input,
    /// `out $20 8`, `out "hi"`: a location or a string and an optional length limit.
    Output,
    /// `text "hi" $20`: a string and a location.
    Text,
    /// `name $20 counter`: a direct address and a new variable name.
    Name,
    /// `list $20 [greeting = "hi" 0x20]`: a direct address and a data list.
    List,
    /// `pic 0xFF`: a selector literal.
    Picture,
    /// `halt`: no operands.
    Bare,
}

lazy_static! {
    /// Every command word, mapped to its verb and operand shape.
    pub static ref COMMANDS: HashMap<&'static str, (Verb, Shape)> = {
        let mut commands = HashMap::new();

        commands.insert("add", (Verb::Add, Shape::Binary));
        commands.insert("sub", (Verb::Subtract, Shape::Binary));
        commands.insert("mul", (Verb::Multiply, Shape::Binary));
        commands.insert("mult", (Verb::Multiply, Shape::Binary));
        commands.insert("div", (Verb::Divide, Shape::Binary));
        commands.insert("mod", (Verb::Modulo, Shape::Binary));
        commands.insert("rem", (Verb::Modulo, Shape::Binary));
        commands.insert("and", (Verb::And, Shape::Binary));
        commands.insert("or", (Verb::Or, Shape::Binary));
        commands.insert("xor", (Verb::Xor, Shape::Binary));

        commands.insert("inc", (Verb::Increment, Shape::Adjust));
        commands.insert("dec", (Verb::Decrement, Shape::Adjust));
        commands.insert("left", (Verb::ShiftLeft, Shape::Adjust));
        commands.insert("rght", (Verb::ShiftRight, Shape::Adjust));

        commands.insert("not", (Verb::Not, Shape::Location));
        commands.insert("rand", (Verb::Random, Shape::Location));
        commands.insert("pop", (Verb::Pop, Shape::Location));
        commands.insert("nin", (Verb::NumberInput, Shape::Location));
        commands.insert("nout", (Verb::NumberOutput, Shape::Location));
        commands.insert("tlly", (Verb::Tally, Shape::Location));
        commands.insert("push", (Verb::Push, Shape::Value));

        commands.insert("comp", (Verb::Compare, Shape::Compare));
        commands.insert("move", (Verb::Move, Shape::Transfer));
        commands.insert("copy", (Verb::Move, Shape::Transfer));
        commands.insert("save", (Verb::Save, Shape::Transfer));
        commands.insert("load", (Verb::Load, Shape::Load));
        commands.insert("swap", (Verb::Swap, Shape::Swap));

        commands.insert("zero", (Verb::Branch(BranchCondition::Zero), Shape::Branch));
        commands.insert("pos", (Verb::Branch(BranchCondition::Positive), Shape::Branch));
        commands.insert("neg", (Verb::Branch(BranchCondition::Negative), Shape::Branch));
        commands.insert("jump", (Verb::Jump(JumpCondition::Always), Shape::Target));
        commands.insert("call", (Verb::Call, Shape::Target));
        commands.insert("jgt", (Verb::Jump(JumpCondition::Greater), Shape::Conditional));
        commands.insert("jge", (Verb::Jump(JumpCondition::GreaterOrEqual), Shape::Conditional));
        commands.insert("jeq", (Verb::Jump(JumpCondition::Equal), Shape::Conditional));
        commands.insert("jle", (Verb::Jump(JumpCondition::LessOrEqual), Shape::Conditional));
        commands.insert("jlt", (Verb::Jump(JumpCondition::Less), Shape::Conditional));

        commands.insert("in", (Verb::Input, Shape::Input));
        commands.insert("out", (Verb::Output, Shape::Output));
        commands.insert("prnt", (Verb::Print, Shape::Output));
        commands.insert("text", (Verb::Text, Shape::Text));

        commands.insert("name", (Verb::Name, Shape::Name));
        commands.insert("var", (Verb::Name, Shape::Name));
        commands.insert("list", (Verb::List, Shape::List));
        commands.insert("pic", (Verb::Picture, Shape::Picture));

        commands.insert("rtrn", (Verb::Return, Shape::Bare));
        commands.insert("dump", (Verb::Dump, Shape::Bare));
        commands.insert("rstr", (Verb::Restore, Shape::Bare));
        commands.insert("nwln", (Verb::Newline, Shape::Bare));
        commands.insert("halt", (Verb::Halt, Shape::Bare));

        commands
    };
}

fn command(word: &str) -> Option<(Verb, Shape)> {
    COMMANDS.get(word.to_lowercase().as_str()).copied()
}

/// The command word closest to `word`, if any is close enough to be a likely typo.
fn closest_command(word: &str) -> Option<&'static str> {
    let word = word.to_lowercase();

    COMMANDS.keys()
        .map(|name| (edit_distance(name, &word), *name))
        .filter(|(distance, _)| *distance <= 2)
        .min()
        .map(|(_, name)| name)
}

type Spanned<'a> = (Token<'a>, Span);

/// A command or label definition with the tokens that follow it.
struct Group<'a> {
    head: Spanned<'a>,
    operands: Vec<Spanned<'a>>,
}

impl<'a> Group<'a> {
    fn span(&self) -> Span {
        let end = self.operands.last()
            .map(|(_, span)| span.end)
            .unwrap_or(self.head.1.end);

        self.head.1.start..end
    }

    fn operand(&self, index: usize) -> Option<&Spanned<'a>> {
        self.operands.get(index)
    }

    fn expect_count(&self, min: usize, max: usize) -> Result<(), ParseError> {
        let got = self.operands.len();

        if got >= min && got <= max {
            return Ok(());
        }

        // A misspelled command swallowed by the previous group shows up as an extra word.
        if let Some((Token::Word(word), span)) = self.operands.get(max) {
            if let Some(suggestion) = closest_command(word) {
                return Err(ErrorKind::UnknownCommand {
                    span: span.clone(),
                    name: word.to_string(),
                    suggestion: Some(suggestion.to_string()),
                }.into());
            }
        }

        Err(ErrorKind::OperandCount {
            span: self.span(),
            expected: min..max + 1,
            got,
        }.into())
    }

    fn invalid(&self, index: usize) -> ParseError {
        let span = self.operand(index)
            .map(|(_, span)| span.clone())
            .unwrap_or_else(|| self.span());

        ErrorKind::InvalidOperand { span, index }.into()
    }
}

fn classify(location: &str, mode: Mode) -> Operand {
    if let Some(Number { value, sign: Sign::Natural }) = parse_number(location) {
        return Operand::Address { value, mode };
    }

    match location.parse::<Register>() {
        Ok(register) => Operand::Register { register, mode },
        Err(()) => Operand::Variable { name: location.to_lowercase(), mode },
    }
}

/// Parser state for a single source text.
pub struct Parser<'a> {
    source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Parser<'a> {
        Parser { source }
    }

    /// Parses the whole source. The result always ends with an `end` instruction.
    pub fn parse(&self) -> Result<Vec<(Instruction, Span)>, ParseError> {
        let groups = self.partition()?;
        let mut instructions = Vec::with_capacity(groups.len() + 1);

        for group in &groups {
            let instruction = self.parse_group(group)
                .context(format!("in `{}`", &self.source[group.span()]))?;

            instructions.push((instruction, group.span()));
        }

        let end = self.source.len();
        instructions.push((Instruction::bare(Verb::End), end..end));

        Ok(instructions)
    }

    fn partition(&self) -> Result<Vec<Group<'a>>, ParseError> {
        let mut groups: Vec<Group<'a>> = Vec::new();

        for (token, span) in Token::lexer(self.source).spanned() {
            let starts_group = match token {
                Token::Error => return Err(ErrorKind::InvalidToken { span }.into()),
                Token::Label(_) => true,
                Token::Word(word) => command(word).is_some(),
                _ => false,
            };

            if starts_group {
                groups.push(Group {
                    head: (token, span),
                    operands: Vec::new(),
                });

                continue;
            }

            match groups.last_mut() {
                Some(group) => group.operands.push((token, span)),
                None => {
                    let suggestion = match token {
                        Token::Word(word) => closest_command(word),
                        _ => None,
                    };

                    let mut error: ParseError = match token {
                        Token::Word(word) => ErrorKind::UnknownCommand {
                            span,
                            name: word.to_string(),
                            suggestion: suggestion.map(str::to_string),
                        },
                        _ => ErrorKind::UnexpectedToken { span },
                    }.into();

                    error.context.push("expected a command or a label".to_string());

                    return Err(error);
                },
            }
        }

        Ok(groups)
    }

    fn parse_group(&self, group: &Group<'a>) -> Result<Instruction, ParseError> {
        let (verb, shape) = match group.head.0 {
            Token::Label(name) => {
                group.expect_count(0, 0)?;
                return Ok(Instruction::new(Verb::Func, Operand::label(name.to_lowercase()), Operand::Blank));
            },
            Token::Word(word) => match command(word) {
                Some(command) => command,
                None => return Err(ErrorKind::UnexpectedToken { span: group.head.1.clone() }.into()),
            },
            _ => return Err(ErrorKind::UnexpectedToken { span: group.head.1.clone() }.into()),
        };

        let instruction = match shape {
            Shape::Binary => {
                group.expect_count(1, 2)?;

                let destination = match group.operand(1) {
                    Some(_) => self.location(group, 1)?,
                    None => Operand::register(Register::A),
                };

                Instruction::new(verb, self.value(group, 0)?, destination)
            },
            Shape::Adjust => {
                group.expect_count(1, 2)?;

                let amount = match group.operand(1) {
                    Some(_) => self.value(group, 1)?,
                    None => Operand::Blank,
                };

                Instruction::new(verb, amount, self.location(group, 0)?)
            },
            Shape::Location => {
                group.expect_count(1, 1)?;
                Instruction::new(verb, self.location(group, 0)?, Operand::Blank)
            },
            Shape::Value => {
                group.expect_count(1, 1)?;
                Instruction::new(verb, self.value(group, 0)?, Operand::Blank)
            },
            Shape::Compare => {
                group.expect_count(2, 2)?;
                Instruction::new(verb, self.value(group, 0)?, self.value(group, 1)?)
            },
            Shape::Transfer => {
                group.expect_count(2, 2)?;
                Instruction::new(verb, self.value(group, 0)?, self.location(group, 1)?)
            },
            Shape::Load => {
                group.expect_count(2, 2)?;
                Instruction::new(verb, self.location(group, 0)?, self.value(group, 1)?)
            },
            Shape::Swap => {
                group.expect_count(2, 2)?;
                Instruction::new(verb, self.location(group, 0)?, self.location(group, 1)?)
            },
            Shape::Branch => {
                group.expect_count(1, 1)?;

                match group.operand(0) {
                    Some((Token::Number(number), span)) => {
                        if number.operand_value() == 0 {
                            return Err(ErrorKind::ZeroOffset { span: span.clone() }.into());
                        }

                        Instruction::new(verb, Operand::Number(*number), Operand::Blank)
                    },
                    _ => return Err(group.invalid(0)),
                }
            },
            Shape::Target => {
                group.expect_count(1, 1)?;
                Instruction::new(verb, self.reference(group, 0)?, Operand::Blank)
            },
            Shape::Conditional => {
                group.expect_count(2, 2)?;
                Instruction::new(verb, self.reference(group, 0)?, self.value(group, 1)?)
            },
            Shape::Input => {
                group.expect_count(1, 2)?;
                Instruction::new(verb, self.location(group, 0)?, self.limit(group, 1)?)
            },
            Shape::Output => {
                group.expect_count(1, 2)?;

                let source = match group.operand(0) {
                    Some((Token::String(text), _)) => Operand::StringLiteral(text.clone()),
                    _ => self.location(group, 0)?,
                };

                Instruction::new(verb, source, self.limit(group, 1)?)
            },
            Shape::Text => {
                group.expect_count(2, 2)?;

                let text = match group.operand(0) {
                    Some((Token::String(text), _)) => Operand::StringLiteral(text.clone()),
                    _ => return Err(group.invalid(0)),
                };

                Instruction::new(verb, text, self.location(group, 1)?)
            },
            Shape::Name => {
                group.expect_count(2, 2)?;

                let name = match group.operand(1) {
                    Some((Token::Word(name), _)) if name.parse::<Register>().is_err() => {
                        Operand::variable(name.to_lowercase())
                    },
                    _ => return Err(group.invalid(1)),
                };

                Instruction::new(verb, self.direct_address(group, 0)?, name)
            },
            Shape::List => {
                let address = self.direct_address(group, 0)?;
                let elements = self.data_list(group)?;

                Instruction::new(verb, address, Operand::DataList(elements))
            },
            Shape::Picture => {
                group.expect_count(1, 1)?;

                match group.operand(0) {
                    Some((Token::Number(number), _)) if number.sign == Sign::Natural => {
                        Instruction::new(verb, Operand::Number(*number), Operand::Blank)
                    },
                    _ => return Err(group.invalid(0)),
                }
            },
            Shape::Bare => {
                group.expect_count(0, 0)?;
                Instruction::bare(verb)
            },
        };

        Ok(instruction)
    }

    fn location(&self, group: &Group<'a>, index: usize) -> Result<Operand, ParseError> {
        match group.operand(index) {
            Some((Token::Direct(location), _)) => Ok(classify(location, Mode::Direct)),
            Some((Token::Indirect(location), _)) => Ok(classify(location, Mode::Indirect)),
            Some((Token::Word(word), _)) => Ok(match word.parse::<Register>() {
                Ok(register) => Operand::register(register),
                Err(()) => Operand::variable(word.to_lowercase()),
            }),
            _ => Err(group.invalid(index)),
        }
    }

    fn value(&self, group: &Group<'a>, index: usize) -> Result<Operand, ParseError> {
        match group.operand(index) {
            Some((Token::Number(number), _)) => Ok(Operand::Number(*number)),
            _ => self.location(group, index),
        }
    }

    fn limit(&self, group: &Group<'a>, index: usize) -> Result<Operand, ParseError> {
        match group.operand(index) {
            Some(_) => self.value(group, index),
            None => Ok(Operand::Number(Number::signed(-1))),
        }
    }

    fn reference(&self, group: &Group<'a>, index: usize) -> Result<Operand, ParseError> {
        match group.operand(index) {
            Some((Token::Reference(name), _)) => Ok(Operand::call(name.to_lowercase())),
            _ => Err(group.invalid(index)),
        }
    }

    fn direct_address(&self, group: &Group<'a>, index: usize) -> Result<Operand, ParseError> {
        match group.operand(index) {
            Some((Token::Direct(location), _)) => match classify(location, Mode::Direct) {
                address @ Operand::Address { .. } => Ok(address),
                _ => Err(group.invalid(index)),
            },
            _ => Err(group.invalid(index)),
        }
    }

    /// `[` (`name =`? literal)* `]` following the address of a `list`.
    fn data_list(&self, group: &Group<'a>) -> Result<Vec<DataElement>, ParseError> {
        match group.operand(1) {
            Some((Token::ListBegin, _)) => (),
            _ => return Err(group.invalid(1)),
        }

        let mut elements = Vec::new();
        let mut name = None;
        let mut index = 2;

        loop {
            let value = match group.operand(index) {
                Some((Token::ListEnd, _)) if name.is_none() => break,
                Some((Token::Word(word), _)) if name.is_none() => {
                    match group.operand(index + 1) {
                        Some((Token::Assign, _)) => (),
                        _ => return Err(group.invalid(index + 1)),
                    }

                    name = Some(word.to_lowercase());
                    index += 2;
                    continue;
                },
                Some((Token::String(text), _)) => format!("\"{}\"", text),
                Some((Token::Number(_), span)) => self.source[span.clone()].to_string(),
                Some(_) => return Err(group.invalid(index)),
                None => return Err(ErrorKind::EndOfStream.into()),
            };

            elements.push(DataElement {
                name: name.take(),
                value,
            });

            index += 1;
        }

        if index + 1 != group.operands.len() {
            return Err(group.invalid(index + 1));
        }

        Ok(elements)
    }
}
