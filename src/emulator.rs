//! [Emulator] for executing [resolved programs](crate::resolver::ResolvedProgram).

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, Write};

use rand::{Rng, SeedableRng, rngs::StdRng};
use slog::{Logger, Discard, o, trace, debug};

use crate::error::{ExecutionError, ExecutionErrorKind};
use crate::event::{Event, EventDispatcher, EventListener, ListenerId};
use crate::instruction::{BranchCondition, Instruction, JumpCondition, Register, Verb};
use crate::resolver::{ResolvedProgram, STACK_BASE};
use crate::symbol_table::SymbolTable;
use crate::token::{self, Mode, Token};

/// Number of cells in the machine's memory.
pub const MEMORY_SIZE: usize = 256;

/// Value of the stack pointer when the stack is empty.
pub const STACK_TOP: u8 = 255;

/// Printed by [StdIo] before reading a line.
pub const INPUT_PROMPT: &str = "[User] << ";

/// Represents the flag register.
///
/// Arithmetic and logic instructions set the result flags, `comp` and the conditional jumps
/// additionally set the comparison flags. Every instruction that touches the flags replaces
/// all of them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// The result was zero.
    pub zero: bool,

    /// The result was negative.
    pub negative: bool,

    /// The result did not fit in an unsigned byte.
    pub carry: bool,

    /// The result did not fit in a signed byte.
    pub overflow: bool,

    /// The compared values were equal.
    pub equal: bool,

    /// The first compared value was greater.
    pub greater: bool,

    /// The low byte of the result has an even number of set bits.
    pub parity: bool,
}

impl Flags {
    /// Result flags of an arithmetic or logic instruction.
    pub fn from_result(result: i32) -> Flags {
        Flags {
            zero: result == 0,
            negative: result < 0,
            carry: result > 255,
            overflow: result < -128 || result > 127,
            parity: (result & 0xFF).count_ones() % 2 == 0,
            ..Flags::default()
        }
    }

    /// Result flags of `difference` plus the comparison flags.
    pub fn from_comparison(difference: i32) -> Flags {
        Flags {
            equal: difference == 0,
            greater: difference > 0,
            ..Flags::from_result(difference)
        }
    }

    pub fn as_word(&self) -> u8 {
        let mut word = 0;

        if self.zero {
            word |= 1 << 0;
        }

        if self.negative {
            word |= 1 << 1;
        }

        if self.carry {
            word |= 1 << 2;
        }

        if self.overflow {
            word |= 1 << 3;
        }

        if self.equal {
            word |= 1 << 4;
        }

        if self.greater {
            word |= 1 << 5;
        }

        if self.parity {
            word |= 1 << 6;
        }

        word
    }

    pub fn from_word(word: u8) -> Flags {
        Flags {
            zero: word & (1 << 0) != 0,
            negative: word & (1 << 1) != 0,
            carry: word & (1 << 2) != 0,
            overflow: word & (1 << 3) != 0,
            equal: word & (1 << 4) != 0,
            greater: word & (1 << 5) != 0,
            parity: word & (1 << 6) != 0,
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let letters = [
            (self.zero, 'Z'),
            (self.negative, 'N'),
            (self.carry, 'C'),
            (self.overflow, 'V'),
            (self.equal, 'E'),
            (self.greater, 'G'),
            (self.parity, 'P'),
        ];

        for (set, letter) in letters.iter() {
            write!(f, "{}", if *set { *letter } else { '-' })?;
        }

        Ok(())
    }
}

/// The 256 byte cells of the machine.
///
/// Cells `0..=9` hold the registers, `240..=255` the stack. Everything in between belongs
/// to the program's data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memory {
    cells: [u8; MEMORY_SIZE],
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

impl Memory {
    /// Zeroed memory with an empty stack.
    pub fn new() -> Memory {
        let mut cells = [0; MEMORY_SIZE];
        cells[Register::StackPointer.address() as usize] = STACK_TOP;

        Memory { cells }
    }

    pub fn get(&self, address: u8) -> u8 {
        self.cells[address as usize]
    }

    pub fn register(&self, register: Register) -> u8 {
        self.get(register.address())
    }

    pub fn cells(&self) -> &[u8; MEMORY_SIZE] {
        &self.cells
    }

    /// The stack region, starting from its deepest cell.
    pub fn stack(&self) -> &[u8] {
        &self.cells[STACK_BASE as usize..]
    }

    fn set(&mut self, address: u8, value: u8) {
        self.cells[address as usize] = value;
    }
}

/// Number base used when taking a [Picture].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Base {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

impl Base {
    fn from_bits(bits: u8) -> Base {
        match bits & 0b11 {
            0b11 => Base::Hexadecimal,
            0b10 => Base::Decimal,
            0b01 => Base::Octal,
            _ => Base::Binary,
        }
    }

    pub fn format(&self, value: u8) -> String {
        match self {
            Base::Binary => format!("{:08b}", value),
            Base::Octal => format!("{:03o}", value),
            Base::Decimal => format!("{:03}", value),
            Base::Hexadecimal => format!("{:02X}", value),
        }
    }
}

/// A snapshot of the machine requested by a `pic` instruction.
///
/// The selector byte of the instruction picks the views in its low nibble
/// (registers, flags, stack, memory from bit 0 up), the value base in bits 4 and 5
/// and the address base in bits 6 and 7.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picture {
    pub registers: bool,
    pub flags: bool,
    pub stack: bool,
    pub memory: bool,
    pub address_base: Base,
    pub value_base: Base,
    pub program_counter: u8,
    pub instruction: Instruction,
    pub cells: [u8; MEMORY_SIZE],
}

impl Picture {
    pub fn new(selector: u8, program_counter: u8, instruction: Instruction, memory: &Memory) -> Picture {
        Picture {
            registers: selector & 0b0001 != 0,
            flags: selector & 0b0010 != 0,
            stack: selector & 0b0100 != 0,
            memory: selector & 0b1000 != 0,
            value_base: Base::from_bits(selector >> 4),
            address_base: Base::from_bits(selector >> 6),
            program_counter,
            instruction,
            cells: *memory.cells(),
        }
    }

    fn cell(&self, address: u8) -> u8 {
        self.cells[address as usize]
    }
}

impl fmt::Display for Picture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "- - -")?;
        writeln!(f, "PICTURE of #{} {}:", self.program_counter, self.instruction)?;

        if self.registers {
            for register in Register::ALL.iter() {
                writeln!(f, "{:>5} = {}", register, self.value_base.format(self.cell(register.address())))?;
            }
        }

        if self.flags {
            writeln!(f, "flags {}", Flags::from_word(self.cell(Register::Flags.address())))?;
        }

        if self.stack {
            let stack_pointer = self.cell(Register::StackPointer.address());

            for address in (STACK_BASE..=STACK_TOP).rev() {
                writeln!(
                    f,
                    "{} | {}{}",
                    self.address_base.format(address),
                    self.value_base.format(self.cell(address)),
                    if address == stack_pointer { " <- sp" } else { "" },
                )?;
            }
        }

        if self.memory {
            for (row, cells) in self.cells.chunks(16).enumerate() {
                write!(f, "{}:", self.address_base.format((row * 16) as u8))?;

                for cell in cells {
                    write!(f, " {}", self.value_base.format(*cell))?;
                }

                writeln!(f)?;
            }
        }

        Ok(())
    }
}

/// A single piece of program output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    /// Raw bytes written by `out`, `prnt` or a string literal.
    Text(Vec<u8>),

    /// A cell printed as a decimal number by `nout` or `tlly`.
    Number(u8),

    Newline,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Output::Text(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Output::Number(value) => write!(f, "{}", value),
            Output::Newline => writeln!(f),
        }
    }
}

/// Interface to the user of the emulated program.
pub trait InputOutput {
    /// Called when an `in` or `nin` instruction is executed.
    ///
    /// # Returns
    /// One line of input, or `None` when no more input is available.
    fn input(&mut self) -> Option<String>;

    /// Called for every piece of output the program produces.
    fn output(&mut self, output: Output);

    /// Called when a `pic` instruction is executed.
    fn picture(&mut self, picture: &Picture);
}

impl<T: InputOutput + ?Sized> InputOutput for &mut T {
    fn input(&mut self) -> Option<String> {
        (**self).input()
    }

    fn output(&mut self, output: Output) {
        (**self).output(output)
    }

    fn picture(&mut self, picture: &Picture) {
        (**self).picture(picture)
    }
}

/// Utility struct for implementing methods in the context of emulating a single instruction.
struct InstructionEmulationContext<'e, 'i, IO> {
    /// The emulator in whose context the instruction is being emulated.
    emulator: &'e mut Emulator<IO>,

    /// The instruction that we are currently emulating.
    instruction: &'i Instruction,
}

type Fallible<T> = Result<T, ExecutionErrorKind>;

fn checked_address(address: i32) -> Fallible<u8> {
    if address < 0 || address >= MEMORY_SIZE as i32 {
        return Err(ExecutionErrorKind::AddressOutOfBounds { address });
    }

    Ok(address as u8)
}

fn floor_divide(dividend: i32, divisor: i32) -> Fallible<i32> {
    if divisor == 0 {
        return Err(ExecutionErrorKind::DivisionByZero);
    }

    let quotient = dividend / divisor;

    if dividend % divisor != 0 && (dividend < 0) != (divisor < 0) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

fn floor_modulo(dividend: i32, divisor: i32) -> Fallible<i32> {
    if divisor == 0 {
        return Err(ExecutionErrorKind::DivisionByZero);
    }

    let remainder = dividend % divisor;

    if remainder != 0 && (remainder < 0) != (divisor < 0) {
        Ok(remainder + divisor)
    } else {
        Ok(remainder)
    }
}

fn shift_left(value: i32, amount: i32) -> Fallible<i32> {
    Ok(value.checked_shl(amount.max(0) as u32).unwrap_or(0))
}

fn shift_right(value: i32, amount: i32) -> Fallible<i32> {
    Ok(value.checked_shr(amount.max(0) as u32).unwrap_or(0))
}

/// Converts a limit operand to a byte count. Negative limits mean no limit.
fn limit(value: i32) -> usize {
    if value < 0 {
        usize::max_value()
    } else {
        value as usize
    }
}

impl<'e, 'i, IO> InstructionEmulationContext<'e, 'i, IO>
    where IO: InputOutput,
{
    fn direct(&self) -> &'i Token {
        &self.instruction.direct_object
    }

    fn indirect(&self) -> &'i Token {
        &self.instruction.indirect_object
    }

    fn cell(&self, address: u8) -> u8 {
        self.emulator.memory.get(address)
    }

    fn lookup(&self, name: &str) -> Fallible<u8> {
        self.emulator.program.symbol_table.address(name)
            .ok_or_else(|| ExecutionErrorKind::UndefinedSymbol { name: name.to_string() })
    }

    fn dereference(&self, address: u8, mode: Mode) -> u8 {
        match mode {
            Mode::Direct => address,
            Mode::Indirect => self.cell(address),
        }
    }

    /// Resolves a location operand to the address of the cell it designates.
    fn address(&self, token: &Token) -> Fallible<u8> {
        match token {
            Token::Register { register, mode } => Ok(self.dereference(self.lookup(register.name())?, *mode)),
            Token::Variable { name, mode } => Ok(self.dereference(self.lookup(name)?, *mode)),
            Token::Address { value, mode } => Ok(self.dereference(checked_address(*value)?, *mode)),
            other => Err(ExecutionErrorKind::NotAddressable { token: other.clone() }),
        }
    }

    /// Resolves an operand to the value it denotes.
    fn value(&self, token: &Token) -> Fallible<i32> {
        match token {
            Token::Number(number) => Ok(number.operand_value()),
            Token::Register { .. } | Token::Variable { .. } | Token::Address { .. } => {
                Ok(self.cell(self.address(token)?) as i32)
            },
            other => Err(ExecutionErrorKind::NotAValue { token: other.clone() }),
        }
    }

    fn value_or(&self, token: &Token, default: i32) -> Fallible<i32> {
        if token.is_blank() {
            Ok(default)
        } else {
            self.value(token)
        }
    }

    /// Reads a resolved instruction index.
    fn target(&self, token: &Token) -> Fallible<u8> {
        match token {
            Token::Number(number) if number.value >= 0 && number.value < MEMORY_SIZE as i32 => {
                Ok(number.value as u8)
            },
            other => Err(ExecutionErrorKind::UnresolvedTarget { token: other.clone() }),
        }
    }

    /// Stores a byte without any checks and notifies the listeners.
    fn store(&mut self, address: u8, data: u8) {
        self.emulator.memory.set(address, data);
        self.emulator.dispatcher.dispatch(Event::MemoryChange { address, data });

        if let Some(register) = Register::from_address(address).filter(|r| !r.is_reserved()) {
            self.emulator.dispatcher.dispatch(Event::RegisterChange { register, data });
        }
    }

    fn writable(&self, address: i32, value: i32) -> Fallible<u8> {
        let address = checked_address(address)?;

        if Register::from_address(address).map_or(false, |register| register.is_reserved()) {
            return Err(ExecutionErrorKind::ReservedRegister { address, value });
        }

        if address >= STACK_BASE {
            return Err(ExecutionErrorKind::StackRegion { address, value });
        }

        Ok(address)
    }

    /// The only path through which instructions modify user memory.
    fn write(&mut self, address: i32, value: i32) -> Fallible<()> {
        let address = self.writable(address, value)?;
        self.store(address, value as u8);

        Ok(())
    }

    fn set_flags(&mut self, flags: Flags) {
        self.emulator.memory.set(Register::Flags.address(), flags.as_word());
    }

    fn flags(&self) -> Flags {
        Flags::from_word(self.cell(Register::Flags.address()))
    }

    fn program_counter(&self) -> u8 {
        self.cell(Register::ProgramCounter.address())
    }

    /// Sets the program counter to the instruction before the one to be executed next.
    fn set_program_counter(&mut self, value: u8) {
        self.emulator.memory.set(Register::ProgramCounter.address(), value);
    }

    /// Makes `target` the next instruction to execute.
    fn jump_to(&mut self, target: u8) {
        let from = self.program_counter();
        self.emulator.dispatcher.dispatch(Event::Jump { from, to: target });
        self.set_program_counter(target.wrapping_sub(1));
    }

    fn stack_pointer(&self) -> u8 {
        self.cell(Register::StackPointer.address())
    }

    fn push(&mut self, value: i32) -> Fallible<()> {
        let stack_pointer = self.stack_pointer();

        if stack_pointer < STACK_BASE {
            return Err(ExecutionErrorKind::StackOverflow { stack_pointer });
        }

        self.store(stack_pointer, value as u8);
        self.emulator.memory.set(Register::StackPointer.address(), stack_pointer - 1);

        Ok(())
    }

    fn pop(&mut self) -> Fallible<u8> {
        let stack_pointer = self.stack_pointer();

        if stack_pointer == STACK_TOP {
            return Err(ExecutionErrorKind::StackUnderflow);
        }

        let stack_pointer = stack_pointer + 1;
        self.emulator.memory.set(Register::StackPointer.address(), stack_pointer);

        Ok(self.cell(stack_pointer))
    }

    fn read_line(&mut self) -> Fallible<String> {
        self.emulator.io.input().ok_or(ExecutionErrorKind::EndOfInput)
    }

    /// `value(direct) OP value(indirect)`, stored at the indirect object.
    fn binary<F>(&mut self, operation: F) -> Fallible<()>
        where F: FnOnce(i32, i32) -> Fallible<i32>
    {
        let left = self.value(self.direct())?;
        let right = self.value(self.indirect())?;
        let destination = self.address(self.indirect())?;

        let result = operation(left, right)?;

        self.set_flags(Flags::from_result(result));
        self.write(destination as i32, result)
    }

    /// Modifies the indirect object by the direct object, which defaults to one.
    fn adjust<F>(&mut self, operation: F) -> Fallible<()>
        where F: FnOnce(i32, i32) -> Fallible<i32>
    {
        let amount = self.value_or(self.direct(), 1)?;
        let current = self.value(self.indirect())?;
        let destination = self.address(self.indirect())?;

        let result = operation(current, amount)?;

        self.set_flags(Flags::from_result(result));
        self.write(destination as i32, result)
    }

    /// Writes the bytes of a string starting from `start`, followed by a zero unless the
    /// string ends right below the stack.
    fn write_string<I>(&mut self, start: u8, bytes: I) -> Fallible<()>
        where I: IntoIterator<Item = u8>
    {
        let mut end = start as i32;

        for byte in bytes {
            self.write(end, byte as i32)?;
            end += 1;
        }

        if end != STACK_BASE as i32 {
            self.write(end, 0)?;
        }

        Ok(())
    }

    fn stream(&mut self, newline: bool) -> Fallible<()> {
        let limit = limit(self.value_or(self.indirect(), -1)?);

        let bytes: Vec<u8> = match self.direct() {
            Token::StringLiteral(text) => text.bytes().take(limit).collect(),
            location => {
                let start = self.address(location)? as usize;

                self.emulator.memory.cells()[start..].iter()
                    .copied()
                    .take_while(|byte| *byte != 0)
                    .take(limit)
                    .collect()
            },
        };

        self.emulator.io.output(Output::Text(bytes));

        if newline {
            self.emulator.io.output(Output::Newline);
        }

        Ok(())
    }

    fn print_number(&mut self, newline: bool) -> Fallible<()> {
        let value = self.cell(self.address(self.direct())?);
        self.emulator.io.output(Output::Number(value));

        if newline {
            self.emulator.io.output(Output::Newline);
        }

        Ok(())
    }

    fn conditional_jump(&mut self, condition: JumpCondition) -> Fallible<()> {
        let target = self.target(self.direct())?;

        if condition == JumpCondition::Always {
            self.jump_to(target);
            return Ok(());
        }

        let accumulator = self.cell(Register::A.address()) as i32;
        let flags = Flags::from_comparison(self.value(self.indirect())? - accumulator);
        self.set_flags(flags);

        let taken = match condition {
            JumpCondition::Always => true,
            JumpCondition::Greater => flags.greater,
            JumpCondition::GreaterOrEqual => flags.greater || flags.equal,
            JumpCondition::Equal => flags.equal,
            JumpCondition::LessOrEqual => flags.equal || flags.negative,
            JumpCondition::Less => flags.negative,
        };

        if taken {
            self.jump_to(target);
        }

        Ok(())
    }

    /// Execute the instruction.
    fn emulate(&mut self) -> Fallible<()> {
        match self.instruction.verb {
            Verb::Add => self.binary(|a, b| Ok(a + b))?,
            Verb::Subtract => self.binary(|a, b| Ok(a - b))?,
            Verb::Multiply => self.binary(|a, b| Ok(a * b))?,
            Verb::Divide => self.binary(floor_divide)?,
            Verb::Modulo => self.binary(floor_modulo)?,
            Verb::And => self.binary(|a, b| Ok(a & b))?,
            Verb::Or => self.binary(|a, b| Ok(a | b))?,
            Verb::Xor => self.binary(|a, b| Ok(a ^ b))?,

            Verb::Increment => self.adjust(|value, amount| Ok(value + amount))?,
            Verb::Decrement => self.adjust(|value, amount| Ok(value - amount))?,
            Verb::ShiftLeft => self.adjust(shift_left)?,
            Verb::ShiftRight => self.adjust(shift_right)?,

            Verb::Not => {
                let result = !self.value(self.direct())?;
                let destination = self.address(self.direct())?;

                self.set_flags(Flags::from_result(result));
                self.write(destination as i32, result)?;
            },

            Verb::Random => {
                let destination = self.address(self.direct())?;
                let result = self.emulator.rng.gen_range(0..=255);

                self.set_flags(Flags::from_result(result));
                self.write(destination as i32, result)?;
            },

            Verb::Move | Verb::Save => {
                let value = self.value(self.direct())?;
                let destination = self.address(self.indirect())?;
                self.write(destination as i32, value)?;
            },

            Verb::Load => {
                let value = self.value(self.indirect())?;
                let destination = self.address(self.direct())?;
                self.write(destination as i32, value)?;
            },

            Verb::Swap => {
                let first = self.address(self.direct())?;
                let second = self.address(self.indirect())?;
                let (first_value, second_value) = (self.cell(first), self.cell(second));

                self.writable(first as i32, second_value as i32)?;
                self.writable(second as i32, first_value as i32)?;

                self.store(first, second_value);
                self.store(second, first_value);
            },

            Verb::Text => {
                let text = match self.direct() {
                    Token::StringLiteral(text) => text,
                    other => return Err(ExecutionErrorKind::NotAValue { token: other.clone() }),
                };

                let start = self.address(self.indirect())?;
                self.write_string(start, text.bytes())?;
            },

            Verb::Input => {
                let start = self.address(self.direct())?;
                let limit = limit(self.value_or(self.indirect(), -1)?);
                let line = self.read_line()?;
                let line = line.trim_end_matches(|c| c == '\n' || c == '\r');

                self.write_string(start, line.bytes().take(limit))?;
            },

            Verb::NumberInput => {
                let destination = self.address(self.direct())?;
                let value = token::parse_leading_integer(&self.read_line()?);
                let value = if value < 0 { value.max(-128) } else { value % 256 };

                self.write(destination as i32, value)?;
            },

            Verb::Output => self.stream(true)?,
            Verb::Print => self.stream(false)?,
            Verb::NumberOutput => self.print_number(true)?,
            Verb::Tally => self.print_number(false)?,
            Verb::Newline => self.emulator.io.output(Output::Newline),

            Verb::Compare => {
                let difference = self.value(self.direct())? - self.value(self.indirect())?;
                self.set_flags(Flags::from_comparison(difference));
            },

            Verb::Branch(condition) => {
                let flags = self.flags();

                let taken = match condition {
                    BranchCondition::Zero => flags.zero,
                    BranchCondition::Positive => flags.greater,
                    BranchCondition::Negative => flags.negative,
                };

                if taken {
                    let offset = self.value(self.direct())?;
                    let target = (self.program_counter() as i32 + offset).rem_euclid(MEMORY_SIZE as i32);
                    self.jump_to(target as u8);
                }
            },

            Verb::Jump(condition) => self.conditional_jump(condition)?,

            Verb::Push => {
                let value = self.value(self.direct())?;
                self.push(value)?;
            },

            Verb::Pop => {
                let destination = self.address(self.direct())?;
                let value = self.pop()?;
                self.write(destination as i32, value as i32)?;
            },

            Verb::Dump => {
                for register in Register::GENERAL.iter() {
                    let value = self.cell(register.address());
                    self.push(value as i32)?;
                }
            },

            Verb::Restore => {
                for register in Register::GENERAL.iter().rev() {
                    let value = self.pop()?;
                    self.write(register.address() as i32, value as i32)?;
                }
            },

            Verb::Call => {
                let destination = self.target(self.direct())?;
                let origin = self.target(self.indirect())?;

                self.push(origin as i32)?;
                self.jump_to(destination);
            },

            Verb::Return => {
                let origin = self.pop()?;
                self.jump_to(origin.wrapping_add(1));
            },

            Verb::Picture => {
                let selector = self.value_or(self.direct(), 0xFF)? as u8;
                let picture = Picture::new(
                    selector,
                    self.program_counter(),
                    self.instruction.clone(),
                    &self.emulator.memory,
                );

                self.emulator.io.picture(&picture);
            },

            Verb::Halt | Verb::End => self.emulator.halted = true,

            Verb::Func | Verb::Name | Verb::List => {
                return Err(ExecutionErrorKind::MetaInstruction { verb: self.instruction.verb });
            },
        }

        Ok(())
    }
}

/// The emulator contains all necessary context for executing a resolved program
/// and interfaces for doing IO.
pub struct Emulator<IO> {
    /// The memory of the emulated machine, registers and stack included.
    pub memory: Memory,

    /// Interface for reading input and presenting output.
    pub io: IO,

    /// True if the execution has been halted.
    pub halted: bool,

    program: ResolvedProgram,
    rng: StdRng,
    logger: Logger,
    dispatcher: EventDispatcher,
}

impl<IO> Emulator<IO> where IO: InputOutput {
    /// Create a new emulator with the program's data laid out in memory.
    pub fn new(program: ResolvedProgram, io: IO) -> Emulator<IO> {
        Emulator::with_logger(program, io, None)
    }

    pub fn with_logger<L>(program: ResolvedProgram, io: IO, logger: L) -> Emulator<IO>
        where L: Into<Option<Logger>>,
    {
        let logger = logger.into()
            .unwrap_or_else(|| Logger::root(Discard, o!()))
            .new(o!("stage" => "execution"));

        let mut memory = Memory::new();

        for (address, value) in &program.writes {
            memory.set(*address, *value);
        }

        debug!(logger, "loaded program";
            "instructions" => program.instructions.len(),
            "data_cells" => program.writes.len(),
        );

        Emulator {
            memory,
            io,
            halted: false,
            program,
            rng: StdRng::from_entropy(),
            logger,
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Makes `rand` produce a reproducible sequence.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) -> ListenerId {
        self.dispatcher.add_listener(listener)
    }

    /// Returns false if the listener was already removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.dispatcher.remove_listener(id)
    }

    pub fn program(&self) -> &ResolvedProgram {
        &self.program
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.program.symbol_table
    }

    pub fn program_counter(&self) -> u8 {
        self.memory.register(Register::ProgramCounter)
    }

    pub fn stack_pointer(&self) -> u8 {
        self.memory.register(Register::StackPointer)
    }

    pub fn flags(&self) -> Flags {
        Flags::from_word(self.memory.register(Register::Flags))
    }

    /// Reads the cell a register, variable or list element name is bound to.
    pub fn symbol_value(&self, name: &str) -> Option<u8> {
        self.program.symbol_table.address(name)
            .map(|address| self.memory.get(address))
    }

    /// Fetches the instruction pointed to by the program counter.
    pub fn current_instruction(&self) -> Result<&Instruction, ExecutionError> {
        let program_counter = self.program_counter();

        self.program.instructions.get(program_counter as usize)
            .ok_or_else(|| ExecutionError {
                program_counter,
                instruction: None,
                kind: ExecutionErrorKind::InstructionOutOfBounds {
                    length: self.program.instructions.len(),
                },
            })
    }

    /// Executes a single instruction.
    ///
    /// Does not increment the program counter or do anything else related to the instruction
    /// fetching.
    pub fn emulate_instruction(&mut self, instruction: &Instruction) -> Result<(), ExecutionError> {
        let program_counter = self.program_counter();

        let mut ctx = InstructionEmulationContext {
            emulator: self,
            instruction,
        };

        ctx.emulate()
            .map_err(|kind| ExecutionError {
                program_counter,
                instruction: Some(instruction.clone()),
                kind,
            })
    }

    /// Fetches and executes the next instruction, then increments the program counter.
    ///
    /// Fetching `halt` or `end` halts the emulator without executing anything.
    pub fn step(&mut self) -> Result<(), ExecutionError> {
        if self.halted {
            return Ok(());
        }

        let instruction = self.current_instruction()?.clone();
        let program_counter = self.program_counter();

        trace!(self.logger, "step"; "pc" => program_counter, "instruction" => %instruction);

        if instruction.verb.is_halt() {
            debug!(self.logger, "halted"; "pc" => program_counter);

            self.halted = true;
            self.dispatcher.dispatch(Event::Halt { program_counter });

            return Ok(());
        }

        self.emulate_instruction(&instruction)?;

        let next = self.program_counter().wrapping_add(1);
        self.memory.set(Register::ProgramCounter.address(), next);

        Ok(())
    }

    /// Executes the program until it halts or fails.
    pub fn run(&mut self) -> Result<(), ExecutionError> {
        while !self.halted {
            self.step()?;
        }

        Ok(())
    }
}

/// An IO handler for testing purposes.
///
/// Reads lines from a pre-determined input buffer and records
/// everything the program prints.
#[derive(Debug, Default)]
pub struct TestIo {
    input_buffer: VecDeque<String>,
    output_buffer: Vec<Output>,
    pictures: Vec<Picture>,
}

impl TestIo {
    pub fn new() -> TestIo {
        TestIo::default()
    }

    pub fn with_input<I, S>(input: I) -> TestIo
        where I: IntoIterator<Item = S>,
              S: Into<String>,
    {
        TestIo {
            input_buffer: input.into_iter().map(Into::into).collect(),
            ..TestIo::default()
        }
    }

    pub fn push_input<S: Into<String>>(&mut self, line: S) {
        self.input_buffer.push_back(line.into());
    }

    pub fn output(&self) -> &[Output] {
        &self.output_buffer[..]
    }

    pub fn into_output(self) -> Vec<Output> {
        self.output_buffer
    }

    /// The output as it would appear on a terminal.
    pub fn text(&self) -> String {
        self.output_buffer.iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn pictures(&self) -> &[Picture] {
        &self.pictures[..]
    }
}

impl InputOutput for TestIo {
    fn input(&mut self) -> Option<String> {
        self.input_buffer.pop_front()
    }

    fn output(&mut self, output: Output) {
        self.output_buffer.push(output);
    }

    fn picture(&mut self, picture: &Picture) {
        self.pictures.push(picture.clone());
    }
}

/// An IO handler that reads lines from the standard input and writes
/// output and pictures to the standard output.
///
/// A failure to read the standard input counts as the end of input.
pub struct StdIo;

impl InputOutput for StdIo {
    fn input(&mut self) -> Option<String> {
        print!("{}", INPUT_PROMPT);
        let _ = std::io::stdout().flush();

        let mut line = String::new();

        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }

    fn output(&mut self, output: Output) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        let _ = match output {
            Output::Text(bytes) => handle.write_all(&bytes),
            other => write!(handle, "{}", other),
        };

        let _ = handle.flush();
    }

    fn picture(&mut self, picture: &Picture) {
        print!("{}", picture);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::resolver::{resolve, MAX_INSTRUCTIONS};
    use crate::event::EventLog;
    use crate::token::{Number, Token};

    fn ins(verb: Verb, direct_object: Token, indirect_object: Token) -> Instruction {
        Instruction::new(verb, direct_object, indirect_object)
    }

    fn reg(register: Register) -> Token {
        Token::register(register)
    }

    fn emulator(instructions: Vec<Instruction>, io: TestIo) -> Emulator<TestIo> {
        let program = resolve(&instructions).expect("program should resolve");
        Emulator::new(program, io)
    }

    fn run(instructions: Vec<Instruction>) -> Emulator<TestIo> {
        let mut emulator = emulator(instructions, TestIo::new());
        emulator.run().expect("program should run");
        emulator
    }

    #[test]
    fn test_add_end_to_end() {
        let emulator = run(vec![
            ins(Verb::Move, Token::number(2), reg(Register::A)),
            ins(Verb::Add, Token::number(3), reg(Register::A)),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.memory.register(Register::A), 5);
        assert!(!emulator.flags().zero);
        assert!(emulator.halted);
        assert_eq!(emulator.program_counter(), 2);
    }

    #[test]
    fn test_add_registers_end_to_end() {
        let emulator = run(vec![
            ins(Verb::Move, Token::number(2), reg(Register::A)),
            ins(Verb::Move, Token::number(3), reg(Register::B)),
            ins(Verb::Add, reg(Register::B), reg(Register::A)),
            Instruction::bare(Verb::Halt),
        ]);

        assert_eq!(emulator.memory.get(0), 5);
        assert_eq!(emulator.memory.register(Register::B), 3);
        assert_eq!(emulator.memory.register(Register::Flags) & 1, 0);
        assert_eq!(emulator.program_counter(), 3);
    }

    #[test]
    fn test_text_and_out() {
        let emulator = run(vec![
            ins(Verb::Text, Token::StringLiteral("hi".into()), Token::address(20)),
            ins(Verb::Output, Token::address(20), Token::Blank),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(&emulator.memory.cells()[20..23], &[b'h', b'i', 0]);
        assert_eq!(emulator.io.output(), &[Output::Text(b"hi".to_vec()), Output::Newline]);
    }

    #[test]
    fn test_out_limit_and_literal() {
        let emulator = run(vec![
            ins(Verb::Text, Token::StringLiteral("hello".into()), Token::address(20)),
            ins(Verb::Print, Token::address(20), Token::number(3)),
            ins(Verb::Print, Token::StringLiteral("!?".into()), Token::Number(Number::signed(-1))),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.io.text(), "hel!?");
    }

    #[test]
    fn test_text_ending_below_the_stack() {
        let written = run(vec![
            ins(Verb::Move, Token::number(7), Token::address(237)),
            ins(Verb::Text, Token::StringLiteral("hi".into()), Token::address(238)),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(&written.memory.cells()[237..240], &[7, b'h', b'i']);
        assert_eq!(written.memory.stack(), &[0; 16][..]);

        let mut emulator = emulator(vec![
            ins(Verb::Text, Token::StringLiteral("hey".into()), Token::address(238)),
            Instruction::bare(Verb::End),
        ], TestIo::new());

        assert_eq!(
            emulator.run().unwrap_err().kind,
            ExecutionErrorKind::StackRegion { address: 240, value: b'y' as i32 },
        );
    }

    #[test]
    fn test_write_to_reserved_register() {
        let mut emulator = emulator(vec![
            ins(Verb::Move, Token::number(1), reg(Register::A)),
            ins(Verb::Move, Token::number(1), Token::address(8)),
            Instruction::bare(Verb::End),
        ], TestIo::new());

        let error = emulator.run().unwrap_err();

        assert_eq!(error.program_counter, 1);
        assert_eq!(error.instruction, Some(ins(Verb::Move, Token::number(1), Token::address(8))));
        assert_eq!(error.kind, ExecutionErrorKind::ReservedRegister { address: 8, value: 1 });
    }

    #[test]
    fn test_write_into_stack_region() {
        let mut emulator = emulator(vec![
            ins(Verb::Move, Token::number(1), Token::address(240)),
            Instruction::bare(Verb::End),
        ], TestIo::new());

        assert_eq!(
            emulator.run().unwrap_err().kind,
            ExecutionErrorKind::StackRegion { address: 240, value: 1 },
        );
    }

    #[test]
    fn test_swap_rejects_reserved_registers() {
        let mut emulator = emulator(vec![
            ins(Verb::Swap, reg(Register::A), reg(Register::ProgramCounter)),
            Instruction::bare(Verb::End),
        ], TestIo::new());

        assert!(matches!(
            emulator.run().unwrap_err().kind,
            ExecutionErrorKind::ReservedRegister { address: 7, .. }
        ));
    }

    #[test]
    fn test_push_pop() {
        let emulator = run(vec![
            ins(Verb::Push, Token::number(7), Token::Blank),
            ins(Verb::Pop, reg(Register::B), Token::Blank),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.memory.register(Register::B), 7);
        assert_eq!(emulator.stack_pointer(), STACK_TOP);
    }

    #[test]
    fn test_pop_empty_stack() {
        let mut emulator = emulator(vec![
            ins(Verb::Pop, reg(Register::B), Token::Blank),
            Instruction::bare(Verb::End),
        ], TestIo::new());

        assert_eq!(emulator.run().unwrap_err().kind, ExecutionErrorKind::StackUnderflow);
    }

    #[test]
    fn test_stack_overflow() {
        let mut program = vec![ins(Verb::Push, Token::number(1), Token::Blank); 16];
        program.push(Instruction::bare(Verb::End));

        let emulator = run(program.clone());
        assert_eq!(emulator.stack_pointer(), STACK_BASE - 1);

        program.insert(0, ins(Verb::Push, Token::number(1), Token::Blank));
        let mut emulator = self::emulator(program, TestIo::new());

        let error = emulator.run().unwrap_err();
        assert_eq!(error.program_counter, 16);
        assert_eq!(error.kind, ExecutionErrorKind::StackOverflow { stack_pointer: STACK_BASE - 1 });
    }

    #[test]
    fn test_dump_restore() {
        let mut program = Register::GENERAL.iter()
            .enumerate()
            .map(|(i, register)| ins(Verb::Move, Token::number(i as i32 + 1), reg(*register)))
            .collect::<Vec<_>>();

        program.push(Instruction::bare(Verb::Dump));

        for register in Register::GENERAL.iter() {
            program.push(ins(Verb::Move, Token::number(0), reg(*register)));
        }

        program.push(Instruction::bare(Verb::Restore));
        program.push(Instruction::bare(Verb::End));

        let emulator = run(program);

        for (i, register) in Register::GENERAL.iter().enumerate() {
            assert_eq!(emulator.memory.register(*register), i as u8 + 1);
        }

        assert_eq!(emulator.stack_pointer(), STACK_TOP);
    }

    #[test]
    fn test_call_return() {
        let emulator = run(vec![
            ins(Verb::Call, Token::call("work"), Token::Blank),
            ins(Verb::Move, Token::number(1), reg(Register::B)),
            Instruction::bare(Verb::Halt),
            ins(Verb::Func, Token::label("work"), Token::Blank),
            ins(Verb::Move, Token::number(9), reg(Register::A)),
            Instruction::bare(Verb::Return),
        ]);

        assert_eq!(emulator.memory.register(Register::A), 9);
        assert_eq!(emulator.memory.register(Register::B), 1);
        assert_eq!(emulator.stack_pointer(), STACK_TOP);
        assert_eq!(emulator.program_counter(), 2);
    }

    #[test]
    fn test_conditional_jumps() {
        let program = |condition, value| vec![
            ins(Verb::Move, Token::number(5), reg(Register::A)),
            ins(Verb::Jump(condition), Token::call("skip"), Token::number(value)),
            ins(Verb::Move, Token::number(1), reg(Register::B)),
            ins(Verb::Func, Token::label("skip"), Token::Blank),
            Instruction::bare(Verb::End),
        ];

        let taken = |condition, value| run(program(condition, value)).memory.register(Register::B) == 0;

        assert!(taken(JumpCondition::Greater, 6));
        assert!(!taken(JumpCondition::Greater, 5));
        assert!(taken(JumpCondition::GreaterOrEqual, 5));
        assert!(taken(JumpCondition::Equal, 5));
        assert!(!taken(JumpCondition::Equal, 4));
        assert!(taken(JumpCondition::LessOrEqual, 4));
        assert!(taken(JumpCondition::LessOrEqual, 5));
        assert!(taken(JumpCondition::Less, 4));
        assert!(!taken(JumpCondition::Less, 5));
        assert!(taken(JumpCondition::Always, 0));
    }

    #[test]
    fn test_jump_events() {
        let log = EventLog::new();

        let mut emulator = emulator(vec![
            ins(Verb::Call, Token::call("work"), Token::Blank),
            Instruction::bare(Verb::Halt),
            ins(Verb::Func, Token::label("work"), Token::Blank),
            ins(Verb::Compare, Token::number(1), Token::number(1)),
            ins(Verb::Branch(BranchCondition::Zero), Token::number(2), Token::Blank),
            Instruction::bare(Verb::Halt),
            Instruction::bare(Verb::Return),
        ], TestIo::new());

        let id = emulator.add_listener(log.clone());
        emulator.run().unwrap();

        let jumps = log.events().into_iter()
            .filter(|event| matches!(event, Event::Jump { .. }))
            .collect::<Vec<_>>();

        assert_eq!(jumps, vec![
            Event::Jump { from: 0, to: 2 },
            Event::Jump { from: 3, to: 5 },
            Event::Jump { from: 5, to: 1 },
        ]);

        assert!(emulator.remove_listener(id));
    }

    #[test]
    fn test_relative_branches() {
        let emulator = run(vec![
            ins(Verb::Compare, Token::number(3), Token::number(3)),
            ins(Verb::Branch(BranchCondition::Zero), Token::number(2), Token::Blank),
            ins(Verb::Move, Token::number(1), reg(Register::B)),
            ins(Verb::Compare, Token::number(4), Token::number(3)),
            ins(Verb::Branch(BranchCondition::Negative), Token::number(2), Token::Blank),
            ins(Verb::Move, Token::number(1), reg(Register::C)),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.memory.register(Register::B), 0);
        assert_eq!(emulator.memory.register(Register::C), 1);
        assert!(emulator.flags().greater);
    }

    #[test]
    fn test_backward_branch_loop() {
        let emulator = run(vec![
            ins(Verb::Move, Token::number(3), reg(Register::A)),
            ins(Verb::Increment, Token::Blank, reg(Register::B)),
            ins(Verb::Decrement, Token::Blank, reg(Register::A)),
            ins(Verb::Compare, reg(Register::A), Token::number(0)),
            ins(Verb::Branch(BranchCondition::Positive), Token::Number(Number::signed(-3)), Token::Blank),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.memory.register(Register::A), 0);
        assert_eq!(emulator.memory.register(Register::B), 3);
    }

    #[test]
    fn test_floor_division_and_masking() {
        let emulator = run(vec![
            ins(Verb::Move, Token::number(2), reg(Register::A)),
            ins(Verb::Divide, Token::Number(Number::signed(-7)), reg(Register::A)),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.memory.register(Register::A), (-4i32 as u8));
        assert!(emulator.flags().negative);

        assert_eq!(floor_modulo(-7, 2), Ok(1));
        assert_eq!(floor_divide(7, -2), Ok(-4));
    }

    #[test]
    fn test_division_by_zero() {
        let mut emulator = emulator(vec![
            ins(Verb::Divide, Token::number(1), reg(Register::A)),
            Instruction::bare(Verb::End),
        ], TestIo::new());

        assert_eq!(emulator.run().unwrap_err().kind, ExecutionErrorKind::DivisionByZero);
    }

    #[test]
    fn test_overflowing_result_flags() {
        let emulator = run(vec![
            ins(Verb::Move, Token::number(200), reg(Register::A)),
            ins(Verb::Add, Token::number(100), reg(Register::A)),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.memory.register(Register::A), 44);
        assert!(emulator.flags().carry);
        assert!(emulator.flags().overflow);
    }

    #[test]
    fn test_shifts_and_not() {
        let emulator = run(vec![
            ins(Verb::Move, Token::number(3), reg(Register::A)),
            ins(Verb::ShiftLeft, Token::number(2), reg(Register::A)),
            ins(Verb::Move, Token::number(8), reg(Register::B)),
            ins(Verb::ShiftRight, Token::Blank, reg(Register::B)),
            ins(Verb::Move, Token::number(0x0F), reg(Register::C)),
            ins(Verb::Not, reg(Register::C), Token::Blank),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.memory.register(Register::A), 12);
        assert_eq!(emulator.memory.register(Register::B), 4);
        assert_eq!(emulator.memory.register(Register::C), 0xF0);
    }

    #[test]
    fn test_move_load_through_pointers() {
        let emulator = run(vec![
            ins(Verb::Move, Token::number(30), reg(Register::H)),
            ins(Verb::Move, Token::number(42), Token::Register { register: Register::H, mode: Mode::Indirect }),
            ins(Verb::Load, reg(Register::L), Token::Address { value: 3, mode: Mode::Indirect }),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.memory.get(30), 42);
        assert_eq!(emulator.memory.register(Register::L), 42);
    }

    #[test]
    fn test_line_input() {
        let mut emulator = emulator(vec![
            ins(Verb::Input, Token::address(20), Token::number(2)),
            ins(Verb::Input, Token::address(30), Token::Blank),
            Instruction::bare(Verb::End),
        ], TestIo::with_input(vec!["abc\n"]));

        emulator.io.push_input("xy\r\n");
        emulator.run().unwrap();

        assert_eq!(&emulator.memory.cells()[20..23], &[b'a', b'b', 0]);
        assert_eq!(&emulator.memory.cells()[30..33], &[b'x', b'y', 0]);
    }

    #[test]
    fn test_number_input() {
        let mut emulator = emulator(vec![
            ins(Verb::NumberInput, reg(Register::A), Token::Blank),
            ins(Verb::NumberInput, reg(Register::B), Token::Blank),
            ins(Verb::NumberInput, reg(Register::C), Token::Blank),
            ins(Verb::NumberOutput, reg(Register::B), Token::Blank),
            ins(Verb::Tally, reg(Register::C), Token::Blank),
            Instruction::bare(Verb::Newline),
            Instruction::bare(Verb::End),
        ], TestIo::with_input(vec!["-300", "300", "nope"]));

        emulator.run().unwrap();

        assert_eq!(emulator.memory.register(Register::A), 128);
        assert_eq!(emulator.memory.register(Register::B), 44);
        assert_eq!(emulator.memory.register(Register::C), 0);
        assert_eq!(emulator.io.text(), "44\n0\n");
    }

    #[test]
    fn test_end_of_input() {
        let mut emulator = emulator(vec![
            ins(Verb::NumberInput, reg(Register::A), Token::Blank),
            Instruction::bare(Verb::End),
        ], TestIo::new());

        assert_eq!(emulator.run().unwrap_err().kind, ExecutionErrorKind::EndOfInput);
    }

    #[test]
    fn test_seeded_random() {
        let program = vec![
            ins(Verb::Random, reg(Register::A), Token::Blank),
            ins(Verb::Random, reg(Register::B), Token::Blank),
            Instruction::bare(Verb::End),
        ];

        let registers = || {
            let mut emulator = emulator(program.clone(), TestIo::new());
            emulator.seed(42);
            emulator.run().unwrap();
            (emulator.memory.register(Register::A), emulator.memory.register(Register::B))
        };

        assert_eq!(registers(), registers());
    }

    #[test]
    fn test_picture() {
        let emulator = run(vec![
            ins(Verb::Move, Token::number(7), reg(Register::A)),
            ins(Verb::Picture, Token::number(0b1101_0011), Token::Blank),
            Instruction::bare(Verb::End),
        ]);

        let pictures = emulator.io.pictures();
        assert_eq!(pictures.len(), 1);

        let picture = &pictures[0];
        assert!(picture.registers && picture.flags);
        assert!(!picture.stack && !picture.memory);
        assert_eq!(picture.address_base, Base::Hexadecimal);
        assert_eq!(picture.value_base, Base::Octal);
        assert_eq!(picture.program_counter, 1);
        assert_eq!(picture.cells[0], 7);
        assert!(picture.to_string().contains("a = 007"));
    }

    #[test]
    fn test_events() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let recorded = events.clone();

        let mut emulator = emulator(vec![
            ins(Verb::Move, Token::number(3), reg(Register::B)),
            ins(Verb::Move, Token::number(4), Token::address(20)),
            Instruction::bare(Verb::End),
        ], TestIo::new());

        emulator.add_listener(move |event: &Event| recorded.borrow_mut().push(event.clone()));
        emulator.run().unwrap();

        assert_eq!(*events.borrow(), vec![
            Event::MemoryChange { address: 1, data: 3 },
            Event::RegisterChange { register: Register::B, data: 3 },
            Event::MemoryChange { address: 20, data: 4 },
            Event::Halt { program_counter: 2 },
        ]);
    }

    #[test]
    fn test_meta_instruction_and_running_off_the_end() {
        let program = ResolvedProgram {
            instructions: vec![
                ins(Verb::Move, Token::number(1), reg(Register::A)),
                Instruction::bare(Verb::List),
            ],
            symbol_table: SymbolTable::new(),
            writes: BTreeMap::new(),
            origins: vec![0, 1],
        };

        let mut emulator = Emulator::new(program.clone(), TestIo::new());
        assert_eq!(
            emulator.run().unwrap_err().kind,
            ExecutionErrorKind::MetaInstruction { verb: Verb::List },
        );

        let mut truncated = program;
        truncated.instructions.pop();

        let mut emulator = Emulator::new(truncated, TestIo::new());
        let error = emulator.run().unwrap_err();
        assert_eq!(error.program_counter, 1);
        assert_eq!(error.instruction, None);
        assert_eq!(error.kind, ExecutionErrorKind::InstructionOutOfBounds { length: 1 });
    }

    #[test]
    fn test_falling_through_the_largest_program() {
        let program = vec![ins(Verb::Increment, Token::Blank, reg(Register::B)); MAX_INSTRUCTIONS];
        let mut emulator = emulator(program, TestIo::new());

        let error = emulator.run().unwrap_err();

        assert_eq!(error.program_counter, 255);
        assert_eq!(error.instruction, None);
        assert_eq!(error.kind, ExecutionErrorKind::InstructionOutOfBounds { length: MAX_INSTRUCTIONS });
        assert_eq!(emulator.memory.register(Register::B), 255);
    }

    #[test]
    fn test_list_data_is_loaded() {
        let emulator = run(vec![
            ins(
                Verb::List,
                Token::address(50),
                Token::DataList(vec![
                    crate::token::DataElement { name: Some("greeting".into()), value: "\"ok\"".into() },
                ]),
            ),
            ins(Verb::Output, Token::variable("greeting"), Token::Blank),
            Instruction::bare(Verb::End),
        ]);

        assert_eq!(emulator.symbol_value("greeting"), Some(b'o'));
        assert_eq!(emulator.io.text(), "ok\n");
    }

    #[test]
    fn test_halted_emulator_stays_put() {
        let mut emulator = run(vec![Instruction::bare(Verb::Halt)]);

        emulator.step().unwrap();
        assert_eq!(emulator.program_counter(), 0);
    }
}
