//! Line based assembler producing a code image.
//!
//! ```text
//! # sum the input until it runs dry
//!     MOV R1, #0
//! loop:
//!     MOV R0, 400        ; read the input port
//!     ADD R1, R1, R0
//!     JMP loop
//! ```
//!
//! Operands are registers (`R3`), immediates (`#-5`), direct addresses (`17`,
//! `label`), register-indirect (`[R2]`) or indirect addresses (`[17]`). The
//! addressing shape of an instruction follows from its operand shapes.
//! `! value` emits a raw word and `0x40:` moves the write position forward.
//!
//! `.data` switches to the data segment, `.code` back. The data segment only
//! takes literals and labels, and its labels resolve to addresses behind the
//! data base. Raw words left in the code section can still be run but cannot
//! be written to a code image.

use std::borrow::Cow;
use std::collections::HashMap;
use std::error;
use std::str::FromStr;
use std::{fmt, str::Lines};

use crate::isa::{Instruction, Opcode, Register};

use super::{Address, Cell, Memory, DATA_BASE};

macro_rules! propagate {
    ( $res:expr ) => {
        match $res {
            Ok(value) => value,
            Err(err) => return Some(Err(err)),
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidAddress { address: usize },
    InvalidLiteral,
    InvalidNumber { radix: u32 },
    InvalidInstruction,
    InvalidOperand,
    InvalidAddressLabel,
    UnknownLabel,
    UnknownDirective,
    InstructionInData,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidAddress { address } => {
                write!(f, "cannot place code at address `{}`", address)
            }
            ParseErrorKind::InvalidLiteral => f.write_str("invalid literal"),
            ParseErrorKind::InvalidNumber { radix } => {
                write!(f, "failed to parse number with radix `{}`", radix)
            }
            ParseErrorKind::InvalidInstruction => f.write_str("failed to resolve instruction"),
            ParseErrorKind::InvalidOperand => f.write_str("invalid operand"),
            ParseErrorKind::InvalidAddressLabel => f.write_str("invalid address label"),
            ParseErrorKind::UnknownLabel => f.write_str("unknown label"),
            ParseErrorKind::UnknownDirective => f.write_str("unknown directive"),
            ParseErrorKind::InstructionInData => {
                f.write_str("instructions are not allowed in the data section")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl ParseError {
    fn new<C, S>(kind: ParseErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for ParseError {}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Parses decimal, `0b`, `0o` and `0x` numbers with an optional minus sign.
/// Hex words above `i32::MAX` are taken as their two's complement value.
fn parse_number(text: &str) -> std::result::Result<i32, u32> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (radix, offset) = match digits.as_bytes() {
        [b'0', b'b', ..] => (2, 2),
        [b'0', b'o', ..] => (8, 2),
        [b'0', b'x', ..] => (16, 2),
        _ => (10, 0),
    };

    let magnitude = i64::from_str_radix(&digits[offset..], radix).map_err(|_| radix)?;
    let value = if negative { -magnitude } else { magnitude };

    i32::try_from(value)
        .or_else(|_| u32::try_from(value).map(|word| word as i32))
        .map_err(|_| radix)
}

fn is_label(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_register(text: &str) -> Option<Register> {
    let index = text.strip_prefix(|c| c == 'R' || c == 'r')?.parse::<u8>().ok()?;
    Register::try_from(index).ok()
}

/// A word that may still refer to a label
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Number(i32),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Register(Register),
    RegisterIndirect(Register),
    Immediate(Value),
    Direct(Value),
    Indirect(Value),
}

/// Opcodes of a binary operation in the order
/// register, memory, memory-to-memory, mixed-left, mixed-right
fn binary_family(mnemonic: &str) -> Option<[Opcode; 5]> {
    use Opcode::*;

    Some(match mnemonic {
        "ADD" => [AddRegister, AddMemory, AddMemoryToMemory, AddMixedLeft, AddMixedRight],
        "SUB" => [SubRegister, SubMemory, SubMemoryToMemory, SubMixedLeft, SubMixedRight],
        "MUL" => [MulRegister, MulMemory, MulMemoryToMemory, MulMixedLeft, MulMixedRight],
        "DIV" => [DivRegister, DivMemory, DivMemoryToMemory, DivMixedLeft, DivMixedRight],
        "REM" => [RemRegister, RemMemory, RemMemoryToMemory, RemMixedLeft, RemMixedRight],
        "AND" => [AndRegister, AndMemory, AndMemoryToMemory, AndMixedLeft, AndMixedRight],
        "OR" => [OrRegister, OrMemory, OrMemoryToMemory, OrMixedLeft, OrMixedRight],
        "XOR" => [XorRegister, XorMemory, XorMemoryToMemory, XorMixedLeft, XorMixedRight],
        _ => return None,
    })
}

type Selected = (Opcode, Vec<Register>, Vec<Value>);

/// Picks the opcode for a mnemonic and its operand shapes
fn select(mnemonic: &str, operands: Vec<Operand>) -> Option<Selected> {
    use Opcode::*;
    use Operand as O;

    if let Some(family) = binary_family(mnemonic) {
        return match <[Operand; 3]>::try_from(operands).ok()? {
            [O::Register(d), O::Register(l), O::Register(r)] => Some((family[0], vec![d, l, r], vec![])),
            [O::Register(d), O::Direct(a), O::Direct(b)] => Some((family[1], vec![d], vec![a, b])),
            [O::Direct(c), O::Direct(a), O::Direct(b)] => Some((family[2], vec![], vec![a, b, c])),
            [O::Register(d), O::Register(l), O::Direct(a)] => Some((family[3], vec![d, l], vec![a])),
            [O::Register(d), O::Direct(a), O::Register(r)] => Some((family[4], vec![d, r], vec![a])),
            _ => None,
        };
    }

    let accumulate = match mnemonic {
        "NADD" => Some(Nadd),
        "NSUB" => Some(Nsub),
        "NMUL" => Some(Nmul),
        "NAND" => Some(Nand),
        "NOR" => Some(Nor),
        _ => None,
    };
    if let Some(opcode) = accumulate {
        return match <[Operand; 3]>::try_from(operands).ok()? {
            [O::Register(n), O::Register(d), O::Direct(base)] => Some((opcode, vec![n, d], vec![base])),
            _ => None,
        };
    }

    let branch = match mnemonic {
        "BEQZ" => Some(Beqz),
        "BNEZ" => Some(Bnez),
        "BGZ" => Some(Bgz),
        "BLZ" => Some(Blz),
        _ => None,
    };
    if let Some(opcode) = branch {
        return match <[Operand; 2]>::try_from(operands).ok()? {
            [O::Register(r), O::Direct(target)] => Some((opcode, vec![r], vec![target])),
            _ => None,
        };
    }

    let mut operands = operands.into_iter();
    let first = operands.next();
    let second = operands.next();
    if operands.next().is_some() {
        return None;
    }

    match (mnemonic, first, second) {
        ("MOV", Some(O::Register(d)), Some(O::Register(s))) => Some((MovRegister, vec![d, s], vec![])),
        ("MOV", Some(O::Register(d)), Some(O::RegisterIndirect(s))) => Some((MovIndirectRegister, vec![d, s], vec![])),
        ("MOV", Some(O::Register(d)), Some(O::Immediate(v))) => Some((MovImmediate, vec![d], vec![v])),
        ("MOV", Some(O::Register(d)), Some(O::Direct(a))) => Some((MovDirect, vec![d], vec![a])),
        ("MOV", Some(O::Register(d)), Some(O::Indirect(a))) => Some((MovIndirect, vec![d], vec![a])),
        ("MOV", Some(O::Direct(to)), Some(O::Direct(from))) => Some((MovMemory, vec![], vec![from, to])),
        ("STORE", Some(O::Register(s)), Some(O::Register(t))) => Some((StoreRegister, vec![s, t], vec![])),
        ("STORE", Some(O::Register(s)), Some(O::RegisterIndirect(t))) => Some((StoreIndirectRegister, vec![s, t], vec![])),
        ("STORE", Some(O::Register(s)), Some(O::Direct(a))) => Some((StoreDirect, vec![s], vec![a])),
        ("STORE", Some(O::Register(s)), Some(O::Indirect(a))) => Some((StoreIndirect, vec![s], vec![a])),
        ("INC", Some(O::Register(r)), None) => Some((IncRegister, vec![r], vec![])),
        ("INC", Some(O::Direct(a)), None) => Some((IncMemory, vec![], vec![a])),
        ("DEC", Some(O::Register(r)), None) => Some((DecRegister, vec![r], vec![])),
        ("DEC", Some(O::Direct(a)), None) => Some((DecMemory, vec![], vec![a])),
        ("JMP", Some(O::Register(r)), None) => Some((JmpRegister, vec![r], vec![])),
        ("JMP", Some(O::Direct(target)), None) => Some((JmpImmediate, vec![], vec![target])),
        ("CALL", Some(O::Direct(target)), None) => Some((Call, vec![], vec![target])),
        ("RET", None, None) => Some((Ret, vec![], vec![])),
        ("PUSH", Some(O::Register(r)), None) => Some((Push, vec![r], vec![])),
        ("POP", Some(O::Register(r)), None) => Some((Pop, vec![r], vec![])),
        ("HLT", None, None) => Some((Hlt, vec![], vec![])),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Code,
    Data,
}

/// A word waiting for its label
#[derive(Debug, Clone)]
struct Fixup {
    section: Section,
    /// index inside the section
    position: usize,
    label: String,
    line_nr: usize,
}

/// Output of the assembler: a code image for address 0 and a data segment
/// for `data_base`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub code: Vec<Cell>,
    pub data: Vec<i32>,
    pub data_base: Address,
}

#[derive(Debug, Clone)]
pub struct Parser<'a> {
    lines: Lines<'a>,
    line_nr: usize,
    section: Section,
    cells: Vec<Cell>,
    data: Vec<i32>,
    data_base: Address,
    labels: HashMap<String, usize>,
    fixups: Vec<Fixup>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for `data`. Code is placed from address 0 on,
    /// the data section from [`DATA_BASE`] on.
    pub fn new(data: &'a str) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            section: Section::Code,
            cells: Vec::new(),
            data: Vec::new(),
            data_base: DATA_BASE,
            labels: HashMap::new(),
            fixups: Vec::new(),
        }
    }

    /// Places the data section at `data_base`
    pub fn with_data_base(mut self, data_base: Address) -> Self {
        self.data_base = data_base;
        self
    }

    /// Address the next word is written to
    fn position(&self) -> usize {
        match self.section {
            Section::Code => self.cells.len(),
            Section::Data => self.data_base.idx() + self.data.len(),
        }
    }

    /// Consumes `self` and tries to assemble all of `data` into a program.
    ///
    /// # Errors
    ///
    /// All errors which may occur are collected and returned at the end.
    pub fn parse(mut self) -> Result<Program, Vec<ParseError>> {
        let mut errors = Vec::new();

        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::error!("{}", err);
                errors.push(err);
            }
        }

        for fixup in &self.fixups {
            match self.labels.get(&fixup.label) {
                Some(address) => {
                    let value = *address as i32;
                    match fixup.section {
                        Section::Code => self.cells[fixup.position] = Cell::Value(value),
                        Section::Data => self.data[fixup.position] = value,
                    }
                }
                None => {
                    let err = ParseError::new(
                        ParseErrorKind::UnknownLabel,
                        format!("`{}` is never defined", fixup.label),
                        fixup.line_nr,
                    );
                    log::error!("{}", err);
                    errors.push(err);
                }
            }
        }

        if errors.is_empty() {
            Ok(Program {
                code: self.cells,
                data: self.data,
                data_base: self.data_base,
            })
        } else {
            Err(errors)
        }
    }

    /// Tries to parse the next line. Each instruction should be located on
    /// its own line, optionally behind a label.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let raw = self.lines.next()?;
        self.line_nr += 1;

        let mut line = raw.split(';').next().unwrap_or_default().trim();

        if line.is_empty() || line.starts_with('#') {
            // Comment or empty line; skip
            return Some(Ok(()));
        }

        if let Some(directive) = line.strip_prefix('.') {
            return Some(self.parse_directive(directive));
        }

        if let Some((label, rest)) = line.split_once(':') {
            propagate!(self.parse_address_label(label.trim()));
            line = rest.trim();
            if line.is_empty() {
                return Some(Ok(()));
            }
        }

        if line.starts_with('!') {
            // Line is a literal
            Some(self.parse_literal(line))
        } else if self.section == Section::Data {
            Some(Err(ParseError::new(
                ParseErrorKind::InstructionInData,
                format!("`{}`", line),
                self.line_nr,
            )))
        } else {
            // Line is an instruction.
            Some(self.parse_instruction(line))
        }
    }

    /// Switches sections on `.code` and `.data`
    fn parse_directive(&mut self, directive: &str) -> Result<()> {
        self.section = match directive.trim() {
            "code" => Section::Code,
            "data" => Section::Data,
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnknownDirective,
                    format!("`.{}`", other),
                    self.line_nr,
                ))
            }
        };
        log::debug!("[{}] Switched to {:?} section", self.line_nr, self.section);
        Ok(())
    }

    /// Tries to parse an address label, without its colon.
    ///
    /// # Examples
    ///
    /// - `loop` names the current position
    /// - `0x40` moves the position forward to 0x40
    fn parse_address_label(&mut self, label: &str) -> Result<()> {
        if is_label(label) {
            log::debug!("[{}] Found label `{}`", self.line_nr, label);

            if self.labels.insert(label.to_owned(), self.position()).is_some() {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidAddressLabel,
                    format!("`{}` is defined twice", label),
                    self.line_nr,
                ));
            }
            return Ok(());
        }

        let address = parse_number(label).map_err(|radix| {
            ParseError::new(
                ParseErrorKind::InvalidNumber { radix },
                format!("`{}` is neither a label nor an address", label),
                self.line_nr,
            )
        })?;

        log::debug!("[{}] Address label `0x{:x}`", self.line_nr, address);

        match usize::try_from(address) {
            Ok(address) if address >= self.position() => {
                match self.section {
                    Section::Code => self.cells.resize(address, Cell::default()),
                    Section::Data => self.data.resize(address - self.data_base.idx(), 0),
                }
                Ok(())
            }
            _ => Err(ParseError::new(
                ParseErrorKind::InvalidAddress {
                    address: address as usize,
                },
                "address labels may only move forward",
                self.line_nr,
            )),
        }
    }

    /// Tries to parse line as literal.
    ///
    /// # Examples
    ///
    /// - `! 0x22`
    /// - `! -7`
    /// - `! table`
    fn parse_literal(&mut self, line: &str) -> Result<()> {
        let text = line.trim_start_matches('!').trim();

        log::debug!("[{}] Found literal", self.line_nr);

        if text.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidLiteral,
                "a literal needs to have a number set",
                self.line_nr,
            ));
        }

        let value = self.parse_value(text)?;
        self.write_value(value);
        Ok(())
    }

    /// Tries to parse line as an instruction.
    ///
    /// # Examples
    ///
    /// - `MOV R0, #5`
    /// - `ADD R0, R1, [R2]`
    /// - `NADD R1, R0, values`
    fn parse_instruction(&mut self, line: &str) -> Result<()> {
        let (mnemonic, rest) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));
        let mnemonic = mnemonic.to_ascii_uppercase();

        let operands = rest
            .split(',')
            .map(str::trim)
            .filter(|operand| !operand.is_empty())
            .map(|operand| self.parse_operand(operand))
            .collect::<Result<Vec<_>>>()?;

        let (opcode, terms, words) = select(&mnemonic, operands).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::InvalidInstruction,
                format!("no form of `{}` takes operands `{}`", mnemonic, rest.trim()),
                self.line_nr,
            )
        })?;

        let instruction = Instruction::new(opcode, &terms).map_err(|err| {
            ParseError::new(
                ParseErrorKind::InvalidInstruction,
                err.to_string(),
                self.line_nr,
            )
        })?;

        log::debug!("[{}] Found instruction {}", self.line_nr, instruction);

        self.cells.push(Cell::Instruction(instruction));
        for word in words {
            self.write_value(word);
        }
        Ok(())
    }

    fn parse_operand(&self, text: &str) -> Result<Operand> {
        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            let inner = inner.trim();
            return match parse_register(inner) {
                Some(register) => Ok(Operand::RegisterIndirect(register)),
                None => Ok(Operand::Indirect(self.parse_value(inner)?)),
            };
        }

        if text.starts_with('[') || text.ends_with(']') {
            return Err(ParseError::new(
                ParseErrorKind::InvalidOperand,
                format!("unbalanced brackets in `{}`", text),
                self.line_nr,
            ));
        }

        if let Some(immediate) = text.strip_prefix('#') {
            return Ok(Operand::Immediate(self.parse_value(immediate.trim())?));
        }

        match parse_register(text) {
            Some(register) => Ok(Operand::Register(register)),
            None => Ok(Operand::Direct(self.parse_value(text)?)),
        }
    }

    fn parse_value(&self, text: &str) -> Result<Value> {
        if is_label(text) && parse_register(text).is_none() {
            return Ok(Value::Label(text.to_owned()));
        }

        parse_number(text).map(Value::Number).map_err(|radix| {
            ParseError::new(
                ParseErrorKind::InvalidNumber { radix },
                format!("`{}` is not a number or label", text),
                self.line_nr,
            )
        })
    }

    /// Appends a raw word to the current section, deferring labels until
    /// all of them are known
    fn write_value(&mut self, value: Value) {
        let number = match value {
            Value::Number(number) => number,
            Value::Label(label) => {
                self.fixups.push(Fixup {
                    section: self.section,
                    position: match self.section {
                        Section::Code => self.cells.len(),
                        Section::Data => self.data.len(),
                    },
                    label,
                    line_nr: self.line_nr,
                });
                0
            }
        };

        match self.section {
            Section::Code => self.cells.push(Cell::Value(number)),
            Section::Data => self.data.push(number),
        }
    }
}

/// Assembles `source` with the data section at [`DATA_BASE`]
pub fn assemble(source: &str) -> Result<Program, Vec<ParseError>> {
    Parser::new(source).parse()
}

impl<const S: usize> FromStr for Memory<S> {
    type Err = Vec<ParseError>;

    /// Assembles `s`, loading code at address 0 and data at its base
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let program = assemble(s)?;
        let data: Vec<Cell> = program.data.iter().copied().map(Cell::Value).collect();

        let mut memory = Memory::default();
        memory
            .load(Address(0), &program.code)
            .and_then(|_| memory.load(program.data_base, &data))
            .map_err(|err| {
                vec![ParseError::new(
                    ParseErrorKind::InvalidAddress {
                        address: program.data_base.idx() + data.len(),
                    },
                    err.to_string(),
                    0,
                )]
            })?;
        Ok(memory)
    }
}

#[cfg(test)]
mod tests {
    use crate::isa::Register::*;
    use crate::memory::StdMem;
    use std::str::FromStr;

    use super::*;
    use color_eyre::Result;

    fn instruction(opcode: Opcode, terms: &[Register]) -> Cell {
        Cell::Instruction(Instruction::new(opcode, terms).unwrap())
    }

    #[test]
    fn parse_moves() -> Result<()> {
        let data = r#"
            MOV R0, #5
            MOV R1, R0
            MOV R2, [R1]
            MOV R3, 100
            MOV R4, [0x64]
            MOV 20, 10
        "#;

        let cells = assemble(data).unwrap().code;

        assert_eq!(
            cells,
            vec![
                instruction(Opcode::MovImmediate, &[R0]),
                Cell::Value(5),
                instruction(Opcode::MovRegister, &[R1, R0]),
                instruction(Opcode::MovIndirectRegister, &[R2, R1]),
                instruction(Opcode::MovDirect, &[R3]),
                Cell::Value(100),
                instruction(Opcode::MovIndirect, &[R4]),
                Cell::Value(100),
                instruction(Opcode::MovMemory, &[]),
                Cell::Value(10),
                Cell::Value(20),
            ]
        );

        Ok(())
    }

    #[test]
    fn parse_binary_shapes() -> Result<()> {
        let data = r#"
            add r0, r1, r2
            SUB R0, 10, 11
            MUL 12, 10, 11
            DIV R0, R1, 10
            REM R0, 10, R2
        "#;

        let cells = assemble(data).unwrap().code;

        assert_eq!(cells[0], instruction(Opcode::AddRegister, &[R0, R1, R2]));
        assert_eq!(cells[1], instruction(Opcode::SubMemory, &[R0]));
        assert_eq!(cells[2..4], [Cell::Value(10), Cell::Value(11)]);
        assert_eq!(cells[4], instruction(Opcode::MulMemoryToMemory, &[]));
        assert_eq!(cells[5..8], [Cell::Value(10), Cell::Value(11), Cell::Value(12)]);
        assert_eq!(cells[8], instruction(Opcode::DivMixedLeft, &[R0, R1]));
        assert_eq!(cells[10], instruction(Opcode::RemMixedRight, &[R0, R2]));
        assert_eq!(cells.len(), 12);

        Ok(())
    }

    #[test]
    fn parse_labels() -> Result<()> {
        let data = r#"
            # jump over the data
                JMP start
            table:
                ! 7
                !-1
            start: MOV R0, table   ; direct read
                BNEZ R0, start
                CALL done
            done:
                HLT
        "#;

        let cells = assemble(data).unwrap().code;

        assert_eq!(cells[1], Cell::Value(4));
        assert_eq!(cells[2..4], [Cell::Value(7), Cell::Value(-1)]);
        assert_eq!(cells[5], Cell::Value(2));
        assert_eq!(cells[7], Cell::Value(4));
        assert_eq!(cells[9], Cell::Value(10));
        assert_eq!(cells[10], instruction(Opcode::Hlt, &[]));

        Ok(())
    }

    #[test]
    fn parse_address_labels() -> Result<()> {
        let data = r#"
                HLT
            0x10:
                ! 0b101
                ! 0o17
        "#;

        let mem = StdMem::from_str(data).unwrap();

        assert_eq!(mem.cells[0], instruction(Opcode::Hlt, &[]));
        assert_eq!(mem.cells[1], Cell::Value(0));
        assert_eq!(mem.cells[0x10], Cell::Value(5));
        assert_eq!(mem.cells[0x11], Cell::Value(15));

        Ok(())
    }

    #[test]
    fn parse_collects_errors() -> Result<()> {
        let data = r#"
            MOV R0
            FLY R1
            JMP nowhere
            ! 0xZZ
            HLT
        "#;

        let errors = assemble(data).unwrap_err();
        let kinds: Vec<_> = errors.iter().map(|err| (err.line_nr(), err.kind())).collect();

        assert_eq!(
            kinds,
            vec![
                (2, ParseErrorKind::InvalidInstruction),
                (3, ParseErrorKind::InvalidInstruction),
                (5, ParseErrorKind::InvalidNumber { radix: 16 }),
                (4, ParseErrorKind::UnknownLabel),
            ]
        );

        Ok(())
    }

    #[test]
    fn parse_data_section() -> Result<()> {
        let data = r#"
                JMP start
            .data
            table:
                ! 7
                ! table
            0x210:
            limit: ! -1
            .code
            start: MOV R0, table
                MOV R1, limit
                HLT
        "#;

        let program = Parser::new(data)
            .with_data_base(Address(0x200))
            .parse()
            .unwrap();

        assert_eq!(program.data_base, Address(0x200));
        assert_eq!(program.data[..2], [7, 0x200]);
        assert_eq!(program.data.len(), 0x11);
        assert_eq!(program.data[0x10], -1);
        assert_eq!(program.code[1], Cell::Value(2));
        assert_eq!(program.code[3], Cell::Value(0x200));
        assert_eq!(program.code[5], Cell::Value(0x210));
        assert_eq!(program.code.len(), 7);

        Ok(())
    }

    #[test]
    fn parse_data_section_errors() -> Result<()> {
        let data = r#"
            .data
                HLT
            .text
            0x10:
        "#;

        let errors = assemble(data).unwrap_err();
        let kinds: Vec<_> = errors.iter().map(|err| (err.line_nr(), err.kind())).collect();

        assert_eq!(
            kinds,
            vec![
                (3, ParseErrorKind::InstructionInData),
                (4, ParseErrorKind::UnknownDirective),
                (5, ParseErrorKind::InvalidAddress { address: 0x10 }),
            ]
        );

        Ok(())
    }

    #[test]
    fn parse_data_into_memory() -> Result<()> {
        let data = "HLT\n.data\n! 40\n! 2";

        let mem = StdMem::from_str(data).unwrap();

        assert_eq!(mem.cells[DATA_BASE.idx()], Cell::Value(40));
        assert_eq!(mem.cells[DATA_BASE.idx() + 1], Cell::Value(2));

        Ok(())
    }

    #[test]
    fn parse_numbers() -> Result<()> {
        assert_eq!(parse_number("42"), Ok(42));
        assert_eq!(parse_number("-42"), Ok(-42));
        assert_eq!(parse_number("0xFFFFFFFF"), Ok(-1));
        assert_eq!(parse_number("0b12"), Err(2));
        assert_eq!(parse_number("99999999999"), Err(10));

        Ok(())
    }
}
