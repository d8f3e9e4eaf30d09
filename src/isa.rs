//! Instruction set: registers, opcodes and decoded instructions.
//!
//! An opcode's numeric value is the address of its routine inside the
//! microprogram. The values are not written by hand: `opcodes!` lists every
//! routine in control-store order and each discriminant is the cumulative
//! length of all routines before it.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::MachineError;
use crate::microcode::{self, MicroInstruction};

pub mod codec;

/// Number of bits holding the opcode in an encoded word
pub const OPCODE_BITS: u32 = 10;
/// Upper bound on inline register terms of any instruction
pub const MAX_TERMS: usize = 3;

/// General purpose registers, addressable from a 3-bit field
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(TryFromPrimitive, IntoPrimitive)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
}

impl Register {
    pub const ALL: &'static [Self] = &[
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
    ];

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.index())
    }
}

/// Inline operand of an instruction. Always a register; immediates and
/// addresses travel as trailing words.
pub type Term = Register;

/// How the decode step wires an instruction's terms onto the register
/// selection slots of the datapath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    /// No register involved
    Nothing,
    /// term 0 is the destination
    Destination,
    /// term 0 is both destination and left operand
    Accumulator,
    /// term 0 is the destination, term 1 the left operand
    DestinationLeft,
    /// term 0 is the destination, term 1 the right operand
    DestinationRight,
    /// terms are destination, left and right
    DestinationLeftRight,
    /// term 0 is the left operand
    Left,
    /// term 0 is the right operand
    Right,
    /// term 0 is the right operand (value), term 1 the left one (address)
    RightLeft,
    /// term 0 holds the repeat count, term 1 is destination and left operand
    Repeat,
}

macro_rules! opcodes {
    ( $(
        $( #[doc = $doc:expr] )+
        $name:ident = $routine:ident, terms: $terms:literal, words: $words:literal, $selection:ident;
    )+ ) => {
        /// Position of each routine in the control store, fetch first
        #[repr(usize)]
        #[allow(dead_code)]
        enum Slot {
            Fetch,
            $( $name, )+
        }

        /// Every routine in control-store order
        pub(crate) const ROUTINES: &[&[MicroInstruction]] = &[
            microcode::FETCH,
            $( microcode::$routine, )+
        ];

        /// Instruction kinds. The discriminant is the entry address of the
        /// kind's microprogram routine.
        #[repr(u16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Opcode {
            $(
                $( #[doc = $doc] )+
                $name = microcode::entry_point(ROUTINES, Slot::$name as usize),
            )+
        }

        impl Opcode {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }

            /// Number of inline register terms
            pub fn terms(&self) -> usize {
                match self {
                    $( Self::$name => $terms , )+
                }
            }

            /// Number of raw words following the instruction in memory
            pub fn trailing_words(&self) -> usize {
                match self {
                    $( Self::$name => $words , )+
                }
            }

            pub fn selection(&self) -> Selection {
                match self {
                    $( Self::$name => Selection::$selection , )+
                }
            }

            /// The microprogram routine this opcode dispatches to
            pub fn routine(&self) -> &'static [MicroInstruction] {
                match self {
                    $( Self::$name => microcode::$routine , )+
                }
            }
        }
    }
}

opcodes! {
    /// `dst <- src`
    MovRegister = MOV_REGISTER, terms: 2, words: 0, DestinationLeft;
    /// `dst <- mem[src]`
    MovIndirectRegister = MOV_INDIRECT_REGISTER, terms: 2, words: 0, DestinationLeft;
    /// `dst <- imm`
    MovImmediate = MOV_IMMEDIATE, terms: 1, words: 1, Destination;
    /// `dst <- mem[addr]`
    MovDirect = MOV_DIRECT, terms: 1, words: 1, Destination;
    /// `dst <- mem[mem[addr]]`
    MovIndirect = MOV_INDIRECT, terms: 1, words: 1, Destination;
    /// `mem[to] <- mem[from]`, trailing words are `from, to`
    MovMemory = MOV_MEMORY, terms: 0, words: 2, Nothing;
    /// `reg <- reg + 1`
    IncRegister = INC_REGISTER, terms: 1, words: 0, Accumulator;
    /// `mem[addr] <- mem[addr] + 1`
    IncMemory = INC_MEMORY, terms: 0, words: 1, Nothing;
    /// `reg <- reg - 1`
    DecRegister = DEC_REGISTER, terms: 1, words: 0, Accumulator;
    /// `mem[addr] <- mem[addr] - 1`
    DecMemory = DEC_MEMORY, terms: 0, words: 1, Nothing;
    /// `mem[target] <- src`
    StoreRegister = STORE_REGISTER, terms: 2, words: 0, RightLeft;
    /// `mem[mem[target]] <- src`
    StoreIndirectRegister = STORE_INDIRECT_REGISTER, terms: 2, words: 0, RightLeft;
    /// `mem[addr] <- src`
    StoreDirect = STORE_DIRECT, terms: 1, words: 1, Right;
    /// `mem[mem[addr]] <- src`
    StoreIndirect = STORE_INDIRECT, terms: 1, words: 1, Right;
    /// `dst <- dst + mem[base + i]` for every `i` below the count register
    Nadd = NADD, terms: 2, words: 1, Repeat;
    /// `dst <- dst - mem[base + i]` for every `i` below the count register
    Nsub = NSUB, terms: 2, words: 1, Repeat;
    /// `dst <- dst * mem[base + i]` for every `i` below the count register
    Nmul = NMUL, terms: 2, words: 1, Repeat;
    /// `dst <- dst & mem[base + i]` for every `i` below the count register
    Nand = NAND, terms: 2, words: 1, Repeat;
    /// `dst <- dst | mem[base + i]` for every `i` below the count register
    Nor = NOR, terms: 2, words: 1, Repeat;
    /// Jump to the address held in a register
    JmpRegister = JMP_REGISTER, terms: 1, words: 0, Left;
    /// Jump to a literal address
    JmpImmediate = JMP_IMMEDIATE, terms: 0, words: 1, Nothing;
    /// Branch if the register is zero
    Beqz = BEQZ, terms: 1, words: 1, Left;
    /// Branch if the register is not zero
    Bnez = BNEZ, terms: 1, words: 1, Left;
    /// Branch if the register is strictly positive
    Bgz = BGZ, terms: 1, words: 1, Right;
    /// Branch if the register is negative
    Blz = BLZ, terms: 1, words: 1, Left;
    /// Push the return address and jump
    Call = CALL, terms: 0, words: 1, Nothing;
    /// Pop the return address and jump to it
    Ret = RET, terms: 0, words: 0, Nothing;
    /// Push a register onto the stack
    Push = PUSH, terms: 1, words: 0, Left;
    /// Pop the top of the stack into a register
    Pop = POP, terms: 1, words: 0, Destination;
    /// Stop the machine
    Hlt = HLT, terms: 0, words: 0, Nothing;

    /// `dst <- left + right`
    AddRegister = ADD_REGISTER, terms: 3, words: 0, DestinationLeftRight;
    /// `dst <- mem[a] + mem[b]`
    AddMemory = ADD_MEMORY, terms: 1, words: 2, Destination;
    /// `mem[c] <- mem[a] + mem[b]`
    AddMemoryToMemory = ADD_MEMORY_TO_MEMORY, terms: 0, words: 3, Nothing;
    /// `dst <- left + mem[a]`
    AddMixedLeft = ADD_MIXED_LEFT, terms: 2, words: 1, DestinationLeft;
    /// `dst <- mem[a] + right`
    AddMixedRight = ADD_MIXED_RIGHT, terms: 2, words: 1, DestinationRight;

    /// `dst <- left - right`
    SubRegister = SUB_REGISTER, terms: 3, words: 0, DestinationLeftRight;
    /// `dst <- mem[a] - mem[b]`
    SubMemory = SUB_MEMORY, terms: 1, words: 2, Destination;
    /// `mem[c] <- mem[a] - mem[b]`
    SubMemoryToMemory = SUB_MEMORY_TO_MEMORY, terms: 0, words: 3, Nothing;
    /// `dst <- left - mem[a]`
    SubMixedLeft = SUB_MIXED_LEFT, terms: 2, words: 1, DestinationLeft;
    /// `dst <- mem[a] - right`
    SubMixedRight = SUB_MIXED_RIGHT, terms: 2, words: 1, DestinationRight;

    /// `dst <- left * right`
    MulRegister = MUL_REGISTER, terms: 3, words: 0, DestinationLeftRight;
    /// `dst <- mem[a] * mem[b]`
    MulMemory = MUL_MEMORY, terms: 1, words: 2, Destination;
    /// `mem[c] <- mem[a] * mem[b]`
    MulMemoryToMemory = MUL_MEMORY_TO_MEMORY, terms: 0, words: 3, Nothing;
    /// `dst <- left * mem[a]`
    MulMixedLeft = MUL_MIXED_LEFT, terms: 2, words: 1, DestinationLeft;
    /// `dst <- mem[a] * right`
    MulMixedRight = MUL_MIXED_RIGHT, terms: 2, words: 1, DestinationRight;

    /// `dst <- left / right`
    DivRegister = DIV_REGISTER, terms: 3, words: 0, DestinationLeftRight;
    /// `dst <- mem[a] / mem[b]`
    DivMemory = DIV_MEMORY, terms: 1, words: 2, Destination;
    /// `mem[c] <- mem[a] / mem[b]`
    DivMemoryToMemory = DIV_MEMORY_TO_MEMORY, terms: 0, words: 3, Nothing;
    /// `dst <- left / mem[a]`
    DivMixedLeft = DIV_MIXED_LEFT, terms: 2, words: 1, DestinationLeft;
    /// `dst <- mem[a] / right`
    DivMixedRight = DIV_MIXED_RIGHT, terms: 2, words: 1, DestinationRight;

    /// `dst <- left % right`
    RemRegister = REM_REGISTER, terms: 3, words: 0, DestinationLeftRight;
    /// `dst <- mem[a] % mem[b]`
    RemMemory = REM_MEMORY, terms: 1, words: 2, Destination;
    /// `mem[c] <- mem[a] % mem[b]`
    RemMemoryToMemory = REM_MEMORY_TO_MEMORY, terms: 0, words: 3, Nothing;
    /// `dst <- left % mem[a]`
    RemMixedLeft = REM_MIXED_LEFT, terms: 2, words: 1, DestinationLeft;
    /// `dst <- mem[a] % right`
    RemMixedRight = REM_MIXED_RIGHT, terms: 2, words: 1, DestinationRight;

    /// `dst <- left & right`
    AndRegister = AND_REGISTER, terms: 3, words: 0, DestinationLeftRight;
    /// `dst <- mem[a] & mem[b]`
    AndMemory = AND_MEMORY, terms: 1, words: 2, Destination;
    /// `mem[c] <- mem[a] & mem[b]`
    AndMemoryToMemory = AND_MEMORY_TO_MEMORY, terms: 0, words: 3, Nothing;
    /// `dst <- left & mem[a]`
    AndMixedLeft = AND_MIXED_LEFT, terms: 2, words: 1, DestinationLeft;
    /// `dst <- mem[a] & right`
    AndMixedRight = AND_MIXED_RIGHT, terms: 2, words: 1, DestinationRight;

    /// `dst <- left | right`
    OrRegister = OR_REGISTER, terms: 3, words: 0, DestinationLeftRight;
    /// `dst <- mem[a] | mem[b]`
    OrMemory = OR_MEMORY, terms: 1, words: 2, Destination;
    /// `mem[c] <- mem[a] | mem[b]`
    OrMemoryToMemory = OR_MEMORY_TO_MEMORY, terms: 0, words: 3, Nothing;
    /// `dst <- left | mem[a]`
    OrMixedLeft = OR_MIXED_LEFT, terms: 2, words: 1, DestinationLeft;
    /// `dst <- mem[a] | right`
    OrMixedRight = OR_MIXED_RIGHT, terms: 2, words: 1, DestinationRight;

    /// `dst <- left ^ right`
    XorRegister = XOR_REGISTER, terms: 3, words: 0, DestinationLeftRight;
    /// `dst <- mem[a] ^ mem[b]`
    XorMemory = XOR_MEMORY, terms: 1, words: 2, Destination;
    /// `mem[c] <- mem[a] ^ mem[b]`
    XorMemoryToMemory = XOR_MEMORY_TO_MEMORY, terms: 0, words: 3, Nothing;
    /// `dst <- left ^ mem[a]`
    XorMixedLeft = XOR_MIXED_LEFT, terms: 2, words: 1, DestinationLeft;
    /// `dst <- mem[a] ^ right`
    XorMixedRight = XOR_MIXED_RIGHT, terms: 2, words: 1, DestinationRight;
}

impl Opcode {
    /// Numeric value, which is also the routine's micro-address
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl From<Opcode> for u16 {
    fn from(opcode: Opcode) -> Self {
        opcode.code()
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Opcode::ALL
            .iter()
            .find(|opcode| opcode.code() == code)
            .copied()
            .ok_or(code)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded instruction. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    opcode: Opcode,
    terms: [Term; MAX_TERMS],
}

impl Instruction {
    /// Builds an instruction, checking the term count against the opcode table.
    pub fn new(opcode: Opcode, terms: &[Term]) -> Result<Self, MachineError> {
        if terms.len() != opcode.terms() {
            return Err(MachineError::TermCount {
                opcode,
                expected: opcode.terms(),
                found: terms.len(),
            });
        }

        // unused slots stay R0 so equality only depends on the real terms
        let mut slots = [Register::R0; MAX_TERMS];
        slots[..terms.len()].copy_from_slice(terms);

        Ok(Self {
            opcode,
            terms: slots,
        })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms[..self.opcode.terms()]
    }

    pub fn term(&self, index: usize) -> Result<Term, MachineError> {
        self.terms()
            .get(index)
            .copied()
            .ok_or(MachineError::TermCount {
                opcode: self.opcode,
                expected: index + 1,
                found: self.opcode.terms(),
            })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.name())?;
        for (i, term) in self.terms().iter().enumerate() {
            if i == 0 {
                write!(f, " {}", term)?;
            } else {
                write!(f, ", {}", term)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_opcodes_fit_in_field() -> Result<()> {
        for opcode in Opcode::ALL {
            assert!(u32::from(opcode.code()) < 1 << OPCODE_BITS, "{}", opcode);
        }

        Ok(())
    }

    #[test]
    fn test_opcodes_are_entry_points() -> Result<()> {
        // first routine starts right behind the fetch routine
        assert_eq!(
            Opcode::MovRegister.code() as usize,
            microcode::FETCH.len()
        );

        for pair in Opcode::ALL.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            assert_eq!(
                current.code() as usize + current.routine().len(),
                next.code() as usize,
                "{} is not followed by {}",
                current,
                next
            );
        }

        Ok(())
    }

    #[test]
    fn test_opcode_from_code() -> Result<()> {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::try_from(opcode.code()), Ok(*opcode));
        }
        assert_eq!(Opcode::try_from(1u16), Err(1));

        Ok(())
    }

    #[test]
    fn test_instruction_term_count() -> Result<()> {
        let mov = Instruction::new(Opcode::MovRegister, &[Register::R1, Register::R2])?;
        assert_eq!(mov.terms(), &[Register::R1, Register::R2]);
        assert_eq!(mov.term(1)?, Register::R2);
        assert!(mov.term(2).is_err());

        assert_eq!(
            Instruction::new(Opcode::Hlt, &[Register::R0]),
            Err(MachineError::TermCount {
                opcode: Opcode::Hlt,
                expected: 0,
                found: 1
            })
        );

        Ok(())
    }

    #[test]
    fn test_display() -> Result<()> {
        let add = Instruction::new(
            Opcode::AddRegister,
            &[Register::R0, Register::R1, Register::R7],
        )?;
        assert_eq!(add.to_string(), "AddRegister R0, R1, R7");
        assert_eq!(Instruction::new(Opcode::Ret, &[])?.to_string(), "Ret");

        Ok(())
    }
}
