//! Packed 32-bit big-endian encoding of instructions and data.
//!
//! ```text
//!  31        22 21 20 19 17 16 14 13 11 10          0
//! +------------+-----+-----+-----+-----+-------------+
//! |   opcode   |  -  | t0  | t1  | t2  |      -      |
//! +------------+-----+-----+-----+-----+-------------+
//! ```
//!
//! An instruction word is followed by as many raw words as its opcode's
//! trailing count says. Data files are raw words only.

use crate::error::MachineError;
use crate::memory::Cell;

use super::{Instruction, Opcode, Register, OPCODE_BITS};

pub type Word = u32;

pub const WORD_BYTES: usize = 4;

const OPCODE_SHIFT: u32 = Word::BITS - OPCODE_BITS;
const TERM_BITS: u32 = 3;
const TERM_MASK: Word = (1 << TERM_BITS) - 1;
const FIRST_TERM_SHIFT: u32 = 17;

fn term_shift(index: usize) -> u32 {
    FIRST_TERM_SHIFT - TERM_BITS * index as u32
}

/// Packs an instruction into a single word
pub fn encode_instruction(instruction: &Instruction) -> Word {
    let mut word = Word::from(instruction.opcode().code()) << OPCODE_SHIFT;
    for (i, term) in instruction.terms().iter().enumerate() {
        word |= Word::from(u8::from(*term)) << term_shift(i);
    }
    word
}

/// Unpacks a single instruction word
pub fn decode_instruction(word: Word) -> Result<Instruction, MachineError> {
    let code = word >> OPCODE_SHIFT;
    let opcode = u16::try_from(code)
        .ok()
        .and_then(|code| Opcode::try_from(code).ok())
        .ok_or(MachineError::UnknownOpcode { word, opcode: code })?;

    let terms = (0..opcode.terms())
        .map(|i| {
            let field = ((word >> term_shift(i)) & TERM_MASK) as u8;
            Register::try_from(field).map_err(|_| MachineError::InvalidRegister { index: field })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Instruction::new(opcode, &terms)
}

fn words(bytes: &[u8]) -> Result<impl Iterator<Item = Word> + '_, MachineError> {
    if bytes.len() % WORD_BYTES != 0 {
        return Err(MachineError::MisalignedStream {
            length: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(WORD_BYTES)
        .map(|chunk| Word::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
}

/// Decodes a code image into memory cells. Each instruction word is followed
/// by exactly the number of value words the opcode table declares.
pub fn decode_word_stream(bytes: &[u8]) -> Result<Vec<Cell>, MachineError> {
    let words: Vec<Word> = words(bytes)?.collect();
    let mut cells = Vec::with_capacity(words.len());

    let mut offset = 0;
    while offset < words.len() {
        let instruction = decode_instruction(words[offset])?;
        let expected = instruction.opcode().trailing_words();
        let available = words.len() - offset - 1;
        if available < expected {
            return Err(MachineError::TruncatedStream {
                opcode: instruction.opcode(),
                offset,
                expected,
                found: available,
            });
        }

        cells.push(Cell::Instruction(instruction));
        cells.extend(
            words[offset + 1..offset + 1 + expected]
                .iter()
                .map(|word| Cell::Value(*word as i32)),
        );
        offset += 1 + expected;
    }

    Ok(cells)
}

/// Encodes memory cells into a code image. The inverse of [`decode_word_stream`].
pub fn encode_word_stream(cells: &[Cell]) -> Result<Vec<u8>, MachineError> {
    let mut bytes = Vec::with_capacity(cells.len() * WORD_BYTES);

    let mut offset = 0;
    while offset < cells.len() {
        let instruction = match cells[offset] {
            Cell::Instruction(instruction) => instruction,
            // a loose value can only appear as a trailing word
            Cell::Value(_) => {
                return Err(MachineError::NotAnInstruction {
                    address: offset.into(),
                })
            }
        };
        bytes.extend_from_slice(&encode_instruction(&instruction).to_be_bytes());

        let expected = instruction.opcode().trailing_words();
        for i in 0..expected {
            match cells.get(offset + 1 + i) {
                Some(Cell::Value(value)) => bytes.extend_from_slice(&value.to_be_bytes()),
                _ => {
                    return Err(MachineError::TruncatedStream {
                        opcode: instruction.opcode(),
                        offset,
                        expected,
                        found: i,
                    })
                }
            }
        }
        offset += 1 + expected;
    }

    Ok(bytes)
}

/// Encodes a data segment as plain big-endian words
pub fn encode_data(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_be_bytes()).collect()
}

/// Decodes a data segment of plain big-endian words
pub fn decode_data(bytes: &[u8]) -> Result<Vec<i32>, MachineError> {
    Ok(words(bytes)?.map(|word| word as i32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Register::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_bit_layout() -> Result<()> {
        let instruction = Instruction::new(Opcode::AddRegister, &[R1, R2, R7])?;
        let word = encode_instruction(&instruction);

        assert_eq!(word >> 22, u32::from(Opcode::AddRegister.code()));
        assert_eq!((word >> 17) & 0b111, 1);
        assert_eq!((word >> 14) & 0b111, 2);
        assert_eq!((word >> 11) & 0b111, 7);
        // bits 21..20 and 10..0 stay clear
        assert_eq!(word & 0x0030_07FF, 0);

        Ok(())
    }

    #[test]
    fn test_decode_instruction() -> Result<()> {
        let word = (u32::from(Opcode::MovRegister.code()) << 22) | (3 << 17) | (5 << 14);
        assert_eq!(
            decode_instruction(word)?,
            Instruction::new(Opcode::MovRegister, &[R3, R5])?
        );

        Ok(())
    }

    #[test]
    fn test_decode_every_register_field() -> Result<()> {
        let code = u32::from(Opcode::AddRegister.code()) << 22;
        for field in 0..8u32 {
            let word = code | (field << 17) | (field << 14) | (field << 11);
            let register = Register::try_from(field as u8)?;
            assert_eq!(
                decode_instruction(word)?.terms(),
                &[register, register, register]
            );
        }

        Ok(())
    }

    #[test]
    fn test_unknown_opcode() -> Result<()> {
        // 0 is the fetch routine, never an opcode
        assert_eq!(
            decode_instruction(0),
            Err(MachineError::UnknownOpcode { word: 0, opcode: 0 })
        );
        assert!(decode_instruction(0xFFFF_FFFF).is_err());

        Ok(())
    }

    #[test]
    fn test_word_stream() -> Result<()> {
        let cells = vec![
            Cell::Instruction(Instruction::new(Opcode::MovImmediate, &[R0])?),
            Cell::Value(-5),
            Cell::Instruction(Instruction::new(Opcode::AddMemoryToMemory, &[])?),
            Cell::Value(10),
            Cell::Value(11),
            Cell::Value(12),
            Cell::Instruction(Instruction::new(Opcode::Hlt, &[])?),
        ];

        let bytes = encode_word_stream(&cells)?;
        assert_eq!(bytes.len(), cells.len() * WORD_BYTES);
        assert_eq!(&bytes[4..8], &[0xFF, 0xFF, 0xFF, 0xFB]);
        assert_eq!(decode_word_stream(&bytes)?, cells);

        Ok(())
    }

    #[test]
    fn test_truncated_stream() -> Result<()> {
        let call = Instruction::new(Opcode::Call, &[])?;
        let bytes = encode_instruction(&call).to_be_bytes();

        assert_eq!(
            decode_word_stream(&bytes),
            Err(MachineError::TruncatedStream {
                opcode: Opcode::Call,
                offset: 0,
                expected: 1,
                found: 0
            })
        );
        assert_eq!(
            encode_word_stream(&[Cell::Instruction(call)]),
            Err(MachineError::TruncatedStream {
                opcode: Opcode::Call,
                offset: 0,
                expected: 1,
                found: 0
            })
        );

        Ok(())
    }

    #[test]
    fn test_misaligned_stream() -> Result<()> {
        assert_eq!(
            decode_word_stream(&[0, 0, 0]),
            Err(MachineError::MisalignedStream { length: 3 })
        );
        assert!(decode_data(&[1, 2, 3, 4, 5]).is_err());

        Ok(())
    }

    #[test]
    fn test_data() -> Result<()> {
        let values = [0, 1, -1, i32::MAX, i32::MIN];
        let bytes = encode_data(&values);
        assert_eq!(&bytes[8..12], &[0xFF; 4]);
        assert_eq!(decode_data(&bytes)?, values);

        Ok(())
    }
}
