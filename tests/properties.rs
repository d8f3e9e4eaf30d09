use proptest::prelude::*;

use microcpu::alu::{Alu, AluOperation};
use microcpu::isa::{codec, Instruction, Opcode, Register};
use microcpu::memory::Cell;
use microcpu::MachineError;

fn opcode() -> impl Strategy<Value = Opcode> {
    prop::sample::select(Opcode::ALL.to_vec())
}

fn register() -> impl Strategy<Value = Register> {
    prop::sample::select(Register::ALL.to_vec())
}

fn operation() -> impl Strategy<Value = AluOperation> {
    prop::sample::select(vec![
        AluOperation::Add,
        AluOperation::Sub,
        AluOperation::And,
        AluOperation::Or,
        AluOperation::Xor,
        AluOperation::Mul,
        AluOperation::Div,
        AluOperation::Rem,
    ])
}

fn reference(operation: AluOperation, left: i64, right: i64) -> i64 {
    match operation {
        AluOperation::Add => left + right,
        AluOperation::Sub => left - right,
        AluOperation::And => left & right,
        AluOperation::Or => left | right,
        AluOperation::Xor => left ^ right,
        AluOperation::Mul => left * right,
        AluOperation::Div => left / right,
        AluOperation::Rem => left % right,
    }
}

proptest! {
    #[test]
    fn instruction_words_survive_the_codec(
        opcode in opcode(),
        terms in prop::array::uniform3(register()),
        trailing in prop::collection::vec(any::<i32>(), 3),
    ) {
        let instruction = Instruction::new(opcode, &terms[..opcode.terms()])
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let mut cells = vec![Cell::Instruction(instruction)];
        cells.extend(trailing[..opcode.trailing_words()].iter().copied().map(Cell::Value));

        let bytes = codec::encode_word_stream(&cells)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(bytes.len(), cells.len() * codec::WORD_BYTES);
        prop_assert_eq!(codec::decode_word_stream(&bytes), Ok(cells));
    }

    #[test]
    fn any_word_decodes_or_is_rejected(word in any::<u32>()) {
        match codec::decode_instruction(word) {
            Ok(instruction) => {
                prop_assert_eq!(instruction.opcode().code() as u32, word >> 22);
            }
            Err(error) => {
                let is_unknown = matches!(error, MachineError::UnknownOpcode { .. });
                prop_assert!(is_unknown);
            }
        }
    }

    #[test]
    fn data_words_survive_the_codec(values in prop::collection::vec(any::<i32>(), 0..64)) {
        prop_assert_eq!(codec::decode_data(&codec::encode_data(&values)), Ok(values));
    }

    #[test]
    fn alu_flags_describe_the_wide_result(
        operation in operation(),
        left in any::<i32>(),
        right in any::<i32>(),
    ) {
        let mut alu = Alu::default();
        alu.latch_left(left);
        alu.latch_right(right);

        let divides = matches!(operation, AluOperation::Div | AluOperation::Rem);
        if divides && right == 0 {
            prop_assert_eq!(alu.perform(operation), Err(MachineError::DivisionByZero));
            return Ok(());
        }
        prop_assert_eq!(alu.perform(operation), Ok(()));

        let wide = reference(operation, i64::from(left), i64::from(right));
        prop_assert_eq!(alu.result, wide as i32);
        prop_assert_eq!(alu.flags.zero, alu.result == 0);
        prop_assert_eq!(alu.flags.negative, alu.result < 0);
        prop_assert_eq!(alu.flags.carry, wide > i64::from(i32::MAX));
        prop_assert_eq!(alu.flags.overflow, wide < i64::from(i32::MIN) || wide > i64::from(i32::MAX));
    }
}
