//! The control store.
//!
//! Every machine instruction is realised by a contiguous routine of
//! micro-instructions. The routines are laid out back to back behind the
//! shared fetch routine at address 0, and the layout is computed at compile
//! time from the routine lengths (see [`crate::isa::Opcode`]).

use crate::alu::{AluOperation, Flag};
use crate::error::MachineError;
use crate::isa::{Opcode, ROUTINES};

/// Where the address register is latched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSource {
    ProgramCounter,
    Alu,
    StackPointer,
    DataRegister,
}

/// Where the data register is latched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    Alu,
    Memory,
}

/// Where the destination register is latched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterSource {
    Alu,
    DataRegister,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramCounterSource {
    /// `pc + 1`
    Next,
    /// the jump register if the selected flag allows it, `pc + 1` otherwise
    Condition,
}

/// Left ALU input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeftOperand {
    Register,
    Zero,
    PlusOne,
    MinusOne,
    ProgramCounter,
    DataRegister,
    /// the pending repeat count of the control unit
    Repeat,
}

/// Right ALU input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RightOperand {
    Register,
    Zero,
    DataRegister,
    PlusOne,
    MinusOne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackAdjust {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MicroProgramCounterSource {
    /// entry point of the decoded opcode
    Opcode,
    /// back to fetch
    Zero,
    /// back to the opcode's entry point while the repeat count is not zero
    Repeat,
}

/// One control-store entry: a signal and its selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MicroInstruction {
    LatchAddress(AddressSource),
    LatchData(DataSource),
    LatchRegister(RegisterSource),
    /// `mem[ar] <- dr`
    LatchMemory,
    LatchProgramCounter(ProgramCounterSource),
    /// `jump <- alu`
    LatchJump,
    /// flag consulted by the conditional program counter latch, `None` always jumps
    LatchFlag(Option<Flag>),
    LatchInverse(bool),
    LatchLeft(LeftOperand),
    LatchRight(RightOperand),
    Execute(AluOperation),
    AdjustStackPointer(StackAdjust),
    LatchMicroProgramCounter(MicroProgramCounterSource),
    /// decode the instruction in the data register
    LatchInstruction,
    DecrementRepeat,
    Halt,
}

use AddressSource as Ar;
use DataSource as Dr;
use LeftOperand as L;
use MicroInstruction::*;
use MicroProgramCounterSource as Mpc;
use ProgramCounterSource as Pc;
use RegisterSource as Reg;
use RightOperand as R;

pub const FETCH: &[MicroInstruction] = &[
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchInstruction,
    LatchMicroProgramCounter(Mpc::Opcode),
];

pub const MOV_REGISTER: &[MicroInstruction] = &[
    LatchRegister(Reg::Left),
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const MOV_INDIRECT_REGISTER: &[MicroInstruction] = &[
    LatchLeft(L::Register),
    LatchRight(R::Zero),
    Execute(AluOperation::Add),
    LatchAddress(Ar::Alu),
    LatchData(Dr::Memory),
    LatchRegister(Reg::DataRegister),
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const MOV_IMMEDIATE: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchRegister(Reg::DataRegister),
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const MOV_DIRECT: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchData(Dr::Memory),
    LatchRegister(Reg::DataRegister),
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const MOV_INDIRECT: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchData(Dr::Memory),
    LatchRegister(Reg::DataRegister),
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

/// The copied value is parked in the ALU result while the target address is fetched.
pub const MOV_MEMORY: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchData(Dr::Memory),
    LatchLeft(L::Zero),
    LatchRight(R::DataRegister),
    Execute(AluOperation::Add),
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const INC_REGISTER: &[MicroInstruction] = &[
    LatchLeft(L::Register),
    LatchRight(R::PlusOne),
    Execute(AluOperation::Add),
    LatchRegister(Reg::Alu),
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const DEC_REGISTER: &[MicroInstruction] = &[
    LatchLeft(L::Register),
    LatchRight(R::MinusOne),
    Execute(AluOperation::Add),
    LatchRegister(Reg::Alu),
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const INC_MEMORY: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchData(Dr::Memory),
    LatchLeft(L::PlusOne),
    LatchRight(R::DataRegister),
    Execute(AluOperation::Add),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const DEC_MEMORY: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchData(Dr::Memory),
    LatchLeft(L::MinusOne),
    LatchRight(R::DataRegister),
    Execute(AluOperation::Add),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

/// `mem[left] <- right`
pub const STORE_REGISTER: &[MicroInstruction] = &[
    LatchLeft(L::Register),
    LatchRight(R::Zero),
    Execute(AluOperation::Add),
    LatchAddress(Ar::Alu),
    LatchLeft(L::Zero),
    LatchRight(R::Register),
    Execute(AluOperation::Add),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

/// `mem[mem[left]] <- right`
pub const STORE_INDIRECT_REGISTER: &[MicroInstruction] = &[
    LatchLeft(L::Register),
    LatchRight(R::Zero),
    Execute(AluOperation::Add),
    LatchAddress(Ar::Alu),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchLeft(L::Zero),
    LatchRight(R::Register),
    Execute(AluOperation::Add),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const STORE_DIRECT: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchLeft(L::Zero),
    LatchRight(R::Register),
    Execute(AluOperation::Add),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const STORE_INDIRECT: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchData(Dr::Memory),
    LatchAddress(Ar::DataRegister),
    LatchLeft(L::Zero),
    LatchRight(R::Register),
    Execute(AluOperation::Add),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

/// Accumulate routines loop on their own entry point. Each pass decrements the
/// repeat count `n` first and then folds `mem[base + n]` into the destination.
/// The base address is re-read every pass, so the program counter only moves
/// once the loop is done.
macro_rules! accumulate_routines {
    ( $( $name:ident => $op:ident ; )+ ) => { $(
        pub const $name: &[MicroInstruction] = &[
            DecrementRepeat,
            LatchLeft(L::ProgramCounter),
            LatchRight(R::PlusOne),
            Execute(AluOperation::Add),
            LatchAddress(Ar::Alu),
            LatchData(Dr::Memory),
            LatchLeft(L::Repeat),
            LatchRight(R::DataRegister),
            Execute(AluOperation::Add),
            LatchAddress(Ar::Alu),
            LatchData(Dr::Memory),
            LatchLeft(L::Register),
            LatchRight(R::DataRegister),
            Execute(AluOperation::$op),
            LatchRegister(Reg::Alu),
            LatchMicroProgramCounter(Mpc::Repeat),
            LatchProgramCounter(Pc::Next),
            LatchProgramCounter(Pc::Next),
            LatchMicroProgramCounter(Mpc::Zero),
        ];
    )+ };
}

accumulate_routines! {
    NADD => Add;
    NSUB => Sub;
    NMUL => Mul;
    NAND => And;
    NOR => Or;
}

pub const JMP_REGISTER: &[MicroInstruction] = &[
    LatchLeft(L::Register),
    LatchRight(R::Zero),
    Execute(AluOperation::Add),
    LatchJump,
    LatchFlag(None),
    LatchProgramCounter(Pc::Condition),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const JMP_IMMEDIATE: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchLeft(L::Zero),
    LatchRight(R::DataRegister),
    Execute(AluOperation::Add),
    LatchJump,
    LatchFlag(None),
    LatchProgramCounter(Pc::Condition),
    LatchMicroProgramCounter(Mpc::Zero),
];

/// Branches load the target into the jump register, then run the tested
/// register through the ALU so the flags describe it.
macro_rules! branch_routines {
    ( $( $name:ident => $left:ident $op:ident $right:ident, $flag:ident, $inverse:literal ; )+ ) => { $(
        pub const $name: &[MicroInstruction] = &[
            LatchProgramCounter(Pc::Next),
            LatchAddress(Ar::ProgramCounter),
            LatchData(Dr::Memory),
            LatchLeft(L::Zero),
            LatchRight(R::DataRegister),
            Execute(AluOperation::Add),
            LatchJump,
            LatchLeft(L::$left),
            LatchRight(R::$right),
            Execute(AluOperation::$op),
            LatchFlag(Some(Flag::$flag)),
            LatchInverse($inverse),
            LatchProgramCounter(Pc::Condition),
            LatchMicroProgramCounter(Mpc::Zero),
        ];
    )+ };
}

branch_routines! {
    BEQZ => Register Add Zero, Zero, false;
    BNEZ => Register Add Zero, Zero, true;
    // 0 - r is negative exactly when r is positive
    BGZ => Zero Sub Register, Negative, false;
    BLZ => Register Add Zero, Negative, false;
}

/// Pushes `pc + 2`, the word behind the call's target operand.
pub const CALL: &[MicroInstruction] = &[
    LatchProgramCounter(Pc::Next),
    LatchAddress(Ar::ProgramCounter),
    LatchData(Dr::Memory),
    LatchLeft(L::Zero),
    LatchRight(R::DataRegister),
    Execute(AluOperation::Add),
    LatchJump,
    AdjustStackPointer(StackAdjust::Decrement),
    LatchAddress(Ar::StackPointer),
    LatchLeft(L::ProgramCounter),
    LatchRight(R::PlusOne),
    Execute(AluOperation::Add),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchFlag(None),
    LatchProgramCounter(Pc::Condition),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const RET: &[MicroInstruction] = &[
    LatchAddress(Ar::StackPointer),
    LatchData(Dr::Memory),
    LatchLeft(L::Zero),
    LatchRight(R::DataRegister),
    Execute(AluOperation::Add),
    LatchJump,
    LatchFlag(None),
    LatchProgramCounter(Pc::Condition),
    AdjustStackPointer(StackAdjust::Increment),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const PUSH: &[MicroInstruction] = &[
    AdjustStackPointer(StackAdjust::Decrement),
    LatchAddress(Ar::StackPointer),
    LatchLeft(L::Register),
    LatchRight(R::Zero),
    Execute(AluOperation::Add),
    LatchData(Dr::Alu),
    LatchMemory,
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

pub const POP: &[MicroInstruction] = &[
    LatchAddress(Ar::StackPointer),
    LatchData(Dr::Memory),
    LatchRegister(Reg::DataRegister),
    AdjustStackPointer(StackAdjust::Increment),
    LatchProgramCounter(Pc::Next),
    LatchMicroProgramCounter(Mpc::Zero),
];

/// The program counter stays on the halt, resuming halts again.
pub const HLT: &[MicroInstruction] = &[Halt, LatchMicroProgramCounter(Mpc::Zero)];

/// The five addressing shapes of a binary ALU operation
macro_rules! alu_routines {
    ( $( $op:ident => $register:ident, $memory:ident, $memory_to_memory:ident, $mixed_left:ident, $mixed_right:ident ; )+ ) => { $(
        /// `dst <- left op right`
        pub const $register: &[MicroInstruction] = &[
            LatchLeft(L::Register),
            LatchRight(R::Register),
            Execute(AluOperation::$op),
            LatchRegister(Reg::Alu),
            LatchProgramCounter(Pc::Next),
            LatchMicroProgramCounter(Mpc::Zero),
        ];

        /// `dst <- mem[a] op mem[b]`
        pub const $memory: &[MicroInstruction] = &[
            LatchProgramCounter(Pc::Next),
            LatchAddress(Ar::ProgramCounter),
            LatchData(Dr::Memory),
            LatchAddress(Ar::DataRegister),
            LatchData(Dr::Memory),
            LatchLeft(L::DataRegister),
            LatchProgramCounter(Pc::Next),
            LatchAddress(Ar::ProgramCounter),
            LatchData(Dr::Memory),
            LatchAddress(Ar::DataRegister),
            LatchData(Dr::Memory),
            LatchRight(R::DataRegister),
            Execute(AluOperation::$op),
            LatchRegister(Reg::Alu),
            LatchProgramCounter(Pc::Next),
            LatchMicroProgramCounter(Mpc::Zero),
        ];

        /// `mem[c] <- mem[a] op mem[b]`
        pub const $memory_to_memory: &[MicroInstruction] = &[
            LatchProgramCounter(Pc::Next),
            LatchAddress(Ar::ProgramCounter),
            LatchData(Dr::Memory),
            LatchAddress(Ar::DataRegister),
            LatchData(Dr::Memory),
            LatchLeft(L::DataRegister),
            LatchProgramCounter(Pc::Next),
            LatchAddress(Ar::ProgramCounter),
            LatchData(Dr::Memory),
            LatchAddress(Ar::DataRegister),
            LatchData(Dr::Memory),
            LatchRight(R::DataRegister),
            Execute(AluOperation::$op),
            LatchProgramCounter(Pc::Next),
            LatchAddress(Ar::ProgramCounter),
            LatchData(Dr::Memory),
            LatchAddress(Ar::DataRegister),
            LatchData(Dr::Alu),
            LatchMemory,
            LatchProgramCounter(Pc::Next),
            LatchMicroProgramCounter(Mpc::Zero),
        ];

        /// `dst <- left op mem[a]`
        pub const $mixed_left: &[MicroInstruction] = &[
            LatchLeft(L::Register),
            LatchProgramCounter(Pc::Next),
            LatchAddress(Ar::ProgramCounter),
            LatchData(Dr::Memory),
            LatchAddress(Ar::DataRegister),
            LatchData(Dr::Memory),
            LatchRight(R::DataRegister),
            Execute(AluOperation::$op),
            LatchRegister(Reg::Alu),
            LatchProgramCounter(Pc::Next),
            LatchMicroProgramCounter(Mpc::Zero),
        ];

        /// `dst <- mem[a] op right`
        pub const $mixed_right: &[MicroInstruction] = &[
            LatchRight(R::Register),
            LatchProgramCounter(Pc::Next),
            LatchAddress(Ar::ProgramCounter),
            LatchData(Dr::Memory),
            LatchAddress(Ar::DataRegister),
            LatchData(Dr::Memory),
            LatchLeft(L::DataRegister),
            Execute(AluOperation::$op),
            LatchRegister(Reg::Alu),
            LatchProgramCounter(Pc::Next),
            LatchMicroProgramCounter(Mpc::Zero),
        ];
    )+ };
}

alu_routines! {
    Add => ADD_REGISTER, ADD_MEMORY, ADD_MEMORY_TO_MEMORY, ADD_MIXED_LEFT, ADD_MIXED_RIGHT;
    Sub => SUB_REGISTER, SUB_MEMORY, SUB_MEMORY_TO_MEMORY, SUB_MIXED_LEFT, SUB_MIXED_RIGHT;
    Mul => MUL_REGISTER, MUL_MEMORY, MUL_MEMORY_TO_MEMORY, MUL_MIXED_LEFT, MUL_MIXED_RIGHT;
    Div => DIV_REGISTER, DIV_MEMORY, DIV_MEMORY_TO_MEMORY, DIV_MIXED_LEFT, DIV_MIXED_RIGHT;
    Rem => REM_REGISTER, REM_MEMORY, REM_MEMORY_TO_MEMORY, REM_MIXED_LEFT, REM_MIXED_RIGHT;
    And => AND_REGISTER, AND_MEMORY, AND_MEMORY_TO_MEMORY, AND_MIXED_LEFT, AND_MIXED_RIGHT;
    Or => OR_REGISTER, OR_MEMORY, OR_MEMORY_TO_MEMORY, OR_MIXED_LEFT, OR_MIXED_RIGHT;
    Xor => XOR_REGISTER, XOR_MEMORY, XOR_MEMORY_TO_MEMORY, XOR_MIXED_LEFT, XOR_MIXED_RIGHT;
}

/// Start address of the routine at `slot`: the summed length of everything before it.
pub const fn entry_point(routines: &[&[MicroInstruction]], slot: usize) -> u16 {
    let mut address = 0;
    let mut i = 0;
    while i < slot {
        address += routines[i].len();
        i += 1;
    }
    address as u16
}

const fn total_length(routines: &[&[MicroInstruction]]) -> usize {
    let mut length = 0;
    let mut i = 0;
    while i < routines.len() {
        length += routines[i].len();
        i += 1;
    }
    length
}

pub const MICROPROGRAM_LEN: usize = total_length(ROUTINES);

// every entry point must be expressible in the opcode field
const _: () = assert!(MICROPROGRAM_LEN <= 1 << crate::isa::OPCODE_BITS);

const fn flatten() -> [MicroInstruction; MICROPROGRAM_LEN] {
    let mut table = [Halt; MICROPROGRAM_LEN];
    let mut address = 0;
    let mut r = 0;
    while r < ROUTINES.len() {
        let routine = ROUTINES[r];
        let mut i = 0;
        while i < routine.len() {
            table[address] = routine[i];
            address += 1;
            i += 1;
        }
        r += 1;
    }
    table
}

/// The whole control store, fetch routine first
pub static MICROPROGRAM: [MicroInstruction; MICROPROGRAM_LEN] = flatten();

/// Checks that every opcode value addresses its own routine and that the
/// routine hands control back to fetch. Run once before executing anything.
pub fn self_check() -> Result<(), MachineError> {
    if MICROPROGRAM.get(..FETCH.len()) != Some(FETCH) {
        return Err(MachineError::MicroprogramLayout {
            address: 0,
            reason: "fetch routine is not at address 0",
        });
    }

    for opcode in Opcode::ALL {
        let start = opcode.code() as usize;
        let routine = opcode.routine();

        if MICROPROGRAM.get(start..start + routine.len()) != Some(routine) {
            return Err(MachineError::MicroprogramLayout {
                address: start,
                reason: "opcode value is not the routine's entry address",
            });
        }

        if routine.last() != Some(&LatchMicroProgramCounter(Mpc::Zero)) {
            return Err(MachineError::MicroprogramLayout {
                address: start,
                reason: "routine does not return to fetch",
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_self_check() -> Result<()> {
        self_check()?;

        Ok(())
    }

    #[test]
    fn test_layout_is_contiguous() -> Result<()> {
        let covered = FETCH.len()
            + Opcode::ALL
                .iter()
                .map(|opcode| opcode.routine().len())
                .sum::<usize>();
        assert_eq!(covered, MICROPROGRAM_LEN);

        let last = Opcode::ALL[Opcode::ALL.len() - 1];
        assert_eq!(last.code() as usize + last.routine().len(), MICROPROGRAM_LEN);

        Ok(())
    }

    #[test]
    fn test_routines_leave_fetch_only_at_the_end() -> Result<()> {
        for opcode in Opcode::ALL {
            let returns = opcode
                .routine()
                .iter()
                .filter(|micro| **micro == LatchMicroProgramCounter(Mpc::Zero))
                .count();
            assert_eq!(returns, 1, "{}", opcode);
        }

        Ok(())
    }

    #[test]
    fn test_only_accumulators_repeat() -> Result<()> {
        for opcode in Opcode::ALL {
            let repeats = opcode
                .routine()
                .contains(&LatchMicroProgramCounter(Mpc::Repeat));
            assert_eq!(
                repeats,
                opcode.selection() == crate::isa::Selection::Repeat,
                "{}",
                opcode
            );
        }

        Ok(())
    }

    #[test]
    fn test_entry_point() -> Result<()> {
        let routines: &[&[MicroInstruction]] = &[FETCH, HLT, RET];
        assert_eq!(entry_point(routines, 0), 0);
        assert_eq!(entry_point(routines, 1), 4);
        assert_eq!(entry_point(routines, 2), 6);

        Ok(())
    }
}
