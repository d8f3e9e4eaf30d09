use log::*;

use crate::datapath::{DataPath, Read};
use crate::error::MachineError;
use crate::isa::{Instruction, Selection};
use crate::memory::Cell;
use crate::microcode::{MicroInstruction, MicroProgramCounterSource, MICROPROGRAM};

/// Why the machine stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaltReason {
    /// a halt instruction was executed
    Instruction,
    /// the input port was read with no input left
    InputExhausted,
}

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tick {
    Continue,
    Halted(HaltReason),
}

/// Emulates the microprogrammed control unit. Each tick executes exactly one
/// micro-instruction against a datapath it does not own.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlUnit {
    micro_program_counter: usize,
    instruction: Option<Instruction>,
    repeat: i32,
}

impl ControlUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn micro_program_counter(&self) -> usize {
        self.micro_program_counter
    }

    /// The last decoded instruction
    pub fn instruction(&self) -> Option<Instruction> {
        self.instruction
    }

    /// Pending repeat count of an accumulate instruction
    pub fn repeat(&self) -> i32 {
        self.repeat
    }

    /// Executes the micro-instruction at the micro-program counter
    pub fn tick<const S: usize>(
        &mut self,
        datapath: &mut DataPath<S>,
    ) -> Result<Tick, MachineError> {
        let address = self.micro_program_counter;
        let micro = *MICROPROGRAM
            .get(address)
            .ok_or(MachineError::MicroAddressOutOfRange { address })?;

        trace!("{:4}: {:?}", address, micro);

        let mut outcome = Tick::Continue;
        let mut next = address + 1;

        match micro {
            MicroInstruction::LatchAddress(source) => datapath.latch_address(source)?,
            MicroInstruction::LatchData(source) => {
                if datapath.latch_data(source)? == Read::InputExhausted {
                    outcome = Tick::Halted(HaltReason::InputExhausted);
                }
            }
            MicroInstruction::LatchRegister(source) => datapath.latch_register(source)?,
            MicroInstruction::LatchMemory => datapath.latch_memory()?,
            MicroInstruction::LatchProgramCounter(source) => {
                datapath.latch_program_counter(source)?
            }
            MicroInstruction::LatchJump => datapath.latch_jump(),
            MicroInstruction::LatchFlag(flag) => datapath.latch_flag(flag),
            MicroInstruction::LatchInverse(inverse) => datapath.latch_inverse(inverse),
            MicroInstruction::LatchLeft(source) => datapath.latch_left(source, self.repeat)?,
            MicroInstruction::LatchRight(source) => datapath.latch_right(source)?,
            MicroInstruction::Execute(operation) => datapath.alu.perform(operation)?,
            MicroInstruction::AdjustStackPointer(adjust) => datapath.adjust_stack_pointer(adjust),
            MicroInstruction::LatchMicroProgramCounter(source) => {
                next = self.next_micro_address(source, address)?;
            }
            MicroInstruction::LatchInstruction => self.decode(datapath)?,
            MicroInstruction::DecrementRepeat => self.repeat -= 1,
            MicroInstruction::Halt => outcome = Tick::Halted(HaltReason::Instruction),
        }

        self.micro_program_counter = next;
        Ok(outcome)
    }

    fn next_micro_address(
        &self,
        source: MicroProgramCounterSource,
        address: usize,
    ) -> Result<usize, MachineError> {
        let entry = || {
            self.instruction
                .map(|instruction| instruction.opcode().code() as usize)
                .ok_or(MachineError::NothingDecoded)
        };

        match source {
            MicroProgramCounterSource::Zero => Ok(0),
            MicroProgramCounterSource::Opcode => entry(),
            MicroProgramCounterSource::Repeat if self.repeat != 0 => entry(),
            MicroProgramCounterSource::Repeat => Ok(address + 1),
        }
    }

    /// Records the instruction in the data register and wires its terms onto
    /// the register selection slots.
    fn decode<const S: usize>(&mut self, datapath: &mut DataPath<S>) -> Result<(), MachineError> {
        let instruction = match datapath.data_register {
            Cell::Instruction(instruction) => instruction,
            Cell::Value(_) => {
                return Err(MachineError::NotAnInstruction {
                    address: datapath.address_register,
                })
            }
        };

        match instruction.opcode().selection() {
            Selection::Nothing => {}
            Selection::Destination => datapath.destination = instruction.term(0)?,
            Selection::Accumulator => {
                datapath.destination = instruction.term(0)?;
                datapath.left = instruction.term(0)?;
            }
            Selection::DestinationLeft => {
                datapath.destination = instruction.term(0)?;
                datapath.left = instruction.term(1)?;
            }
            Selection::DestinationRight => {
                datapath.destination = instruction.term(0)?;
                datapath.right = instruction.term(1)?;
            }
            Selection::DestinationLeftRight => {
                datapath.destination = instruction.term(0)?;
                datapath.left = instruction.term(1)?;
                datapath.right = instruction.term(2)?;
            }
            Selection::Left => datapath.left = instruction.term(0)?,
            Selection::Right => datapath.right = instruction.term(0)?,
            Selection::RightLeft => {
                datapath.right = instruction.term(0)?;
                datapath.left = instruction.term(1)?;
            }
            Selection::Repeat => {
                let count = datapath.registers.get(instruction.term(0)?);
                if count < 1 {
                    return Err(MachineError::InvalidRepeatCount { count });
                }
                self.repeat = count;
                datapath.destination = instruction.term(1)?;
                datapath.left = instruction.term(1)?;
            }
        }

        debug!(
            "PC: {:4} SP: {:4} INSTR: {}",
            datapath.program_counter.idx(),
            datapath.registers.stack_pointer,
            instruction
        );

        self.instruction = Some(instruction);
        Ok(())
    }
}
