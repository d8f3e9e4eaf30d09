//! Wires between memory, registers and the ALU.
//!
//! Every latch operation moves one value onto one wire (or into one memory
//! cell). The control unit decides which latch fires on a given tick.

use std::fmt;

use crate::alu::{Alu, Flag};
use crate::error::MachineError;
use crate::isa::Register;
use crate::memory::{Address, Cell, Memory, Ports};
use crate::microcode::{
    AddressSource, DataSource, LeftOperand, ProgramCounterSource, RegisterSource, RightOperand,
    StackAdjust,
};
use crate::registers::RegisterFile;

/// Result of a memory read onto the data register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Read {
    Done,
    /// the input port had nothing left
    InputExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath<const S: usize> {
    pub alu: Alu,
    pub registers: RegisterFile,
    pub memory: Memory<S>,

    pub address_register: Address,
    pub data_register: Cell,
    pub program_counter: Address,
    pub jump_register: i32,
    pub selected_flag: Option<Flag>,
    pub inverse_flag: bool,

    pub left: Register,
    pub right: Register,
    pub destination: Register,
}

impl<const S: usize> Default for DataPath<S> {
    fn default() -> Self {
        Self::new(Memory::default())
    }
}

impl<const S: usize> DataPath<S> {
    /// Wires up `memory`. The stack starts just past the last cell.
    pub fn new(memory: Memory<S>) -> Self {
        Self {
            alu: Alu::default(),
            registers: RegisterFile::new(S as i32),
            memory,
            address_register: Address(0),
            data_register: Cell::default(),
            program_counter: Address(0),
            jump_register: 0,
            selected_flag: None,
            inverse_flag: false,
            left: Register::R0,
            right: Register::R0,
            destination: Register::R0,
        }
    }

    pub fn with_ports(ports: Ports) -> Result<Self, MachineError> {
        Ok(Self::new(Memory::with_ports(ports)?))
    }

    /// The data register as a plain value
    pub fn data_value(&self) -> Result<i32, MachineError> {
        match self.data_register {
            Cell::Value(value) => Ok(value),
            Cell::Instruction(_) => Err(MachineError::NotAValue),
        }
    }

    pub fn latch_address(&mut self, source: AddressSource) -> Result<(), MachineError> {
        self.address_register = match source {
            AddressSource::ProgramCounter => self.program_counter,
            AddressSource::Alu => Address::from_value(self.alu.result)?,
            AddressSource::StackPointer => Address::from_value(self.registers.stack_pointer)?,
            AddressSource::DataRegister => Address::from_value(self.data_value()?)?,
        };
        Ok(())
    }

    pub fn latch_data(&mut self, source: DataSource) -> Result<Read, MachineError> {
        match source {
            DataSource::Alu => self.data_register = Cell::Value(self.alu.result),
            DataSource::Memory => match self.memory.read(self.address_register)? {
                Some(cell) => self.data_register = cell,
                None => return Ok(Read::InputExhausted),
            },
        }
        Ok(Read::Done)
    }

    /// Writes the destination register
    pub fn latch_register(&mut self, source: RegisterSource) -> Result<(), MachineError> {
        let value = match source {
            RegisterSource::Alu => self.alu.result,
            RegisterSource::DataRegister => self.data_value()?,
            RegisterSource::Left => self.registers.get(self.left),
        };
        self.registers.set(self.destination, value);
        Ok(())
    }

    /// `mem[ar] <- dr`
    pub fn latch_memory(&mut self) -> Result<(), MachineError> {
        self.memory
            .write(self.address_register, self.data_register)
    }

    pub fn latch_program_counter(
        &mut self,
        source: ProgramCounterSource,
    ) -> Result<(), MachineError> {
        let jump = match source {
            ProgramCounterSource::Next => false,
            ProgramCounterSource::Condition => match self.selected_flag {
                None => true,
                Some(flag) => self.alu.flags.get(flag) ^ self.inverse_flag,
            },
        };

        self.program_counter = if jump {
            Address::from_value(self.jump_register)?
        } else {
            self.program_counter + 1
        };
        Ok(())
    }

    /// `jump <- alu`
    pub fn latch_jump(&mut self) {
        self.jump_register = self.alu.result;
    }

    pub fn latch_flag(&mut self, flag: Option<Flag>) {
        self.selected_flag = flag;
    }

    pub fn latch_inverse(&mut self, inverse: bool) {
        self.inverse_flag = inverse;
    }

    /// Latches the left ALU input. `repeat` is the control unit's pending count.
    pub fn latch_left(&mut self, source: LeftOperand, repeat: i32) -> Result<(), MachineError> {
        let value = match source {
            LeftOperand::Register => self.registers.get(self.left),
            LeftOperand::Zero => 0,
            LeftOperand::PlusOne => 1,
            LeftOperand::MinusOne => -1,
            LeftOperand::ProgramCounter => self.program_counter.value(),
            LeftOperand::DataRegister => self.data_value()?,
            LeftOperand::Repeat => repeat,
        };
        self.alu.latch_left(value);
        Ok(())
    }

    pub fn latch_right(&mut self, source: RightOperand) -> Result<(), MachineError> {
        let value = match source {
            RightOperand::Register => self.registers.get(self.right),
            RightOperand::Zero => 0,
            RightOperand::DataRegister => self.data_value()?,
            RightOperand::PlusOne => 1,
            RightOperand::MinusOne => -1,
        };
        self.alu.latch_right(value);
        Ok(())
    }

    pub fn adjust_stack_pointer(&mut self, adjust: StackAdjust) {
        self.registers.adjust_stack_pointer(adjust);
    }
}

impl<const S: usize> fmt::Display for DataPath<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC: {:4} SP: {:4} AR: {:4} DR: {:>12} ALU: {:11} [{}]",
            self.program_counter.idx(),
            self.registers.stack_pointer,
            self.address_register.idx(),
            self.data_register.to_string(),
            self.alu.result,
            self.alu.flags
        )
    }
}
