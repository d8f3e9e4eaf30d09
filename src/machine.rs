use std::ops::Range;

use log::*;

use crate::control_unit::{ControlUnit, HaltReason, Tick};
use crate::datapath::DataPath;
use crate::error::MachineError;
use crate::memory::{Address, Cell, Ports, CAPACITY};

/// Default machine
pub type StdMachine = Machine<CAPACITY>;

/// The whole computer: a datapath and the control unit driving it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine<const S: usize> {
    pub datapath: DataPath<S>,
    pub control_unit: ControlUnit,
    ticks: u64,
    instructions: u64,
    /// cells claimed by the loaded code image and data segment
    code: Range<usize>,
    data: Range<usize>,
}

impl<const S: usize> Default for Machine<S> {
    fn default() -> Self {
        Self::from_datapath(DataPath::default())
    }
}

impl<const S: usize> Machine<S> {
    pub fn new(ports: Ports) -> Result<Self, MachineError> {
        Ok(Self::from_datapath(DataPath::with_ports(ports)?))
    }

    fn from_datapath(datapath: DataPath<S>) -> Self {
        Self {
            datapath,
            control_unit: ControlUnit::new(),
            ticks: 0,
            instructions: 0,
            code: 0..0,
            data: 0..0,
        }
    }

    /// Segments may not cover a port: the port would shadow the loaded cell.
    fn check_ports(&self, segment: &'static str, cells: &Range<usize>) -> Result<(), MachineError> {
        let ports = self.datapath.memory.ports();
        match [ports.input, ports.output]
            .into_iter()
            .find(|port| cells.contains(&port.idx()))
        {
            Some(port) => Err(MachineError::SegmentCoversPort {
                segment,
                start: Address(cells.start),
                end: Address(cells.end),
                port,
            }),
            None => Ok(()),
        }
    }

    fn check_overlap(code: &Range<usize>, data: &Range<usize>) -> Result<(), MachineError> {
        if code.is_empty() || data.is_empty() || code.end <= data.start || data.end <= code.start {
            return Ok(());
        }

        Err(MachineError::SegmentsOverlap {
            code_end: Address(code.end),
            data_start: Address(data.start),
            data_end: Address(data.end),
        })
    }

    /// Loads a code image at address 0, where execution starts
    pub fn load_code(&mut self, cells: &[Cell]) -> Result<(), MachineError> {
        let code = 0..cells.len();
        self.check_ports("code", &code)?;
        Self::check_overlap(&code, &self.data)?;

        self.datapath.memory.load(Address(0), cells)?;
        self.code = code;
        Ok(())
    }

    /// Loads a data segment at `base`. The heap starts right behind it.
    pub fn load_data(&mut self, base: Address, values: &[i32]) -> Result<(), MachineError> {
        let data = base.idx()..base.idx() + values.len();
        self.check_ports("data", &data)?;
        Self::check_overlap(&self.code, &data)?;

        let cells: Vec<Cell> = values.iter().copied().map(Cell::Value).collect();
        self.datapath.memory.load(base, &cells)?;
        self.datapath.registers.heap_pointer = (base + values.len()).value();
        self.data = data;
        Ok(())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Number of instructions fetched so far
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Runs one micro-instruction
    pub fn tick(&mut self) -> Result<Tick, MachineError> {
        if self.control_unit.micro_program_counter() == 0 {
            self.instructions += 1;
        }
        self.ticks += 1;

        let tick = self.control_unit.tick(&mut self.datapath)?;
        trace!("TICK: {:6} {}", self.ticks, self.datapath);
        Ok(tick)
    }

    /// Runs until the machine halts or `budget` ticks have been spent
    pub fn run(&mut self, budget: u64) -> Result<HaltReason, MachineError> {
        while self.ticks < budget {
            if let Tick::Halted(reason) = self.tick()? {
                info!(
                    "Machine halted ({:?}) after {} ticks and {} instructions",
                    reason, self.ticks, self.instructions
                );
                return Ok(reason);
            }
        }

        error!(
            "Tick budget of {} exhausted at {} ({} instructions)",
            budget, self.datapath.program_counter, self.instructions
        );
        Err(MachineError::TickBudgetExhausted { budget })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{Instruction, Opcode, Register::*};
    use color_eyre::eyre::Result;

    #[test]
    fn test_counts() -> Result<()> {
        let mut machine = StdMachine::default();
        machine.load_code(&[
            Cell::Instruction(Instruction::new(Opcode::IncRegister, &[R0])?),
            Cell::Instruction(Instruction::new(Opcode::Hlt, &[])?),
        ])?;

        assert_eq!(machine.run(100)?, HaltReason::Instruction);
        assert_eq!(machine.instructions(), 2);
        // fetch + inc + fetch + halt
        assert_eq!(machine.ticks(), 4 + 6 + 4 + 1);
        assert_eq!(machine.datapath.registers.get(R0), 1);

        Ok(())
    }

    #[test]
    fn test_budget() -> Result<()> {
        let mut machine = StdMachine::default();
        machine.load_code(&[
            Cell::Instruction(Instruction::new(Opcode::JmpImmediate, &[])?),
            Cell::Value(0),
        ])?;

        assert_eq!(
            machine.run(1000),
            Err(MachineError::TickBudgetExhausted { budget: 1000 })
        );
        assert_eq!(machine.ticks(), 1000);

        Ok(())
    }

    #[test]
    fn test_code_may_not_cover_ports() -> Result<()> {
        let inc = Cell::Instruction(Instruction::new(Opcode::IncRegister, &[R0])?);
        let mut machine = StdMachine::default();

        assert_eq!(
            machine.load_code(&[inc; 402]),
            Err(MachineError::SegmentCoversPort {
                segment: "code",
                start: Address(0),
                end: Address(402),
                port: Address(400),
            })
        );
        // nothing was written
        assert_eq!(machine.datapath.memory.peek(Address(0))?, Cell::Value(0));

        machine.load_code(&[inc; 400])?;

        Ok(())
    }

    #[test]
    fn test_segments_may_not_overlap() -> Result<()> {
        let hlt = Cell::Instruction(Instruction::new(Opcode::Hlt, &[])?);

        let mut machine = StdMachine::default();
        machine.load_code(&[hlt; 10])?;
        assert_eq!(
            machine.load_data(Address(8), &[1, 2, 3]),
            Err(MachineError::SegmentsOverlap {
                code_end: Address(10),
                data_start: Address(8),
                data_end: Address(11),
            })
        );
        machine.load_data(Address(10), &[1, 2, 3])?;
        assert_eq!(
            machine.load_data(Address(399), &[1, 2]),
            Err(MachineError::SegmentCoversPort {
                segment: "data",
                start: Address(399),
                end: Address(401),
                port: Address(400),
            })
        );

        // the same check holds when data is loaded first
        let mut machine = StdMachine::default();
        machine.load_data(Address(4), &[])?;
        machine.load_data(Address(4), &[7])?;
        assert!(machine.load_code(&[hlt; 5]).is_err());

        Ok(())
    }

    #[test]
    fn test_load_data_moves_heap() -> Result<()> {
        let mut machine = StdMachine::default();
        machine.load_data(Address(512), &[1, 2, 3])?;

        assert_eq!(machine.datapath.memory.peek(Address(514))?, Cell::Value(3));
        assert_eq!(machine.datapath.registers.heap_pointer, 515);

        Ok(())
    }
}
