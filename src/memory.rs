use std::collections::VecDeque;
use std::fmt;
use std::ops::Add;

use crate::error::MachineError;
use crate::isa::Instruction;

pub mod parse;

/// Default memory capacity in cells
pub const CAPACITY: usize = 1024;
/// Default input port
pub const INPUT_PORT: Address = Address(400);
/// Default output port
pub const OUTPUT_PORT: Address = Address(401);
/// Default base address of the data segment
pub const DATA_BASE: Address = Address(512);

/// Default memory
pub type StdMem = Memory<CAPACITY>;

/// Index of a memory cell
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub usize);

impl Address {
    pub fn idx(self) -> usize {
        self.0
    }

    /// Interprets a machine value as an address
    pub fn from_value(value: i32) -> Result<Self, MachineError> {
        usize::try_from(value)
            .map(Address)
            .map_err(|_| MachineError::NegativeAddress { value })
    }

    /// The address as a machine value
    pub fn value(self) -> i32 {
        self.0 as i32
    }
}

impl From<usize> for Address {
    fn from(index: usize) -> Self {
        Address(index)
    }
}

impl Add<usize> for Address {
    type Output = Address;

    fn add(self, rhs: usize) -> Self::Output {
        Address(self.0 + rhs)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Contents of a memory cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Instruction(Instruction),
    Value(i32),
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Value(0)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Instruction(instruction) => write!(f, "{}", instruction),
            Cell::Value(value) => write!(f, "{}", value),
        }
    }
}

/// Memory-mapped I/O addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ports {
    pub input: Address,
    pub output: Address,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            input: INPUT_PORT,
            output: OUTPUT_PORT,
        }
    }
}

/// Emulates memory for use with the CPU. Two cells are replaced by I/O ports:
/// reading the input port pops from an input queue, writing the output port
/// appends to an output queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory<const S: usize> {
    /// The actual cells of the memory
    pub cells: [Cell; S],
    ports: Ports,
    input: VecDeque<i32>,
    output: Vec<i32>,
}

impl<const S: usize> Default for Memory<S> {
    fn default() -> Self {
        Self {
            cells: [Cell::Value(0); S],
            ports: Ports::default(),
            input: VecDeque::new(),
            output: Vec::new(),
        }
    }
}

impl<const S: usize> Memory<S> {
    /// Initializes the memory with custom ports
    pub fn with_ports(ports: Ports) -> Result<Self, MachineError> {
        if ports.input == ports.output || ports.input.idx() >= S || ports.output.idx() >= S {
            return Err(MachineError::InvalidPorts {
                input: ports.input,
                output: ports.output,
            });
        }

        Ok(Self {
            ports,
            ..Self::default()
        })
    }

    pub fn ports(&self) -> Ports {
        self.ports
    }

    fn check(&self, address: Address) -> Result<usize, MachineError> {
        if address.idx() < S {
            Ok(address.idx())
        } else {
            Err(MachineError::AddressOutOfRange {
                address,
                capacity: S,
            })
        }
    }

    /// Reads a cell. `None` means the input port was read with no input left.
    pub fn read(&mut self, address: Address) -> Result<Option<Cell>, MachineError> {
        let index = self.check(address)?;

        if address == self.ports.input {
            Ok(self.input.pop_front().map(Cell::Value))
        } else if address == self.ports.output {
            Err(MachineError::ReadFromOutputPort { address })
        } else {
            Ok(Some(self.cells[index]))
        }
    }

    /// Writes a cell. Only values may be written to the output port.
    pub fn write(&mut self, address: Address, cell: Cell) -> Result<(), MachineError> {
        let index = self.check(address)?;

        if address == self.ports.input {
            Err(MachineError::WriteToInputPort { address })
        } else if address == self.ports.output {
            match cell {
                Cell::Value(value) => {
                    self.output.push(value);
                    Ok(())
                }
                Cell::Instruction(_) => Err(MachineError::NotAValue),
            }
        } else {
            self.cells[index] = cell;
            Ok(())
        }
    }

    /// Reads a cell without port semantics
    pub fn peek(&self, address: Address) -> Result<Cell, MachineError> {
        let index = self.check(address)?;
        Ok(self.cells[index])
    }

    /// Copies `cells` into memory starting at `position`, ignoring ports
    pub fn load(&mut self, position: Address, cells: &[Cell]) -> Result<(), MachineError> {
        let start = self.check(position)?;
        if cells.is_empty() {
            return Ok(());
        }
        self.check(position + (cells.len() - 1))?;

        self.cells[start..start + cells.len()].copy_from_slice(cells);
        Ok(())
    }

    /// Queues values for the input port
    pub fn extend_input<I: IntoIterator<Item = i32>>(&mut self, values: I) {
        self.input.extend(values);
    }

    /// Values still waiting on the input port
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Everything written to the output port so far
    pub fn output(&self) -> &[i32] {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use crate::isa::{Opcode, Register};

    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_read_write() -> Result<()> {
        let mut mem = StdMem::default();
        mem.write(Address(0x12), Cell::Value(-3))?;
        assert_eq!(mem.cells[0x12], Cell::Value(-3));
        assert_eq!(mem.read(Address(0x12))?, Some(Cell::Value(-3)));

        let hlt = Cell::Instruction(Instruction::new(Opcode::Hlt, &[])?);
        mem.write(Address(0), hlt)?;
        assert_eq!(mem.peek(Address(0))?, hlt);

        Ok(())
    }

    #[test]
    fn test_out_of_range() -> Result<()> {
        let mut mem = StdMem::default();

        assert_eq!(
            mem.read(Address(CAPACITY)),
            Err(MachineError::AddressOutOfRange {
                address: Address(CAPACITY),
                capacity: CAPACITY
            })
        );
        assert!(mem.write(Address(CAPACITY + 7), Cell::Value(1)).is_err());
        assert!(mem.peek(Address(usize::MAX)).is_err());
        assert!(mem.read(Address(CAPACITY - 1))?.is_some());

        Ok(())
    }

    #[test]
    fn test_input_port() -> Result<()> {
        let mut mem = StdMem::default();
        mem.extend_input([7, 8]);

        assert_eq!(mem.read(INPUT_PORT)?, Some(Cell::Value(7)));
        assert_eq!(mem.read(INPUT_PORT)?, Some(Cell::Value(8)));
        // exhausted input is not an error
        assert_eq!(mem.read(INPUT_PORT)?, None);
        assert_eq!(
            mem.write(INPUT_PORT, Cell::Value(1)),
            Err(MachineError::WriteToInputPort {
                address: INPUT_PORT
            })
        );

        Ok(())
    }

    #[test]
    fn test_output_port() -> Result<()> {
        let mut mem = StdMem::default();
        mem.write(OUTPUT_PORT, Cell::Value(4))?;
        mem.write(OUTPUT_PORT, Cell::Value(2))?;

        assert_eq!(mem.output(), &[4, 2]);
        // the cell behind the port is untouched
        assert_eq!(mem.cells[OUTPUT_PORT.idx()], Cell::Value(0));
        assert_eq!(
            mem.read(OUTPUT_PORT),
            Err(MachineError::ReadFromOutputPort {
                address: OUTPUT_PORT
            })
        );

        let push = Instruction::new(Opcode::Push, &[Register::R1])?;
        assert_eq!(
            mem.write(OUTPUT_PORT, Cell::Instruction(push)),
            Err(MachineError::NotAValue)
        );

        Ok(())
    }

    #[test]
    fn test_custom_ports() -> Result<()> {
        let ports = Ports {
            input: Address(10),
            output: Address(11),
        };
        let mut mem = StdMem::with_ports(ports)?;
        mem.write(INPUT_PORT, Cell::Value(1))?;
        assert_eq!(mem.read(Address(10))?, None);

        assert!(StdMem::with_ports(Ports {
            input: Address(3),
            output: Address(3)
        })
        .is_err());
        assert!(StdMem::with_ports(Ports {
            input: Address(3),
            output: Address(CAPACITY)
        })
        .is_err());

        Ok(())
    }

    #[test]
    fn test_load() -> Result<()> {
        let mut mem = StdMem::default();
        mem.load(Address(0x44), &[Cell::Value(1), Cell::Value(2), Cell::Value(3)])?;
        assert_eq!(mem.cells[0x44], Cell::Value(1));
        assert_eq!(mem.cells[0x45], Cell::Value(2));
        assert_eq!(mem.cells[0x46], Cell::Value(3));

        assert!(mem
            .load(Address(CAPACITY - 1), &[Cell::Value(1), Cell::Value(2)])
            .is_err());
        mem.load(Address(CAPACITY - 1), &[Cell::Value(9)])?;

        Ok(())
    }

    #[test]
    fn test_address_from_value() -> Result<()> {
        assert_eq!(Address::from_value(12)?, Address(12));
        assert_eq!(
            Address::from_value(-1),
            Err(MachineError::NegativeAddress { value: -1 })
        );
        assert_eq!(Address(5) + 3, Address(8));
        assert_eq!(Address(5).to_string(), "@5");

        Ok(())
    }
}
