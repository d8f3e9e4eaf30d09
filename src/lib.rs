//! A microprogrammed educational computer.
//!
//! Programs are word streams of [`isa::Instruction`]s and raw values. The
//! [`control_unit::ControlUnit`] executes them one micro-instruction per tick
//! from the fixed control store in [`microcode`], driving the
//! [`datapath::DataPath`] that owns memory, registers and the ALU.

pub mod alu;
pub mod control_unit;
pub mod datapath;
pub mod error;
pub mod isa;
pub mod machine;
pub mod memory;
pub mod microcode;
pub mod registers;
pub mod simulation;

pub use error::MachineError;
