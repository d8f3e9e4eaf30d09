use crate::isa::Opcode;
use crate::memory::Address;

/// Everything that can abort a run. Halting is not an error and never shows up here.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("address {address} is outside of memory (capacity {capacity})")]
    AddressOutOfRange { address: Address, capacity: usize },

    #[error("value {value} cannot be used as an address")]
    NegativeAddress { value: i32 },

    #[error("write to input port {address}")]
    WriteToInputPort { address: Address },

    #[error("read from output port {address}")]
    ReadFromOutputPort { address: Address },

    #[error("unknown opcode 0x{opcode:03X} in word 0x{word:08X}")]
    UnknownOpcode { word: u32, opcode: u32 },

    #[error("{opcode} takes {expected} register terms, got {found}")]
    TermCount {
        opcode: Opcode,
        expected: usize,
        found: usize,
    },

    #[error("{opcode} at word {offset} expects {expected} trailing words, stream ends after {found}")]
    TruncatedStream {
        opcode: Opcode,
        offset: usize,
        expected: usize,
        found: usize,
    },

    #[error("byte stream of length {length} is not a whole number of 32-bit words")]
    MisalignedStream { length: usize },

    #[error("cell at {address} holds a value where an instruction was expected")]
    NotAnInstruction { address: Address },

    #[error("data register holds an instruction where a value was expected")]
    NotAValue,

    #[error("repeat count must be at least 1, register holds {count}")]
    InvalidRepeatCount { count: i32 },

    #[error("no instruction has been decoded yet")]
    NothingDecoded,

    #[error("micro-program counter {address} is outside of the microprogram")]
    MicroAddressOutOfRange { address: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("tick budget of {budget} exhausted")]
    TickBudgetExhausted { budget: u64 },

    #[error("microprogram layout broken at micro-address {address}: {reason}")]
    MicroprogramLayout {
        address: usize,
        reason: &'static str,
    },

    #[error("register field {index} does not name a register")]
    InvalidRegister { index: u8 },

    #[error("{segment} segment {start}..{end} covers port {port}")]
    SegmentCoversPort {
        segment: &'static str,
        start: Address,
        end: Address,
        port: Address,
    },

    #[error("data segment {data_start}..{data_end} overlaps code ending at {code_end}")]
    SegmentsOverlap {
        code_end: Address,
        data_start: Address,
        data_end: Address,
    },

    #[error("invalid input token `{token}`")]
    InvalidInput { token: String },

    #[error("ports must be two distinct addresses inside memory, got {input} and {output}")]
    InvalidPorts { input: Address, output: Address },
}
