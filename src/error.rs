use std::{error::Error, fmt, io};

use crate::runtime::{MEMORY_SIZE, PROGRAM_START};

/// Unrecoverable condition raised while executing a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    /// Address of the instruction being executed.
    pub address: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// Program counter does not leave room for a two byte fetch.
    PcOutOfBounds,
    /// `CALL` with all 16 stack slots in use.
    StackOverflow,
    /// `RET` with an empty stack.
    StackUnderflow,
    InvalidInstruction { raw: [u8; 2] },
    /// Memory access through `I` past the end of memory.
    MemoryOutOfBounds { target: usize },
}

/// Program image could not be loaded.
#[derive(Debug, PartialEq, Eq)]
pub enum LoadError {
    TooLarge { len: usize },
}

/// Reason the run loop stopped early.
#[derive(Debug)]
pub enum RunError {
    Fault(Fault),
    /// Display or keyboard backend failed.
    Device(io::Error),
}

impl Error for Fault {}
impl Error for LoadError {}
impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fault(fault) => Some(fault),
            Self::Device(error) => Some(error),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at address 0x{:03x}", self.kind, self.address)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PcOutOfBounds => write!(f, "program counter overflow"),
            Self::StackOverflow => write!(f, "stack overflow, more than 16 nested calls"),
            Self::StackUnderflow => write!(f, "return with an empty call stack"),
            Self::InvalidInstruction { raw } => {
                write!(f, "invalid instruction 0x{:02x}{:02x}", raw[0], raw[1])
            }
            Self::MemoryOutOfBounds { target } => {
                write!(f, "memory access out of bounds (0x{:04x})", target)
            }
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { len } => write!(
                f,
                "program is {} bytes long, but at most {} bytes fit in memory",
                len,
                MEMORY_SIZE - PROGRAM_START as usize
            ),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "machine fault: {}", fault),
            Self::Device(error) => write!(f, "device error: {}", error),
        }
    }
}

impl From<Fault> for RunError {
    fn from(value: Fault) -> Self {
        Self::Fault(value)
    }
}

impl From<io::Error> for RunError {
    fn from(value: io::Error) -> Self {
        Self::Device(value)
    }
}
