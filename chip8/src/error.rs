//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::Address;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Program could not be loaded into memory.
    Load(LoadError),
    /// VM fault during the interpreter loop.
    Fault(ExecutionFault),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(err) => write!(f, "load error: {err}"),
            Self::Fault(err) => write!(f, "runtime error: {err}"),
            Self::Fmt(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Load(err) => Some(err),
            Self::Fault(err) => Some(err),
            Self::Fmt(err) => Some(err),
        }
    }
}

impl From<LoadError> for Chip8Error {
    fn from(err: LoadError) -> Self {
        Chip8Error::Load(err)
    }
}

impl From<ExecutionFault> for Chip8Error {
    fn from(err: ExecutionFault) -> Self {
        Chip8Error::Fault(err)
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

/// Failure to place a program into VM memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Attempt to load a program that can't fit in memory.
    TooLarge { len: usize, capacity: usize },
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { len, capacity } => write!(
                f,
                "program of {len} bytes too large for VM memory, capacity is {capacity} bytes"
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// Fault raised while fetching, decoding or executing an instruction.
///
/// A fault never leaves the machine half-updated. The step that raised it
/// did not change registers, memory, stack, timers or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionFault {
    /// Memory access outside of the address space.
    OutOfBounds { addr: usize },
    /// `CALL` with a full call stack. `addr` is the target of the call.
    StackOverflow { addr: Address },
    /// `RET` with an empty call stack. `addr` is the location of the return.
    StackUnderflow { addr: Address },
    /// Bit pattern that is not part of the instruction set.
    UnknownOpcode { opcode: u16, addr: Address },
}

impl Display for ExecutionFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { addr } => write!(f, "memory access out of bounds at 0x{addr:04X}"),
            Self::StackOverflow { addr } => {
                write!(f, "call stack overflow calling 0x{addr:03X}")
            }
            Self::StackUnderflow { addr } => {
                write!(f, "call stack underflow returning at 0x{addr:03X}")
            }
            Self::UnknownOpcode { opcode, addr } => {
                write!(f, "unknown opcode {opcode:04X} at 0x{addr:03X}")
            }
        }
    }
}

impl std::error::Error for ExecutionFault {}
