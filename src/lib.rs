// Decoding
mod decode;
pub use decode::{
    decode, AddressOp, ImmediateOp, NoOperandOp, Operation, PairOp, Register, RegisterOp,
    SpriteOp,
};

// Running
mod runtime;
pub use runtime::{
    Machine, RunOptions, TickClock, DEFAULT_SEED, FONT, MEMORY_SIZE, PROGRAM_START, STACK_SIZE,
};
mod device;
pub use device::{Display, Frame, KeyState, Keyboard, Signal, SCREEN_HEIGHT, SCREEN_WIDTH};
mod error;
pub use error::{Fault, FaultKind, LoadError, RunError};

// Listing
mod disasm;
pub use disasm::{disassemble, Disassembly, LabelTable};

pub mod env;
pub mod output;
pub mod term;
