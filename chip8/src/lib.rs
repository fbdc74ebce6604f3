pub mod constants;
mod cpu;
mod display;
mod error;
mod font;
mod instr;
mod interp;
mod keypad;
mod memory;
mod quirks;
mod vm;

pub use self::{
    cpu::{CallStack, Timers},
    display::Framebuffer,
    error::{Chip8Error, Chip8Result, ExecutionFault, LoadError},
    font::{glyph_address, FONTSET},
    instr::Op,
    interp::{ExecState, Flow},
    keypad::{InvalidKeyCode, KeyCode, Keypad},
    memory::Memory,
    quirks::Quirks,
    vm::{Chip8Conf, Chip8Vm, FaultMode},
};

pub mod prelude {
    pub use super::{
        error::{Chip8Error, Chip8Result, ExecutionFault, LoadError},
        interp::{ExecState, Flow},
        keypad::KeyCode,
        quirks::Quirks,
        vm::{Chip8Conf, Chip8Vm, FaultMode},
    };
}
