//! CPU and memory state.
use crate::{
    constants::*, display::Framebuffer, error::ExecutionFault, interp::ExecState, keypad::Keypad,
    memory::Memory,
};

/// Core state for a chip8 interpreter.
#[derive(Clone)]
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction to fetch.
    pub(crate) pc: Address,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address.
    pub(crate) address: Address,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: CallStack,
    pub(crate) timers: Timers,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Memory,
    /// Screen buffer that is drawn too.
    pub(crate) display: Framebuffer,

    // ------------------------------------------------------------------------
    // Input
    /// Keyboard input state. Only the host changes it.
    pub(crate) keys: Keypad,

    // ------------------------------------------------------------------------
    // Control
    /// Whether the interpreter is running, waiting for a key, or halted.
    pub(crate) state: ExecState,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: MEM_START as Address,
            registers: [0; REGISTER_COUNT],
            address: 0,
            stack: CallStack::new(),
            timers: Timers::default(),

            ram: Memory::new(),
            display: Framebuffer::new(),

            keys: Keypad::new(),

            state: ExecState::Running,
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Put registers, stack, timers and display back to their power-on values.
    ///
    /// Memory and keyboard state are left alone. The interpreter is set running.
    pub(crate) fn reset_registers(&mut self) {
        self.pc = MEM_START as Address;
        self.registers = [0; REGISTER_COUNT];
        self.address = 0;
        self.stack.clear();
        self.timers = Timers::default();
        self.display.clear();
        self.state = ExecState::Running;
    }

    #[inline(always)]
    pub(crate) fn v(&self, index: u8) -> u8 {
        self.registers[index as usize & 0xF]
    }

    #[inline(always)]
    pub(crate) fn set_v(&mut self, index: u8, value: u8) {
        self.registers[index as usize & 0xF] = value;
    }

    #[inline(always)]
    pub(crate) fn set_flag(&mut self, flag: bool) {
        self.registers[FLAG_REGISTER] = flag as u8;
    }
}

/// Fixed capacity stack of subroutine return addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStack {
    slots: [Address; STACK_SIZE],
    /// Stack pointer, number of addresses on the stack.
    sp: u8,
}

impl Default for CallStack {
    fn default() -> Self {
        Self {
            slots: [0; STACK_SIZE],
            sp: 0,
        }
    }
}

impl CallStack {
    pub fn new() -> Self {
        Default::default()
    }

    /// Push a return address. `target` is only used to describe the fault.
    pub(crate) fn push(&mut self, addr: Address, target: Address) -> Result<(), ExecutionFault> {
        let slot = self
            .slots
            .get_mut(self.sp as usize)
            .ok_or(ExecutionFault::StackOverflow { addr: target })?;
        *slot = addr;
        self.sp += 1;
        Ok(())
    }

    /// Pop a return address. `at` is only used to describe the fault.
    pub(crate) fn pop(&mut self, at: Address) -> Result<Address, ExecutionFault> {
        let sp = self
            .sp
            .checked_sub(1)
            .ok_or(ExecutionFault::StackUnderflow { addr: at })?;
        self.sp = sp;
        Ok(self.slots[sp as usize])
    }

    #[inline(always)]
    pub fn depth(&self) -> usize {
        self.sp as usize
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.depth() == STACK_SIZE
    }

    /// Return addresses from the bottom of the stack to the top.
    pub fn as_slice(&self) -> &[Address] {
        &self.slots[..self.depth()]
    }

    pub(crate) fn clear(&mut self) {
        self.slots.fill(0);
        self.sp = 0;
    }
}

/// The delay and sound countdown timers.
///
/// Both count down once per logical tick, independent of how many
/// instructions are executed in between.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    /// (DT) Delay timer that counts down to 0.
    pub delay: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub sound: u8,
}

impl Timers {
    /// Count down both timers, stopping at zero.
    #[inline]
    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }

    #[inline(always)]
    pub fn sound_active(&self) -> bool {
        self.sound > 0
    }
}
