//! Virtual machine.
use std::fmt::{self, Write};

use log::{debug, warn};
use rand::{rngs::StdRng, RngCore, SeedableRng};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    cpu::{CallStack, Chip8Cpu},
    display::Framebuffer,
    error::{ExecutionFault, LoadError},
    interp::{ExecState, Flow},
    keypad::KeyCode,
    memory::Memory,
    quirks::Quirks,
};

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct Chip8Conf {
    pub quirks: Quirks,
    pub fault_mode: FaultMode,
    /// Seed for the random number generator used by `Cxnn` (`RND Vx, byte`).
    ///
    /// Seeded from the operating system when absent.
    pub seed: Option<u64>,
}

/// What [`Chip8Vm::step`] does when an instruction faults.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum FaultMode {
    /// Return the fault and leave the machine on the faulting instruction.
    #[default]
    Report,
    /// Return the fault and stop the machine until it is loaded or reset.
    Halt,
    /// Step over the faulting instruction and carry on.
    ///
    /// A program counter outside of memory can't be stepped over,
    /// and is always reported.
    Skip,
}

/// Chip-8 virtual machine.
///
/// Nothing in here touches the host. The caller decides how often to
/// [`step`](Chip8Vm::step) and calls [`tick_timers`](Chip8Vm::tick_timers)
/// at [`DELAY_FREQUENCY`], reads the display buffer to present it, and
/// forwards keyboard input.
pub struct Chip8Vm<R: RngCore = StdRng> {
    cpu: Chip8Cpu,
    conf: Chip8Conf,
    rng: R,
    /// Copy of the loaded program, for resetting.
    rom: Vec<u8>,
    /// Last fault returned without changing state, so
    /// a host retrying the same step logs it only once.
    repeated_fault: Option<ExecutionFault>,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(conf, rng)
    }
}

impl<R: RngCore> Chip8Vm<R> {
    /// Create a VM drawing random numbers from the given generator.
    ///
    /// The `seed` in the configuration is ignored.
    pub fn with_rng(conf: Chip8Conf, rng: R) -> Self {
        Chip8Vm {
            cpu: Chip8Cpu::new(),
            conf,
            rng,
            rom: Vec::new(),
            repeated_fault: None,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Load a program into memory and prepare it for execution.
    ///
    /// On error the VM is left exactly as it was.
    pub fn load(&mut self, bytecode: &[u8]) -> Result<(), LoadError> {
        self.cpu.ram.load_program(bytecode)?;

        self.rom.clear();
        self.rom.extend_from_slice(bytecode);

        // Reset the program counter to prepare for execution.
        self.cpu.reset_registers();
        self.repeated_fault = None;

        debug!("loaded program of {} bytes", bytecode.len());

        Ok(())
    }

    /// Restart the loaded program from a clean state.
    ///
    /// Memory is restored to what it was right after loading, which undoes
    /// any self-modification. Keyboard state is kept.
    pub fn reset(&mut self) {
        self.cpu.ram.install_font();
        self.cpu.ram.restore_program(&self.rom);
        self.cpu.reset_registers();
        self.repeated_fault = None;

        debug!("reset");
    }

    /// Execute a single instruction.
    ///
    /// While waiting for a key press this does nothing but return [`Flow::KeyWait`].
    pub fn step(&mut self) -> Result<Flow, ExecutionFault> {
        if let ExecState::Halted(fault) = self.cpu.state {
            return Err(fault);
        }

        let at = self.cpu.pc;

        match self.cpu.step(&self.conf.quirks, &mut self.rng) {
            Ok(flow) => {
                self.repeated_fault = None;
                Ok(flow)
            }
            Err(fault) => self.on_fault(at, fault),
        }
    }

    /// Remember a fault that leaves the machine in place.
    ///
    /// Returns `false` when it's the same fault as the previous step.
    fn note_fault(&mut self, fault: ExecutionFault) -> bool {
        self.repeated_fault.replace(fault) != Some(fault)
    }

    fn on_fault(&mut self, at: Address, fault: ExecutionFault) -> Result<Flow, ExecutionFault> {
        match self.conf.fault_mode {
            FaultMode::Report => {
                if self.note_fault(fault) {
                    warn!("{fault}");
                }
                Err(fault)
            }
            FaultMode::Halt => {
                warn!("{fault}, halting");
                self.cpu.state = ExecState::Halted(fault);
                Err(fault)
            }
            FaultMode::Skip => {
                if self.cpu.fetch().is_err() {
                    if self.note_fault(fault) {
                        warn!("{fault}, cannot skip");
                    }
                    return Err(fault);
                }
                warn!("{fault}, skipping");
                self.cpu.pc = at.wrapping_add(2);
                Ok(Flow::Skipped)
            }
        }
    }

    /// Execute up to `step_count` instructions, stopping at the first fault.
    ///
    /// Returns the flow of the last step.
    pub fn run_steps(&mut self, step_count: usize) -> Result<Flow, ExecutionFault> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
        }

        Ok(flow)
    }

    /// Count down the delay and sound timers by one logical tick.
    ///
    /// Must be called at [`DELAY_FREQUENCY`], regardless of how many
    /// instructions are executed in between.
    pub fn tick_timers(&mut self) {
        self.cpu.timers.tick();
    }

    /// Whether the buzzer should be sounding.
    pub fn sound_active(&self) -> bool {
        self.cpu.timers.sound_active()
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.cpu.display
    }
}

/// Input
impl<R: RngCore> Chip8Vm<R> {
    /// Sets the keyboard key input state.
    ///
    /// If the VM is waiting for keyboard input, a key press will
    /// resume it on the next step.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.key_event(key, pressed);
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.cpu.keys.is_pressed(key)
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.keys.clear()
    }
}

/// Inspection
impl<R: RngCore> Chip8Vm<R> {
    pub fn state(&self) -> ExecState {
        self.cpu.state
    }

    pub fn pc(&self) -> Address {
        self.cpu.pc
    }

    /// Address register `I`.
    pub fn index(&self) -> Address {
        self.cpu.address
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    pub fn stack(&self) -> &CallStack {
        &self.cpu.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.timers.delay
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.timers.sound
    }

    pub fn memory(&self) -> &Memory {
        &self.cpu.ram
    }
}

/// Troubleshooting
impl<R: RngCore> Chip8Vm<R> {
    /// Returns the contents of program memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let ram = self.cpu.ram.as_slice();
        let end = (MEM_START + count).min(MEM_SIZE);
        let mut buf = String::new();

        for (i, instr) in ram[MEM_START..end].chunks(2).enumerate() {
            let offset = MEM_START + i * 2;
            match instr {
                [a, b] => writeln!(buf, "{offset:04X}: {a:02X}{b:02X}")?,
                [a] => writeln!(buf, "{offset:04X}: {a:02X}")?,
                _ => {}
            }
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        self.cpu.display.dump()
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.keys.any() {
            write!(buf, "keys: ")?;
            for key in self.cpu.keys.pressed() {
                write!(buf, "{key}")?;
            }
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::mock::StepRng;

    use super::*;

    fn vm_with(conf: Chip8Conf, program: &[u8]) -> Chip8Vm<StepRng> {
        let mut vm = Chip8Vm::with_rng(conf, StepRng::new(0, 1));
        vm.load(program).unwrap();
        vm
    }

    #[test]
    fn test_load_too_large_keeps_state() {
        let mut vm = vm_with(Chip8Conf::default(), &[0x60, 0x07]);
        vm.step().unwrap();

        let result = vm.load(&vec![0; MAX_PROGRAM_SIZE + 1]);
        assert!(matches!(result, Err(LoadError::TooLarge { .. })));
        assert_eq!(vm.pc(), 0x202);
        assert_eq!(vm.registers()[0], 7);
        assert_eq!(vm.memory().read_byte(MEM_START), Ok(0x60));
    }

    #[test]
    #[rustfmt::skip]
    fn test_reset_restores_program() {
        let mut vm = vm_with(Chip8Conf::default(), &[
            0x60, 0xFF, // LD v0, 0xFF
            0xA2, 0x00, // LD I, 0x200
            0xF0, 0x55, // LD [I], v0   ; overwrite first instruction
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.memory().read_byte(MEM_START), Ok(0xFF));

        vm.set_key(KeyCode::Key3, true);
        vm.reset();

        assert_eq!(vm.memory().read_byte(MEM_START), Ok(0x60));
        assert_eq!(vm.pc(), MEM_START as Address);
        assert_eq!(vm.index(), 0);
        assert_eq!(vm.registers(), &[0; REGISTER_COUNT]);
        assert!(vm.is_key_pressed(KeyCode::Key3));
    }

    #[test]
    fn test_report_mode_repeats_fault() {
        let mut vm = vm_with(Chip8Conf::default(), &[0xE0, 0x00]);
        let fault = ExecutionFault::UnknownOpcode {
            opcode: 0xE000,
            addr: 0x200,
        };

        assert_eq!(vm.step(), Err(fault));
        assert_eq!(vm.step(), Err(fault));
        assert_eq!(vm.state(), ExecState::Running);
    }

    #[test]
    #[rustfmt::skip]
    fn test_repeated_fault_noted_once() {
        let mut vm = vm_with(Chip8Conf::default(), &[
            0x00, 0xEE, // RET
        ]);
        let fault = ExecutionFault::StackUnderflow { addr: 0x200 };

        assert_eq!(vm.step(), Err(fault));
        assert_eq!(vm.repeated_fault, Some(fault));
        assert!(!vm.note_fault(fault));

        // A different fault is reported again.
        let other = ExecutionFault::OutOfBounds { addr: 0x1000 };
        assert!(vm.note_fault(other));

        vm.reset();
        assert_eq!(vm.repeated_fault, None);
        assert!(vm.note_fault(fault));
    }

    #[test]
    #[rustfmt::skip]
    fn test_halt_mode() {
        let conf = Chip8Conf { fault_mode: FaultMode::Halt, ..Default::default() };
        let mut vm = vm_with(conf, &[
            0x00, 0xEE, // RET
            0x60, 0x01, // LD v0, 1
        ]);
        let fault = ExecutionFault::StackUnderflow { addr: 0x200 };

        assert_eq!(vm.step(), Err(fault));
        assert_eq!(vm.state(), ExecState::Halted(fault));
        assert_eq!(vm.step(), Err(fault));
        assert_eq!(vm.pc(), 0x200);

        vm.reset();
        assert_eq!(vm.state(), ExecState::Running);
    }

    #[test]
    #[rustfmt::skip]
    fn test_skip_mode() {
        let conf = Chip8Conf { fault_mode: FaultMode::Skip, ..Default::default() };
        let mut vm = vm_with(conf, &[
            0xFF, 0xFF, // garbage
            0x60, 0x01, // LD v0, 1
        ]);

        assert_eq!(vm.step(), Ok(Flow::Skipped));
        assert_eq!(vm.pc(), 0x202);
        vm.step().unwrap();
        assert_eq!(vm.registers()[0], 1);
    }

    #[test]
    #[rustfmt::skip]
    fn test_skip_mode_cannot_skip_fetch() {
        let conf = Chip8Conf { fault_mode: FaultMode::Skip, ..Default::default() };
        let mut vm = vm_with(conf, &[
            0x1F, 0xFE, // JP 0xFFE
        ]);
        vm.step().unwrap();
        assert_eq!(vm.pc(), 0xFFE);

        // 0xFFE holds 0000, SYS is a no-op
        vm.step().unwrap();
        assert_eq!(vm.pc(), 0x1000);
        assert_eq!(vm.step(), Err(ExecutionFault::OutOfBounds { addr: 0x1000 }));
    }

    #[test]
    #[rustfmt::skip]
    fn test_sound_active() {
        let mut vm = vm_with(Chip8Conf::default(), &[
            0x60, 0x02, // LD v0, 2
            0xF0, 0x18, // LD ST, v0
        ]);
        assert!(!vm.sound_active());
        vm.run_steps(2).unwrap();
        assert!(vm.sound_active());

        vm.tick_timers();
        assert!(vm.sound_active());
        vm.tick_timers();
        assert!(!vm.sound_active());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        // RND v0, 0xFF ; RND v1, 0xFF
        let program = [0xC0, 0xFF, 0xC1, 0xFF];
        let conf = Chip8Conf {
            seed: Some(1234),
            ..Default::default()
        };

        let mut a = Chip8Vm::new(conf.clone());
        let mut b = Chip8Vm::new(conf);
        a.load(&program).unwrap();
        b.load(&program).unwrap();
        a.run_steps(2).unwrap();
        b.run_steps(2).unwrap();

        assert_eq!(a.registers(), b.registers());
    }

    #[test]
    fn test_dumps() {
        let mut vm = vm_with(Chip8Conf::default(), &[0x00, 0xE0, 0x12, 0x02, 0xAB]);
        assert_eq!(vm.dump_ram(5).unwrap(), "0200: 00E0\n0202: 1202\n0204: AB\n");

        assert_eq!(vm.dump_keys().unwrap(), "");
        vm.set_key(KeyCode::Key1, true);
        vm.set_key(KeyCode::KeyB, true);
        assert_eq!(vm.dump_keys().unwrap(), "keys: k1kb");
    }
}
