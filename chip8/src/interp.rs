//! Bytecode interpreter.
//!
//! Fetch, decode and execute a single instruction against the CPU state.
use rand::{Rng, RngCore};

use crate::{
    constants::*,
    cpu::Chip8Cpu,
    error::ExecutionFault,
    font::glyph_address,
    instr::Op,
    keypad::KeyCode,
    quirks::Quirks,
};

/// Execution state of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// Fetching and executing instructions.
    Running,
    /// Suspended by `Fx0A` (`LD Vx, K`) until a key is pressed.
    ///
    /// `key` holds the key that was pressed while waiting, if any.
    WaitingForKey { vx: u8, key: Option<KeyCode> },
    /// Stopped by a fault. Only loading or resetting leaves this state.
    Halted(ExecutionFault),
}

/// Outcome of a successful step, as a hint for the caller's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// Display buffer was changed.
    Draw,
    /// Sound timer was loaded.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
    /// A faulting instruction was stepped over.
    Skipped,
}

impl Chip8Cpu {
    /// Record a key event for an `Fx0A` wait in progress.
    pub(crate) fn key_event(&mut self, key: KeyCode, pressed: bool) {
        self.keys.set(key, pressed);

        if let ExecState::WaitingForKey { vx, key: None } = self.state {
            if pressed {
                self.state = ExecState::WaitingForKey {
                    vx,
                    key: Some(key),
                };
            }
        }
    }

    /// Advance the machine by one instruction.
    ///
    /// On error, the program counter points at the faulting instruction and
    /// no other state has been touched.
    pub(crate) fn step<R: RngCore>(
        &mut self,
        quirks: &Quirks,
        rng: &mut R,
    ) -> Result<Flow, ExecutionFault> {
        match self.state {
            ExecState::Running => {}
            ExecState::Halted(fault) => return Err(fault),
            ExecState::WaitingForKey { vx, key } => {
                return Ok(self.resume_key_wait(quirks, vx, key));
            }
        }

        let at = self.pc;
        let instr = self.fetch()?;
        let op = Op::decode(instr).ok_or(ExecutionFault::UnknownOpcode {
            opcode: instr,
            addr: at,
        })?;

        op_trace(at, &op);

        // Advance before executing, so skips and calls
        // work relative to the next instruction.
        self.pc = at.wrapping_add(2);

        self.execute(op, at, quirks, rng).map_err(|fault| {
            // Rewind so the fault leaves the machine as it was.
            self.pc = at;
            fault
        })
    }

    /// Read the instruction at the program counter.
    #[inline]
    pub(crate) fn fetch(&self) -> Result<u16, ExecutionFault> {
        self.ram.read_word(self.pc as usize)
    }

    fn resume_key_wait(&mut self, quirks: &Quirks, vx: u8, key: Option<KeyCode>) -> Flow {
        match key {
            Some(key) if !(quirks.key_release_wait && self.keys.is_pressed(key)) => {
                self.set_v(vx, key.as_u8());
                self.state = ExecState::Running;
                Flow::Ok
            }
            _ => Flow::KeyWait,
        }
    }

    /// Validate that an instruction can be fetched from the target address.
    #[inline]
    fn jump_target(target: usize) -> Result<Address, ExecutionFault> {
        if target + 1 < MEM_SIZE {
            Ok(target as Address)
        } else {
            Err(ExecutionFault::OutOfBounds { addr: target })
        }
    }

    #[inline(always)]
    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    /// Execute a decoded instruction located at `at`.
    ///
    /// The program counter has already been advanced past it.
    fn execute<R: RngCore>(
        &mut self,
        op: Op,
        at: Address,
        quirks: &Quirks,
        rng: &mut R,
    ) -> Result<Flow, ExecutionFault> {
        let mut control_flow = Flow::Ok;

        match op {
            Op::Sys { .. } => { /* No Op */ }
            Op::ClearScreen => {
                self.display.clear();
                control_flow = Flow::Draw;
            }
            // Set the program counter to the value at the top of the stack.
            Op::Return => {
                self.pc = self.stack.pop(at)?;
                control_flow = Flow::Jump;
            }
            Op::JumpAddress { address } => {
                self.pc = Self::jump_target(address as usize)?;
                control_flow = Flow::Jump;
            }
            Op::Call { address } => {
                let target = Self::jump_target(address as usize)?;
                self.stack.push(self.pc, address)?;
                self.pc = target;
                control_flow = Flow::Jump;
            }
            Op::Skip_Eq_Byte { vx, nn } => self.skip_if(self.v(vx) == nn),
            Op::Skip_NotEq_Byte { vx, nn } => self.skip_if(self.v(vx) != nn),
            Op::Skip_Eq { vx, vy } => self.skip_if(self.v(vx) == self.v(vy)),
            Op::Load_Byte { vx, nn } => self.set_v(vx, nn),
            Op::Add_Byte { vx, nn } => self.set_v(vx, self.v(vx).wrapping_add(nn)),

            // ----------------------------------------------------------------
            // Arithmetic
            //
            // The flag in VF is written after the result, so when VF is
            // the destination it ends up holding the flag.
            Op::Load_Vx_Vy { vx, vy } => self.set_v(vx, self.v(vy)),
            Op::Or_Vx_Vy { vx, vy } => self.exec_logic(vx, vy, quirks, |a, b| a | b),
            Op::And_Vx_Vy { vx, vy } => self.exec_logic(vx, vy, quirks, |a, b| a & b),
            Op::Xor_Vx_Vy { vx, vy } => self.exec_logic(vx, vy, quirks, |a, b| a ^ b),
            Op::Add_Vx_Vy { vx, vy } => {
                let (result, carry) = self.v(vx).overflowing_add(self.v(vy));
                self.set_v(vx, result);
                self.set_flag(carry);
            }
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::Sub_Vx_Vy { vx, vy } => {
                let (result, borrow) = self.v(vx).overflowing_sub(self.v(vy));
                self.set_v(vx, result);
                self.set_flag(!borrow);
            }
            Op::SubReverse_Vx_Vy { vx, vy } => {
                let (result, borrow) = self.v(vy).overflowing_sub(self.v(vx));
                self.set_v(vx, result);
                self.set_flag(!borrow);
            }
            // The bit shifted out is captured before shifting.
            Op::ShiftRight { vx, vy } => {
                let src = self.shift_source(vx, vy, quirks);
                self.set_v(vx, src >> 1);
                self.set_flag(src & 1 != 0);
            }
            Op::ShiftLeft { vx, vy } => {
                let src = self.shift_source(vx, vy, quirks);
                self.set_v(vx, src << 1);
                self.set_flag(src & 0x80 != 0);
            }
            Op::Skip_NotEq { vx, vy } => self.skip_if(self.v(vx) != self.v(vy)),

            Op::Load_Address { address } => self.address = address,
            Op::Jump_V0 { address } => {
                let offset = if quirks.jump_uses_vx {
                    self.v((address >> 8) as u8)
                } else {
                    self.v(0)
                };
                self.pc = Self::jump_target(address as usize + offset as usize)?;
                control_flow = Flow::Jump;
            }
            Op::Random { vx, nn } => self.set_v(vx, rng.gen::<u8>() & nn),
            // If the drawing operation erases existing pixels in the display buffer, register VF is set to
            // 1, and set to 0 if no display bits are unset. This is used for collision detection.
            Op::Draw { vx, vy, n } => {
                let (x, y) = (self.v(vx), self.v(vy));
                let sprite = self.ram.slice(self.address as usize, n as usize)?;
                let is_erased = self.display.draw_sprite(x, y, sprite, quirks.wrap_sprites);
                self.set_flag(is_erased);
                control_flow = Flow::Draw;
            }

            // ----------------------------------------------------------------
            // Keyboard
            //
            // Only the lower nibble of Vx selects the key.
            Op::Skip_Key { vx } => self.skip_if(self.keys.is_pressed(key_of(self.v(vx)))),
            Op::Skip_NotKey { vx } => self.skip_if(!self.keys.is_pressed(key_of(self.v(vx)))),

            // ----------------------------------------------------------------
            // Misc
            Op::Load_Vx_Delay { vx } => self.set_v(vx, self.timers.delay),
            // All execution stops until a key is pressed, then the value of that key is stored in Vx.
            Op::Wait_Key { vx } => {
                self.state = ExecState::WaitingForKey { vx, key: None };
                control_flow = Flow::KeyWait;
            }
            Op::Load_Delay_Vx { vx } => self.timers.delay = self.v(vx),
            Op::Load_Sound_Vx { vx } => {
                self.timers.sound = self.v(vx);
                control_flow = Flow::Sound;
            }
            Op::Add_I_Vx { vx } => {
                self.address = self.address.wrapping_add(self.v(vx) as Address);
            }
            Op::Load_Glyph { vx } => self.address = glyph_address(self.v(vx)),
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            Op::Store_Bcd { vx } => {
                let x = self.v(vx);
                let dst = self.ram.slice_mut(self.address as usize, 3)?;
                dst.copy_from_slice(&[x / 100, x / 10 % 10, x % 10]);
            }
            Op::Store_Registers { vx } => {
                let count = vx as usize + 1;
                let dst = self.ram.slice_mut(self.address as usize, count)?;
                dst.copy_from_slice(&self.registers[..count]);
                self.advance_index(count, quirks);
            }
            Op::Load_Registers { vx } => {
                let count = vx as usize + 1;
                let src = self.ram.slice(self.address as usize, count)?;
                self.registers[..count].copy_from_slice(src);
                self.advance_index(count, quirks);
            }
        }

        Ok(control_flow)
    }

    /// `8xy1`, `8xy2` and `8xy3`.
    #[inline]
    fn exec_logic(&mut self, vx: u8, vy: u8, quirks: &Quirks, f: impl Fn(u8, u8) -> u8) {
        self.set_v(vx, f(self.v(vx), self.v(vy)));
        if quirks.logic_resets_vf {
            self.set_flag(false);
        }
    }

    #[inline(always)]
    fn shift_source(&self, vx: u8, vy: u8, quirks: &Quirks) -> u8 {
        if quirks.shift_uses_vy {
            self.v(vy)
        } else {
            self.v(vx)
        }
    }

    #[inline(always)]
    fn advance_index(&mut self, count: usize, quirks: &Quirks) {
        if quirks.load_store_increments_index {
            self.address = self.address.wrapping_add(count as Address);
        }
    }
}

#[inline(always)]
fn key_of(value: u8) -> KeyCode {
    KeyCode::ALL[(value & 0xF) as usize]
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(at: Address, op: &Op) {
    log::trace!("{at:04X}: {op}");
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: Address, _: &Op) {}
