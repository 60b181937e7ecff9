use std::ops::Range;
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::decode::{
    decode, AddressOp, ImmediateOp, NoOperandOp, Operation, PairOp, Register, RegisterOp,
    SpriteOp,
};
use crate::device::{Display, Keyboard, Signal};
use crate::error::{Fault, FaultKind, LoadError, RunError};
use crate::output;

/// CHIP-8 can address 4KB of memory.
pub const MEMORY_SIZE: usize = 0x1000;
/// Programs are loaded here, everything below belongs to the interpreter.
pub const PROGRAM_START: u16 = 0x200;
pub const STACK_SIZE: usize = 16;
/// Fixed so that runs are reproducible.
pub const DEFAULT_SEED: u64 = 42;
/// Timers count down at 60Hz.
pub const TICK: Duration = Duration::from_micros(16_667);

/// Hex digit glyphs `0`..`F`, 5 bytes each, loaded at address 0.
pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
const GLYPH_SIZE: u16 = 5;

#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
    /// Seed for `RND`.
    pub seed: u64,
    /// Print every executed instruction to stderr.
    pub trace: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            trace: false,
        }
    }
}

/// Represents complete machine state during runtime.
pub struct Machine {
    /// System memory, font at the bottom and program from 0x200.
    mem: Box<[u8; MEMORY_SIZE]>,
    /// `V0`..`VF`
    reg: [u8; 16],
    /// Index register
    i: u16,
    /// Program counter
    pc: u16,
    /// Amount of used stack slots
    sp: u8,
    /// Return addresses
    stack: [u16; STACK_SIZE],
    delay: u8,
    sound: u8,
    rng: StdRng,
    trace: bool,
}

impl Machine {
    pub fn new(image: &[u8]) -> Result<Machine, LoadError> {
        Self::with_options(image, RunOptions::default())
    }

    pub fn with_options(image: &[u8], options: RunOptions) -> Result<Machine, LoadError> {
        let start = PROGRAM_START as usize;
        if image.len() > MEMORY_SIZE - start {
            return Err(LoadError::TooLarge { len: image.len() });
        }

        let mut mem = Box::new([0; MEMORY_SIZE]);
        mem[..FONT.len()].copy_from_slice(&FONT);
        mem[start..start + image.len()].copy_from_slice(image);

        Ok(Machine {
            mem,
            reg: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            sp: 0,
            stack: [0; STACK_SIZE],
            delay: 0,
            sound: 0,
            rng: StdRng::seed_from_u64(options.seed),
            trace: options.trace,
        })
    }

    /// Run until the keyboard reports a quit or the machine faults.
    ///
    /// Each iteration executes one instruction, polls input, presents the frame and then counts
    /// the timers down by the 60Hz ticks that passed in real time.
    pub fn run<D, K>(&mut self, display: &mut D, keyboard: &mut K) -> Result<(), RunError>
    where
        D: Display + ?Sized,
        K: Keyboard + ?Sized,
    {
        let mut clock = TickClock::new(Instant::now());
        loop {
            if self.step(display, keyboard)? == Signal::Quit {
                return Ok(());
            }
            if keyboard.poll()? == Signal::Quit {
                return Ok(());
            }
            display.present()?;
            let ticks = clock.advance(Instant::now());
            self.decay_timers(ticks);
        }
    }

    /// Fetch, decode and execute a single instruction.
    pub fn step<D, K>(&mut self, display: &mut D, keyboard: &mut K) -> Result<Signal, RunError>
    where
        D: Display + ?Sized,
        K: Keyboard + ?Sized,
    {
        let addr = self.pc;
        let pc = addr as usize;
        // Both bytes of the instruction must be in memory
        if pc + 1 >= MEMORY_SIZE {
            return Err(Fault {
                kind: FaultKind::PcOutOfBounds,
                address: addr,
            }
            .into());
        }
        let raw = [self.mem[pc], self.mem[pc + 1]];
        let op = decode(raw[0], raw[1]);
        if self.trace {
            output::trace(addr, raw, &op);
        }
        // PC incremented before instruction is performed
        self.pc += 2;
        self.execute(addr, op, display, keyboard)
    }

    fn execute<D, K>(
        &mut self,
        addr: u16,
        op: Operation,
        display: &mut D,
        keyboard: &mut K,
    ) -> Result<Signal, RunError>
    where
        D: Display + ?Sized,
        K: Keyboard + ?Sized,
    {
        let fault = |kind| Fault {
            kind,
            address: addr,
        };

        match op {
            Operation::NoOperand(op) => match op {
                NoOperandOp::Cls => display.clear(),
                NoOperandOp::Ret => {
                    if self.sp == 0 {
                        return Err(fault(FaultKind::StackUnderflow).into());
                    }
                    self.sp -= 1;
                    self.pc = self.stack[self.sp as usize];
                }
            },
            Operation::AbsoluteAddress { op, target } => match op {
                AddressOp::Sys => (),
                AddressOp::Jp => self.pc = target,
                AddressOp::Call => {
                    if self.sp as usize >= STACK_SIZE {
                        return Err(fault(FaultKind::StackOverflow).into());
                    }
                    self.stack[self.sp as usize] = self.pc;
                    self.sp += 1;
                    self.pc = target;
                }
                AddressOp::LdI => self.i = target,
                AddressOp::JpV0 => self.pc = self.reg[0] as u16 + target,
            },
            Operation::RegisterImmediate { op, reg, imm } => {
                let vx = self.v(reg);
                match op {
                    ImmediateOp::Se => self.skip_if(vx == imm),
                    ImmediateOp::Sne => self.skip_if(vx != imm),
                    ImmediateOp::Ld => self.set_v(reg, imm),
                    // No carry flag, unlike `ADD Vx, Vy`
                    ImmediateOp::Add => self.set_v(reg, vx.wrapping_add(imm)),
                    ImmediateOp::Rnd => {
                        let byte: u8 = self.rng.gen();
                        self.set_v(reg, byte & imm);
                    }
                }
            }
            Operation::RegisterPair { op, x, y } => self.execute_pair(op, x, y),
            Operation::RegisterPairImmediate { op, x, y, imm } => match op {
                SpriteOp::Drw => {
                    let (vx, vy) = (self.v(x), self.v(y));
                    let rows = self.span(self.i, imm as usize).map_err(fault)?;
                    let collision = display.draw(vx, vy, &self.mem[rows]);
                    self.set_v(Register::VF, collision as u8);
                }
            },
            Operation::SingleRegister { op, reg } => {
                let vx = self.v(reg);
                match op {
                    RegisterOp::Skp => self.skip_if(keyboard.is_key_down(vx)),
                    RegisterOp::Sknp => self.skip_if(!keyboard.is_key_down(vx)),
                    RegisterOp::LdFromDelay => self.set_v(reg, self.delay),
                    RegisterOp::LdKey => match keyboard.wait_for_key()? {
                        Some(key) => self.set_v(reg, key),
                        None => return Ok(Signal::Quit),
                    },
                    RegisterOp::LdDelay => self.delay = vx,
                    RegisterOp::LdSound => self.sound = vx,
                    RegisterOp::AddI => self.i = self.i.wrapping_add(vx as u16),
                    RegisterOp::LdFont => self.i = vx as u16 * GLYPH_SIZE,
                    RegisterOp::LdBcd => {
                        let digits = self.span(self.i, 3).map_err(fault)?;
                        self.mem[digits].copy_from_slice(&[vx / 100, vx / 10 % 10, vx % 10]);
                    }
                    RegisterOp::StoreRange => {
                        let count = reg.index() + 1;
                        let dest = self.span(self.i, count).map_err(fault)?;
                        self.mem[dest].copy_from_slice(&self.reg[..count]);
                    }
                    RegisterOp::LoadRange => {
                        let count = reg.index() + 1;
                        let src = self.span(self.i, count).map_err(fault)?;
                        self.reg[..count].copy_from_slice(&self.mem[src]);
                    }
                }
            }
            Operation::Invalid { raw } => {
                return Err(fault(FaultKind::InvalidInstruction { raw }).into());
            }
        }
        Ok(Signal::Continue)
    }

    fn execute_pair(&mut self, op: PairOp, x: Register, y: Register) {
        let (vx, vy) = (self.v(x), self.v(y));
        match op {
            PairOp::Se => self.skip_if(vx == vy),
            PairOp::Sne => self.skip_if(vx != vy),
            PairOp::Ld => self.set_v(x, vy),
            PairOp::Or => self.set_v(x, vx | vy),
            PairOp::And => self.set_v(x, vx & vy),
            PairOp::Xor => self.set_v(x, vx ^ vy),
            // Flag is written first, so a result in `VF` overwrites it
            PairOp::Add => {
                let (res, carry) = vx.overflowing_add(vy);
                self.set_v(Register::VF, carry as u8);
                self.set_v(x, res);
            }
            // Flag means "no borrow"
            PairOp::Sub => {
                self.set_v(Register::VF, (vx >= vy) as u8);
                self.set_v(x, vx.wrapping_sub(vy));
            }
            PairOp::Subn => {
                self.set_v(Register::VF, (vy >= vx) as u8);
                self.set_v(x, vy.wrapping_sub(vx));
            }
            PairOp::Shr => {
                self.set_v(Register::VF, vx & 0x1);
                self.set_v(x, vx >> 1);
            }
            PairOp::Shl => {
                self.set_v(Register::VF, vx >> 7);
                self.set_v(x, vx << 1);
            }
        }
    }

    /// Range of `len` bytes of memory starting at `start`.
    fn span(&self, start: u16, len: usize) -> Result<Range<usize>, FaultKind> {
        let start = start as usize;
        let end = start + len;
        if end > MEMORY_SIZE {
            return Err(FaultKind::MemoryOutOfBounds {
                target: start.max(MEMORY_SIZE),
            });
        }
        Ok(start..end)
    }

    #[inline]
    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.pc += 2;
        }
    }

    #[inline]
    fn set_v(&mut self, reg: Register, value: u8) {
        self.reg[reg.index()] = value;
    }

    /// Count both timers down by `ticks`, stopping at zero.
    pub fn decay_timers(&mut self, ticks: u32) {
        let ticks = ticks.min(u8::MAX as u32) as u8;
        self.delay = self.delay.saturating_sub(ticks);
        self.sound = self.sound.saturating_sub(ticks);
    }

    pub fn v(&self, reg: Register) -> u8 {
        self.reg[reg.index()]
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.reg
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Return addresses currently on the stack, oldest first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp as usize]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound
    }

    pub fn mem(&self) -> &[u8] {
        &self.mem[..]
    }
}

/// Converts wall-clock time into 60Hz timer ticks.
#[derive(Clone, Copy, Debug)]
pub struct TickClock {
    last: Instant,
}

impl TickClock {
    pub fn new(now: Instant) -> Self {
        Self { last: now }
    }

    /// Whole ticks elapsed since the last call. The leftover fraction is kept for the next call.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.last);
        let ticks = u32::try_from(elapsed.as_micros() / TICK.as_micros()).unwrap_or(u32::MAX);
        self.last += TICK * ticks;
        ticks
    }
}
