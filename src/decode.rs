use std::fmt;

/// General purpose register `V0`..`VF`.
///
/// `VF` doubles as the flag register and is overwritten by arithmetic, shifts and draws.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Register(u8);

impl Register {
    pub const V0: Register = Register(0x0);
    pub const VF: Register = Register(0xF);

    /// Only the low nibble is kept, so every value names a valid register.
    pub fn from_nibble(nibble: u8) -> Self {
        Register(nibble & 0xF)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:X}", self.0)
    }
}

/// Instructions with no operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NoOperandOp {
    /// `00E0`
    Cls,
    /// `00EE`
    Ret,
}

/// Instructions taking a 12-bit absolute address `NNN`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressOp {
    /// `0NNN`, machine code routine. Ignored by the interpreter.
    Sys,
    /// `1NNN`
    Jp,
    /// `2NNN`
    Call,
    /// `ANNN`
    LdI,
    /// `BNNN`, target is offset by `V0` at run time.
    JpV0,
}

/// Instructions taking a register and an 8-bit immediate, `XNN`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImmediateOp {
    /// `3XNN`
    Se,
    /// `4XNN`
    Sne,
    /// `6XNN`
    Ld,
    /// `7XNN`
    Add,
    /// `CXNN`
    Rnd,
}

/// Instructions taking two registers, `XY`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PairOp {
    /// `5XY0`
    Se,
    /// `8XY0`
    Ld,
    /// `8XY1`
    Or,
    /// `8XY2`
    And,
    /// `8XY3`
    Xor,
    /// `8XY4`
    Add,
    /// `8XY5`
    Sub,
    /// `8XY6`
    Shr,
    /// `8XY7`
    Subn,
    /// `8XYE`
    Shl,
    /// `9XY0`
    Sne,
}

/// Instructions taking two registers and a 4-bit count, `XYN`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpriteOp {
    /// `DXYN`
    Drw,
}

/// Instructions taking a single register, `X`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegisterOp {
    /// `EX9E`
    Skp,
    /// `EXA1`
    Sknp,
    /// `FX07`
    LdFromDelay,
    /// `FX0A`
    LdKey,
    /// `FX15`
    LdDelay,
    /// `FX18`
    LdSound,
    /// `FX1E`
    AddI,
    /// `FX29`
    LdFont,
    /// `FX33`
    LdBcd,
    /// `FX55`
    StoreRange,
    /// `FX65`
    LoadRange,
}

/// A decoded instruction.
///
/// Variants describe the operand shape; the inner `*Op` enum names the instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operation {
    NoOperand(NoOperandOp),
    AbsoluteAddress {
        op: AddressOp,
        target: u16,
    },
    RegisterImmediate {
        op: ImmediateOp,
        reg: Register,
        imm: u8,
    },
    RegisterPair {
        op: PairOp,
        x: Register,
        y: Register,
    },
    RegisterPairImmediate {
        op: SpriteOp,
        x: Register,
        y: Register,
        imm: u8,
    },
    SingleRegister {
        op: RegisterOp,
        reg: Register,
    },
    /// Unrecognized bit pattern. Data to the disassembler, a fault to the interpreter.
    Invalid {
        raw: [u8; 2],
    },
}

/// Decode one instruction from its two bytes.
///
/// Every input decodes to something; unknown encodings become [`Operation::Invalid`].
pub fn decode(b1: u8, b2: u8) -> Operation {
    let family = b1 >> 4;
    let x = Register::from_nibble(b1 & 0xF);
    let y = Register::from_nibble(b2 >> 4);
    let n = b2 & 0xF;
    let nnn = ((b1 as u16 & 0xF) << 8) | b2 as u16;

    let address = |op| Operation::AbsoluteAddress { op, target: nnn };
    let immediate = |op| Operation::RegisterImmediate {
        op,
        reg: x,
        imm: b2,
    };
    let pair = |op| Operation::RegisterPair { op, x, y };
    let single = |op| Operation::SingleRegister { op, reg: x };

    match (family, b1 & 0xF, b2) {
        (0x0, 0x0, 0xE0) => Operation::NoOperand(NoOperandOp::Cls),
        (0x0, 0x0, 0xEE) => Operation::NoOperand(NoOperandOp::Ret),
        (0x0, _, _) => address(AddressOp::Sys),
        (0x1, _, _) => address(AddressOp::Jp),
        (0x2, _, _) => address(AddressOp::Call),
        (0x3, _, _) => immediate(ImmediateOp::Se),
        (0x4, _, _) => immediate(ImmediateOp::Sne),
        (0x5, _, _) if n == 0x0 => pair(PairOp::Se),
        (0x6, _, _) => immediate(ImmediateOp::Ld),
        (0x7, _, _) => immediate(ImmediateOp::Add),
        (0x8, _, _) => match n {
            0x0 => pair(PairOp::Ld),
            0x1 => pair(PairOp::Or),
            0x2 => pair(PairOp::And),
            0x3 => pair(PairOp::Xor),
            0x4 => pair(PairOp::Add),
            0x5 => pair(PairOp::Sub),
            0x6 => pair(PairOp::Shr),
            0x7 => pair(PairOp::Subn),
            0xE => pair(PairOp::Shl),
            _ => Operation::Invalid { raw: [b1, b2] },
        },
        (0x9, _, _) if n == 0x0 => pair(PairOp::Sne),
        (0xA, _, _) => address(AddressOp::LdI),
        (0xB, _, _) => address(AddressOp::JpV0),
        (0xC, _, _) => immediate(ImmediateOp::Rnd),
        (0xD, _, _) => Operation::RegisterPairImmediate {
            op: SpriteOp::Drw,
            x,
            y,
            imm: n,
        },
        (0xE, _, 0x9E) => single(RegisterOp::Skp),
        (0xE, _, 0xA1) => single(RegisterOp::Sknp),
        (0xF, _, 0x07) => single(RegisterOp::LdFromDelay),
        (0xF, _, 0x0A) => single(RegisterOp::LdKey),
        (0xF, _, 0x15) => single(RegisterOp::LdDelay),
        (0xF, _, 0x18) => single(RegisterOp::LdSound),
        (0xF, _, 0x1E) => single(RegisterOp::AddI),
        (0xF, _, 0x29) => single(RegisterOp::LdFont),
        (0xF, _, 0x33) => single(RegisterOp::LdBcd),
        (0xF, _, 0x55) => single(RegisterOp::StoreRange),
        (0xF, _, 0x65) => single(RegisterOp::LoadRange),
        _ => Operation::Invalid { raw: [b1, b2] },
    }
}

impl Operation {
    /// Assembly mnemonic, or `None` for [`Operation::Invalid`].
    pub fn mnemonic(&self) -> Option<&'static str> {
        let name = match self {
            Self::NoOperand(op) => match op {
                NoOperandOp::Cls => "CLS",
                NoOperandOp::Ret => "RET",
            },
            Self::AbsoluteAddress { op, .. } => match op {
                AddressOp::Sys => "SYS",
                AddressOp::Jp | AddressOp::JpV0 => "JP",
                AddressOp::Call => "CALL",
                AddressOp::LdI => "LD",
            },
            Self::RegisterImmediate { op, .. } => match op {
                ImmediateOp::Se => "SE",
                ImmediateOp::Sne => "SNE",
                ImmediateOp::Ld => "LD",
                ImmediateOp::Add => "ADD",
                ImmediateOp::Rnd => "RND",
            },
            Self::RegisterPair { op, .. } => match op {
                PairOp::Se => "SE",
                PairOp::Ld => "LD",
                PairOp::Or => "OR",
                PairOp::And => "AND",
                PairOp::Xor => "XOR",
                PairOp::Add => "ADD",
                PairOp::Sub => "SUB",
                PairOp::Shr => "SHR",
                PairOp::Subn => "SUBN",
                PairOp::Shl => "SHL",
                PairOp::Sne => "SNE",
            },
            Self::RegisterPairImmediate { op, .. } => match op {
                SpriteOp::Drw => "DRW",
            },
            Self::SingleRegister { op, .. } => match op {
                RegisterOp::Skp => "SKP",
                RegisterOp::Sknp => "SKNP",
                RegisterOp::AddI => "ADD",
                RegisterOp::LdFromDelay
                | RegisterOp::LdKey
                | RegisterOp::LdDelay
                | RegisterOp::LdSound
                | RegisterOp::LdFont
                | RegisterOp::LdBcd
                | RegisterOp::StoreRange
                | RegisterOp::LoadRange => "LD",
            },
            Self::Invalid { .. } => return None,
        };
        Some(name)
    }

    /// Write the instruction, resolving absolute targets through `label`.
    ///
    /// Targets without a label are written as `@0xNNN`.
    pub fn render<F>(&self, f: &mut impl fmt::Write, label: F) -> fmt::Result
    where
        F: Fn(AddressOp, u16) -> Option<String>,
    {
        let Some(mnemonic) = self.mnemonic() else {
            let Self::Invalid { raw } = self else {
                unreachable!("only invalid operations have no mnemonic");
            };
            return write!(f, "0x{:02x}{:02x}", raw[0], raw[1]);
        };
        match *self {
            Self::NoOperand(_) => write!(f, "{}", mnemonic),
            Self::AbsoluteAddress { op, target } => match label(op, target) {
                Some(name) => write!(f, "{:<4}  {}", mnemonic, name),
                None => write!(f, "{:<4}  @0x{:03x}", mnemonic, target),
            },
            Self::RegisterImmediate { reg, imm, .. } => {
                write!(f, "{:<4}  {}, 0x{:02x}", mnemonic, reg, imm)
            }
            Self::RegisterPair { x, y, .. } => write!(f, "{:<4}  {}, {}", mnemonic, x, y),
            Self::RegisterPairImmediate { x, y, imm, .. } => {
                write!(f, "{:<4}  {}, {}, 0x{:x}", mnemonic, x, y, imm)
            }
            Self::SingleRegister { reg, .. } => write!(f, "{:<4}  {}", mnemonic, reg),
            Self::Invalid { .. } => unreachable!("handled above"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, |_, _| None)
    }
}
