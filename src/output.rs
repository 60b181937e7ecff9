use std::fmt::Write as _;
use std::path::Path;

use colored::Colorize;

use crate::decode::Operation;
use crate::runtime::Machine;

#[derive(Clone, Copy, Debug)]
pub enum MsgColor {
    Green,
    Cyan,
    Red,
}

/// Print a status line with `left` right-aligned and colored, eg. `     Running emitted binary`.
pub fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    // Status goes to stderr so that stdout can be piped
    eprintln!("{left:>12} {right}");
}

pub fn file_message(color: MsgColor, left: &str, path: &Path) {
    let right = format!("target {}", path.display());
    message(color, left, &right);
}

/// Print an executed instruction to stderr.
pub fn trace(address: u16, raw: [u8; 2], op: &Operation) {
    eprintln!(
        "{:>12} 0x{:03x}  {:02x}{:02x}  {}",
        "Trace".blue(),
        address,
        raw[0],
        raw[1],
        op
    );
}

/// Render registers, index, program counter, stack and timers.
pub fn format_state(state: &Machine) -> String {
    let mut out = String::new();
    for (i, value) in state.registers().iter().enumerate() {
        let sep = if i % 8 == 7 { '\n' } else { ' ' };
        let _ = write!(out, "V{:X}=0x{:02x}{}", i, value, sep);
    }
    let _ = writeln!(
        out,
        "I=0x{:03x} PC=0x{:04x} SP={}",
        state.i(),
        state.pc(),
        state.sp()
    );
    let stack: Vec<String> = state
        .stack()
        .iter()
        .map(|addr| format!("0x{:03x}", addr))
        .collect();
    let _ = writeln!(out, "stack[{}]", stack.join(", "));
    let _ = writeln!(
        out,
        "DT={} ST={}",
        state.delay_timer(),
        state.sound_timer()
    );
    out
}

pub fn print_state(state: &Machine) {
    eprintln!("{}", "------ Machine state ------".dimmed());
    eprint!("{}", format_state(state));
    eprintln!("{}", "---------------------------".dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_fresh_state() {
        let machine = Machine::new(&[0x00, 0xE0]).unwrap();
        let expected = "\
V0=0x00 V1=0x00 V2=0x00 V3=0x00 V4=0x00 V5=0x00 V6=0x00 V7=0x00
V8=0x00 V9=0x00 VA=0x00 VB=0x00 VC=0x00 VD=0x00 VE=0x00 VF=0x00
I=0x000 PC=0x0200 SP=0
stack[]
DT=0 ST=0
";
        assert_eq!(format_state(&machine), expected);
    }
}
