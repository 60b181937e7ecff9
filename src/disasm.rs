use std::fmt::{self, Write as _};
use std::io;

use fxhash::FxBuildHasher;
use indexmap::IndexSet;

use crate::decode::{decode, AddressOp, Operation};
use crate::runtime::PROGRAM_START;

type FxSet<T> = IndexSet<T, FxBuildHasher>;

/// Names generated for jump and call targets.
///
/// Each namespace numbers its targets in the order they are first referenced, NOT by address.
/// An address that is both jumped to and called gets one name in each namespace.
#[derive(Debug, Default)]
pub struct LabelTable {
    jumps: FxSet<u16>,
    calls: FxSet<u16>,
}

impl LabelTable {
    /// Collect targets of `JP addr` and `CALL addr` from decoded instructions, in order.
    pub fn resolve<'a>(ops: impl IntoIterator<Item = &'a Operation>) -> Self {
        let mut table = Self::default();
        for op in ops {
            if let Operation::AbsoluteAddress { op, target } = *op {
                match op {
                    AddressOp::Jp => {
                        table.jumps.insert(target);
                    }
                    AddressOp::Call => {
                        table.calls.insert(target);
                    }
                    // `JP V0, addr` is only known at run time
                    AddressOp::Sys | AddressOp::LdI | AddressOp::JpV0 => (),
                }
            }
        }
        table
    }

    pub fn jump_label(&self, target: u16) -> Option<String> {
        self.jumps
            .get_index_of(&target)
            .map(|index| format!("label{}", index))
    }

    pub fn call_label(&self, target: u16) -> Option<String> {
        self.calls
            .get_index_of(&target)
            .map(|index| format!("subroutine{}", index))
    }

    /// Label used when `op` refers to `target`.
    fn for_operand(&self, op: AddressOp, target: u16) -> Option<String> {
        match op {
            AddressOp::Jp => self.jump_label(target),
            AddressOp::Call => self.call_label(target),
            AddressOp::Sys | AddressOp::LdI | AddressOp::JpV0 => None,
        }
    }

    /// Labels defined at `address`, jump label first.
    fn at(&self, address: u32) -> impl Iterator<Item = String> + '_ {
        let address = u16::try_from(address).ok();
        let jump = address.and_then(|addr| self.jump_label(addr));
        let call = address.and_then(|addr| self.call_label(addr));
        jump.into_iter().chain(call)
    }
}

/// Decoded program listing.
#[derive(Debug)]
pub struct Disassembly {
    /// Address and instruction, ascending by address.
    entries: Vec<(u32, Operation)>,
    labels: LabelTable,
}

/// Decode `image` as if loaded at 0x200.
///
/// A trailing odd byte is dropped.
pub fn disassemble(image: &[u8]) -> Disassembly {
    let entries: Vec<(u32, Operation)> = image
        .chunks_exact(2)
        .enumerate()
        .map(|(i, word)| {
            let address = PROGRAM_START as u32 + 2 * i as u32;
            (address, decode(word[0], word[1]))
        })
        .collect();
    let labels = LabelTable::resolve(entries.iter().map(|(_, op)| op));
    Disassembly { entries, labels }
}

impl Disassembly {
    pub fn entries(&self) -> &[(u32, Operation)] {
        &self.entries
    }

    pub fn write_to(&self, writer: &mut impl io::Write) -> io::Result<()> {
        write!(writer, "{}", self)
    }
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "start:")?;
        let mut line = String::new();
        for (address, op) in &self.entries {
            for label in self.labels.at(*address) {
                writeln!(f, "{}:", label)?;
            }
            line.clear();
            op.render(&mut line, |op, target| self.labels.for_operand(op, target))?;
            writeln!(f, "    {}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(words: &[u16]) -> String {
        let image: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
        disassemble(&image).to_string()
    }

    #[test]
    fn labels_follow_first_reference() {
        // Jumps reference 0x206 before 0x202
        let out = listing(&[0x1206, 0x1202, 0x1206, 0x00E0]);
        let expected = "\
start:
    JP    label0
label1:
    JP    label1
    JP    label0
label0:
    CLS
";
        assert_eq!(out, expected);
    }

    #[test]
    fn calls_use_their_own_namespace() {
        let out = listing(&[0x2204, 0x1204, 0x00EE]);
        let expected = "\
start:
    CALL  subroutine0
    JP    label0
label0:
subroutine0:
    RET
";
        assert_eq!(out, expected);
    }

    #[test]
    fn computed_targets_stay_raw() {
        let out = listing(&[0xB202, 0xA202, 0x0202]);
        let expected = "\
start:
    JP    @0x202
    LD    @0x202
    SYS   @0x202
";
        assert_eq!(out, expected);
    }

    #[test]
    fn renders_every_shape() {
        let out = listing(&[0x00E0, 0x3A0F, 0x8AB5, 0xD12F, 0xF20A, 0x5121, 0x1FFF]);
        let expected = "\
start:
    CLS
    SE    VA, 0x0f
    SUB   VA, VB
    DRW   V1, V2, 0xf
    LD    V2
    0x5121
    JP    label0
";
        assert_eq!(out, expected);
    }

    #[test]
    fn drops_trailing_byte() {
        let disassembly = disassemble(&[0x00, 0xE0, 0x12]);
        assert_eq!(disassembly.entries().len(), 1);
        assert_eq!(disassemble(&[0x12]).to_string(), "start:\n");
        assert_eq!(disassemble(&[]).entries().len(), 0);
    }

    #[test]
    fn output_is_stable() {
        let image: Vec<u8> = (0..=255u8).rev().cycle().take(1000).collect();
        let first = disassemble(&image).to_string();
        let second = disassemble(&image).to_string();
        assert_eq!(first, second);

        let mut bytes = Vec::new();
        disassemble(&image).write_to(&mut bytes).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), first);
    }

    #[test]
    fn label_table_lookup() {
        let ops = [
            decode(0x13, 0x00),
            decode(0x22, 0x00),
            decode(0x12, 0x00),
            decode(0x23, 0x00),
        ];
        let table = LabelTable::resolve(&ops);
        assert_eq!(table.jump_label(0x300).as_deref(), Some("label0"));
        assert_eq!(table.jump_label(0x200).as_deref(), Some("label1"));
        assert_eq!(table.call_label(0x200).as_deref(), Some("subroutine0"));
        assert_eq!(table.call_label(0x300).as_deref(), Some("subroutine1"));
        assert_eq!(table.jump_label(0x400), None);
    }
}
