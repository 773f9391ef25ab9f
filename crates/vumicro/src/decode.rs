use crate::{
    Ins,
    opcodes::Mnemonic,
    table::{Group, Slot, Tables},
    usage::RegUsage,
};

/// Which half of an instruction pair a word belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Upper,
    Lower,
}

/// Result of walking the tables for an instruction word.
#[derive(Debug, Clone, Copy)]
pub struct Decoded<H> {
    /// `None` if the word selected an unknown slot.
    pub op: Option<Mnemonic>,
    pub handler: H,
}

impl<H: Copy> Tables<H> {
    /// Selects the handler for `ins`.
    ///
    /// The upper pipeline takes at most two lookups, the lower pipeline at most three.
    #[inline]
    pub fn decode(&self, ins: Ins, pipeline: Pipeline) -> Decoded<H> {
        let mut slot = match pipeline {
            Pipeline::Upper => self.upper[ins.op().value() as usize],
            Pipeline::Lower => self.lower[ins.class().value() as usize],
        };

        loop {
            match slot {
                Slot::Op(op, handler) => {
                    return Decoded {
                        op: Some(op),
                        handler,
                    };
                }
                Slot::Unknown(handler) => return Decoded { op: None, handler },
                Slot::Group(group) => slot = self.group_slot(group, ins),
            }
        }
    }

    #[inline(always)]
    fn group_slot(&self, group: Group, ins: Ins) -> Slot<H> {
        let ext = ins.fd().value() as usize;
        match group {
            Group::UpperFd(table) => self.upper_fd[table as usize][ext],
            Group::LowerOp => self.lower_op[ins.op().value() as usize],
            Group::LowerT3(table) => self.lower_t3[table as usize][ext],
        }
    }
}

/// Computes the register usage of `ins`. Unknown words use no registers.
pub fn analyze(ins: Ins, pipeline: Pipeline) -> RegUsage {
    let decoded = crate::table::analysis().decode(ins, pipeline);
    (decoded.handler)(ins)
}

/// The mnemonic `ins` decodes to, if any.
pub fn mnemonic(ins: Ins, pipeline: Pipeline) -> Option<Mnemonic> {
    crate::table::analysis().decode(ins, pipeline).op
}
