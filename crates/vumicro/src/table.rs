use crate::opcodes::{AnalyzeFn, ExecFn, Execute, Mnemonic, Placement};
use std::sync::LazyLock;
use strum::VariantArray;

/// A nested table selected by a slot of an outer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    UpperFd(u8),
    LowerOp,
    LowerT3(u8),
}

#[derive(Debug, Clone, Copy)]
pub enum Slot<H> {
    Op(Mnemonic, H),
    Unknown(H),
    Group(Group),
}

/// The full set of dispatch tables of one VU, with handlers of type `H`.
///
/// Every slot is populated: slots without a mnemonic hold the unknown handler.
pub struct Tables<H> {
    pub(crate) upper: [Slot<H>; 1 << 6],
    pub(crate) upper_fd: [[Slot<H>; 1 << 5]; 4],
    pub(crate) lower: [Slot<H>; 1 << 7],
    pub(crate) lower_op: [Slot<H>; 1 << 6],
    pub(crate) lower_t3: [[Slot<H>; 1 << 5]; 4],
}

impl<H: Copy> Tables<H> {
    /// Builds the tables, placing `handler(op)` for every mnemonic and `unknown` everywhere else.
    ///
    /// # Panics
    /// Panics if two mnemonics share a slot.
    pub fn build(unknown: H, handler: impl Fn(Mnemonic) -> H) -> Box<Self> {
        let empty = Slot::Unknown(unknown);
        let mut tables = Box::new(Self {
            upper: [empty; 1 << 6],
            upper_fd: [[empty; 1 << 5]; 4],
            lower: [empty; 1 << 7],
            lower_op: [empty; 1 << 6],
            lower_t3: [[empty; 1 << 5]; 4],
        });

        for i in 0..4u8 {
            tables.upper[0x3C + i as usize] = Slot::Group(Group::UpperFd(i));
            tables.lower_op[0x3C + i as usize] = Slot::Group(Group::LowerT3(i));
        }
        tables.lower[0x40] = Slot::Group(Group::LowerOp);

        for &op in Mnemonic::VARIANTS {
            let slot = tables.slot_mut(op.placement());
            assert!(
                matches!(slot, Slot::Unknown(_)),
                "{op} placed over an occupied slot"
            );

            *slot = Slot::Op(op, handler(op));
        }

        tables
    }

    fn slot_mut(&mut self, placement: Placement) -> &mut Slot<H> {
        match placement {
            Placement::Upper(i) => &mut self.upper[i as usize],
            Placement::UpperFd(t, i) => &mut self.upper_fd[t as usize][i as usize],
            Placement::Lower(i) => &mut self.lower[i as usize],
            Placement::LowerOp(i) => &mut self.lower_op[i as usize],
            Placement::LowerT3(t, i) => &mut self.lower_t3[t as usize][i as usize],
        }
    }
}

impl<E: Execute> Tables<ExecFn<E>> {
    /// Builds the execution tables of an [`Execute`] implementation.
    pub fn exec() -> Box<Self> {
        Self::build(<E as Execute>::unknown as ExecFn<E>, Mnemonic::executor::<E>)
    }
}

static ANALYSIS: LazyLock<Box<Tables<AnalyzeFn>>> =
    LazyLock::new(|| Tables::build(crate::usage::unknown as AnalyzeFn, Mnemonic::analyzer));

/// The register usage tables.
pub fn analysis() -> &'static Tables<AnalyzeFn> {
    &ANALYSIS
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{NopExecutor, opcodes::Placement};

    #[test]
    fn every_mnemonic_is_reachable() {
        let tables = Tables::<ExecFn<NopExecutor>>::exec();
        for &op in Mnemonic::VARIANTS {
            let slot = match op.placement() {
                Placement::Upper(i) => tables.upper[i as usize],
                Placement::UpperFd(t, i) => tables.upper_fd[t as usize][i as usize],
                Placement::Lower(i) => tables.lower[i as usize],
                Placement::LowerOp(i) => tables.lower_op[i as usize],
                Placement::LowerT3(t, i) => tables.lower_t3[t as usize][i as usize],
            };

            assert!(matches!(slot, Slot::Op(found, _) if found == op));
        }
    }

    #[test]
    fn group_selectors() {
        let tables = analysis();
        assert!(matches!(tables.upper[0x3C], Slot::Group(Group::UpperFd(0))));
        assert!(matches!(tables.upper[0x3F], Slot::Group(Group::UpperFd(3))));
        assert!(matches!(tables.lower[0x40], Slot::Group(Group::LowerOp)));
        assert!(matches!(tables.lower_op[0x3D], Slot::Group(Group::LowerT3(1))));
        assert!(matches!(tables.lower[0x41], Slot::Unknown(_)));
    }
}
