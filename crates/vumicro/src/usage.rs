//! Register dependency analysis of micro instructions.
//!
//! Every mnemonic has an analyzer here, selected through the same tables as its execution
//! handler. The results feed instruction scheduling: which pipeline an instruction occupies,
//! which registers it reads and writes and how long its result takes to be available.
use crate::ins::{Dest, Ins};
use bitos::{bitos, integer::u2};

/// Execution unit an instruction is issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pipe {
    #[default]
    None,
    Fmac,
    Fdiv,
    Efu,
    Ialu,
    Branch,
    Xgkick,
}

/// Special registers and flag sets.
#[bitos(8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Specials {
    #[bits(0)]
    pub acc: bool,
    #[bits(1)]
    pub q: bool,
    #[bits(2)]
    pub p: bool,
    #[bits(3)]
    pub i: bool,
    #[bits(4)]
    pub r: bool,
    #[bits(5)]
    pub status: bool,
    #[bits(6)]
    pub mac: bool,
    #[bits(7)]
    pub clip: bool,
}

/// Access to a floating point register, restricted to some components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VfAccess {
    pub reg: u8,
    pub mask: Dest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegUsage {
    pub pipe: Pipe,
    pub vf_write: Option<VfAccess>,
    pub vf_read: [Option<VfAccess>; 2],
    /// Bitmask of integer registers read.
    pub vi_read: u16,
    /// Bitmask of integer registers written.
    pub vi_write: u16,
    pub reads: Specials,
    pub writes: Specials,
    /// Latency of the result, in cycles.
    pub cycles: u8,
}

impl RegUsage {
    fn new(pipe: Pipe) -> Self {
        Self {
            pipe,
            ..Default::default()
        }
    }

    /// `vf0` is hardwired, writes to it are discarded.
    fn write_vf(mut self, reg: u8, mask: Dest) -> Self {
        if reg != 0 && !mask.is_empty() {
            self.vf_write = Some(VfAccess { reg, mask });
        }
        self
    }

    fn read_vf(mut self, reg: u8, mask: Dest) -> Self {
        let access = Some(VfAccess { reg, mask });
        if self.vf_read[0].is_none() {
            self.vf_read[0] = access;
        } else {
            self.vf_read[1] = access;
        }
        self
    }

    fn read_vi(mut self, reg: u8) -> Self {
        self.vi_read |= 1 << (reg & 0xF);
        self
    }

    /// `vi0` is hardwired, writes to it are discarded.
    fn write_vi(mut self, reg: u8) -> Self {
        self.vi_write |= (1 << (reg & 0xF)) & !1;
        self
    }

    fn reads(mut self, f: impl FnOnce(Specials) -> Specials) -> Self {
        self.reads = f(self.reads);
        self
    }

    fn writes(mut self, f: impl FnOnce(Specials) -> Specials) -> Self {
        self.writes = f(self.writes);
        self
    }

    fn cycles(mut self, cycles: u8) -> Self {
        self.cycles = cycles;
        self
    }

    /// Whether this usage depends on a register written by `earlier`.
    pub fn depends_on(&self, earlier: &RegUsage) -> bool {
        let vf_hazard = earlier.vf_write.is_some_and(|w| {
            self.vf_read.iter().flatten().any(|r| {
                r.reg == w.reg && (r.mask.to_bits().value() & w.mask.to_bits().value()) != 0
            })
        });

        let vi_hazard = self.vi_read & earlier.vi_write != 0;
        let special_hazard = self.reads.to_bits() & earlier.writes.to_bits() != 0;

        vf_hazard || vi_hazard || special_hazard
    }
}

#[inline(always)]
fn fd(ins: Ins) -> u8 {
    ins.fd().value()
}

#[inline(always)]
fn fs(ins: Ins) -> u8 {
    ins.fs().value()
}

#[inline(always)]
fn ft(ins: Ins) -> u8 {
    ins.ft().value()
}

fn arithmetic_flags(specials: Specials) -> Specials {
    specials.with_status(true).with_mac(true)
}

pub fn unknown(_: Ins) -> RegUsage {
    RegUsage::default()
}

pub fn nop(_: Ins) -> RegUsage {
    RegUsage::default()
}

// upper pipeline

pub fn fmac_bc(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(fd(ins), ins.dest())
        .read_vf(fs(ins), ins.dest())
        .read_vf(ft(ins), Dest::component(ins.bc()))
        .writes(arithmetic_flags)
}

pub fn fmac_bc_acc(ins: Ins) -> RegUsage {
    fmac_bc(ins).reads(|s| s.with_acc(true))
}

pub fn minmax_bc(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(fd(ins), ins.dest())
        .read_vf(fs(ins), ins.dest())
        .read_vf(ft(ins), Dest::component(ins.bc()))
}

pub fn fmac_q(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(fd(ins), ins.dest())
        .read_vf(fs(ins), ins.dest())
        .reads(|s| s.with_q(true))
        .writes(arithmetic_flags)
}

pub fn fmac_q_acc(ins: Ins) -> RegUsage {
    fmac_q(ins).reads(|s| s.with_acc(true))
}

pub fn fmac_i(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(fd(ins), ins.dest())
        .read_vf(fs(ins), ins.dest())
        .reads(|s| s.with_i(true))
        .writes(arithmetic_flags)
}

pub fn fmac_i_acc(ins: Ins) -> RegUsage {
    fmac_i(ins).reads(|s| s.with_acc(true))
}

pub fn minmax_i(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(fd(ins), ins.dest())
        .read_vf(fs(ins), ins.dest())
        .reads(|s| s.with_i(true))
}

pub fn fmac(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(fd(ins), ins.dest())
        .read_vf(fs(ins), ins.dest())
        .read_vf(ft(ins), ins.dest())
        .writes(arithmetic_flags)
}

pub fn fmac_acc(ins: Ins) -> RegUsage {
    fmac(ins).reads(|s| s.with_acc(true))
}

pub fn minmax(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(fd(ins), ins.dest())
        .read_vf(fs(ins), ins.dest())
        .read_vf(ft(ins), ins.dest())
}

pub fn opmsub(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(fd(ins), Dest::xyz())
        .read_vf(fs(ins), Dest::xyz())
        .read_vf(ft(ins), Dest::xyz())
        .reads(|s| s.with_acc(true))
        .writes(arithmetic_flags)
}

// upper pipeline, accumulator forms

pub fn acc_bc(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .read_vf(fs(ins), ins.dest())
        .read_vf(ft(ins), Dest::component(ins.bc()))
        .writes(|s| arithmetic_flags(s).with_acc(true))
}

pub fn acc_bc_acc(ins: Ins) -> RegUsage {
    acc_bc(ins).reads(|s| s.with_acc(true))
}

pub fn acc_q(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .read_vf(fs(ins), ins.dest())
        .reads(|s| s.with_q(true))
        .writes(|s| arithmetic_flags(s).with_acc(true))
}

pub fn acc_q_acc(ins: Ins) -> RegUsage {
    acc_q(ins).reads(|s| s.with_acc(true))
}

pub fn acc_i(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .read_vf(fs(ins), ins.dest())
        .reads(|s| s.with_i(true))
        .writes(|s| arithmetic_flags(s).with_acc(true))
}

pub fn acc_i_acc(ins: Ins) -> RegUsage {
    acc_i(ins).reads(|s| s.with_acc(true))
}

pub fn acc(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .read_vf(fs(ins), ins.dest())
        .read_vf(ft(ins), ins.dest())
        .writes(|s| arithmetic_flags(s).with_acc(true))
}

pub fn acc_acc(ins: Ins) -> RegUsage {
    acc(ins).reads(|s| s.with_acc(true))
}

pub fn opmula(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .read_vf(fs(ins), Dest::xyz())
        .read_vf(ft(ins), Dest::xyz())
        .writes(|s| arithmetic_flags(s).with_acc(true))
}

pub fn convert(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .write_vf(ft(ins), ins.dest())
        .read_vf(fs(ins), ins.dest())
}

pub fn clip(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .read_vf(fs(ins), Dest::xyz())
        .read_vf(ft(ins), Dest::component(u2::new(3)))
        .reads(|s| s.with_clip(true))
        .writes(|s| s.with_clip(true))
}

// lower pipeline, memory

pub fn load_quad(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .write_vf(ft(ins), ins.dest())
        .read_vi(fs(ins))
}

pub fn load_quad_update(ins: Ins) -> RegUsage {
    load_quad(ins).write_vi(fs(ins))
}

pub fn store_quad(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .read_vf(fs(ins), ins.dest())
        .read_vi(ft(ins))
}

pub fn store_quad_update(ins: Ins) -> RegUsage {
    store_quad(ins).write_vi(ft(ins))
}

pub fn load_int(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .read_vi(fs(ins))
        .write_vi(ft(ins))
}

pub fn store_int(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .read_vi(fs(ins))
        .read_vi(ft(ins))
}

// lower pipeline, integer

pub fn ialu(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Ialu)
        .read_vi(fs(ins))
        .read_vi(ft(ins))
        .write_vi(fd(ins))
}

pub fn ialu_imm(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Ialu)
        .read_vi(fs(ins))
        .write_vi(ft(ins))
}

pub fn move_to_int(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .read_vf(fs(ins), Dest::component(ins.fsf()))
        .write_vi(ft(ins))
}

pub fn move_from_int(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .read_vi(fs(ins))
        .write_vf(ft(ins), ins.dest())
}

pub fn vf_move(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fmac)
        .read_vf(fs(ins), ins.dest())
        .write_vf(ft(ins), ins.dest())
}

// lower pipeline, flags

pub fn clip_test(_: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .reads(|s| s.with_clip(true))
        .write_vi(1)
}

pub fn clip_get(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .reads(|s| s.with_clip(true))
        .write_vi(ft(ins))
}

pub fn clip_set(_: Ins) -> RegUsage {
    RegUsage::new(Pipe::None).writes(|s| s.with_clip(true))
}

pub fn status_test(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .reads(|s| s.with_status(true))
        .write_vi(ft(ins))
}

pub fn status_set(_: Ins) -> RegUsage {
    RegUsage::new(Pipe::None).writes(|s| s.with_status(true))
}

pub fn mac_test(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .reads(|s| s.with_mac(true))
        .read_vi(fs(ins))
        .write_vi(ft(ins))
}

// lower pipeline, branches

pub fn branch(_: Ins) -> RegUsage {
    RegUsage::new(Pipe::Branch)
}

pub fn branch_link(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Branch).write_vi(ft(ins))
}

pub fn jump(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Branch).read_vi(fs(ins))
}

pub fn jump_link(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Branch)
        .read_vi(fs(ins))
        .write_vi(ft(ins))
}

pub fn branch_compare(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Branch)
        .read_vi(fs(ins))
        .read_vi(ft(ins))
}

pub fn branch_zero(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Branch).read_vi(fs(ins))
}

// lower pipeline, divider

pub fn div(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fdiv)
        .read_vf(fs(ins), Dest::component(ins.fsf()))
        .read_vf(ft(ins), Dest::component(ins.ftf()))
        .writes(|s| s.with_q(true).with_status(true))
        .cycles(6)
}

pub fn sqrt(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fdiv)
        .read_vf(ft(ins), Dest::component(ins.ftf()))
        .writes(|s| s.with_q(true).with_status(true))
        .cycles(6)
}

pub fn rsqrt(ins: Ins) -> RegUsage {
    div(ins).cycles(12)
}

pub fn wait_q(_: Ins) -> RegUsage {
    RegUsage::new(Pipe::Fdiv).reads(|s| s.with_q(true))
}

// lower pipeline, random

pub fn random_get(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .write_vf(ft(ins), ins.dest())
        .reads(|s| s.with_r(true))
}

pub fn random_next(ins: Ins) -> RegUsage {
    random_get(ins).writes(|s| s.with_r(true))
}

pub fn random_set(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None)
        .read_vf(fs(ins), Dest::component(ins.fsf()))
        .writes(|s| s.with_r(true))
}

pub fn random_xor(ins: Ins) -> RegUsage {
    random_set(ins).reads(|s| s.with_r(true))
}

// lower pipeline, elementary function unit

pub fn move_from_p(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Efu)
        .write_vf(ft(ins), ins.dest())
        .reads(|s| s.with_p(true))
}

pub fn wait_p(_: Ins) -> RegUsage {
    RegUsage::new(Pipe::Efu).reads(|s| s.with_p(true))
}

macro_rules! efu {
    ($($name:ident: $operand:expr, $cycles:literal;)*) => {
        $(
            pub fn $name(ins: Ins) -> RegUsage {
                let operand: fn(Ins) -> Dest = $operand;
                RegUsage::new(Pipe::Efu)
                    .read_vf(fs(ins), operand(ins))
                    .writes(|s| s.with_p(true))
                    .cycles($cycles)
            }
        )*
    };
}

efu! {
    esadd: |_| Dest::xyz(), 10;
    ersadd: |_| Dest::xyz(), 17;
    eleng: |_| Dest::xyz(), 17;
    erleng: |_| Dest::xyz(), 23;
    eatanxy: |_| Dest::default().with_x(true).with_y(true), 53;
    eatanxz: |_| Dest::default().with_x(true).with_z(true), 53;
    esum: |_| Dest::xyzw(), 11;
    ercpr: |ins| Dest::component(ins.fsf()), 11;
    esqrt: |ins| Dest::component(ins.fsf()), 11;
    ersqrt: |ins| Dest::component(ins.fsf()), 17;
    esin: |ins| Dest::component(ins.fsf()), 28;
    eatan: |ins| Dest::component(ins.fsf()), 53;
    eexp: |ins| Dest::component(ins.fsf()), 43;
}

// lower pipeline, interface

pub fn xtop(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::None).write_vi(ft(ins))
}

pub fn xgkick(ins: Ins) -> RegUsage {
    RegUsage::new(Pipe::Xgkick).read_vi(fs(ins))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writes_to_hardwired_registers_are_dropped() {
        // ADD.xyzw vf0, vf1, vf2
        let usage = fmac(Ins::new(0x01E2_0828));
        assert_eq!(usage.vf_write, None);

        // IADD vi0, vi1, vi2
        let usage = ialu(Ins::new(0x8002_0830));
        assert_eq!(usage.vi_write, 0);
        assert_eq!(usage.vi_read, 0b110);
    }

    #[test]
    fn broadcast_reads_one_component() {
        // ADDy.xyzw vf3, vf1, vf2
        let usage = fmac_bc(Ins::new(0x01E2_08C1));
        let [first, second] = usage.vf_read;
        assert_eq!(first.map(|r| r.reg), Some(1));
        assert_eq!(
            second,
            Some(VfAccess {
                reg: 2,
                mask: Dest::default().with_y(true)
            })
        );
    }

    #[test]
    fn hazards() {
        // ADD.xyzw vf3, vf1, vf2 then MUL.x vf4, vf3, vf3
        let add = fmac(Ins::new(0x01E2_08E8));
        let mul = fmac(Ins::new(0x0103_192A));
        assert!(mul.depends_on(&add));
        assert!(!add.depends_on(&mul));

        let div = div(Ins::new(0x8000_03BC));
        let wait = wait_q(Ins::new(0x8000_03BF));
        assert!(wait.depends_on(&div));
    }
}
