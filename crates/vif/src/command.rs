//! VIF0 command dispatch.
//!
//! Every command has a setup handler, run on the command word itself, and a data handler, run on
//! the words that follow it until its payload has been consumed.
use crate::{
    Vif0,
    modules::VuModule,
    regs::{AddMode, WriteCycle},
};
use bitos::integer::u2;
use strum::{FromRepr, IntoStaticStr};
use tracing::{debug, warn};

/// Runs on the command word.
pub type SetupFn = fn(&mut Vif0, &mut dyn VuModule);
/// Runs on the payload words following the command word. Returns how many were consumed.
pub type DataFn = fn(&mut Vif0, &mut dyn VuModule, &[u32]) -> usize;

/// Commands implemented by VIF0, other than `UNPACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u8)]
pub enum Command {
    #[strum(serialize = "NOP")]
    Nop = 0x00,
    #[strum(serialize = "STCYCL")]
    Stcycl = 0x01,
    #[strum(serialize = "ITOP")]
    Itop = 0x04,
    #[strum(serialize = "STMOD")]
    Stmod = 0x05,
    #[strum(serialize = "MARK")]
    Mark = 0x07,
    #[strum(serialize = "FLUSHE")]
    Flushe = 0x10,
    #[strum(serialize = "MSCAL")]
    Mscal = 0x14,
    #[strum(serialize = "MSCALF")]
    Mscalf = 0x15,
    #[strum(serialize = "MSCNT")]
    Mscnt = 0x17,
    #[strum(serialize = "STMASK")]
    Stmask = 0x20,
    #[strum(serialize = "STROW")]
    Strow = 0x30,
    #[strum(serialize = "STCOL")]
    Stcol = 0x31,
    #[strum(serialize = "MPG")]
    Mpg = 0x4A,
}

/// Whether `cmd` belongs to the unpack family.
pub fn is_unpack(cmd: u8) -> bool {
    cmd & 0x60 == 0x60
}

/// Name of a command byte, for diagnostics.
pub fn name(cmd: u8) -> &'static str {
    let cmd = cmd & 0x7F;
    if is_unpack(cmd) {
        return "UNPACK";
    }

    Command::from_repr(cmd).map_or("unknown", <&'static str>::from)
}

pub static SETUP_LUT: [SetupFn; 1 << 7] = {
    let mut lut = [Vif0::cmd_unknown as SetupFn; 1 << 7];

    lut[Command::Nop as usize] = Vif0::cmd_nop as SetupFn;
    lut[Command::Stcycl as usize] = Vif0::cmd_stcycl as SetupFn;
    lut[Command::Itop as usize] = Vif0::cmd_itop as SetupFn;
    lut[Command::Stmod as usize] = Vif0::cmd_stmod as SetupFn;
    lut[Command::Mark as usize] = Vif0::cmd_mark as SetupFn;
    lut[Command::Flushe as usize] = Vif0::cmd_flushe as SetupFn;
    lut[Command::Mscal as usize] = Vif0::cmd_mscal as SetupFn;
    lut[Command::Mscalf as usize] = Vif0::cmd_mscal as SetupFn;
    lut[Command::Mscnt as usize] = Vif0::cmd_mscnt as SetupFn;
    lut[Command::Stmask as usize] = Vif0::cmd_stmask as SetupFn;
    lut[Command::Strow as usize] = Vif0::cmd_strow as SetupFn;
    lut[Command::Stcol as usize] = Vif0::cmd_stcol as SetupFn;
    lut[Command::Mpg as usize] = Vif0::cmd_mpg as SetupFn;

    let mut i = 0x60;
    while i < 0x80 {
        lut[i] = Vif0::unpack_setup as SetupFn;
        i += 1;
    }

    lut
};

pub static DATA_LUT: [DataFn; 1 << 7] = {
    let mut lut = [Vif0::data_none as DataFn; 1 << 7];

    lut[Command::Stmask as usize] = Vif0::data_stmask as DataFn;
    lut[Command::Strow as usize] = Vif0::data_strow as DataFn;
    lut[Command::Stcol as usize] = Vif0::data_stcol as DataFn;
    lut[Command::Mpg as usize] = Vif0::data_mpg as DataFn;

    let mut i = 0x60;
    while i < 0x80 {
        lut[i] = Vif0::unpack_data as DataFn;
        i += 1;
    }

    lut
};

impl Vif0 {
    /// Completes an immediate command. Only the interrupt bit survives.
    #[inline(always)]
    fn complete(&mut self) {
        self.session.cmd &= 0x80;
    }

    /// Completes the payload of the current command.
    #[inline(always)]
    fn complete_payload(&mut self) {
        self.session.remaining = 0;
        self.session.cmd = 0;
    }

    /// Waits for the running micro program to end.
    pub(crate) fn flush(&mut self, vu: &mut dyn VuModule) {
        let waited = vu.finish();
        self.cycles += waited * self.config.bias;
    }

    pub(crate) fn cmd_unknown(&mut self, _: &mut dyn VuModule) {
        if !self.regs.err.mask_invalid_command() {
            warn!(
                cmd = self.session.cmd,
                code = self.regs.code,
                "unknown vif0 command"
            );

            self.regs.stat.set_invalid_command(true);
            self.session.irq += 1;
        }

        self.session.cmd = 0;
    }

    fn cmd_nop(&mut self, _: &mut dyn VuModule) {
        self.complete();
    }

    fn cmd_stcycl(&mut self, _: &mut dyn VuModule) {
        self.regs.cycle = WriteCycle::from_bits(self.regs.imm() as u32);
        self.complete();
    }

    fn cmd_itop(&mut self, _: &mut dyn VuModule) {
        self.regs.itop = self.regs.imm() & 0x3FF;
        self.complete();
    }

    fn cmd_stmod(&mut self, _: &mut dyn VuModule) {
        self.regs.mode = AddMode::from_bits(u2::new((self.regs.imm() & 0b11) as u8));
        self.complete();
    }

    fn cmd_mark(&mut self, _: &mut dyn VuModule) {
        self.regs.mark = self.regs.imm();
        self.regs.stat.set_mark(true);
        self.complete();
    }

    fn cmd_flushe(&mut self, vu: &mut dyn VuModule) {
        self.flush(vu);
        self.complete();
    }

    fn cmd_mscal(&mut self, vu: &mut dyn VuModule) {
        self.flush(vu);
        vu.start(self.regs.imm());
        self.complete();
    }

    fn cmd_mscnt(&mut self, vu: &mut dyn VuModule) {
        self.flush(vu);
        vu.resume();
        self.complete();
    }

    fn cmd_stmask(&mut self, _: &mut dyn VuModule) {
        self.session.remaining = 1;
    }

    fn cmd_strow(&mut self, _: &mut dyn VuModule) {
        self.session.addr = 0;
        self.session.remaining = 4;
    }

    fn cmd_stcol(&mut self, _: &mut dyn VuModule) {
        self.session.addr = 0;
        self.session.remaining = 4;
    }

    fn cmd_mpg(&mut self, vu: &mut dyn VuModule) {
        self.flush(vu);

        let num = self.regs.code_num();
        let instructions = if num == 0 { 256 } else { num as u32 };

        self.regs.num = num;
        self.session.addr = (self.regs.imm() as u32 * 2) % vumicro::MICRO_WORDS as u32;
        self.session.remaining = instructions * 2;

        debug!(
            addr = self.regs.imm(),
            instructions, "loading micro program"
        );
    }

    fn data_none(&mut self, _: &mut dyn VuModule, _: &[u32]) -> usize {
        self.session.cmd = 0;
        0
    }

    fn data_stmask(&mut self, _: &mut dyn VuModule, data: &[u32]) -> usize {
        let Some(&mask) = data.first() else {
            return 0;
        };

        self.regs.mask = mask;
        self.complete_payload();

        1
    }

    /// Stores payload words into a four word register, resuming at the session address.
    fn store_filter(&mut self, data: &[u32], column: bool) -> usize {
        let count = data.len().min(self.session.remaining as usize);
        let start = self.session.addr as usize;

        let target = if column {
            &mut self.regs.col
        } else {
            &mut self.regs.row
        };

        target[start..start + count].copy_from_slice(&data[..count]);

        self.session.addr += count as u32;
        self.session.remaining -= count as u32;
        if self.session.remaining == 0 {
            self.session.cmd = 0;
        }

        count
    }

    fn data_strow(&mut self, _: &mut dyn VuModule, data: &[u32]) -> usize {
        self.store_filter(data, false)
    }

    fn data_stcol(&mut self, _: &mut dyn VuModule, data: &[u32]) -> usize {
        self.store_filter(data, true)
    }

    fn data_mpg(&mut self, vu: &mut dyn VuModule, data: &[u32]) -> usize {
        let count = data.len().min(self.session.remaining as usize);
        for (i, &word) in data[..count].iter().enumerate() {
            vu.write_micro(self.session.addr + i as u32, word);
        }

        self.session.addr += count as u32;
        self.session.remaining -= count as u32;
        if self.session.remaining == 0 {
            self.session.cmd = 0;
        }

        count
    }
}
