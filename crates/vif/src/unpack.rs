//! `UNPACK`: decompression of vectors into VU data memory.
use crate::{Vif0, modules::VuModule, regs::AddMode};
use tinyvec::ArrayVec;
use tracing::debug;
use util::{sign_extend, zero_extend};
use vumicro::DATA_QWORDS;

/// Element layout of an unpack, from the command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Format {
    /// Components per vector, minus one.
    pub vn: u8,
    /// Element width: 32, 16, 8 or 5 bits.
    pub vl: u8,
}

impl Format {
    pub fn from_cmd(cmd: u8) -> Self {
        Self {
            vn: (cmd >> 2) & 0b11,
            vl: cmd & 0b11,
        }
    }

    /// Whether this is `V4-5` (RGBA 5551).
    pub fn is_packed(self) -> bool {
        self.vl == 3
    }

    /// Only `V4-5` exists with 5 bit elements.
    pub fn is_valid(self) -> bool {
        !self.is_packed() || self.vn == 3
    }

    /// Size in bytes of a single vector in the payload.
    pub fn vector_bytes(self) -> usize {
        if self.is_packed() {
            2
        } else {
            (self.vn as usize + 1) * (32 >> self.vl) / 8
        }
    }

    /// Expands the bytes of a vector into a quadword.
    pub fn expand(self, bytes: &[u8], unsigned: bool) -> [u32; 4] {
        if self.is_packed() {
            let value = u16::from_le_bytes([bytes[0], bytes[1]]) as u32;
            return [
                (value & 0x1F) << 3,
                ((value >> 5) & 0x1F) << 3,
                ((value >> 10) & 0x1F) << 3,
                ((value >> 15) & 1) << 7,
            ];
        }

        let width = 32 >> self.vl;
        let size = width as usize / 8;
        let element = |index: usize| {
            let raw = bytes[index * size..(index + 1) * size]
                .iter()
                .rev()
                .fold(0u32, |acc, &byte| (acc << 8) | byte as u32);

            if unsigned {
                zero_extend(raw, width)
            } else {
                sign_extend(raw, width)
            }
        };

        match self.vn {
            0 => [element(0); 4],
            1 => [element(0), element(1), element(0), element(1)],
            2 => [element(0), element(1), element(2), 0],
            _ => [element(0), element(1), element(2), element(3)],
        }
    }
}

/// Progress of the current unpack.
#[derive(Debug, Clone, Default)]
pub struct Unpack {
    pub format: Format,
    pub masked: bool,
    pub unsigned: bool,
    /// Next quadword of data memory to write.
    pub addr: u32,
    /// Quadwords left to write, including filled ones.
    pub left: u32,
    /// Position within the current write cycle block.
    pub cycle: u32,
    pub cl: u32,
    pub wl: u32,
    /// Bytes of an incomplete vector.
    pub residue: ArrayVec<[u8; 16]>,
}

impl Unpack {
    /// Number of vectors read from the payload to write `num` quadwords.
    pub fn vectors(num: u32, cl: u32, wl: u32) -> u32 {
        if wl <= cl {
            num
        } else {
            cl * (num / wl) + (num % wl).min(cl)
        }
    }
}

fn cycle_length(value: u8) -> u32 {
    if value == 0 { 256 } else { value as u32 }
}

impl Vif0 {
    pub(crate) fn unpack_setup(&mut self, vu: &mut dyn VuModule) {
        let cmd = self.session.cmd;
        let format = Format::from_cmd(cmd);
        if !format.is_valid() {
            self.cmd_unknown(vu);
            return;
        }

        let imm = self.regs.imm();
        let num = self.regs.code_num();
        let quadwords = if num == 0 { 256 } else { num as u32 };
        let cl = cycle_length(self.regs.cycle.cl());
        let wl = cycle_length(self.regs.cycle.wl());

        let vectors = Unpack::vectors(quadwords, cl, wl);
        let bytes = vectors as usize * format.vector_bytes();

        self.regs.num = num;
        self.session.remaining = bytes.div_ceil(4) as u32;
        self.session.unpack = Unpack {
            format,
            masked: cmd & 0x10 != 0,
            unsigned: imm & (1 << 14) != 0,
            addr: (imm & 0xFF) as u32,
            left: quadwords,
            cycle: 0,
            cl,
            wl,
            residue: ArrayVec::new(),
        };

        debug!(
            vn = format.vn,
            vl = format.vl,
            addr = imm & 0xFF,
            quadwords,
            words = self.session.remaining,
            "unpack"
        );
    }

    pub(crate) fn unpack_data(&mut self, vu: &mut dyn VuModule, data: &[u32]) -> usize {
        let count = data.len().min(self.session.remaining as usize);
        let vector_bytes = self.session.unpack.format.vector_bytes();

        for &word in &data[..count] {
            for byte in word.to_le_bytes() {
                if self.session.unpack.left == 0 {
                    break;
                }

                let unpack = &mut self.session.unpack;
                unpack.residue.push(byte);
                if unpack.residue.len() < vector_bytes {
                    continue;
                }

                let vector = unpack.format.expand(&unpack.residue, unpack.unsigned);
                unpack.residue.clear();

                self.write_vector(vu, Some(vector));
                self.fill_skipped(vu);
            }
        }

        self.session.remaining -= count as u32;
        if self.session.remaining == 0 {
            self.session.unpack.residue.clear();
            self.session.cmd = 0;
        }

        count
    }

    /// Writes the positions of the current write cycle block that take no data.
    fn fill_skipped(&mut self, vu: &mut dyn VuModule) {
        loop {
            let unpack = &self.session.unpack;
            if unpack.wl <= unpack.cl || unpack.cycle < unpack.cl || unpack.left == 0 {
                break;
            }

            self.write_vector(vu, None);
        }
    }

    /// Writes a quadword at the current position, `None` being a filling write.
    fn write_vector(&mut self, vu: &mut dyn VuModule, data: Option<[u32; 4]>) {
        let unpack = &self.session.unpack;
        let addr = unpack.addr;
        let row = unpack.cycle.min(3) as usize;
        let masked = unpack.masked;

        let mut quad = vu.read_data(addr);
        for (c, out) in quad.iter_mut().enumerate() {
            let op = if masked {
                (self.regs.mask >> (row * 8 + c * 2)) & 0b11
            } else {
                0
            };

            *out = match (op, data) {
                (0, Some(value)) => self.apply_mode(c, value[c]),
                (1, _) => self.regs.row[c],
                (2, _) => self.regs.col[row],
                _ => continue,
            };
        }
        vu.write_data(addr, quad);

        let unpack = &mut self.session.unpack;
        unpack.left -= 1;
        unpack.cycle += 1;
        unpack.addr = (unpack.addr + 1) % DATA_QWORDS as u32;

        if unpack.cycle >= unpack.wl {
            unpack.cycle = 0;
            if unpack.cl > unpack.wl {
                unpack.addr = (unpack.addr + unpack.cl - unpack.wl) % DATA_QWORDS as u32;
            }
        }
    }

    fn apply_mode(&mut self, component: usize, value: u32) -> u32 {
        match self.regs.mode {
            AddMode::Offset => value.wrapping_add(self.regs.row[component]),
            AddMode::Difference => {
                let row = &mut self.regs.row[component];
                *row = row.wrapping_add(value);
                *row
            }
            AddMode::Normal | AddMode::Reserved => value,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::regs::WriteCycle;
    use vumicro::{NopExecutor, Vu0};

    fn unpack(cmd: u8, num: u8, imm: u16) -> u32 {
        ((cmd as u32) << 24) | ((num as u32) << 16) | imm as u32
    }

    fn setup(cl: u8, wl: u8) -> (Vif0, Vu0<NopExecutor>) {
        let mut vif = Vif0::default();
        vif.regs.cycle = WriteCycle::default().with_cl(cl).with_wl(wl);
        (vif, Vu0::new(NopExecutor))
    }

    #[test]
    fn payload_sizes() {
        assert_eq!(Format::from_cmd(0x6C).vector_bytes(), 16);
        assert_eq!(Format::from_cmd(0x65).vector_bytes(), 4);
        assert_eq!(Format::from_cmd(0x6A).vector_bytes(), 3);
        assert_eq!(Format::from_cmd(0x6F).vector_bytes(), 2);
        assert!(!Format::from_cmd(0x63).is_valid());

        assert_eq!(Unpack::vectors(8, 4, 4), 8);
        assert_eq!(Unpack::vectors(8, 4, 2), 8);
        assert_eq!(Unpack::vectors(8, 1, 4), 2);
        assert_eq!(Unpack::vectors(7, 2, 4), 4);
    }

    #[test]
    fn v4_32() {
        let (mut vif, mut vu) = setup(1, 1);
        let words = [unpack(0x6C, 2, 0x10), 1, 2, 3, 4, 5, 6, 7, 8];

        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0x10], [1, 2, 3, 4]);
        assert_eq!(vu.state.data[0x11], [5, 6, 7, 8]);
        assert_eq!(vif.session.cmd, 0);
        assert_eq!(vif.regs.num, 2);
    }

    #[test]
    fn v2_16_sign_extension() {
        let (mut vif, mut vu) = setup(1, 1);
        let words = [unpack(0x65, 2, 0), 0x8000_7FFF, 0x0001_FFFF];

        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0], [0x7FFF, 0xFFFF_8000, 0x7FFF, 0xFFFF_8000]);
        assert_eq!(vu.state.data[1], [0xFFFF_FFFF, 1, 0xFFFF_FFFF, 1]);

        let (mut vif, mut vu) = setup(1, 1);
        let words = [unpack(0x65, 1, 1 << 14), 0x8000_7FFF];

        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0], [0x7FFF, 0x8000, 0x7FFF, 0x8000]);
    }

    #[test]
    fn v3_8_across_calls() {
        let (mut vif, mut vu) = setup(1, 1);

        assert!(vif.transfer(&mut vu, &[unpack(0x6A, 2, 4), 0x0403_02FF], false));
        assert_eq!(vu.state.data[4], [0xFFFF_FFFF, 2, 3, 0]);
        assert_eq!(vif.session.unpack.residue.as_slice(), &[4]);

        assert!(vif.transfer(&mut vu, &[0x0000_0605], false));
        assert_eq!(vu.state.data[5], [4, 5, 6, 0]);
        assert_eq!(vif.session.cmd, 0);
    }

    #[test]
    fn v4_5() {
        let (mut vif, mut vu) = setup(1, 1);
        let words = [unpack(0x6F, 2, 0), 0x0000_FFFF];

        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0], [0xF8, 0xF8, 0xF8, 0x80]);
        assert_eq!(vu.state.data[1], [0, 0, 0, 0]);
    }

    #[test]
    fn skipping_write() {
        let (mut vif, mut vu) = setup(4, 2);
        let words = [unpack(0x60, 4, 0), 1, 2, 3, 4];

        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0], [1; 4]);
        assert_eq!(vu.state.data[1], [2; 4]);
        assert_eq!(vu.state.data[2], [0; 4]);
        assert_eq!(vu.state.data[4], [3; 4]);
        assert_eq!(vu.state.data[5], [4; 4]);
    }

    #[test]
    fn filling_write() {
        let (mut vif, mut vu) = setup(1, 3);
        vif.regs.mask = 0b01 << 8 | 0b10 << 16;
        vif.regs.row = [10, 11, 12, 13];
        vif.regs.col = [20, 21, 22, 23];

        let words = [unpack(0x70, 6, 0), 1, 2];

        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0], [1; 4]);
        assert_eq!(vu.state.data[1], [10, 0, 0, 0]);
        assert_eq!(vu.state.data[2], [22, 0, 0, 0]);
        assert_eq!(vu.state.data[3], [2; 4]);
        assert_eq!(vu.state.data[4], [10, 0, 0, 0]);
        assert_eq!(vu.state.data[5], [22, 0, 0, 0]);
        assert_eq!(vif.session.unpack.left, 0);
    }

    #[test]
    fn masks_and_modes() {
        let (mut vif, mut vu) = setup(1, 1);
        vu.state.data[0] = [0xAA; 4];
        vif.regs.mask = 0b11_10_01_00;
        vif.regs.row = [100, 200, 300, 400];
        vif.regs.col = [7, 8, 9, 10];

        let words = [unpack(0x7C, 1, 0), 1, 2, 3, 4];
        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0], [1, 200, 7, 0xAA]);

        let (mut vif, mut vu) = setup(1, 1);
        vif.regs.mode = AddMode::Offset;
        vif.regs.row = [100, 200, 300, 400];

        let words = [unpack(0x6C, 1, 0), 1, 2, 3, 4];
        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0], [101, 202, 303, 404]);
        assert_eq!(vif.regs.row, [100, 200, 300, 400]);

        let (mut vif, mut vu) = setup(1, 1);
        vif.regs.mode = AddMode::Difference;
        vif.regs.row = [100, 200, 300, 400];

        let words = [unpack(0x6C, 2, 0), 1, 2, 3, 4, 1, 1, 1, 1];
        assert!(vif.transfer(&mut vu, &words, false));
        assert_eq!(vu.state.data[0], [101, 202, 303, 404]);
        assert_eq!(vu.state.data[1], [102, 203, 304, 405]);
        assert_eq!(vif.regs.row, [102, 203, 304, 405]);
    }

    #[test]
    fn invalid_format_is_unknown() {
        let (mut vif, mut vu) = setup(1, 1);
        assert!(!vif.transfer(&mut vu, &[unpack(0x63, 1, 0), 0], false));
        assert!(vif.regs.stat.invalid_command());
        assert_eq!(vif.session.cmd, 0);
    }
}
