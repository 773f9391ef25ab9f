use bitos::{
    BitUtils, bitos,
    integer::{u2, u4, u5, u6, u7},
};

/// Component mask of a vector operation.
#[bitos(4)]
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Dest {
    #[bits(0)]
    pub w: bool,
    #[bits(1)]
    pub z: bool,
    #[bits(2)]
    pub y: bool,
    #[bits(3)]
    pub x: bool,
}

impl Dest {
    pub fn xyzw() -> Self {
        Self::from_bits(u4::new(0b1111))
    }

    pub fn xyz() -> Self {
        Self::from_bits(u4::new(0b1110))
    }

    /// Mask selecting a single component, where 0 is `x` and 3 is `w`.
    pub fn component(index: u2) -> Self {
        Self::from_bits(u4::new(0b1000 >> index.value()))
    }

    pub fn is_empty(self) -> bool {
        self.to_bits().value() == 0
    }
}

impl std::fmt::Debug for Dest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (set, name) in [
            (self.x(), 'x'),
            (self.y(), 'y'),
            (self.z(), 'z'),
            (self.w(), 'w'),
        ] {
            if set {
                write!(f, "{name}")?;
            }
        }

        Ok(())
    }
}

/// A single 32-bit VU micro instruction, either the upper or the lower half of a pair.
///
/// Field names follow the upper pipeline layout. In the lower pipeline `fs` and `ft` name the
/// integer registers `is` and `it`, and `fd` names `id`.
#[bitos(32)]
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Ins {
    /// Primary opcode of the upper pipeline and of the lower `0x40` class.
    #[bits(0..6)]
    pub op: u6,
    /// Destination register, or the secondary opcode of the extended tables.
    #[bits(6..11)]
    pub fd: u5,
    #[bits(11..16)]
    pub fs: u5,
    #[bits(16..21)]
    pub ft: u5,
    #[bits(21..25)]
    pub dest: Dest,
    /// Primary opcode of the lower pipeline.
    #[bits(25..32)]
    pub class: u7,
}

impl Ins {
    #[inline(always)]
    pub fn new(code: u32) -> Self {
        Self::from_bits(code)
    }

    #[inline(always)]
    pub fn code(self) -> u32 {
        self.to_bits()
    }

    /// Broadcast component of the upper `*bc` forms.
    #[inline(always)]
    pub fn bc(self) -> u2 {
        u2::new(self.code().bits(0, 2) as u8)
    }

    /// Component selector for `fs` in lower scalar operations.
    #[inline(always)]
    pub fn fsf(self) -> u2 {
        u2::new(self.code().bits(21, 23) as u8)
    }

    /// Component selector for `ft` in lower scalar operations.
    #[inline(always)]
    pub fn ftf(self) -> u2 {
        u2::new(self.code().bits(23, 25) as u8)
    }

    /// Signed 11-bit immediate of lower branches and loads.
    #[inline(always)]
    pub fn imm11(self) -> i32 {
        util::sign_extend(self.code().bits(0, 11), 11) as i32
    }

    /// Unsigned 15-bit immediate of `IADDIU` and `ISUBIU`.
    #[inline(always)]
    pub fn imm15(self) -> u16 {
        (self.code().bits(0, 11) | (self.code().bits(21, 25) << 11)) as u16
    }

    /// Signed 5-bit immediate of `IADDI`.
    #[inline(always)]
    pub fn imm5(self) -> i16 {
        util::sign_extend(self.code().bits(6, 11), 5) as i16
    }

    /// Upper word `I` bit: the lower word holds an immediate for the `I` register.
    #[inline(always)]
    pub fn immediate(self) -> bool {
        self.code().bit(31)
    }

    /// Upper word `E` bit: the program ends after the next instruction pair.
    #[inline(always)]
    pub fn end(self) -> bool {
        self.code().bit(30)
    }

    /// Upper word `M` bit.
    #[inline(always)]
    pub fn m(self) -> bool {
        self.code().bit(29)
    }
}

impl std::fmt::Debug for Ins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ins({:08X})", self.code())
    }
}
