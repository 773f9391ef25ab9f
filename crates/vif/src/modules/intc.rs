/// Interrupt lines of the INTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IntcLine {
    Gs = 0,
    Sbus = 1,
    VBlankStart = 2,
    VBlankEnd = 3,
    Vif0 = 4,
    Vif1 = 5,
    Vu0 = 6,
    Vu1 = 7,
    Ipu = 8,
}

impl IntcLine {
    pub fn mask(self) -> u32 {
        1 << self as u8
    }
}

/// Trait for interrupt controller modules.
pub trait IntcModule {
    fn raise(&mut self, line: IntcLine);
    fn is_masked(&self, line: IntcLine) -> bool;
}

/// An implementation of [`IntcModule`] which does nothing.
#[derive(Debug, Clone, Copy)]
pub struct NopIntcModule;

impl IntcModule for NopIntcModule {
    fn raise(&mut self, _: IntcLine) {}

    fn is_masked(&self, _: IntcLine) -> bool {
        false
    }
}
