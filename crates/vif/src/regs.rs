//! VIF0 registers.
use bitos::{bitos, integer::u4};

/// The `VPS` field of `STAT`.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle = 0b00,
    /// Waiting for the data of a command.
    Waiting = 0b01,
    Decoding = 0b10,
    Transferring = 0b11,
}

/// The `STAT` register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Status {
    #[bits(0..2)]
    pub pipeline: PipelineState,
    /// MRK
    #[bits(6)]
    pub mark: bool,
    /// VSS
    #[bits(8)]
    pub stalled_by_stop: bool,
    /// VFS
    #[bits(9)]
    pub stalled_by_break: bool,
    /// VIS
    #[bits(10)]
    pub stalled_by_interrupt: bool,
    /// INT
    #[bits(11)]
    pub interrupted: bool,
    /// ER0
    #[bits(12)]
    pub tag_mismatch: bool,
    /// ER1
    #[bits(13)]
    pub invalid_command: bool,
    /// FQC
    #[bits(24..28)]
    pub fifo_count: u4,
}

impl Status {
    /// Whether the VIF is stalled and must be released before continuing.
    pub fn is_stalled(&self) -> bool {
        self.stalled_by_stop() || self.stalled_by_break() || self.stalled_by_interrupt()
    }
}

/// The `ERR` register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorMask {
    /// MII
    #[bits(0)]
    pub mask_interrupt: bool,
    /// ME0
    #[bits(1)]
    pub mask_tag_mismatch: bool,
    /// ME1
    #[bits(2)]
    pub mask_invalid_command: bool,
}

/// The `CYCLE` register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteCycle {
    #[bits(0..8)]
    pub cl: u8,
    #[bits(8..16)]
    pub wl: u8,
}

/// The `MODE` register: how unpacked data is combined with `ROW`.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddMode {
    #[default]
    Normal = 0b00,
    Offset = 0b01,
    Difference = 0b10,
    Reserved = 0b11,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Registers {
    pub stat: Status,
    pub err: ErrorMask,
    pub cycle: WriteCycle,
    pub mode: AddMode,
    pub mask: u32,
    pub row: [u32; 4],
    pub col: [u32; 4],
    /// Last command word fetched.
    pub code: u32,
    pub itop: u16,
    pub mark: u16,
    pub num: u8,
}

impl Registers {
    /// Immediate field of the last command.
    pub fn imm(&self) -> u16 {
        self.code as u16
    }

    /// `NUM` field of the last command.
    pub fn code_num(&self) -> u8 {
        (self.code >> 16) as u8
    }
}
