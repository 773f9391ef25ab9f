use crate::unpack::Unpack;

/// Transfer state carried across calls of the transfer loop.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Command being processed, `0` when idle.
    pub cmd: u8,
    /// Payload words still owed to the current command.
    pub remaining: u32,
    /// Destination of multi-word commands: a word index for `STROW`, `STCOL` and `MPG`.
    pub addr: u32,
    /// Words left in the buffer of the current transfer.
    pub packet_remaining: u32,
    pub stalled: bool,
    /// Words of the current quadword already consumed, after a stall or a payload buffer that
    /// ended inside a quadword.
    pub irq_offset: u32,
    /// Interrupts requested and not yet delivered.
    pub irq: u32,
    /// The stall happened while transferring a tag.
    pub stall_on_tag: bool,
    /// The chain is finished.
    pub done: bool,
    pub unpack: Unpack,
}

impl Session {
    /// Whether an interrupt is waiting to be delivered at a command boundary.
    pub fn interrupt_pending(&self) -> bool {
        self.irq > 0 && self.remaining == 0
    }
}
