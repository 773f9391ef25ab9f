use crate::dmac::DmaChannel;

/// Trait for DMA controller modules.
pub trait DmacModule {
    /// Resolves a bus address into the words from it to the end of its region.
    fn resolve(&self, addr: u32) -> Option<&[u32]>;
    /// Whether the controller is enabled (`D_CTRL.DMAE`).
    fn enabled(&self) -> bool;
    /// Signals the end of a transfer on `channel`.
    fn raise_channel(&mut self, channel: DmaChannel);
    /// Signals a bus error on `channel`.
    fn bus_error(&mut self, channel: DmaChannel);
}

/// An implementation of [`DmacModule`] which has no memory.
#[derive(Debug, Clone, Copy)]
pub struct NopDmacModule;

impl DmacModule for NopDmacModule {
    fn resolve(&self, _: u32) -> Option<&[u32]> {
        None
    }

    fn enabled(&self) -> bool {
        true
    }

    fn raise_channel(&mut self, _: DmaChannel) {}
    fn bus_error(&mut self, _: DmaChannel) {}
}
