//! Collaborator modules.
//!
//! Modules provide the transfer engine with the parts of the machine it talks to (the DMA
//! controller, the interrupt controller and the vector unit) but do not drive the transfer
//! themselves.

pub mod dmac;
pub mod intc;
pub mod vu;

pub use dmac::{DmacModule, NopDmacModule};
pub use intc::{IntcLine, IntcModule, NopIntcModule};
pub use vu::{NopVuModule, VuModule};

/// Mutable access to every collaborator of the channel for the duration of one call.
pub struct Bus<'a> {
    pub dmac: &'a mut dyn DmacModule,
    pub intc: &'a mut dyn IntcModule,
    pub vu: &'a mut dyn VuModule,
}
