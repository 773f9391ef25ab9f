//! VIF0 DMA transfer engine.
//!
//! The engine is driven by the DMA controller: [`Vif0::start`] is called when the channel is
//! started and [`Vif0::on_event`] whenever the event it scheduled fires. Both walk the source
//! chain, feed its words through the command stream and return the delay, in cycles, after which
//! the channel wants to be called again.
//!
//! A transfer never blocks: when an interrupt is requested in the middle of a buffer, the
//! transfer loop returns early and keeps enough state to resume exactly where it stopped.
pub mod chain;
pub mod command;
pub mod dmac;
pub mod memory;
pub mod modules;
pub mod regs;
pub mod session;
pub mod system;
pub mod transfer;
pub mod unpack;

use dmac::Channel;
use regs::Registers;
use session::Session;

/// Timing configuration of the engine.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Cycles charged per quadword transferred and per VU cycle waited on.
    pub bias: u64,
    /// Delay between channel events.
    pub event_delay: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bias: 2,
            event_delay: 32,
        }
    }
}

/// The VIF0 channel: its DMA registers, VIF registers and transfer state.
#[derive(Debug, Clone, Default)]
pub struct Vif0 {
    pub config: Config,
    pub channel: Channel,
    pub regs: Registers,
    pub session: Session,
    /// Cycles spent by the current event.
    pub cycles: u64,
}

impl Vif0 {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Resets the transfer state and VIF registers, as on a channel disable.
    pub fn reset(&mut self) {
        self.session = Session::default();
        self.regs = Registers::default();
        self.cycles = 0;

        tracing::debug!("vif0 reset");
    }
}
