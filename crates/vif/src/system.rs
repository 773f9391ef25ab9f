//! A minimal machine around VIF0: memory, DMA and interrupt controllers, a VU and a scheduler.

pub mod scheduler;

use crate::{
    Config, Vif0,
    dmac::DmaChannel,
    memory::Memory,
    modules::{Bus, DmacModule, IntcLine, IntcModule, VuModule},
};
use scheduler::Scheduler;

/// DMA controller state.
pub struct Dmac {
    pub memory: Memory,
    /// `D_CTRL.DMAE`.
    pub enabled: bool,
    /// Channel interrupt status, one bit per channel.
    pub stat: u32,
    /// Set when a channel hits an unmapped address.
    pub bus_error: bool,
}

impl Default for Dmac {
    fn default() -> Self {
        Self {
            memory: Memory::new(),
            enabled: true,
            stat: 0,
            bus_error: false,
        }
    }
}

impl DmacModule for Dmac {
    fn resolve(&self, addr: u32) -> Option<&[u32]> {
        self.memory.resolve(addr)
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn raise_channel(&mut self, channel: DmaChannel) {
        self.stat |= 1 << channel as u8;
    }

    fn bus_error(&mut self, channel: DmaChannel) {
        tracing::warn!(?channel, "dma bus error");
        self.bus_error = true;
    }
}

/// Interrupt controller state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Intc {
    pub stat: u32,
    /// Enabled lines.
    pub mask: u32,
}

impl IntcModule for Intc {
    fn raise(&mut self, line: IntcLine) {
        self.stat |= line.mask();
    }

    fn is_masked(&self, line: IntcLine) -> bool {
        self.mask & line.mask() == 0
    }
}

/// System state.
pub struct System {
    pub scheduler: Scheduler,
    pub vif0: Vif0,
    pub dmac: Dmac,
    pub intc: Intc,
    pub vu: Box<dyn VuModule>,
    /// Cycles charged by VIF0 over all of its events.
    pub vif0_cycles: u64,
}

impl System {
    pub fn new(config: Config, vu: Box<dyn VuModule>) -> Self {
        Self {
            scheduler: Scheduler::default(),
            vif0: Vif0::new(config),
            dmac: Dmac::default(),
            intc: Intc::default(),
            vu,
            vif0_cycles: 0,
        }
    }

    fn with_vif0<R>(&mut self, f: impl FnOnce(&mut Vif0, &mut Bus) -> R) -> R {
        let mut bus = Bus {
            dmac: &mut self.dmac,
            intc: &mut self.intc,
            vu: self.vu.as_mut(),
        };

        let result = f(&mut self.vif0, &mut bus);
        self.vif0_cycles += self.vif0.cycles;

        result
    }

    fn schedule_vif0(&mut self, after: Option<u64>) {
        self.scheduler.cancel(vif0_event);
        if let Some(after) = after {
            self.scheduler.schedule(after, vif0_event);
        }
    }

    /// Starts the VIF0 channel with its current registers.
    pub fn start_vif0(&mut self) {
        let next = self.with_vif0(|vif, bus| vif.start(bus));
        self.schedule_vif0(next);
    }

    /// Releases a VIF0 stall, as a write of `FBRST.STC` would.
    pub fn release_vif0_stall(&mut self) {
        let next = self.with_vif0(|vif, bus| vif.release_stall(bus));
        if next.is_some() {
            self.schedule_vif0(next);
        }
    }

    /// Disables the VIF0 channel, dropping its transfer state.
    pub fn reset_vif0(&mut self) {
        self.scheduler.cancel(vif0_event);
        self.vif0.reset();
        self.vif0.channel.control.set_started(false);
    }

    /// Runs events until none are left or the next one is past `limit` cycles. Returns the
    /// elapsed cycles.
    pub fn run(&mut self, limit: u64) -> u64 {
        while let Some(until) = self.scheduler.until_next() {
            if self.scheduler.elapsed() + until > limit {
                break;
            }

            self.scheduler.advance(until);
            while let Some(handler) = self.scheduler.pop() {
                handler(self);
            }
        }

        self.scheduler.elapsed()
    }
}

fn vif0_event(sys: &mut System) {
    let next = sys.with_vif0(|vif, bus| vif.on_event(bus));
    sys.schedule_vif0(next);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dmac::Mode;
    use vumicro::{NopExecutor, Vu0};

    fn system() -> System {
        System::new(Config::default(), Box::new(Vu0::new(NopExecutor)))
    }

    /// Writes a chain with a CNT block holding an unpack followed by an END tag.
    fn unpack_chain(sys: &mut System) {
        let words = [
            // CNT, 2 quadwords
            (1 << 28) | 2,
            0,
            0,
            0,
            // STCYCL 1/1, UNPACK V4-32 of 1 quadword at 3
            0x0100_0101,
            0x6C01_0003,
            10,
            20,
            30,
            40,
            0,
            0,
            // END
            7 << 28,
            0,
            0,
            0,
        ];

        sys.dmac.memory.write_words(0x1000, &words).unwrap();
        sys.vif0.channel.control.set_mode(Mode::Chain);
        sys.vif0.channel.tadr = 0x1000;
    }

    #[test]
    fn unpack_through_chain() {
        let mut sys = system();
        unpack_chain(&mut sys);

        sys.start_vif0();
        let elapsed = sys.run(u64::MAX);

        assert!(sys.scheduler.is_empty());
        assert_eq!(elapsed, 2 * sys.vif0.config.event_delay);
        assert_eq!(sys.vu.read_data(3), [10, 20, 30, 40]);
        assert_eq!(sys.dmac.stat, 1 << DmaChannel::Vif0 as u8);
        assert!(!sys.vif0.channel.control.started());
        assert_eq!(sys.vif0_cycles, 2 * sys.vif0.config.bias + 2);
    }

    #[test]
    fn timing_follows_config() {
        let config = Config {
            bias: 5,
            event_delay: 7,
        };

        let mut sys = System::new(config, Box::new(Vu0::new(NopExecutor)));
        unpack_chain(&mut sys);

        sys.start_vif0();
        assert_eq!(sys.run(u64::MAX), 14);
        assert_eq!(sys.vif0_cycles, 12);
        assert_eq!(sys.vu.read_data(3), [10, 20, 30, 40]);
    }

    #[test]
    fn interrupt_then_release() {
        let mut sys = system();
        sys.intc.mask = IntcLine::Vif0.mask();

        let words = [0x8000_0000, 0x2000_0000, 0xFF, 0];
        sys.dmac.memory.write_words(0x2000, &words).unwrap();
        sys.vif0.channel.madr = 0x2000;
        sys.vif0.channel.qwc = 1;

        sys.start_vif0();
        sys.run(u64::MAX);

        assert_eq!(sys.intc.stat, IntcLine::Vif0.mask());
        assert_eq!(sys.dmac.stat, 0);
        assert!(sys.vif0.regs.stat.stalled_by_interrupt());
        assert_eq!(sys.vif0.regs.mask, 0);

        sys.release_vif0_stall();
        sys.run(u64::MAX);

        assert_eq!(sys.vif0.regs.mask, 0xFF);
        assert_eq!(sys.dmac.stat, 1);
        assert_eq!(sys.vif0.channel.qwc, 0);
    }

    #[test]
    fn run_respects_limit() {
        let mut sys = system();
        sys.dmac.memory.write_words(0x1000, &[0; 4]).unwrap();
        sys.vif0.channel.madr = 0x1000;
        sys.vif0.channel.qwc = 1;

        sys.start_vif0();
        assert_eq!(sys.run(10), 0);
        assert_eq!(sys.scheduler.len(), 1);

        sys.run(u64::MAX);
        assert!(sys.scheduler.is_empty());
        assert_eq!(sys.dmac.stat, 1);
    }

    #[test]
    fn bus_error_on_unmapped_tag() {
        let mut sys = system();
        sys.vif0.channel.control.set_mode(Mode::Chain);
        sys.vif0.channel.tadr = 0x1FFF_FFF0;

        sys.start_vif0();
        sys.run(u64::MAX);

        assert!(sys.dmac.bus_error);
        assert!(!sys.vif0.channel.control.started());
    }

    #[test]
    fn reset_cancels_events() {
        let mut sys = system();
        sys.vif0.channel.control.set_mode(Mode::Chain);
        sys.vif0.session.irq = 3;

        sys.start_vif0();
        assert_eq!(sys.scheduler.len(), 1);

        sys.reset_vif0();
        assert!(sys.scheduler.is_empty());
        assert_eq!(sys.vif0.session.irq, 0);
    }
}
